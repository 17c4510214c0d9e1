//! Media source resolution and upload.
//!
//! A media reference is an in-memory buffer, a local path (`/`, `~`, drive
//! letter, `file:` URL, or anything that is not a URL) or a remote URL. Local
//! sources are read into memory; remote sources are passed on by reference.

use std::path::{Path, PathBuf};

use {
    base64::Engine,
    reqwest::multipart::{Form, Part},
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::debug,
};

use crate::{
    auth::ACCESS_TOKEN_HEADER,
    client::DingTalkClient,
    error::{Context, Error, Result},
};

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];
pub const VOICE_EXTENSIONS: [&str; 5] = ["opus", "ogg", "mp3", "wav", "m4a"];

const DEFAULT_FILE_NAME: &str = "file";

/// Upload/media category, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Voice,
    File,
}

impl MediaKind {
    /// Value of the upload `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Voice => "voice",
            Self::File => "file",
        }
    }
}

pub fn detect_media_kind(name: &str) -> MediaKind {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if VOICE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Voice
    } else {
        MediaKind::File
    }
}

/// Bytes supplied directly by the caller.
#[derive(Debug, Clone)]
pub struct MediaBuffer {
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

/// A media reference ready for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bytes { data: Vec<u8>, name: String },
    Remote { url: String, name: String },
}

impl MediaSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Bytes { name, .. } | Self::Remote { name, .. } => name,
        }
    }

    pub fn kind(&self) -> MediaKind {
        detect_media_kind(self.name())
    }
}

/// Whether `url_or_path` refers to the local filesystem.
pub fn is_local_path(url_or_path: &str) -> bool {
    if url_or_path.starts_with('/') || url_or_path.starts_with('~') || has_drive_letter(url_or_path)
    {
        return true;
    }
    match url::Url::parse(url_or_path) {
        Ok(url) => url.scheme() == "file",
        Err(_) => true,
    }
}

fn has_drive_letter(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

/// Resolve a media reference. An explicit buffer wins over `url_or_path`.
pub async fn resolve_media_source(
    url_or_path: Option<&str>,
    buffer: Option<MediaBuffer>,
) -> Result<MediaSource> {
    resolve_with_home(url_or_path, buffer, home_dir().as_deref()).await
}

pub(crate) async fn resolve_with_home(
    url_or_path: Option<&str>,
    buffer: Option<MediaBuffer>,
    home: Option<&Path>,
) -> Result<MediaSource> {
    if let Some(buffer) = buffer {
        return Ok(MediaSource::Bytes {
            data: buffer.data,
            name: buffer
                .file_name
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        });
    }
    let Some(url_or_path) = url_or_path.map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(Error::invalid_input(
            "either a media URL or a media buffer must be provided",
        ));
    };

    if !is_local_path(url_or_path) {
        let name = url::Url::parse(url_or_path)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_owned))
            })
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        return Ok(MediaSource::Remote {
            url: url_or_path.to_string(),
            name,
        });
    }

    let path = local_path(url_or_path, home);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound { path });
        },
        Err(e) => return Err(e.into()),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();
    debug!(path = %path.display(), bytes = data.len(), "read local media");
    Ok(MediaSource::Bytes { data, name })
}

fn local_path(url_or_path: &str, home: Option<&Path>) -> PathBuf {
    if let Some(rest) = url_or_path.strip_prefix('~') {
        let rest = rest.trim_start_matches(['/', '\\']);
        return match home {
            Some(home) => home.join(rest),
            None => PathBuf::from(url_or_path),
        };
    }
    if let Ok(url) = url::Url::parse(url_or_path)
        && url.scheme() == "file"
        && let Ok(path) = url.to_file_path()
    {
        return path;
    }
    PathBuf::from(url_or_path)
}

/// Decode a `data:<mime>;base64,<payload>` URL into a buffer.
pub fn decode_data_url(data_url: &str, file_name: Option<&str>) -> Result<MediaBuffer> {
    let rest = data_url
        .strip_prefix("data:")
        .context("not a data URL")?;
    let (meta, payload) = rest.split_once(',').context("data URL has no payload")?;
    if !meta.ends_with(";base64") {
        return Err(Error::invalid_input("only base64 data URLs are supported"));
    }
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .context("invalid base64 in data URL")?;
    let mime = meta.trim_end_matches(";base64");
    let name = file_name.map(str::to_owned).or_else(|| {
        mime.split_once('/')
            .map(|(_, subtype)| format!("{DEFAULT_FILE_NAME}.{}", subtype.trim_start_matches("x-")))
    });
    Ok(MediaBuffer {
        data,
        file_name: name,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    media_id: Option<String>,
}

/// Upload bytes and return the opaque media ID.
///
/// Fails with [`Error::NoClient`] when no authenticated client is attached.
pub async fn upload_media(
    client: Option<&DingTalkClient>,
    data: &[u8],
    name: &str,
    kind: MediaKind,
) -> Result<String> {
    let client = client.ok_or(Error::NoClient)?;
    let token = client.access_token().await?;

    let part = Part::bytes(data.to_vec())
        .file_name(name.to_string())
        .mime_str("application/octet-stream")
        .map_err(|e| Error::upload_failed(e.to_string()))?;
    let form = Form::new()
        .part("file", part)
        .text("type", kind.as_str())
        .text("robotCode", client.robot_code().to_string());

    let resp = client
        .http()
        .post(format!("{}/v1.0/robot/messageFiles/upload", client.api_base()))
        .header(ACCESS_TOKEN_HEADER, token.expose_secret())
        .multipart(form)
        .send()
        .await
        .map_err(|e| Error::upload_failed(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::upload_failed(format!("{status}: {body}")));
    }
    let body: UploadResponse = resp
        .json()
        .await
        .map_err(|e| Error::upload_failed(e.to_string()))?;
    let media_id = body
        .media_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::upload_failed("no mediaId returned"))?;
    debug!(name, kind = kind.as_str(), "uploaded media");
    Ok(media_id)
}
