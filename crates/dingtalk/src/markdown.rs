//! Markdown helpers for outbound text: table conversion, markdown detection
//! and chunking.

use serde::{Deserialize, Serialize};

/// DingTalk text message size limit used by the outbound chunker.
pub const TEXT_CHUNK_LIMIT: usize = 4000;

/// How markdown tables are handled before text is composed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownTableMode {
    /// Leave tables untouched.
    Native,
    /// Render tables as aligned plain-text columns.
    #[default]
    Ascii,
    /// Drop table syntax, keeping one line of cells per row.
    Strip,
}

/// Transform markdown tables in `text` according to `mode`.
///
/// A table is a header row directly followed by a `---|---` rule row, plus
/// every pipe row after it. Tables inside code fences are left alone.
pub fn convert_markdown_tables(text: &str, mode: MarkdownTableMode) -> String {
    if mode == MarkdownTableMode::Native {
        return text.to_string();
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_fence = false;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let header = if in_fence { None } else { row_cells(line) };
        if let Some(header) = header
            && lines.get(i + 1).is_some_and(|next| is_rule(next))
        {
            let mut rows = vec![header];
            i += 2;
            while let Some(cells) = lines.get(i).and_then(|l| row_cells(l)) {
                rows.push(cells);
                i += 1;
            }
            out.push(match mode {
                MarkdownTableMode::Strip => render_stripped(&rows),
                _ => render_ascii(&rows),
            });
            continue;
        }
        out.push(line.to_string());
        i += 1;
    }
    out.join("\n")
}

// ── Tables ───────────────────────────────────────────────────────────────

/// Cells of a pipe row, or `None` when the line is not one.
///
/// A row starts with `|` or holds at least two pipes, so prose such as
/// "a | b" stays prose.
fn row_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    let is_row = trimmed.len() > 1
        && (trimmed.starts_with('|') || trimmed.matches('|').count() >= 2);
    if !is_row {
        return None;
    }
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    Some(inner.split('|').map(|c| c.trim().to_owned()).collect())
}

fn is_rule(line: &str) -> bool {
    row_cells(line).is_some_and(|cells| {
        cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
    })
}

fn render_ascii(rows: &[Vec<String>]) -> String {
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; col_count];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (row_idx, row) in rows.iter().enumerate() {
        let mut line = String::new();
        for (col_idx, cell) in row.iter().enumerate() {
            if col_idx > 0 {
                line.push_str(" | ");
            }
            line.push_str(cell);
            let pad = widths[col_idx].saturating_sub(cell.chars().count());
            line.extend(std::iter::repeat_n(' ', pad));
        }
        lines.push(line.trim_end().to_string());
        if row_idx == 0 && rows.len() > 1 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            lines.push(rule.join("-+-"));
        }
    }
    lines.join("\n")
}

fn render_stripped(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .filter(|c| !c.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Markdown detection ───────────────────────────────────────────────────

/// Heuristic check for markdown syntax worth rendering as a markdown message.
pub fn looks_like_markdown(text: &str) -> bool {
    if text.contains("```") || text.contains("**") || text.contains("](") {
        return true;
    }
    text.lines().any(|line| {
        let t = line.trim_start();
        t.starts_with("# ")
            || t.starts_with("## ")
            || t.starts_with("### ")
            || t.starts_with("> ")
            || t.starts_with("- ")
            || t.starts_with("* ")
            || is_ordered_list_item(t)
            || row_cells(t.trim_end()).is_some()
    })
}

fn is_ordered_list_item(line: &str) -> bool {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Title for a markdown message: first non-empty line without heading marks,
/// capped at 20 characters.
pub fn derive_title(text: &str) -> String {
    let first = text
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let title: String = first.chars().take(20).collect();
    if title.is_empty() {
        "Message".into()
    } else {
        title
    }
}

// ── Chunking ─────────────────────────────────────────────────────────────

/// Split markdown into chunks of at most `limit` bytes.
///
/// Splits at newlines, then spaces, never inside a UTF-8 character. A code
/// fence left open at a split is closed in that chunk and reopened in the
/// next one.
pub fn chunk_markdown_text(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.is_empty() {
        return Vec::new();
    }
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    const FENCE_CLOSE: &str = "\n```";
    let mut chunks = Vec::new();
    let mut remaining = text;
    let mut reopen: Option<String> = None;

    while !remaining.is_empty() {
        let prefix = reopen.take().map(|f| format!("{f}\n")).unwrap_or_default();
        // Leave room for a fence reopen and a possible close.
        let budget = limit
            .saturating_sub(prefix.len())
            .saturating_sub(FENCE_CLOSE.len())
            .max(1);

        if prefix.len() + remaining.len() <= limit {
            chunks.push(format!("{prefix}{remaining}"));
            break;
        }

        let split_at = best_split(remaining, budget);
        let head = &remaining[..split_at];
        let mut chunk = format!("{prefix}{head}");
        if let Some(fence) = open_fence(&chunk) {
            chunk.push_str(FENCE_CLOSE);
            reopen = Some(fence);
        }
        chunks.push(chunk);

        // Drop only the separator the split landed on.
        remaining = &remaining[split_at..];
        remaining = remaining
            .strip_prefix('\n')
            .or_else(|| remaining.strip_prefix(' '))
            .unwrap_or(remaining);
    }

    chunks
}

fn best_split(text: &str, budget: usize) -> usize {
    let mut window_end = budget.min(text.len());
    while !text.is_char_boundary(window_end) {
        window_end -= 1;
    }
    if window_end == 0 {
        window_end = text.chars().next().map(char::len_utf8).unwrap_or(text.len());
    }
    let slice = &text[..window_end];
    slice
        .rfind('\n')
        .or_else(|| slice.rfind(' '))
        .filter(|pos| *pos > 0)
        .unwrap_or(window_end)
}

/// The opening fence line (e.g. "```rust") if `chunk` ends inside a fence.
fn open_fence(chunk: &str) -> Option<String> {
    let mut open: Option<&str> = None;
    for line in chunk.lines() {
        let t = line.trim_start();
        if t.starts_with("```") {
            open = match open {
                Some(_) => None,
                None => Some(t),
            };
        }
    }
    open.map(str::to_owned)
}
