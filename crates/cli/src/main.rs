mod send_commands;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "moltis", about = "Send messages through the moltis DingTalk channel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to ~/.config/moltis/moltis.toml).
    #[arg(long, global = true, env = "MOLTIS_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(flatten)]
    credentials: send_commands::CredentialArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a text message.
    Send {
        /// Destination: session webhook URL, `user:<id>`, `group:<id>`, `cid...`
        /// or a bare user ID.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
    /// Send media, optionally preceded by text.
    SendMedia {
        #[arg(long)]
        to: String,
        /// Remote URL, local path, or `data:` URL.
        #[arg(long)]
        media: String,
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "moltis starting");

    let config = send_commands::load_config(cli.config.as_deref(), &cli.credentials)?;
    let result = match cli.command {
        Commands::Send { to, message } => send_commands::send_text(&config, &to, &message).await?,
        Commands::SendMedia { to, media, message } => {
            send_commands::send_media(&config, &to, message.as_deref(), &media).await?
        },
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
