mod dispatch;
mod job;
mod registry;
mod timeparse;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use streamcap_capture::delivery::DeliveryOptions;
use streamcap_capture::recorder::Recorder;
use streamcap_config::StreamcapConfig;
use streamcap_directory::ChannelDirectory;
use streamcap_telegram::api::TelegramApi;
use streamcap_telegram::polling;
use streamcap_telegram::types::{BotCommand, SetMyCommandsParams};

use dispatch::Dispatcher;
use job::JobDeps;
use registry::JobRegistry;

#[derive(Parser)]
#[command(name = "streamcap", about = "Telegram stream-capture bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Config file path (defaults to ~/.streamcap/config.json5)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the resolved configuration summary
    Health {
        /// Config file path (defaults to ~/.streamcap/config.json5)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = load(config)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(config))?;
        }
        Commands::Health { config } => {
            let config = load(config)?;
            println!("streamcap configuration:");
            println!("  allowed chat id: {}", config.telegram.allowed_chat_id);
            println!(
                "  bot token: {}",
                if config.telegram.bot_token.is_empty() {
                    "NOT SET"
                } else {
                    "set"
                }
            );
            println!("  ffmpeg: {}", config.recorder.ffmpeg_path.display());
            println!("  work dir: {}", config.recorder.work_dir.display());
            println!("  channel directory: {}", config.directory.path.display());
            println!("  timezone offset: {} min", config.timezone_offset_minutes);
        }
    }

    Ok(())
}

fn load(path: Option<PathBuf>) -> anyhow::Result<StreamcapConfig> {
    let config = match path {
        Some(path) => streamcap_config::load_config_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => streamcap_config::load_config().context("failed to load config")?,
    };
    Ok(config)
}

async fn run(config: StreamcapConfig) -> anyhow::Result<()> {
    anyhow::ensure!(
        !config.telegram.bot_token.is_empty(),
        "bot token not configured (set telegram.bot_token or STREAMCAP_BOT_TOKEN)"
    );
    let tz = config.timezone()?;

    let api = Arc::new(TelegramApi::new(&config.telegram.bot_token)?);
    let bot = api
        .get_me()
        .await
        .context("failed to authenticate Telegram bot")?;
    info!(
        bot_username = bot.username.as_deref().unwrap_or("unknown"),
        "Telegram bot authenticated"
    );

    if let Err(e) = api.set_my_commands(&command_menu()).await {
        warn!("Failed to register bot commands: {e:#}");
    }

    tokio::fs::create_dir_all(&config.recorder.work_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create work dir {}",
                config.recorder.work_dir.display()
            )
        })?;

    let directory = Arc::new(ChannelDirectory::new(
        config.directory.path.clone(),
        Duration::from_secs(config.directory.reload_secs),
    ));
    let registry = Arc::new(JobRegistry::new());
    let deps = Arc::new(JobDeps {
        sink: api.clone(),
        recorder: Arc::new(Recorder::new(config.recorder.ffmpeg_path.clone())),
        registry,
        delivery: DeliveryOptions {
            max_upload_bytes: config.recorder.max_upload_bytes,
            segment_seconds: config.recorder.segment_seconds,
        },
    });
    let dispatcher = Dispatcher::new(
        api.clone(),
        deps,
        directory,
        config.telegram.allowed_chat_id,
        tz,
        config.recorder.work_dir.clone(),
    );

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(64);

    let poll_cancel = cancel.child_token();
    let poll_api = api.clone();
    let poll_handle = tokio::spawn(async move {
        polling::run_polling_loop(&poll_api, tx, poll_cancel).await;
    });

    let dispatch_cancel = cancel.child_token();
    let dispatch_handle = tokio::spawn(dispatcher.run(rx, dispatch_cancel));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutting down");
    cancel.cancel();
    let _ = poll_handle.await;
    let _ = dispatch_handle.await;

    Ok(())
}

fn command_menu() -> SetMyCommandsParams {
    SetMyCommandsParams {
        commands: vec![
            BotCommand {
                command: "start".into(),
                description: "Welcome message".into(),
            },
            BotCommand {
                command: "record".into(),
                description: "Schedule a recording: URL start end".into(),
            },
            BotCommand {
                command: "rsec".into(),
                description: "Record in seconds: URL offset duration".into(),
            },
            BotCommand {
                command: "mrr".into(),
                description: "Schedule by channel: name start end".into(),
            },
            BotCommand {
                command: "mrr_sec".into(),
                description: "Channel recording in seconds".into(),
            },
            BotCommand {
                command: "jobs".into(),
                description: "List capture jobs".into(),
            },
            BotCommand {
                command: "cancel".into(),
                description: "Cancel a pending job".into(),
            },
        ],
    }
}
