use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use notecatch::channels::{Channel, CliChannel, DiscordChannel};
use notecatch::classifier::TextClassifier;
use notecatch::config::Config;
use notecatch::coordinator::{normalize, CaptureCoordinator};
use notecatch::dispatch::Dispatcher;
use notecatch::gateway;
use notecatch::providers::GeminiProvider;
use notecatch::storage::{create_backend, StorageSession};

#[derive(Parser)]
#[command(name = "notecatch")]
#[command(about = "Turn chat messages into notes and checklists")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./notecatch.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and the health endpoint
    Run {
        #[arg(long, value_enum, default_value = "discord")]
        channel: ChannelKind,
    },
    /// Log in to note storage and print the session token
    Login,
    /// Classify one text and print the capture as JSON (nothing is stored)
    Classify {
        text: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChannelKind {
    Discord,
    Cli,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "notecatch=debug" } else { "notecatch=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { channel } => run(config, channel).await,
        Commands::Login => login(&config).await,
        Commands::Classify { text } => classify(&config, &text).await,
    }
}

fn build_classifier(config: &Config) -> Result<TextClassifier> {
    let provider = GeminiProvider::from_config(&config.llm)?;
    tracing::info!(model = provider.model(), "LLM provider ready");
    Ok(TextClassifier::with_default_title(
        Arc::new(provider),
        config.capture.default_title.clone(),
    ))
}

fn build_storage(config: &Config) -> Result<StorageSession> {
    config.validate_storage()?;
    let backend = create_backend(&config.storage)?;
    Ok(StorageSession::new(backend, config.credentials()))
}

async fn run(config: Config, kind: ChannelKind) -> Result<()> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    tokio::spawn(async move {
        if let Err(e) = gateway::run_health_server(&host, port).await {
            tracing::error!("Health endpoint stopped: {e}");
        }
    });

    let classifier = Arc::new(build_classifier(&config)?);
    let storage = Arc::new(build_storage(&config)?);
    if let Err(e) = storage.login().await {
        // Writes retry the login lazily.
        tracing::error!("CRITICAL: failed to initialize note storage: {e}");
    }

    let owner = config.authorized_principal();
    if owner.is_none() {
        tracing::warn!("OWNER_ID is not set; every message will be ignored");
    }

    let channel: Arc<dyn Channel> = match kind {
        ChannelKind::Discord => {
            let token = config
                .discord
                .bot_token
                .clone()
                .context("DISCORD_TOKEN is required for the discord channel")?;
            Arc::new(DiscordChannel::new(token))
        }
        ChannelKind::Cli => Arc::new(CliChannel::new(owner.clone().unwrap_or_default())),
    };

    let coordinator = Arc::new(CaptureCoordinator::new(
        classifier,
        storage,
        config.capture.mode,
        owner,
    ));
    let dispatcher = Arc::new(Dispatcher::new(coordinator, Arc::clone(&channel)));

    let (tx, rx) = mpsc::channel(64);
    let dispatch_task = tokio::spawn(dispatcher.run(rx));

    tracing::info!(
        channel = channel.name(),
        mode = ?config.capture.mode,
        "notecatch is running"
    );

    tokio::select! {
        result = channel.listen(tx) => {
            if let Err(e) = result {
                tracing::error!("Channel {} stopped: {e}", channel.name());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    // Sender is gone once `listen` returns or is dropped.
    let _ = dispatch_task.await;
    Ok(())
}

async fn login(config: &Config) -> Result<()> {
    let storage = build_storage(config)?;
    storage.login().await?;

    match storage.minted_token().await {
        Some(token) => {
            println!("Logged in. Session token:");
            println!("{token}");
            println!("Set NOTES_SESSION_TOKEN to reuse it.");
        }
        None => println!("Logged in with the configured session token."),
    }
    Ok(())
}

async fn classify(config: &Config, text: &str) -> Result<()> {
    let classifier = build_classifier(config)?;
    let result = classifier.classify(text).await?;
    let capture = normalize(result);
    println!("{}", serde_json::to_string_pretty(&capture)?);
    Ok(())
}
