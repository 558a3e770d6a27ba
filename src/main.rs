// src/main.rs
// versebot - console surface for the reference pipeline

use anyhow::{Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use versebot::config::Settings;
use versebot::delivery::{DeliveryScheduler, MessageSink, OutgoingMessage};
use versebot::error::SendError;
use versebot::passage::{HttpVerseLookup, PassageFetcher};
use versebot::pipeline::{ERROR_PASSAGE_NOT_FOUND, ERROR_SERVICE_UNAVAILABLE, missing_api_key_message};
use versebot::{FetchError, Outcome, Pipeline};

#[derive(Parser)]
#[command(name = "versebot")]
#[command(about = "Scripture reference detection and reliable chat delivery")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/versebot/config.toml)
    #[arg(short, long, global = true, env = "VERSEBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read messages from stdin and reply on stdout (default)
    Run {
        /// Room name attached to every console message
        #[arg(long, default_value = "console")]
        room: String,
    },

    /// Resolve and print a single reference
    Lookup {
        /// Message text, e.g. "John 3:16 esv"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

/// Send capability backed by stdout
struct ConsoleSink {
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleSink {
    fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn send(&self, room: &str, message: &OutgoingMessage) -> Result<(), SendError> {
        let line = format!("[{room}] {}\n", message.body);
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SendError::transport(e.to_string()))?;
        stdout.flush().await.map_err(|e| SendError::transport(e.to_string()))
    }
}

fn build_pipeline(settings: &Settings) -> Pipeline {
    let lookup = HttpVerseLookup::new(
        settings.endpoints.clone(),
        settings.api_keys.esv.clone(),
        settings.lookup_timeout,
    );
    let fetcher = PassageFetcher::new(
        Arc::new(lookup),
        settings.default_translation,
        settings.cache,
        settings.lookup_timeout,
    );
    let scheduler = DeliveryScheduler::new(Arc::new(ConsoleSink::new()), settings.delivery_config());
    Pipeline::new(fetcher, scheduler, settings.pipeline_settings())
}

async fn run_console(settings: Settings, room: String) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&settings));
    let shutdown = CancellationToken::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling pending deliveries");
                shutdown.cancel();
            }
        });
    }

    info!(
        room = %room,
        translation = %settings.default_translation,
        mode = ?settings.match_mode,
        "versebot ready, reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let pipeline = pipeline.clone();
        let room = room.clone();
        let cancel = shutdown.child_token();
        tasks.spawn(async move {
            let outcome = pipeline.handle(&room, &line, &cancel).await;
            debug!(outcome = ?outcome, "Message handled");
            outcome
        });

        // reap finished tasks so the set does not grow without bound
        while let Some(done) = tasks.try_join_next() {
            log_join(done);
        }
    }

    while let Some(done) = tasks.join_next().await {
        log_join(done);
    }
    Ok(())
}

fn log_join(result: Result<Outcome, tokio::task::JoinError>) {
    match result {
        Ok(Outcome::DeliveryFailed(report)) => {
            warn!(sent = report.chunks_sent, planned = report.chunks_planned, "Delivery failed");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Message task panicked"),
    }
}

async fn run_lookup(settings: Settings, text: String) -> Result<()> {
    let pipeline = build_pipeline(&settings);
    let Some(reference) = pipeline.detect(&text) else {
        bail!("no scripture reference in {text:?}");
    };

    match pipeline.lookup(&text).await {
        Some(Ok(formatted)) => {
            println!("{formatted}");
            Ok(())
        }
        Some(Err(FetchError::MissingApiKey(translation))) => {
            bail!("{}", missing_api_key_message(translation, &reference))
        }
        Some(Err(FetchError::Transient(e))) => bail!("{ERROR_SERVICE_UNAVAILABLE} ({e})"),
        Some(Err(FetchError::NotFound(_))) | None => bail!("{ERROR_PASSAGE_NOT_FOUND}"),
    }
}

fn check_config(settings: &Settings) {
    println!("default translation : {}", settings.default_translation.marker());
    println!("match mode          : {:?}", settings.match_mode);
    println!("poetry formatting   : {}", settings.format.preserve_poetry);
    println!("translation suffix  : {}", settings.format.translation_suffix);
    println!(
        "message limits      : max {} / split {}",
        settings.limits.max_message_length, settings.limits.split_message_length
    );
    println!(
        "cache               : {} ({} entries, {:?} ttl)",
        if settings.cache.enabled { "on" } else { "off" },
        settings.cache.max_entries,
        settings.cache.ttl
    );
    println!("lookup timeout      : {:?}", settings.lookup_timeout);
    println!("send timeout        : {:?}", settings.send_timeout);
    println!("ESV API key         : {}", if settings.api_keys.has_esv() { "set" } else { "missing" });
    println!("ESV endpoint        : {}", settings.endpoints.esv_url);
    println!("bible-api endpoint  : {}", settings.endpoints.bible_api_url);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only chat output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        None => run_console(settings, "console".to_string()).await,
        Some(Commands::Run { room }) => run_console(settings, room).await,
        Some(Commands::Lookup { text }) => run_lookup(settings, text.join(" ")).await,
        Some(Commands::CheckConfig) => {
            check_config(&settings);
            Ok(())
        }
    }
}
