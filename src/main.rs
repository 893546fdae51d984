use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use voice_relay::artifact::WorkDir;
use voice_relay::channels::TelegramChannel;
use voice_relay::daemon::build_orchestrator;
use voice_relay::voice::{Synthesizer, TextToSpeech};
use voice_relay::{Config, Daemon};

/// Voice relay - answers Telegram text and voice messages with a language model
#[derive(Parser)]
#[command(name = "voice-relay", version, about)]
struct Cli {
    /// Path to the TOML config file (defaults to the user config directory)
    #[arg(short, long, env = "VOICE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay (default)
    Run,
    /// Load the configuration, print it with secrets redacted and validate the backends
    CheckConfig,
    /// Synthesize text with the configured TTS backend
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info",
        1 => "info,voice_relay=debug",
        _ => "debug,voice_relay=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting voice relay");
            Daemon::new(config).run().await?;
            Ok(())
        }
        Command::CheckConfig => check_config(&config),
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    println!("{config:#?}\n");

    // Send-only channel: no network calls are made
    let channel = TelegramChannel::new(
        config.telegram.token.expose_secret().to_string(),
        config.telegram.api_base.clone(),
    );
    let work_dir = WorkDir::create(&config.work_dir, config.keep_artifacts)?;
    build_orchestrator(config, Arc::new(channel), work_dir)?;

    println!("Configuration OK");
    Ok(())
}

async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    // Keep the file so it can be played back
    let work_dir = WorkDir::create(&config.work_dir, true)?;
    let tts = TextToSpeech::from_config(&config.tts, work_dir)?;

    println!("Synthesizing speech...");
    let speech = tts.synthesize(text).await?;

    println!("Wrote {}", speech.path().display());
    Ok(())
}
