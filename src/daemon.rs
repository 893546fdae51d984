//! Daemon - the relay service
//!
//! Connects the transport, wires the backends into an [`Orchestrator`] and
//! runs one task per incoming message until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::agent::build_engine;
use crate::artifact::WorkDir;
use crate::channels::{BotCommand, Channel, IncomingMessage, TelegramChannel};
use crate::pipeline::Orchestrator;
use crate::tools::ToolRegistry;
use crate::voice::{AudioFetcher, SpeechToText, TextToSpeech};
use crate::{Config, Result};

/// Wire the configured backends around `channel`
///
/// # Errors
///
/// Returns error if a backend is missing required configuration
pub fn build_orchestrator(config: &Config, channel: Arc<dyn Channel>, work_dir: WorkDir) -> Result<Orchestrator> {
    let fetcher = Arc::new(AudioFetcher::new(Arc::clone(&channel), work_dir.clone()));
    let transcriber = Arc::new(SpeechToText::from_config(&config.stt)?);
    let synthesizer = Arc::new(TextToSpeech::from_config(&config.tts, work_dir)?);
    let engine = build_engine(&config.llm, ToolRegistry::from_config(config.search.as_ref()))?;

    Ok(Orchestrator::new(channel, fetcher, transcriber, engine, synthesizer))
}

/// Dispatch messages from `rx` until shutdown or until the source closes
///
/// Each message is handled in its own task. On shutdown `rx` is closed first,
/// so the listener stops forwarding, and messages it already queued are still
/// handled. In-flight tasks then get `grace` to finish before they are
/// aborted. Returns the number of flows that ran to completion.
pub async fn dispatch(
    orchestrator: Arc<Orchestrator>,
    mut rx: mpsc::Receiver<IncomingMessage>,
    mut shutdown_rx: mpsc::Receiver<()>,
    grace: Duration,
) -> usize {
    let mut tasks = JoinSet::new();
    let mut completed = 0usize;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown requested");
                break;
            }
            msg = rx.recv() => {
                let Some(msg) = msg else {
                    tracing::info!("message source closed");
                    break;
                };
                let orchestrator = Arc::clone(&orchestrator);
                tasks.spawn(async move { orchestrator.handle(&msg).await });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                completed += usize::from(log_joined(joined));
            }
        }
    }

    // Already received from the transport, so they would be lost otherwise
    rx.close();
    while let Ok(msg) = rx.try_recv() {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.spawn(async move { orchestrator.handle(&msg).await });
    }

    if !tasks.is_empty() {
        tracing::info!(in_flight = tasks.len(), grace_secs = grace.as_secs(), "waiting for in-flight messages");
    }

    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            completed += usize::from(log_joined(joined));
        }
    };

    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!(aborted = tasks.len(), "shutdown grace elapsed, aborting in-flight messages");
        tasks.abort_all();
    }

    completed
}

/// Log a finished flow task; true when it ran to completion
fn log_joined(joined: std::result::Result<crate::pipeline::FlowOutcome, tokio::task::JoinError>) -> bool {
    match joined {
        Ok(_) => true,
        Err(e) if e.is_cancelled() => false,
        Err(e) => {
            tracing::error!(error = %e, "message task panicked");
            false
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, only Ctrl-C stops the relay");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// The relay daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the work directory cannot be created, the transport
    /// rejects the credentials or a backend is misconfigured
    pub async fn run(self) -> Result<()> {
        let config = &self.config;
        let work_dir = WorkDir::create(&config.work_dir, config.keep_artifacts)?;

        let (mut telegram, rx) = TelegramChannel::with_receiver(
            config.telegram.token.expose_secret().to_string(),
            config.telegram.api_base.clone(),
        );
        telegram.connect().await?;
        let telegram = Arc::new(telegram);

        let orchestrator = Arc::new(build_orchestrator(
            config,
            Arc::clone(&telegram) as Arc<dyn Channel>,
            work_dir,
        )?);

        if let Err(e) = telegram.sync_commands(&BotCommand::defaults()).await {
            tracing::warn!(error = %e, "failed to register bot commands");
        }

        let poller = telegram.start_polling(config.telegram.poll_interval)?;
        let stop_polling = poller.abort_handle();

        if let Some(url) = &config.healthcheck_url {
            // Outcome is logged by the check itself
            drop(crate::health::spawn_startup_check(url.clone()));
        }

        // Set up shutdown signal
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            wait_for_signal().await;
            // Stop confirming updates before in-flight flows drain
            stop_polling.abort();
            let _ = shutdown_tx.send(()).await;
        });

        tracing::info!(
            work_dir = %config.work_dir.display(),
            stt = ?config.stt.provider,
            tts = ?config.tts.provider,
            engine = ?config.llm.engine,
            "relay running"
        );

        let completed = dispatch(orchestrator, rx, shutdown_rx, config.shutdown_grace).await;

        poller.abort();
        tracing::info!(completed, "relay stopped");
        Ok(())
    }
}
