//! `foco`: listens to a WAV file or the microphone and switches bulbs by voice.
//!
//! Controller events are printed to stdout as JSON lines; logs go to stderr.

mod settings;
mod source;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use foco_core::{
    run_ingest, ChunkAccumulator, CommandController, DeviceRoster, DeviceSink, Interpreter,
    InterpreterChain, LlmConfig, LlmInterpreter, LoggingSink, StubTranscriber, Transcriber,
    WhisperConfig, WhisperTranscriber,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use settings::{default_settings_path, load_settings, save_settings, AppSettings};

/// Capture channel depth: 64 buffers of 100 ms.
const CAPTURE_QUEUE: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "foco", version, about = "Voice-controlled smart bulbs")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, env = "FOCO_SETTINGS")]
    settings: Option<PathBuf>,

    /// Device roster, comma-separated; position N answers to "foco N".
    #[arg(long, value_delimiter = ',')]
    devices: Vec<String>,

    /// Read audio from a WAV file.
    #[arg(long, conflicts_with = "mic")]
    wav: Option<PathBuf>,

    /// Capture from the microphone (needs the `mic` feature).
    #[arg(long)]
    mic: bool,

    /// Pace WAV input at capture speed.
    #[arg(long, requires = "wav")]
    realtime: bool,

    /// No network: scripted transcripts and local patterns only.
    #[arg(long)]
    offline: bool,

    /// Transcript returned for each chunk in offline mode, in order.
    #[arg(long = "script", requires = "offline")]
    script: Vec<String>,

    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    init_settings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("foco=info,foco_core=info")),
        )
        .init();

    let cli = Cli::parse();

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut app_settings = load_settings(&settings_path);
    app_settings.apply_env_overrides();
    if !cli.devices.is_empty() {
        app_settings.devices = cli.devices.clone();
        app_settings.normalize();
    }
    info!(
        settings_path = %settings_path.display(),
        runtime = %serde_json::to_string(&app_settings.runtime_settings())?,
        "runtime settings loaded"
    );

    if cli.init_settings {
        save_settings(&settings_path, &app_settings)
            .with_context(|| format!("failed to write {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings written");
        return Ok(());
    }
    if app_settings.devices.is_empty() {
        warn!("device roster is empty — commands will have no targets");
    }

    // ── Engine setup ──────────────────────────────────────────────────────
    let (transcriber, interpreter) = build_gateways(&cli, &app_settings)?;
    let sink: Arc<dyn DeviceSink> = Arc::new(LoggingSink::new());
    let roster = DeviceRoster::new(app_settings.devices.clone());
    let handle = CommandController::spawn(
        app_settings.engine.clone(),
        transcriber,
        interpreter,
        sink,
        roster,
    )?;
    let printer = tokio::spawn(print_events(handle.subscribe()));

    // ── Capture ───────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel(CAPTURE_QUEUE);
    let source = if let Some(path) = cli.wav.clone() {
        source::spawn_wav_file(path, cli.realtime, Arc::clone(&running), tx)
    } else if cli.mic {
        source::spawn_microphone(
            app_settings.preferred_input_device.clone(),
            Arc::clone(&running),
            tx,
        )
    } else {
        bail!("no audio input: pass --wav <file> or --mic");
    };

    let mut ingest = tokio::spawn(run_ingest(
        rx,
        ChunkAccumulator::new(app_settings.engine.chunk_duration_ms),
        handle.clone(),
    ));

    let ingested = tokio::select! {
        res = &mut ingest => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received — stopping capture");
            running.store(false, Ordering::Release);
            ingest.await
        }
    };
    match ingested.context("ingest task panicked")? {
        Ok(chunks) => info!(chunks, "audio input finished"),
        Err(e) => warn!(error = %e, "ingest stopped early"),
    }
    match source.await.context("capture task panicked")? {
        Ok(()) => {}
        Err(e) => warn!(error = %e, "capture source failed"),
    }

    // ── Shutdown ──────────────────────────────────────────────────────────
    handle.shutdown().await?;
    info!(
        diagnostics = %serde_json::to_string(&handle.diagnostics())?,
        "controller stopped"
    );
    drop(handle);
    if tokio::time::timeout(Duration::from_secs(5), printer).await.is_err() {
        warn!("event printer did not finish");
    }
    Ok(())
}

fn build_gateways(
    cli: &Cli,
    settings: &AppSettings,
) -> anyhow::Result<(Arc<dyn Transcriber>, Arc<dyn Interpreter>)> {
    if cli.offline {
        info!(scripted = cli.script.len(), "offline mode: stub transcriber, local patterns");
        let transcriber: Arc<dyn Transcriber> =
            Arc::new(StubTranscriber::scripted(cli.script.iter().cloned()));
        let interpreter: Arc<dyn Interpreter> = Arc::new(InterpreterChain::patterns_only()?);
        return Ok((transcriber, interpreter));
    }

    let api_key = settings.openai_api_key.clone().context(
        "no API key: set FOCO_OPENAI_API_KEY, add openaiApiKey to the settings file, or use --offline",
    )?;

    let transcriber = WhisperTranscriber::new(WhisperConfig {
        api_key: api_key.clone(),
        endpoint: settings.transcription_endpoint.clone(),
        model: settings.transcription_model.clone(),
        language: settings.language.clone(),
        timeout: Duration::from_secs(settings.transcription_timeout_secs),
    })?;

    let interpreter = if settings.llm_enabled {
        let llm = LlmInterpreter::new(LlmConfig {
            api_key,
            endpoint: settings.interpreter_endpoint.clone(),
            model: settings.interpreter_model.clone(),
            timeout: Duration::from_secs(settings.interpreter_timeout_secs),
        })?;
        InterpreterChain::with_pattern_fallback(Arc::new(llm))?
    } else {
        InterpreterChain::patterns_only()?
    };
    info!(stages = ?interpreter.stage_names(), "interpreter chain ready");

    let transcriber: Arc<dyn Transcriber> = Arc::new(transcriber);
    let interpreter: Arc<dyn Interpreter> = Arc::new(interpreter);
    Ok((transcriber, interpreter))
}

/// Print every controller event as one JSON line until the bus closes.
async fn print_events(mut rx: broadcast::Receiver<foco_core::ControllerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
