//! `CommandController`: spawns the controller actor and hands out handles.
//!
//! ## Lifecycle
//!
//! ```text
//! CommandController::spawn()   → config validated, executor + actor tasks started
//!     └─► handle.submit_chunk() → chunk enters the pending batch
//!     └─► handle.update_roster() → applies to work interpreted from now on
//!     └─► handle.shutdown()     → pending batch flushed, in-flight work and
//!                                  queued actions drained, actor stops
//! ```
//!
//! Dropping every handle has the same effect as `shutdown()` without the wait.
//!
//! ## Threading
//!
//! Both tasks run on the ambient Tokio runtime; `spawn` must be called from
//! within one. Controller state is owned by the actor task alone.

pub(crate) mod controller;
pub mod debounce;
pub mod diagnostics;
pub(crate) mod executor;
pub mod ingest;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tracing::info;

use crate::{
    buffering::{AudioChunk, DEFAULT_CHUNK_DURATION_MS},
    device::DeviceSink,
    error::{FocoError, Result},
    intent::{DeviceAddress, Interpreter},
    ipc::events::ControllerEvent,
    roster::DeviceRoster,
    transcription::Transcriber,
};

use controller::{ControlMessage, ControllerActor};
use diagnostics::{DiagnosticsSnapshot, EngineDiagnostics};
use executor::ActionExecutor;

pub use ingest::{run_ingest, CaptureEvent};

/// Broadcast channel capacity: 256 controller events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Timing and concurrency knobs for the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Target chunk length for the accumulator. Default: 3000.
    pub chunk_duration_ms: u64,
    /// Pending chunks that trigger an immediate flush. Default: 2.
    pub batch_size: usize,
    /// Longest a chunk waits in the pending batch. Default: 2000.
    pub batch_timeout_ms: u64,
    /// Minimum spacing between executed actions. Default: 1000.
    pub debounce_ms: u64,
    /// Chunks processed at once across all batches. Default: 5.
    pub max_concurrency: usize,
    /// Per-chunk transcribe + interpret budget. Default: 30000.
    pub chunk_timeout_ms: u64,
    /// Per-device `set_power` budget. Default: 5000.
    pub device_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_duration_ms: DEFAULT_CHUNK_DURATION_MS,
            batch_size: 2,
            batch_timeout_ms: 2_000,
            debounce_ms: 1_000,
            max_concurrency: 5,
            chunk_timeout_ms: 30_000,
            device_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// # Errors
    /// `FocoError::Config` naming the first zero-valued field.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("chunkDurationMs", self.chunk_duration_ms == 0),
            ("batchSize", self.batch_size == 0),
            ("batchTimeoutMs", self.batch_timeout_ms == 0),
            ("maxConcurrency", self.max_concurrency == 0),
            ("chunkTimeoutMs", self.chunk_timeout_ms == 0),
            ("deviceTimeoutMs", self.device_timeout_ms == 0),
        ];
        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(FocoError::Config(format!("{name} must be positive"))),
            None => Ok(()),
        }
    }
}

/// Sequenced publisher shared by the actor and the executor.
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ControllerEvent>,
    seq: Arc<AtomicU64>,
}

impl EventBus {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn publish(&self, make: impl FnOnce(u64, DateTime<Utc>) -> ControllerEvent) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = self.tx.send(make(seq, Utc::now()));
    }
}

/// Entry point: validates configuration and starts the actor.
pub struct CommandController;

impl CommandController {
    /// Start the controller on the current Tokio runtime.
    ///
    /// # Errors
    /// `FocoError::Config` if `config` fails validation.
    pub fn spawn(
        config: EngineConfig,
        transcriber: Arc<dyn Transcriber>,
        interpreter: Arc<dyn Interpreter>,
        sink: Arc<dyn DeviceSink>,
        roster: DeviceRoster,
    ) -> Result<ControllerHandle> {
        config.validate()?;

        let events = EventBus::new();
        let diagnostics = Arc::new(EngineDiagnostics::default());
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();

        let executor = ActionExecutor {
            sink,
            device_timeout: std::time::Duration::from_millis(config.device_timeout_ms),
            events: events.clone(),
            diagnostics: Arc::clone(&diagnostics),
        };
        let executor = tokio::spawn(executor.run(actions_rx));

        let actor = ControllerActor {
            workers: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            transcriber,
            interpreter,
            roster: roster.clone(),
            mailbox: mailbox_rx,
            completions_tx,
            completions_rx,
            actions_tx,
            executor,
            events: events.clone(),
            diagnostics: Arc::clone(&diagnostics),
        };
        tokio::spawn(actor.run());

        info!(devices = roster.len(), "command controller spawned");
        Ok(ControllerHandle {
            tx: mailbox_tx,
            roster,
            events: events.tx,
            diagnostics,
        })
    }
}

/// Cloneable handle to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
    roster: DeviceRoster,
    events: broadcast::Sender<ControllerEvent>,
    diagnostics: Arc<EngineDiagnostics>,
}

impl ControllerHandle {
    /// Queue a chunk for batching. Never blocks.
    ///
    /// # Errors
    /// - `FocoError::InvalidInput` for an empty chunk or invalid format.
    /// - `FocoError::ControllerClosed` once the actor has stopped.
    pub fn submit_chunk(&self, chunk: AudioChunk) -> Result<()> {
        chunk.format.validate()?;
        if chunk.is_empty() {
            return Err(FocoError::InvalidInput(format!(
                "chunk {} carries no audio",
                chunk.id
            )));
        }
        self.tx
            .send(ControlMessage::Chunk(chunk))
            .map_err(|_| FocoError::ControllerClosed)
    }

    /// Replace the device roster. In-flight work keeps its snapshot.
    pub fn update_roster(&self, addresses: Vec<DeviceAddress>) {
        self.roster.update(addresses);
    }

    pub fn roster(&self) -> Arc<[DeviceAddress]> {
        self.roster.snapshot()
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Snapshot of controller counters for observability.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Flush pending chunks, wait for in-flight work and queued actions, stop.
    ///
    /// # Errors
    /// `FocoError::ControllerClosed` if the actor already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Shutdown(ack_tx))
            .map_err(|_| FocoError::ControllerClosed)?;
        ack_rx.await.map_err(|_| FocoError::ControllerClosed)
    }
}

impl std::fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("roster", &self.roster)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_duration_ms, 3_000);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.batch_timeout_ms, 2_000);
        assert_eq!(config.debounce_ms, 1_000);
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.chunk_timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = EngineConfig {
            max_concurrency: 0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("maxConcurrency"));
    }

    #[test]
    fn zero_debounce_is_allowed() {
        let config = EngineConfig {
            debounce_ms: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"batchSize": 4, "debounceMs": 250}"#).unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.batch_timeout_ms, 2_000);
    }
}
