//! Controller actor loop.
//!
//! ## Events (handled one at a time)
//!
//! ```text
//! mailbox:      Chunk      → append to pending batch, arm timer, flush at batch_size
//!               Shutdown   → close the mailbox, flush, drain in-flight work
//! timer:        expiry     → flush whatever is pending
//! completions:  Completion → report, debounce, queue action for the executor
//! ```
//!
//! A flush takes the whole pending batch and spawns one worker per chunk.
//! Workers queue on a semaphore (bounded parallelism), run
//! transcribe → interpret under a per-chunk timeout, and post a `Completion`
//! back into this loop. Batches may overlap: a new batch can be dispatched
//! while an earlier one is still in flight.
//!
//! All state here is owned by the actor task; nothing is shared except the
//! roster (read-only snapshots) and the diagnostics counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::debounce::{DebounceDecision, Debouncer};
use super::diagnostics::EngineDiagnostics;
use super::{EngineConfig, EventBus};
use crate::buffering::AudioChunk;
use crate::intent::{Intent, Interpreter, PowerCommand};
use crate::ipc::events::{
    ActionSuppressedEvent, BatchDispatchedEvent, ChunkOutcome, ChunkProcessedEvent,
    ControllerEvent,
};
use crate::roster::DeviceRoster;
use crate::transcription::Transcriber;

pub(crate) enum ControlMessage {
    Chunk(AudioChunk),
    Shutdown(oneshot::Sender<()>),
}

/// Result of one worker, posted back to the actor.
#[derive(Debug)]
pub(crate) struct Completion {
    pub batch_id: u64,
    pub chunk_id: u64,
    pub result: ChunkResult,
    pub completed_at: Instant,
}

#[derive(Debug)]
pub(crate) enum ChunkResult {
    Command {
        transcript: String,
        command: PowerCommand,
    },
    NoIntent {
        transcript: String,
    },
    Failed(String),
    TimedOut,
}

/// Everything the actor owns, moved into its task at spawn.
pub(crate) struct ControllerActor {
    pub config: EngineConfig,
    pub transcriber: Arc<dyn Transcriber>,
    pub interpreter: Arc<dyn Interpreter>,
    pub roster: DeviceRoster,
    pub mailbox: mpsc::UnboundedReceiver<ControlMessage>,
    pub completions_tx: mpsc::UnboundedSender<Completion>,
    pub completions_rx: mpsc::UnboundedReceiver<Completion>,
    pub actions_tx: mpsc::UnboundedSender<PowerCommand>,
    pub executor: tokio::task::JoinHandle<()>,
    pub workers: Arc<Semaphore>,
    pub events: EventBus,
    pub diagnostics: Arc<EngineDiagnostics>,
}

struct ActorState {
    pending: Vec<AudioChunk>,
    flush_deadline: Option<Instant>,
    debounce: Debouncer,
    in_flight: usize,
    next_batch_id: u64,
}

impl ControllerActor {
    pub(crate) async fn run(mut self) {
        info!(
            batch_size = self.config.batch_size,
            batch_timeout_ms = self.config.batch_timeout_ms,
            max_concurrency = self.config.max_concurrency,
            "controller started"
        );

        let mut state = ActorState {
            pending: Vec::with_capacity(self.config.batch_size),
            flush_deadline: None,
            debounce: Debouncer::new(Duration::from_millis(self.config.debounce_ms)),
            in_flight: 0,
            next_batch_id: 0,
        };
        let mut draining = false;
        let mut shutdown_acks: Vec<oneshot::Sender<()>> = Vec::new();

        loop {
            if draining && state.in_flight == 0 {
                break;
            }
            let deadline = state.flush_deadline;

            tokio::select! {
                biased;

                Some(done) = self.completions_rx.recv() => {
                    self.on_completion(&mut state, done);
                }

                msg = self.mailbox.recv(), if !draining => match msg {
                    Some(ControlMessage::Chunk(chunk)) => self.on_chunk(&mut state, chunk),
                    Some(ControlMessage::Shutdown(ack)) => {
                        info!(pending = state.pending.len(), in_flight = state.in_flight, "shutdown requested — draining");
                        shutdown_acks.push(ack);
                        self.mailbox.close();
                        // Chunks accepted before the close still belong to this run.
                        let mut late = 0usize;
                        while let Ok(msg) = self.mailbox.try_recv() {
                            match msg {
                                ControlMessage::Chunk(chunk) => {
                                    late += 1;
                                    self.on_chunk(&mut state, chunk);
                                }
                                ControlMessage::Shutdown(ack) => shutdown_acks.push(ack),
                            }
                        }
                        if late > 0 {
                            debug!(late, "chunks queued behind shutdown folded into final flush");
                        }
                        self.flush(&mut state);
                        draining = true;
                    }
                    None => {
                        debug!("all controller handles dropped — draining");
                        self.flush(&mut state);
                        draining = true;
                    }
                },

                () = flush_timer(deadline) => {
                    state.flush_deadline = None;
                    if !state.pending.is_empty() {
                        debug!(pending = state.pending.len(), "batch timeout — flushing");
                        self.flush(&mut state);
                    }
                }
            }
        }

        // Let the executor finish every queued action before acknowledging.
        let Self {
            actions_tx,
            executor,
            ..
        } = self;
        drop(actions_tx);
        if let Err(e) = executor.await {
            warn!(error = %e, "action executor ended abnormally");
        }
        info!("controller stopped");
        for ack in shutdown_acks {
            let _ = ack.send(());
        }
    }

    fn on_chunk(&self, state: &mut ActorState, chunk: AudioChunk) {
        EngineDiagnostics::bump(&self.diagnostics.chunks_received);
        debug!(chunk_id = chunk.id, duration_ms = chunk.duration_ms(), "chunk received");
        state.pending.push(chunk);
        if state.flush_deadline.is_none() {
            state.flush_deadline =
                Some(Instant::now() + Duration::from_millis(self.config.batch_timeout_ms));
        }
        if state.pending.len() >= self.config.batch_size {
            self.flush(state);
        }
    }

    /// Take the whole pending batch and hand each chunk to a worker.
    fn flush(&self, state: &mut ActorState) {
        state.flush_deadline = None;
        if state.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut state.pending);
        let batch_id = state.next_batch_id;
        state.next_batch_id += 1;
        state.in_flight += batch.len();
        EngineDiagnostics::bump(&self.diagnostics.batches_dispatched);

        let chunk_ids: Vec<u64> = batch.iter().map(|c| c.id).collect();
        info!(batch_id, chunks = batch.len(), in_flight = state.in_flight, "batch dispatched");
        self.events.publish(|seq, at| {
            ControllerEvent::BatchDispatched(BatchDispatchedEvent {
                seq,
                at,
                batch_id,
                chunk_ids,
            })
        });

        for chunk in batch {
            self.spawn_worker(batch_id, chunk);
        }
    }

    fn spawn_worker(&self, batch_id: u64, chunk: AudioChunk) {
        let workers = Arc::clone(&self.workers);
        let transcriber = Arc::clone(&self.transcriber);
        let interpreter = Arc::clone(&self.interpreter);
        let roster = self.roster.clone();
        let completions = self.completions_tx.clone();
        let limit = Duration::from_millis(self.config.chunk_timeout_ms);
        let chunk_id = chunk.id;
        let span = info_span!("chunk", batch_id, chunk_id);

        tokio::spawn(
            async move {
                let result = match workers.acquire_owned().await {
                    Ok(_permit) => {
                        let work = process_chunk(&*transcriber, &*interpreter, &roster, &chunk);
                        match tokio::time::timeout(limit, work).await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!(timeout_ms = limit.as_millis() as u64, "chunk processing timed out");
                                ChunkResult::TimedOut
                            }
                        }
                    }
                    Err(_) => ChunkResult::Failed("worker pool closed".into()),
                };
                let _ = completions.send(Completion {
                    batch_id,
                    chunk_id,
                    result,
                    completed_at: Instant::now(),
                });
            }
            .instrument(span),
        );
    }

    fn on_completion(&self, state: &mut ActorState, done: Completion) {
        state.in_flight = state.in_flight.saturating_sub(1);
        let Completion {
            batch_id,
            chunk_id,
            result,
            completed_at,
        } = done;

        let (outcome, transcript, error, command) = match result {
            ChunkResult::Command {
                transcript,
                command,
            } => {
                EngineDiagnostics::bump(&self.diagnostics.intents_detected);
                (ChunkOutcome::Intent, Some(transcript), None, Some(command))
            }
            ChunkResult::NoIntent { transcript } => {
                (ChunkOutcome::NoIntent, Some(transcript), None, None)
            }
            ChunkResult::Failed(reason) => {
                EngineDiagnostics::bump(&self.diagnostics.chunks_failed);
                (ChunkOutcome::Failed, None, Some(reason), None)
            }
            ChunkResult::TimedOut => {
                EngineDiagnostics::bump(&self.diagnostics.chunks_timed_out);
                (ChunkOutcome::TimedOut, None, None, None)
            }
        };

        debug!(batch_id, chunk_id, ?outcome, in_flight = state.in_flight, "chunk completed");
        self.events.publish(|seq, at| {
            ControllerEvent::ChunkProcessed(ChunkProcessedEvent {
                seq,
                at,
                batch_id,
                chunk_id,
                outcome,
                transcript,
                error,
            })
        });

        if let Some(command) = command {
            self.debounce_and_dispatch(state, command, completed_at);
        }
    }

    fn debounce_and_dispatch(
        &self,
        state: &mut ActorState,
        command: PowerCommand,
        completed_at: Instant,
    ) {
        match state.debounce.check(completed_at) {
            DebounceDecision::Execute => {
                EngineDiagnostics::bump(&self.diagnostics.actions_executed);
                info!(action = %command.action, targets = command.targets.len(), "action approved");
                if self.actions_tx.send(command).is_err() {
                    warn!("action executor is gone — dropping action");
                }
            }
            DebounceDecision::Suppress { elapsed } => {
                EngineDiagnostics::bump(&self.diagnostics.actions_suppressed);
                let elapsed_ms = elapsed.as_millis() as u64;
                info!(action = %command.action, elapsed_ms, "action suppressed by debounce");
                self.events.publish(|seq, at| {
                    ControllerEvent::ActionSuppressed(ActionSuppressedEvent {
                        seq,
                        at,
                        action: command.action,
                        targets: command.targets,
                        elapsed_ms,
                    })
                });
            }
        }
    }
}

/// Transcribe, then interpret against the roster as it is *now*.
pub(crate) async fn process_chunk(
    transcriber: &dyn Transcriber,
    interpreter: &dyn Interpreter,
    roster: &DeviceRoster,
    chunk: &AudioChunk,
) -> ChunkResult {
    let transcript = match transcriber.transcribe(chunk).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "transcription failed");
            return ChunkResult::Failed(e.to_string());
        }
    };
    if transcript.is_empty() {
        return ChunkResult::NoIntent { transcript };
    }

    let snapshot = roster.snapshot();
    match interpreter.interpret(&transcript, &snapshot).await {
        Ok(Intent::Command(command)) => ChunkResult::Command {
            transcript,
            command,
        },
        Ok(Intent::NoIntent) => ChunkResult::NoIntent { transcript },
        Err(e) => {
            warn!(error = %e, "interpretation failed");
            ChunkResult::Failed(e.to_string())
        }
    }
}

async fn flush_timer(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
