//! # foco-core
//!
//! Voice command engine: turns a live audio stream into debounced power
//! commands for a roster of smart bulbs.
//!
//! ## Architecture
//!
//! ```text
//! capture source → CaptureEvent channel → ChunkAccumulator (run_ingest)
//!                                                │  AudioChunk
//!                                                ▼
//!                                     ControllerActor (batching)
//!                                                │  one worker per chunk, bounded
//!                                                ▼
//!                          Transcriber::transcribe → Interpreter::interpret
//!                                                │  Completion
//!                                                ▼
//!                                 debounce → ActionExecutor (FIFO)
//!                                                │
//!                                       DeviceSink::set_power
//! ```
//!
//! Every stage reports through `broadcast::Sender<ControllerEvent>`.
//! Failures in a chunk never take the controller down.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod device;
pub mod engine;
pub mod error;
pub mod intent;
pub mod ipc;
pub mod roster;
pub mod transcription;

// Convenience re-exports for downstream crates
pub use buffering::{AudioBuffer, AudioChunk, ChunkAccumulator, StreamFormat};
pub use device::{Ack, DeviceSink, LoggingSink};
pub use engine::{
    diagnostics::DiagnosticsSnapshot, run_ingest, CaptureEvent, CommandController,
    ControllerHandle, EngineConfig,
};
pub use error::{FocoError, Result};
pub use intent::{
    DeviceAddress, Intent, Interpreter, InterpreterChain, LlmConfig, LlmInterpreter,
    PatternInterpreter, PowerAction, PowerCommand,
};
pub use ipc::events::{ChunkOutcome, ControllerEvent, DeviceResult};
pub use roster::DeviceRoster;
pub use transcription::{StubTranscriber, Transcriber, WhisperConfig, WhisperTranscriber};
