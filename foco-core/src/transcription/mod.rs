//! Speech-to-text gateway abstraction.
//!
//! The `Transcriber` trait decouples the controller from any specific
//! backend (hosted Whisper-compatible API, scripted stub, etc.). Gateways are
//! stateless request/response: `&self` on `transcribe` lets the worker pool
//! share one instance across concurrent chunks.

pub mod stub;
pub mod wav;
pub mod whisper;

pub use stub::StubTranscriber;
pub use whisper::{WhisperConfig, WhisperTranscriber};

use async_trait::async_trait;

use crate::buffering::AudioChunk;
use crate::error::Result;

/// Contract for speech recognition gateways.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    /// Transcribe one chunk into text.
    ///
    /// # Errors
    /// Transport failures, non-success statuses and unparseable responses are
    /// returned as errors; the controller downgrades them to "no intent".
    async fn transcribe(&self, chunk: &AudioChunk) -> Result<String>;
}
