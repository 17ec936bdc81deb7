//! Glue between a capture source and the controller.
//!
//! A source pushes `CaptureEvent`s into a bounded channel; `run_ingest`
//! groups buffers into chunks and submits each one as soon as it closes.
//! End-of-stream (or the channel closing) flushes the partial chunk.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ControllerHandle;
use crate::buffering::{AudioBuffer, ChunkAccumulator, StreamFormat};
use crate::error::Result;

#[derive(Debug)]
pub enum CaptureEvent {
    /// One PCM buffer. `format` is `None` when the source has not reported one.
    Buffer {
        buffer: AudioBuffer,
        format: Option<StreamFormat>,
    },
    EndOfStream,
}

/// Drive `accumulator` from `rx` until the stream ends. Returns the number of
/// chunks submitted.
///
/// Rejected buffers (bad format) are logged and skipped.
///
/// # Errors
/// `FocoError::ControllerClosed` if the controller stops while audio is
/// still arriving.
pub async fn run_ingest(
    mut rx: mpsc::Receiver<CaptureEvent>,
    mut accumulator: ChunkAccumulator,
    controller: ControllerHandle,
) -> Result<u64> {
    let mut submitted = 0u64;

    while let Some(event) = rx.recv().await {
        match event {
            CaptureEvent::Buffer { buffer, format } => match accumulator.ingest(buffer, format) {
                Ok(Some(chunk)) => {
                    controller.submit_chunk(chunk)?;
                    submitted += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "capture buffer rejected"),
            },
            CaptureEvent::EndOfStream => {
                debug!("end of stream");
                break;
            }
        }
    }

    if let Some(chunk) = accumulator.flush() {
        controller.submit_chunk(chunk)?;
        submitted += 1;
    }
    info!(chunks = submitted, "ingest finished");
    Ok(submitted)
}
