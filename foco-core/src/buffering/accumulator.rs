//! Groups incoming PCM buffers into time-boxed chunks.
//!
//! ## Algorithm
//!
//! 1. The held duration is derived from the total byte count and the stream
//!    format (`frames * 1000 / sample_rate`, floored once over the total).
//! 2. Buffers are appended until the held duration reaches the threshold,
//!    then all of them are emitted as one `AudioChunk` and accumulation restarts.
//! 3. `flush()` at end-of-stream emits whatever is left, however short.
//!
//! Until a format is known, durations are estimated with
//! `StreamFormat::FALLBACK`. The first real format replaces the estimate for
//! the buffers already held.

use tracing::debug;

use super::chunk::{AudioBuffer, AudioChunk, StreamFormat};
use crate::error::Result;

/// Default chunk length in milliseconds.
pub const DEFAULT_CHUNK_DURATION_MS: u64 = 3_000;

#[derive(Debug)]
pub struct ChunkAccumulator {
    threshold_ms: u64,
    /// `None` until the capture source reports a format.
    format: Option<StreamFormat>,
    buffers: Vec<AudioBuffer>,
    accumulated_bytes: usize,
    next_id: u64,
}

impl ChunkAccumulator {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms: threshold_ms.max(1),
            format: None,
            buffers: Vec::new(),
            accumulated_bytes: 0,
            next_id: 0,
        }
    }

    /// Feed one buffer. Returns a chunk once the accumulated duration reaches
    /// the threshold.
    ///
    /// A format that differs from the one already in effect closes the
    /// current accumulation first, so every chunk carries a single format.
    /// In that case the returned chunk holds the earlier buffers and `buffer`
    /// starts the next accumulation. If `buffer` alone reaches the threshold
    /// it is emitted on the following call, ahead of that call's buffer.
    ///
    /// # Errors
    /// Returns `FocoError::InvalidInput` if `format` is invalid.
    pub fn ingest(
        &mut self,
        buffer: AudioBuffer,
        format: Option<StreamFormat>,
    ) -> Result<Option<AudioChunk>> {
        if let Some(format) = format {
            format.validate()?;
        }
        if buffer.is_empty() {
            return Ok(None);
        }

        // Left over from a format-change close.
        let mut closed = if self.accumulated_ms() >= self.threshold_ms {
            self.take_chunk()
        } else {
            None
        };
        match (self.format, format) {
            (None, Some(real)) => self.format = Some(real),
            (Some(current), Some(real)) if current != real => {
                debug!(?current, new = ?real, "stream format changed — closing chunk");
                closed = closed.or_else(|| self.take_chunk());
                self.format = Some(real);
            }
            _ => {}
        }

        self.accumulated_bytes += buffer.len();
        self.buffers.push(buffer);

        if closed.is_some() {
            return Ok(closed);
        }
        if self.accumulated_ms() >= self.threshold_ms {
            return Ok(self.take_chunk());
        }
        Ok(None)
    }

    /// Emit any remaining buffers as a final (possibly short) chunk.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        self.take_chunk()
    }

    /// Duration currently held, in milliseconds.
    pub fn accumulated_ms(&self) -> u64 {
        self.effective_format().duration_ms(self.accumulated_bytes)
    }

    pub fn pending_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn effective_format(&self) -> StreamFormat {
        self.format.unwrap_or(StreamFormat::FALLBACK)
    }

    fn take_chunk(&mut self) -> Option<AudioChunk> {
        if self.buffers.is_empty() {
            return None;
        }
        let buffers = std::mem::take(&mut self.buffers);
        let chunk = AudioChunk::new(self.next_id, buffers, self.effective_format());
        debug!(
            chunk_id = chunk.id,
            buffers = chunk.buffers.len(),
            duration_ms = self.accumulated_ms(),
            "chunk emitted"
        );
        self.next_id += 1;
        self.accumulated_bytes = 0;
        Some(chunk)
    }
}

impl Default for ChunkAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_DURATION_MS)
    }
}
