//! Typed audio buffers and time-boxed chunks passed from capture to the controller.

use serde::{Deserialize, Serialize};

use crate::error::{FocoError, Result};

/// PCM layout of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFormat {
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bytes per sample per channel (2 for 16-bit PCM).
    pub sample_width_bytes: u16,
}

impl StreamFormat {
    /// Assumed layout when a buffer arrives before any format is known:
    /// 16 kHz, mono, 16-bit.
    pub const FALLBACK: StreamFormat = StreamFormat {
        sample_rate: 16_000,
        channels: 1,
        sample_width_bytes: 2,
    };

    /// Build a validated format.
    ///
    /// # Errors
    /// Returns `FocoError::InvalidInput` if any field is zero or the sample
    /// width is not 1–4 bytes.
    pub fn new(sample_rate: u32, channels: u16, sample_width_bytes: u16) -> Result<Self> {
        let format = Self {
            sample_rate,
            channels,
            sample_width_bytes,
        };
        format.validate()?;
        Ok(format)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.sample_width_bytes == 0 {
            return Err(FocoError::InvalidInput(format!(
                "stream format fields must be positive: {self:?}"
            )));
        }
        if self.sample_width_bytes > 4 {
            return Err(FocoError::InvalidInput(format!(
                "unsupported sample width: {} bytes",
                self.sample_width_bytes
            )));
        }
        Ok(())
    }

    /// Bytes occupied by one interleaved frame (all channels).
    pub fn frame_bytes(&self) -> usize {
        self.sample_width_bytes as usize * self.channels as usize
    }

    /// Duration in whole milliseconds of `byte_len` bytes of audio in this format.
    ///
    /// Trailing bytes that do not fill a complete frame are ignored.
    pub fn duration_ms(&self, byte_len: usize) -> u64 {
        let frame_bytes = self.frame_bytes();
        if frame_bytes == 0 || self.sample_rate == 0 {
            return 0;
        }
        let sample_count = (byte_len / frame_bytes) as u64;
        sample_count * 1000 / u64::from(self.sample_rate)
    }
}

/// One slice of raw interleaved PCM as delivered by the capture source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioBuffer {
    pub data: Vec<u8>,
}

impl AudioBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for AudioBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// An ordered group of buffers treated as one transcription unit.
///
/// All buffers share `format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Sequence number assigned by the accumulator, starting at 0.
    pub id: u64,
    pub buffers: Vec<AudioBuffer>,
    pub format: StreamFormat,
}

impl AudioChunk {
    pub fn new(id: u64, buffers: Vec<AudioBuffer>, format: StreamFormat) -> Self {
        Self {
            id,
            buffers,
            format,
        }
    }

    /// Total payload size across all buffers.
    pub fn byte_len(&self) -> usize {
        self.buffers.iter().map(AudioBuffer::len).sum()
    }

    /// Returns the duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.format.duration_ms(self.byte_len())
    }

    /// Returns true if the chunk carries no audio bytes.
    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    /// Concatenate all buffers into one contiguous PCM payload.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for buffer in &self.buffers {
            out.extend_from_slice(&buffer.data);
        }
        out
    }
}
