//! Minimal WAV container around a chunk's raw PCM.

use std::io::Cursor;

use crate::buffering::{AudioChunk, StreamFormat};
use crate::error::{FocoError, Result};

/// Wrap the chunk's concatenated PCM in a RIFF/WAVE header matching its format.
///
/// 8-bit input is treated as unsigned (WAV convention); wider samples as
/// signed little-endian. Trailing bytes that do not complete a frame are dropped.
///
/// # Errors
/// `FocoError::InvalidInput` for an empty chunk or invalid format.
pub fn encode_wav(chunk: &AudioChunk) -> Result<Vec<u8>> {
    chunk.format.validate()?;
    let mut pcm = chunk.concat();
    let frame_bytes = chunk.format.frame_bytes();
    pcm.truncate(pcm.len() - pcm.len() % frame_bytes);
    if pcm.is_empty() {
        return Err(FocoError::InvalidInput(format!(
            "chunk {} carries no complete audio frame",
            chunk.id
        )));
    }
    encode_pcm(&pcm, chunk.format)
}

fn encode_pcm(pcm: &[u8], format: StreamFormat) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.sample_width_bytes * 8,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let width = format.sample_width_bytes as usize;
        for s in pcm.chunks_exact(width) {
            match width {
                1 => writer.write_sample((s[0] ^ 0x80) as i8)?,
                2 => writer.write_sample(i16::from_le_bytes([s[0], s[1]]))?,
                // Sign-extend 24-bit little-endian into i32.
                3 => writer.write_sample(i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 8)?,
                _ => writer.write_sample(i32::from_le_bytes([s[0], s[1], s[2], s[3]]))?,
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
