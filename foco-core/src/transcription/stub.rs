//! `StubTranscriber` — offline backend that needs no credentials.
//!
//! Replays scripted lines in order, one per chunk. Once the script is
//! exhausted it echoes chunk metadata, which never matches a command pattern.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::Transcriber;
use crate::buffering::AudioChunk;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct StubTranscriber {
    script: Mutex<VecDeque<String>>,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(lines.into_iter().map(Into::into).collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, chunk: &AudioChunk) -> Result<String> {
        let next = self.script.lock().pop_front();
        if let Some(line) = next {
            debug!(chunk_id = chunk.id, text = %line, "stub transcript");
            return Ok(line);
        }
        Ok(format!(
            "[stub: {} bytes @ {} Hz]",
            chunk.byte_len(),
            chunk.format.sample_rate
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::{AudioBuffer, StreamFormat};

    #[tokio::test]
    async fn replays_script_then_echoes_metadata() {
        let stub = StubTranscriber::scripted(["enciende las luces"]);
        let chunk = AudioChunk::new(0, vec![AudioBuffer::new(vec![0; 64])], StreamFormat::FALLBACK);

        assert_eq!(stub.transcribe(&chunk).await.unwrap(), "enciende las luces");
        assert_eq!(stub.remaining(), 0);
        assert_eq!(
            stub.transcribe(&chunk).await.unwrap(),
            "[stub: 64 bytes @ 16000 Hz]"
        );
    }
}
