//! Capture sources feeding the ingest channel.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use foco_core::audio::convert::{f32_to_i16, i16_to_le_bytes, int_to_i16};
use foco_core::{AudioBuffer, CaptureEvent, StreamFormat};
use tokio::sync::mpsc;
use tracing::{debug, info};

const BUFFER_MS: u64 = 100;

/// Stream a WAV file as PCM16 buffers of `BUFFER_MS`, then `EndOfStream`.
///
/// With `realtime` the file is paced at capture speed; otherwise it is
/// pushed as fast as the ingest side accepts it.
pub fn spawn_wav_file(
    path: PathBuf,
    realtime: bool,
    running: Arc<AtomicBool>,
    tx: mpsc::Sender<CaptureEvent>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::task::spawn_blocking(move || {
        let result = stream_wav(&path, realtime, &running, &tx);
        let _ = tx.blocking_send(CaptureEvent::EndOfStream);
        result
    })
}

fn stream_wav(
    path: &Path,
    realtime: bool,
    running: &AtomicBool,
    tx: &mpsc::Sender<CaptureEvent>,
) -> anyhow::Result<()> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let format = StreamFormat::new(spec.sample_rate, spec.channels, 2)?;
    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "streaming wav file"
    );

    let frames_per_buffer = (spec.sample_rate as u64 * BUFFER_MS / 1_000) as usize;
    let per_buffer = frames_per_buffer.max(1) * spec.channels as usize;
    let samples: Box<dyn Iterator<Item = anyhow::Result<i16>> + '_> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample > 32 {
                bail!("unsupported bit depth: {}", spec.bits_per_sample);
            }
            let bits = spec.bits_per_sample;
            Box::new(
                reader
                    .samples::<i32>()
                    .map(move |s| -> anyhow::Result<i16> { Ok(int_to_i16(s?, bits)) }),
            )
        }
        hound::SampleFormat::Float => Box::new(
            reader
                .samples::<f32>()
                .map(|s| -> anyhow::Result<i16> { Ok(f32_to_i16(s?)) }),
        ),
    };

    let mut pending: Vec<i16> = Vec::with_capacity(per_buffer);
    let mut sent = 0usize;
    for sample in samples {
        pending.push(sample?);
        if pending.len() < per_buffer {
            continue;
        }
        if !running.load(Ordering::Acquire) || !send(tx, &pending, format, realtime) {
            debug!(buffers = sent, "wav streaming stopped early");
            return Ok(());
        }
        sent += 1;
        pending.clear();
    }
    if !pending.is_empty() && running.load(Ordering::Acquire) {
        send(tx, &pending, format, realtime);
        sent += 1;
    }
    info!(buffers = sent, "wav file fully streamed");
    Ok(())
}

/// False once the receiver is gone.
fn send(
    tx: &mpsc::Sender<CaptureEvent>,
    samples: &[i16],
    format: StreamFormat,
    realtime: bool,
) -> bool {
    if realtime {
        std::thread::sleep(Duration::from_millis(BUFFER_MS));
    }
    tx.blocking_send(CaptureEvent::Buffer {
        buffer: AudioBuffer::new(i16_to_le_bytes(samples)),
        format: Some(format),
    })
    .is_ok()
}

#[cfg(feature = "mic")]
pub fn spawn_microphone(
    preferred_device: Option<String>,
    running: Arc<AtomicBool>,
    tx: mpsc::Sender<CaptureEvent>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    let capture = foco_core::audio::spawn_microphone(preferred_device, running, tx);
    tokio::spawn(async move { Ok(capture.await??) })
}

#[cfg(not(feature = "mic"))]
pub fn spawn_microphone(
    _preferred_device: Option<String>,
    _running: Arc<AtomicBool>,
    _tx: mpsc::Sender<CaptureEvent>,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async { Err(anyhow::anyhow!("microphone capture needs the `mic` feature")) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &std::path::Path, samples: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..samples {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn wav_file_is_split_into_100ms_buffers() {
        let path = std::env::temp_dir().join(format!("foco-source-{}.wav", std::process::id()));
        // 250 ms at 16 kHz: two full buffers and a 50 ms tail.
        write_wav(&path, 4_000);

        let (tx, mut rx) = mpsc::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        spawn_wav_file(path.clone(), false, running, tx)
            .await
            .unwrap()
            .unwrap();

        let mut sizes = Vec::new();
        let mut ended = false;
        while let Some(event) = rx.recv().await {
            match event {
                CaptureEvent::Buffer { buffer, format } => {
                    assert_eq!(format, Some(StreamFormat::FALLBACK));
                    sizes.push(buffer.len());
                }
                CaptureEvent::EndOfStream => ended = true,
            }
        }
        assert_eq!(sizes, vec![3_200, 3_200, 1_600]);
        assert!(ended);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let (tx, _rx) = mpsc::channel(1);
        let running = Arc::new(AtomicBool::new(true));
        let result = spawn_wav_file("/nonexistent/input.wav".into(), false, running, tx)
            .await
            .unwrap();
        assert!(result.is_err());
    }
}
