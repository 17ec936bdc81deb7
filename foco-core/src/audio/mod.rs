//! Microphone capture.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not** block on a lock or perform I/O. It downmixes to mono PCM16
//! into a reused scratch buffer and pushes the samples into an SPSC ring
//! whose `push_slice` is lock-free.
//!
//! A drain loop on a blocking thread pops the ring every `DRAIN_INTERVAL`,
//! packs the samples as little-endian bytes and forwards them to the ingest
//! channel as `CaptureEvent::Buffer`.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms, so `AudioCapture` is created
//! and dropped on the drain thread (`spawn_microphone` does both inside
//! `spawn_blocking`).

pub mod convert;

#[cfg(feature = "audio-cpal")]
pub use capture::{spawn_microphone, AudioCapture};

#[cfg(feature = "audio-cpal")]
mod capture {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::time::Duration;

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        SampleFormat, SampleRate, Stream, StreamConfig,
    };
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};

    use super::convert::{downmix_to_mono, f32_to_i16, i16_to_le_bytes, u8_to_i16};
    use crate::{
        buffering::{
            create_audio_ring, AudioBuffer, AudioConsumer, AudioProducer, Consumer, Producer,
            StreamFormat,
        },
        engine::CaptureEvent,
        error::{FocoError, Result},
    };

    const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

    /// Handle to an active input stream. Not `Send`.
    pub struct AudioCapture {
        _stream: Stream,
        running: Arc<AtomicBool>,
        /// Capture rate reported by the device (Hz). Samples are mono.
        pub sample_rate: u32,
    }

    impl AudioCapture {
        /// Open an input device by name, falling back to the default input
        /// and then to the first available one.
        ///
        /// # Errors
        /// - `FocoError::NoDefaultInputDevice` when no input exists.
        /// - `FocoError::AudioStream` if the stream cannot be built or started.
        pub fn open(
            mut producer: AudioProducer,
            running: Arc<AtomicBool>,
            preferred_device_name: Option<&str>,
        ) -> Result<Self> {
            let host = cpal::default_host();
            let mut selected = None;

            if let Some(preferred) = preferred_device_name {
                match host.input_devices() {
                    Ok(mut devices) => {
                        selected = devices
                            .find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                        if selected.is_none() {
                            warn!("preferred input device '{preferred}' not found, falling back");
                        }
                    }
                    Err(e) => warn!("failed to list input devices: {e}"),
                }
            }

            let device = match selected.or_else(|| host.default_input_device()) {
                Some(device) => device,
                None => {
                    let mut devices = host
                        .input_devices()
                        .map_err(|e| FocoError::AudioDevice(e.to_string()))?;
                    warn!("no default input device, using first available input");
                    devices.next().ok_or(FocoError::NoDefaultInputDevice)?
                }
            };

            info!(device = device.name().unwrap_or_default().as_str(), "opening input device");

            let supported = device
                .default_input_config()
                .map_err(|e| FocoError::AudioDevice(e.to_string()))?;
            let sample_rate = supported.sample_rate().0;
            let channels = supported.channels();
            info!(sample_rate, channels, "audio config selected");

            let config = StreamConfig {
                channels,
                sample_rate: SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };
            let ch = channels as usize;
            let flag = Arc::clone(&running);
            let mut mix: Vec<i16> = Vec::new();

            let mut push = move |samples: &[i16]| {
                let written = producer.push_slice(samples);
                if written < samples.len() {
                    warn!("ring buffer full: dropped {} samples", samples.len() - written);
                }
            };

            let stream = match supported.sample_format() {
                SampleFormat::F32 => device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if flag.load(Ordering::Relaxed) {
                            downmix_to_mono(data, ch, &mut mix, f32_to_i16);
                            push(&mix);
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                ),
                SampleFormat::I16 => device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if flag.load(Ordering::Relaxed) {
                            downmix_to_mono(data, ch, &mut mix, |s| s);
                            push(&mix);
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                ),
                SampleFormat::U8 => device.build_input_stream(
                    &config,
                    move |data: &[u8], _info| {
                        if flag.load(Ordering::Relaxed) {
                            downmix_to_mono(data, ch, &mut mix, u8_to_i16);
                            push(&mix);
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                ),
                fmt => {
                    return Err(FocoError::AudioStream(format!(
                        "unsupported sample format: {fmt:?}"
                    )))
                }
            }
            .map_err(|e| FocoError::AudioStream(e.to_string()))?;

            stream
                .play()
                .map_err(|e| FocoError::AudioStream(e.to_string()))?;

            Ok(Self {
                _stream: stream,
                running,
                sample_rate,
            })
        }

        pub fn format(&self) -> StreamFormat {
            StreamFormat {
                sample_rate: self.sample_rate,
                channels: 1,
                sample_width_bytes: 2,
            }
        }

        /// Signal the callback to no-op on its next invocation.
        pub fn stop(&self) {
            self.running.store(false, Ordering::Release);
        }
    }

    /// Capture from the microphone until `running` is cleared or the ingest
    /// side hangs up, then send `EndOfStream`.
    pub fn spawn_microphone(
        preferred_device_name: Option<String>,
        running: Arc<AtomicBool>,
        tx: mpsc::Sender<CaptureEvent>,
    ) -> tokio::task::JoinHandle<Result<()>> {
        tokio::task::spawn_blocking(move || {
            let (producer, consumer) = create_audio_ring();
            let capture =
                AudioCapture::open(producer, Arc::clone(&running), preferred_device_name.as_deref())?;
            let result = drain(consumer, &capture, &running, &tx);
            capture.stop();
            let _ = tx.blocking_send(CaptureEvent::EndOfStream);
            result
        })
    }

    fn drain(
        mut consumer: AudioConsumer,
        capture: &AudioCapture,
        running: &AtomicBool,
        tx: &mpsc::Sender<CaptureEvent>,
    ) -> Result<()> {
        let format = capture.format();
        let mut scratch = vec![0i16; (capture.sample_rate as usize / 10).max(1) * 2];

        while running.load(Ordering::Acquire) {
            std::thread::sleep(DRAIN_INTERVAL);
            let mut samples = Vec::new();
            loop {
                let n = consumer.pop_slice(&mut scratch);
                if n == 0 {
                    break;
                }
                samples.extend_from_slice(&scratch[..n]);
            }
            if samples.is_empty() {
                continue;
            }
            let event = CaptureEvent::Buffer {
                buffer: AudioBuffer::new(i16_to_le_bytes(&samples)),
                format: Some(format),
            };
            if tx.blocking_send(event).is_err() {
                info!("ingest channel closed, stopping capture");
                break;
            }
        }
        Ok(())
    }
}
