//! Audio buffering: chunk types, the duration-based accumulator and, with the
//! `audio-cpal` feature, the lock-free SPSC ring between the capture callback
//! and the drain thread.

pub mod accumulator;
pub mod chunk;

pub use accumulator::{ChunkAccumulator, DEFAULT_CHUNK_DURATION_MS};
pub use chunk::{AudioBuffer, AudioChunk, StreamFormat};

#[cfg(feature = "audio-cpal")]
pub use ring::*;

#[cfg(feature = "audio-cpal")]
mod ring {
    use ringbuf::{traits::Split, HeapRb};

    pub use ringbuf::traits::{Consumer, Producer};

    /// Producer half — held by the audio callback thread.
    pub type AudioProducer = ringbuf::HeapProd<i16>;

    /// Consumer half — held by the drain thread.
    pub type AudioConsumer = ringbuf::HeapCons<i16>;

    /// 2^20 = 1 048 576 i16 samples ≈ 21.8 s at 48 kHz.
    pub const RING_CAPACITY: usize = 1 << 20;

    /// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
    pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
        HeapRb::<i16>::new(RING_CAPACITY).split()
    }
}
