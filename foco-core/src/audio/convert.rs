//! Sample conversions into PCM16 little-endian mono.

/// Clamp and scale a float sample in `[-1.0, 1.0]` to i16.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Unsigned 8-bit (silence at 128) to i16.
#[inline]
pub fn u8_to_i16(sample: u8) -> i16 {
    ((sample as i16) - 128) << 8
}

/// Average interleaved frames down to one channel, writing into `out`.
///
/// A trailing partial frame is dropped. `out` is cleared first.
pub fn downmix_to_mono<T, F>(data: &[T], channels: usize, out: &mut Vec<i16>, to_i16: F)
where
    T: Copy,
    F: Fn(T) -> i16,
{
    out.clear();
    if channels <= 1 {
        out.extend(data.iter().map(|s| to_i16(*s)));
        return;
    }
    for frame in data.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|s| to_i16(*s) as i32).sum();
        out.push((sum / channels as i32) as i16);
    }
}

/// Serialize samples as PCM16 little-endian bytes.
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Rescale a signed integer sample of `bits` width to i16.
#[inline]
pub fn int_to_i16(sample: i32, bits: u16) -> i16 {
    match bits {
        0..=16 => (sample << (16 - bits as u32)) as i16,
        _ => (sample >> (bits as u32 - 16)) as i16,
    }
}
