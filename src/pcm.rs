//! Float32 PCM helpers
//!
//! PCM travelling as bytes is interleaved little-endian float32.

use crate::error::{AudioShmError, Result};
use std::f32::consts::PI;

/// Encode samples as little-endian float32 bytes
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Decode little-endian float32 bytes
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AudioShmError::InvalidPcm { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Interleaved sine wave, identical on every channel
pub fn generate_test_signal(sample_rate: u32, frames: u32, channels: u32, freq_hz: f32) -> Vec<f32> {
    let channels = channels as usize;
    let mut pcm = Vec::with_capacity(frames as usize * channels);

    for i in 0..frames {
        let s = (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin();
        pcm.extend(std::iter::repeat(s).take(channels));
    }

    pcm
}

/// [`generate_test_signal`] as PCM bytes
pub fn generate_test_signal_bytes(
    sample_rate: u32,
    frames: u32,
    channels: u32,
    freq_hz: f32,
) -> Vec<u8> {
    samples_to_bytes(&generate_test_signal(sample_rate, frames, channels, freq_hz))
}
