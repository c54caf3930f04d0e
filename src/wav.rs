//! 16-bit PCM WAV writer
//!
//! Float samples are clamped to [-1, 1], scaled by 32767 and truncated
//! toward zero.

use crate::error::{AudioShmError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

const PCM16_SCALE: f32 = 32767.0;

/// Convert one float sample to PCM-16
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16
}

/// Write interleaved float32 samples as a 16-bit PCM WAV file
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
    frames: u32,
) -> Result<()> {
    let path = path.as_ref();

    if samples.is_empty() || channels == 0 {
        return Err(AudioShmError::InvalidArgument(
            "WAV output needs at least one sample and one channel".into(),
        ));
    }
    let expected = frames as usize * channels as usize;
    if samples.len() != expected {
        return Err(AudioShmError::InvalidArgument(format!(
            "{} samples given for {} frames x {} channels",
            samples.len(),
            frames,
            channels
        )));
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let wav_err = |source: hound::Error| AudioShmError::Wav {
        path: path.display().to_string(),
        source,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample)).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    tracing::debug!(path = %path.display(), frames, channels, "wrote WAV");
    Ok(())
}
