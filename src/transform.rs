//! Gain + soft-clip transform
//!
//! - bypass: output is a verbatim copy of the input, gain ignored
//! - otherwise: `output[i] = tanh(input[i] * gain)`
//!
//! The transform holds no state and never clamps or validates `gain`.

use crate::error::{AudioShmError, Result};
use crate::pcm;
use std::time::Instant;

/// Output of one transform call
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// Interleaved float32 samples, same length as the input
    pub samples: Vec<f32>,
    /// Time spent in the transform loop, in nanoseconds
    pub elapsed_ns: i64,
}

/// Run the transform, allocating the output
pub fn process(input: &[f32], gain: f32, bypass: bool) -> Processed {
    let mut samples = vec![0.0f32; input.len()];
    let elapsed_ns = apply(input, &mut samples, gain, bypass);
    Processed {
        samples,
        elapsed_ns,
    }
}

/// Run the transform into a caller-owned buffer
///
/// Returns the elapsed time in nanoseconds.
pub fn process_into(input: &[f32], output: &mut [f32], gain: f32, bypass: bool) -> Result<i64> {
    if input.len() != output.len() {
        return Err(AudioShmError::ShapeMismatch {
            expected: input.len() * 4,
            got: output.len() * 4,
        });
    }
    Ok(apply(input, output, gain, bypass))
}

/// Byte-level entry point: little-endian float32 PCM in, PCM out
pub fn process_pcm(pcm_bytes: &[u8], gain: f32, bypass: bool) -> Result<(Vec<u8>, i64)> {
    let input = pcm::bytes_to_samples(pcm_bytes)?;
    let out = process(&input, gain, bypass);
    Ok((pcm::samples_to_bytes(&out.samples), out.elapsed_ns))
}

#[inline]
fn apply(input: &[f32], output: &mut [f32], gain: f32, bypass: bool) -> i64 {
    let start = Instant::now();

    if bypass {
        output.copy_from_slice(input);
    } else {
        for (dst, &src) in output.iter_mut().zip(input) {
            *dst = (src * gain).tanh();
        }
    }

    i64::try_from(start.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_soft_clip_values() {
        let out = process(&[0.0, 0.5, -0.5, 4.0], 2.0, false);
        assert_eq!(out.samples.len(), 4);
        assert_eq!(out.samples[0], 0.0);
        assert_relative_eq!(out.samples[1], 1.0f32.tanh());
        assert_relative_eq!(out.samples[2], -(1.0f32.tanh()));
        assert!(out.samples[3] <= 1.0);
        assert!(out.elapsed_ns >= 0);
    }

    #[test]
    fn test_empty_input() {
        let out = process(&[], 1.0, false);
        assert!(out.samples.is_empty());
        assert!(out.elapsed_ns >= 0);

        let out = process(&[], 1.0, true);
        assert!(out.samples.is_empty());
    }

    #[test]
    fn test_bypass_ignores_gain() {
        let input = [0.25, -3.0, 7.5, f32::MIN_POSITIVE];
        let out = process(&input, 100.0, true);
        assert_eq!(out.samples, input);
    }

    #[test]
    fn test_process_into_length_mismatch() {
        let mut out = [0.0f32; 3];
        assert!(matches!(
            process_into(&[1.0, 2.0], &mut out, 1.0, false),
            Err(AudioShmError::ShapeMismatch { expected: 8, got: 12 })
        ));

        let mut out = [0.0f32; 2];
        process_into(&[0.1, 0.2], &mut out, 1.0, false).unwrap();
        assert_relative_eq!(out[1], 0.2f32.tanh());
    }

    #[test]
    fn test_process_pcm() {
        let bytes = pcm::samples_to_bytes(&[0.5, -0.5]);
        let (out, _) = process_pcm(&bytes, 1.0, false).unwrap();
        let out = pcm::bytes_to_samples(&out).unwrap();
        assert_relative_eq!(out[0], 0.5f32.tanh());
        assert_relative_eq!(out[1], (-0.5f32).tanh());

        assert!(matches!(
            process_pcm(&[0u8; 7], 1.0, false),
            Err(AudioShmError::InvalidPcm { len: 7 })
        ));
    }

    proptest! {
        #[test]
        fn prop_bypass_is_identity(
            input in proptest::collection::vec(-10.0f32..10.0, 0..512),
            gain in -100.0f32..100.0,
        ) {
            let out = process(&input, gain, true);
            prop_assert_eq!(out.samples, input);
        }

        #[test]
        fn prop_soft_clip_matches_tanh_and_stays_in_unity(
            input in proptest::collection::vec(-10.0f32..10.0, 0..512),
            gain in -100.0f32..100.0,
        ) {
            let out = process(&input, gain, false);
            prop_assert_eq!(out.samples.len(), input.len());
            for (o, x) in out.samples.iter().zip(&input) {
                prop_assert_eq!(*o, (x * gain).tanh());
                prop_assert!(o.abs() <= 1.0);
            }
        }
    }
}
