//! Whole-buffer sample rate conversion for freshly decoded audio.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio_engine::errors::SampleLoadError;

/// Input chunk size handed to the sinc resampler.
const CHUNK_FRAMES: usize = 1024;

/// Converts planar `channels` from `from_hz` to `to_hz`.
///
/// The output is trimmed of the resampler's delay and cut to
/// `round(frames * to_hz / from_hz)` frames, so the duration is preserved. Conversions whose
/// output would exceed `max_samples_out` samples across all channels fail before allocating.
pub fn resample_channels(
    channels: Vec<Vec<f32>>,
    from_hz: u32,
    to_hz: u32,
    max_samples_out: usize,
) -> Result<Vec<Vec<f32>>, SampleLoadError> {
    if from_hz == to_hz || channels.is_empty() {
        return Ok(channels);
    }

    let frames_in = channels[0].len();
    let ratio = f64::from(to_hz) / f64::from(from_hz);
    let expected_out = (frames_in as f64 * ratio).round();
    let samples_out = expected_out * channels.len() as f64;
    if samples_out > max_samples_out as f64 {
        return Err(SampleLoadError::TooLong {
            samples: samples_out.min(usize::MAX as f64) as usize,
            limit: max_samples_out,
        });
    }
    let expected_out = expected_out as usize;
    if frames_in == 0 {
        return Ok(channels);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels.len())?;

    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = (0..channels.len())
        .map(|_| Vec::with_capacity(expected_out + delay + CHUNK_FRAMES))
        .collect();

    let mut pos = 0;
    while frames_in - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = channels.iter().map(|c| &c[pos..pos + needed]).collect();
        append(&mut out, resampler.process(&chunk, None)?);
        pos += needed;
    }

    if pos < frames_in {
        let tail: Vec<&[f32]> = channels.iter().map(|c| &c[pos..]).collect();
        append(&mut out, resampler.process_partial(Some(tail.as_slice()), None)?);
    }

    while out[0].len() < delay + expected_out {
        let flushed = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if flushed.first().is_none_or(Vec::is_empty) {
            break;
        }
        append(&mut out, flushed);
    }

    for channel in &mut out {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected_out, 0.0);
    }

    log::debug!(
        "Resampled {} frames @ {} Hz -> {} frames @ {} Hz",
        frames_in,
        from_hz,
        expected_out,
        to_hz
    );

    Ok(out)
}

fn append(out: &mut [Vec<f32>], processed: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(processed) {
        dst.extend_from_slice(&src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_passthrough() {
        let input = vec![vec![0.1, 0.2, 0.3]];
        let output = resample_channels(input.clone(), 44_100, 44_100, usize::MAX).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_upsample_preserves_duration() {
        let input = vec![vec![0.0; 22_050], vec![0.0; 22_050]];
        let output = resample_channels(input, 22_050, 44_100, usize::MAX).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].len(), 44_100);
        assert_eq!(output[1].len(), 44_100);
    }

    #[test]
    fn test_downsample_constant_signal_stays_close() {
        let input = vec![vec![0.5; 48_000]];
        let output = resample_channels(input, 48_000, 44_100, usize::MAX).unwrap();

        assert_eq!(output[0].len(), 44_100);
        // Ignore the filter's edges.
        let middle = &output[0][1_000..43_000];
        assert!(middle.iter().all(|s| (s - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_output_over_budget_is_rejected() {
        let input = vec![vec![0.0; 100], vec![0.0; 100]];

        let err = resample_channels(input.clone(), 1_000, 2_000, 399).unwrap_err();
        assert!(matches!(
            err,
            SampleLoadError::TooLong {
                samples: 400,
                limit: 399
            }
        ));

        let output = resample_channels(input, 1_000, 2_000, 400).unwrap();
        assert_eq!(output[0].len(), 200);
    }
}
