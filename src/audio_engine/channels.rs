use crate::messages::SampleBuffer;

/// Splits interleaved samples into one vector per channel.
///
/// A trailing partial frame is dropped.
pub fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }

    let frames = samples.len() / channels;
    let mut out: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in out.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    out
}

/// Reads one output-channel sample from a planar source with a different channel layout.
///
/// - Same channel count: straight copy
/// - Mono source: the signal is duplicated to every output channel
/// - Stereo source into mono output: both channels are averaged
/// - Anything else: output channel `c` reads source channel `c % source_channels`
pub fn mapped_sample(
    source: &SampleBuffer,
    frame: usize,
    output_channel: usize,
    output_channels: usize,
) -> f32 {
    match (source.channel_count(), output_channels) {
        (s, o) if s == o => source.channel(output_channel)[frame],
        (1, _) => source.channel(0)[frame],
        (2, 1) => (source.channel(0)[frame] + source.channel(1)[frame]) * 0.5,
        (s, _) => source.channel(output_channel % s)[frame],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_stereo() {
        let input = [0.5, -0.5, 0.25, -0.25, 1.0, -1.0];
        let output = deinterleave(&input, 2);

        assert_eq!(output, vec![vec![0.5, 0.25, 1.0], vec![-0.5, -0.25, -1.0]]);
    }

    #[test]
    fn test_deinterleave_drops_partial_frame() {
        let output = deinterleave(&[0.1, 0.2, 0.3], 2);
        assert_eq!(output, vec![vec![0.1], vec![0.2]]);
    }

    #[test]
    fn test_mapped_sample_mono_to_stereo() {
        let source = SampleBuffer::from_channels(44_100, vec![vec![0.5, -0.3]]).unwrap();

        assert_eq!(mapped_sample(&source, 1, 0, 2), -0.3);
        assert_eq!(mapped_sample(&source, 1, 1, 2), -0.3);
    }

    #[test]
    fn test_mapped_sample_stereo_to_mono() {
        let source = SampleBuffer::from_channels(44_100, vec![vec![0.5], vec![0.3]]).unwrap();

        assert!((mapped_sample(&source, 0, 0, 1) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mapped_sample_wraps_wider_outputs() {
        let source = SampleBuffer::from_channels(44_100, vec![vec![0.1], vec![0.2]]).unwrap();

        assert_eq!(mapped_sample(&source, 0, 2, 4), 0.1);
        assert_eq!(mapped_sample(&source, 0, 3, 4), 0.2);
    }
}
