//! Message and buffer definitions shared between the control side and the render path.
//!
//! [`SampleBuffer`] is the decoded-audio type every component agrees on. [`GraphEvent`] travels
//! from the render path to the engine through a ring buffer, [`LoaderEvent`] from background
//! decode threads to the engine through a channel.

use std::sync::Arc;
use std::time::Duration;

use crate::audio_engine::errors::{BufferShapeError, SampleLoadError};

/// Decoded, channel-separated audio.
///
/// The channel data lives behind an [`Arc`], so cloning a buffer is cheap and every clone
/// refers to the same immutable samples. A pad slot and the voice playing it share one buffer.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    sample_rate: u32,
    frame_count: usize,
    channels: Arc<[Box<[f32]>]>,
}

impl SampleBuffer {
    /// Builds a buffer from per-channel sample vectors.
    ///
    /// # Errors
    ///
    /// Fails when there are no channels, the sample rate is zero, or the channels
    /// differ in length.
    pub fn from_channels(
        sample_rate: u32,
        channels: Vec<Vec<f32>>,
    ) -> Result<Self, BufferShapeError> {
        if channels.is_empty() {
            return Err(BufferShapeError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(BufferShapeError::ZeroSampleRate);
        }

        let frame_count = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frame_count)
        {
            return Err(BufferShapeError::RaggedChannels {
                channel: index,
                expected: frame_count,
                found: channel.len(),
            });
        }

        let channels: Vec<Box<[f32]>> = channels.into_iter().map(Vec::into_boxed_slice).collect();
        Ok(Self {
            sample_rate,
            frame_count,
            channels: Arc::from(channels),
        })
    }

    /// A buffer of `frame_count` zero-valued frames.
    pub fn silent(
        channel_count: usize,
        sample_rate: u32,
        frame_count: usize,
    ) -> Result<Self, BufferShapeError> {
        Self::from_channels(sample_rate, vec![vec![0.0; frame_count]; channel_count])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Samples of one channel. Panics if `index >= channel_count()`.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(|channel| &channel[..])
    }

    /// Playback length at the buffer's own sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count as f64 / f64::from(self.sample_rate))
    }

    /// True when both handles point at the same channel storage.
    pub fn shares_storage_with(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.channels, &other.channels)
    }

    /// Number of live handles to this buffer's storage.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.channels)
    }

    /// Field-by-field equality comparing floats by bit pattern, so NaN payloads and signed
    /// zeros count.
    pub fn bit_eq(&self, other: &SampleBuffer) -> bool {
        self.sample_rate == other.sample_rate
            && self.frame_count == other.frame_count
            && self.channel_count() == other.channel_count()
            && self.channels().zip(other.channels()).all(|(a, b)| {
                a.iter()
                    .zip(b)
                    .all(|(x, y)| x.to_bits() == y.to_bits())
            })
    }
}

/// Message emitted from the render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A voice reached the end of its buffer and was removed from the graph.
    VoiceEnded { voice_id: u64 },
}

/// Events emitted from background decode threads.
#[derive(Debug)]
pub enum LoaderEvent {
    /// Decoding finished and produced a valid buffer.
    Success {
        pad_index: usize,
        version: u64,
        label: String,
        sample: SampleBuffer,
    },

    /// Decoding failed.
    Error {
        pad_index: usize,
        version: u64,
        error: SampleLoadError,
    },
}

impl LoaderEvent {
    pub fn pad_index(&self) -> usize {
        match self {
            LoaderEvent::Success { pad_index, .. } | LoaderEvent::Error { pad_index, .. } => {
                *pad_index
            }
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            LoaderEvent::Success { version, .. } | LoaderEvent::Error { version, .. } => *version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_channels_rejects_ragged_input() {
        let result = SampleBuffer::from_channels(44_100, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(
            result,
            Err(BufferShapeError::RaggedChannels {
                channel: 1,
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn test_from_channels_rejects_empty_and_zero_rate() {
        assert!(matches!(
            SampleBuffer::from_channels(44_100, Vec::new()),
            Err(BufferShapeError::NoChannels)
        ));
        assert!(matches!(
            SampleBuffer::from_channels(0, vec![vec![0.0]]),
            Err(BufferShapeError::ZeroSampleRate)
        ));
    }

    #[test]
    fn test_zero_frames_is_a_valid_shape() {
        let buffer = SampleBuffer::silent(2, 48_000, 0).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 0);
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::silent(2, 44_100, 88_200).unwrap();
        assert_eq!(buffer.duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_clones_share_storage() {
        let buffer = SampleBuffer::from_channels(8_000, vec![vec![0.25, -0.5]]).unwrap();
        let clone = buffer.clone();
        assert!(clone.shares_storage_with(&buffer));
        assert!(clone.bit_eq(&buffer));
    }

    #[test]
    fn test_bit_eq_distinguishes_signed_zero() {
        let a = SampleBuffer::from_channels(8_000, vec![vec![0.0]]).unwrap();
        let b = SampleBuffer::from_channels(8_000, vec![vec![-0.0]]).unwrap();
        assert!(!a.bit_eq(&b));
    }
}
