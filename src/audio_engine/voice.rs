//! Voice management for the voice graph.
//!
//! A [`Voice`] is one live playback instance of a sample, bound to a pad. It owns its source
//! (a shared handle to the buffer plus a read position) and its own gain stage. Voices are
//! created, rendered and destroyed by the [`VoiceGraph`](crate::audio_engine::voice_graph::VoiceGraph).

use std::time::Duration;

use crate::audio_engine::constants::{VOLUME_MAX, VOLUME_MIN};
use crate::messages::SampleBuffer;

/// Identifies a started voice to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceHandle {
    pub pad_id: String,
    pub voice_id: u64,
    pub started_at: Duration,
}

/// A single voice in the graph, representing a playing audio sample.
#[derive(Debug)]
pub struct Voice {
    /// Graph-unique id, increasing with every start.
    pub id: u64,

    /// Pad the voice is bound to.
    pub pad_id: String,

    /// The sample buffer being played.
    pub sample: SampleBuffer,

    /// Current playback position in frames.
    pub frame_pos: usize,

    /// Per-voice gain (0.0 to 1.0).
    pub gain: f32,

    /// Engine time the voice was started at.
    pub started_at: Duration,
}

impl Voice {
    /// Creates a new voice positioned at the first frame.
    ///
    /// The gain is clamped to [0, 1]; a non-finite gain is treated as silence.
    pub fn new(
        id: u64,
        pad_id: &str,
        sample: SampleBuffer,
        gain: f32,
        started_at: Duration,
    ) -> Self {
        Self {
            id,
            pad_id: pad_id.to_string(),
            sample,
            frame_pos: 0,
            gain: clamp_gain(gain),
            started_at,
        }
    }

    pub fn remaining_frames(&self) -> usize {
        self.sample.frame_count().saturating_sub(self.frame_pos)
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_frames() == 0
    }

    pub fn handle(&self) -> VoiceHandle {
        VoiceHandle {
            pad_id: self.pad_id.clone(),
            voice_id: self.id,
            started_at: self.started_at,
        }
    }
}

/// Clamps a gain value into [0, 1], mapping NaN to 0.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        return VOLUME_MIN;
    }
    gain.clamp(VOLUME_MIN, VOLUME_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_creation() {
        let sample = SampleBuffer::silent(2, 44_100, 2).unwrap();

        let voice = Voice::new(42, "pad-3", sample, 0.75, Duration::from_millis(5));

        assert_eq!(voice.id, 42);
        assert_eq!(voice.pad_id, "pad-3");
        assert_eq!(voice.frame_pos, 0);
        assert!((voice.gain - 0.75).abs() < f32::EPSILON);
        assert_eq!(voice.remaining_frames(), 2);
        assert!(!voice.is_finished());
    }

    #[test]
    fn test_voice_gain_is_clamped() {
        let sample = SampleBuffer::silent(1, 44_100, 1).unwrap();

        assert_eq!(Voice::new(0, "pad-0", sample.clone(), 1.7, Duration::ZERO).gain, 1.0);
        assert_eq!(Voice::new(1, "pad-0", sample.clone(), -0.5, Duration::ZERO).gain, 0.0);
        assert_eq!(Voice::new(2, "pad-0", sample, f32::NAN, Duration::ZERO).gain, 0.0);
    }

    #[test]
    fn test_empty_sample_voice_is_finished() {
        let sample = SampleBuffer::silent(1, 44_100, 0).unwrap();
        let voice = Voice::new(0, "pad-0", sample, 1.0, Duration::ZERO);
        assert!(voice.is_finished());
    }

    #[test]
    fn test_handle_reflects_voice() {
        let sample = SampleBuffer::silent(1, 44_100, 10).unwrap();
        let voice = Voice::new(7, "pad-1", sample, 1.0, Duration::from_secs(1));

        let handle = voice.handle();
        assert_eq!(handle.pad_id, "pad-1");
        assert_eq!(handle.voice_id, 7);
        assert_eq!(handle.started_at, Duration::from_secs(1));
    }
}
