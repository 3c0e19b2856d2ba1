//! Pad grid slots and their load/playback state machine.
//!
//! ```text
//! Empty -> Loading -> Loaded -> Playing -> Loaded
//!             |
//!             +-> Empty (load failed)
//! ```
//!
//! Loads are version-stamped. A finished load only settles the slot when its version is newer
//! than the last settled one; anything older is stale and dropped.

use std::time::Duration;

use crate::audio_engine::constants::{DEFAULT_PAD_GAIN, PAD_COLORS};
use crate::audio_engine::errors::ErrorKind;
use crate::messages::SampleBuffer;

/// Observable state of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadState {
    Empty,
    Loading,
    Loaded,
    Playing,
}

impl PadState {
    pub fn as_str(self) -> &'static str {
        match self {
            PadState::Empty => "empty",
            PadState::Loading => "loading",
            PadState::Loaded => "loaded",
            PadState::Playing => "playing",
        }
    }
}

/// A load error shown on a pad until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadError {
    pub kind: ErrorKind,
    pub message: String,
    pub expires_at: Duration,
}

/// Pending end-of-playback check for the voice a pad started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watchdog {
    pub voice_id: u64,
    pub due: Duration,
}

/// One grid position.
#[derive(Debug)]
pub struct PadSlot {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub sample: Option<SampleBuffer>,
    pub gain: f32,
    pub color: &'static str,
    pub playing_voice: Option<u64>,
    pub watchdog: Option<Watchdog>,
    pub last_error: Option<PadError>,
    latest_requested: u64,
    settled_version: u64,
}

impl PadSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: pad_id(index),
            label: default_label(index),
            sample: None,
            gain: DEFAULT_PAD_GAIN,
            color: PAD_COLORS[index % PAD_COLORS.len()],
            playing_voice: None,
            watchdog: None,
            last_error: None,
            latest_requested: 0,
            settled_version: 0,
        }
    }

    pub fn state(&self) -> PadState {
        if self.is_loading() {
            PadState::Loading
        } else if self.playing_voice.is_some() {
            PadState::Playing
        } else if self.sample.is_some() {
            PadState::Loaded
        } else {
            PadState::Empty
        }
    }

    pub fn is_loading(&self) -> bool {
        self.latest_requested > self.settled_version
    }

    pub fn is_playing(&self) -> bool {
        self.playing_voice.is_some()
    }

    /// Records that a load stamped `version` has started.
    pub fn begin_load(&mut self, version: u64) {
        self.latest_requested = self.latest_requested.max(version);
    }

    /// True when a result stamped `version` must be dropped.
    pub fn is_stale(&self, version: u64) -> bool {
        version <= self.settled_version
    }

    /// Installs a decoded sample. Returns `false` (and changes nothing) for stale versions.
    pub fn install(&mut self, version: u64, label: String, sample: SampleBuffer) -> bool {
        if self.is_stale(version) {
            return false;
        }
        self.latest_requested = self.latest_requested.max(version);
        self.settled_version = version;
        self.label = label;
        self.sample = Some(sample);
        self.last_error = None;
        true
    }

    /// Settles a failed load: the slot goes back to empty and shows the error until
    /// `expires_at`. Returns `false` for stale versions.
    pub fn fail(
        &mut self,
        version: u64,
        kind: ErrorKind,
        message: String,
        expires_at: Duration,
    ) -> bool {
        if self.is_stale(version) {
            return false;
        }
        self.settled_version = version;
        self.sample = None;
        self.playing_voice = None;
        self.watchdog = None;
        self.last_error = Some(PadError {
            kind,
            message,
            expires_at,
        });
        true
    }

    /// Empties the slot and invalidates every load started before this call.
    pub fn clear(&mut self) {
        self.settled_version = self.latest_requested;
        self.label = default_label(self.index);
        self.sample = None;
        self.playing_voice = None;
        self.watchdog = None;
        self.last_error = None;
    }

    pub fn mark_playing(&mut self, voice_id: u64, due: Duration) {
        self.playing_voice = Some(voice_id);
        self.watchdog = Some(Watchdog { voice_id, due });
    }

    pub fn mark_stopped(&mut self) {
        self.playing_voice = None;
        self.watchdog = None;
    }

    pub fn snapshot(&self) -> PadSnapshot {
        PadSnapshot {
            index: self.index,
            id: self.id.clone(),
            label: self.label.clone(),
            state: self.state(),
            gain: self.gain,
            color: self.color,
            duration: self.sample.as_ref().map(SampleBuffer::duration),
            last_error: self.last_error.as_ref().map(|err| err.kind),
            error_message: self.last_error.as_ref().map(|err| err.message.clone()),
        }
    }
}

/// Plain-data view of a pad for collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PadSnapshot {
    pub index: usize,
    pub id: String,
    pub label: String,
    pub state: PadState,
    pub gain: f32,
    pub color: &'static str,
    pub duration: Option<Duration>,
    pub last_error: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl PadSnapshot {
    pub fn is_playing(&self) -> bool {
        self.state == PadState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == PadState::Loading
    }
}

pub fn pad_id(index: usize) -> String {
    format!("pad-{index}")
}

fn default_label(index: usize) -> String {
    format!("Pad {}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frames: usize) -> SampleBuffer {
        SampleBuffer::silent(1, 1_000, frames).unwrap()
    }

    #[test]
    fn test_new_pad_defaults() {
        let pad = PadSlot::new(9);
        assert_eq!(pad.id, "pad-9");
        assert_eq!(pad.label, "Pad 10");
        assert_eq!(pad.gain, 1.0);
        assert_eq!(pad.color, PAD_COLORS[1]);
        assert_eq!(pad.state(), PadState::Empty);
    }

    #[test]
    fn test_load_then_play_then_stop() {
        let mut pad = PadSlot::new(0);
        pad.begin_load(1);
        assert_eq!(pad.state(), PadState::Loading);

        assert!(pad.install(1, "kick".into(), sample(10)));
        assert_eq!(pad.state(), PadState::Loaded);
        assert_eq!(pad.label, "kick");

        pad.mark_playing(5, Duration::from_millis(10));
        assert_eq!(pad.state(), PadState::Playing);

        pad.mark_stopped();
        assert_eq!(pad.state(), PadState::Loaded);
        assert!(pad.watchdog.is_none());
    }

    #[test]
    fn test_failed_load_empties_pad() {
        let mut pad = PadSlot::new(0);
        pad.begin_load(1);
        pad.install(1, "old".into(), sample(10));

        pad.begin_load(2);
        assert!(pad.fail(2, ErrorKind::DecodeError, "bad".into(), Duration::from_secs(3)));

        assert_eq!(pad.state(), PadState::Empty);
        let snapshot = pad.snapshot();
        assert_eq!(snapshot.last_error, Some(ErrorKind::DecodeError));
        assert_eq!(snapshot.error_message.as_deref(), Some("bad"));
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let mut pad = PadSlot::new(0);
        pad.begin_load(1);
        pad.begin_load(2);

        assert!(pad.install(2, "newer".into(), sample(2)));
        assert!(!pad.install(1, "older".into(), sample(1)));
        assert!(!pad.fail(1, ErrorKind::DecodeError, "late".into(), Duration::ZERO));

        assert_eq!(pad.label, "newer");
        assert_eq!(pad.sample.as_ref().unwrap().frame_count(), 2);
        assert!(pad.last_error.is_none());
    }

    #[test]
    fn test_older_result_installs_while_newer_is_pending() {
        let mut pad = PadSlot::new(0);
        pad.begin_load(1);
        pad.begin_load(2);

        assert!(pad.install(1, "first".into(), sample(1)));
        assert_eq!(pad.state(), PadState::Loading);
        assert!(pad.install(2, "second".into(), sample(2)));
        assert_eq!(pad.state(), PadState::Loaded);
    }

    #[test]
    fn test_clear_invalidates_in_flight_loads() {
        let mut pad = PadSlot::new(3);
        pad.begin_load(1);
        pad.install(1, "snare".into(), sample(4));
        pad.begin_load(2);

        pad.clear();

        assert_eq!(pad.state(), PadState::Empty);
        assert_eq!(pad.label, "Pad 4");
        assert!(!pad.install(2, "late".into(), sample(4)));
    }
}
