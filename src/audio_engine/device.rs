//! Output device abstraction.
//!
//! The engine never talks to an audio API directly. It asks an [`OutputBackend`] to open an
//! [`OutputDevice`] bound to the shared voice graph, and reads time from a [`Clock`].
//!
//! Two backends ship with the crate: [`CpalBackend`](crate::audio_engine::audio_stream::CpalBackend)
//! for the host's default output, and [`OfflineBackend`] for headless rendering. The offline
//! backend is also a clock whose time only advances as frames are rendered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::audio_engine::constants::OFFLINE_BLOCK_FRAMES;
use crate::audio_engine::errors::DeviceError;
use crate::audio_engine::voice_graph::SharedGraph;

/// State reported by an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// No device has been opened.
    Uninitialized,
    /// Opened but not producing output (e.g. waiting for a user gesture).
    Suspended,
    /// Producing output.
    Running,
    /// Released. A closed device cannot be resumed.
    Closed,
}

impl DeviceState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::Suspended => "suspended",
            DeviceState::Running => "running",
            DeviceState::Closed => "closed",
        }
    }
}

/// An opened output device rendering a voice graph.
pub trait OutputDevice {
    fn state(&self) -> DeviceState;

    fn channels(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Starts (or restarts) output.
    fn resume(&mut self) -> Result<(), DeviceError>;

    /// Pauses output without releasing the device.
    fn suspend(&mut self) -> Result<(), DeviceError>;

    /// Releases the device. Further calls are no-ops.
    fn close(&mut self);
}

/// Opens output devices.
pub trait OutputBackend {
    fn open(&self, graph: SharedGraph) -> Result<Box<dyn OutputDevice>, DeviceError>;
}

/// Monotonic time source for watchdogs and error display windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

struct OfflineShared {
    channels: usize,
    sample_rate: u32,
    start_suspended: bool,
    state: Mutex<DeviceState>,
    graph: Mutex<Option<SharedGraph>>,
    frames_rendered: AtomicU64,
    opened: AtomicU64,
}

/// Headless backend that renders on demand.
///
/// Clones share state, so a test can keep one handle for driving the render while the engine
/// owns another. Time (as a [`Clock`]) is the number of rendered frames divided by the sample
/// rate, so it stands still while the device is suspended.
#[derive(Clone)]
pub struct OfflineBackend {
    shared: Arc<OfflineShared>,
}

impl OfflineBackend {
    /// A backend whose devices start running as soon as they are opened.
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self::build(channels, sample_rate, false)
    }

    /// A backend whose devices open suspended, like hosts that require a user gesture.
    pub fn suspended(channels: usize, sample_rate: u32) -> Self {
        Self::build(channels, sample_rate, true)
    }

    fn build(channels: usize, sample_rate: u32, start_suspended: bool) -> Self {
        Self {
            shared: Arc::new(OfflineShared {
                channels,
                sample_rate,
                start_suspended,
                state: Mutex::new(DeviceState::Uninitialized),
                graph: Mutex::new(None),
                frames_rendered: AtomicU64::new(0),
                opened: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> DeviceState {
        *self.shared.state.lock()
    }

    /// How many devices this backend has opened.
    pub fn open_count(&self) -> u64 {
        self.shared.opened.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }

    /// Renders `frames` frames and returns the interleaved output.
    ///
    /// Nothing is rendered (and time does not advance) unless a device is open and running.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let channels = self.shared.channels;
        if self.state() != DeviceState::Running {
            return Vec::new();
        }
        let Some(graph) = self.shared.graph.lock().clone() else {
            return Vec::new();
        };

        let mut output = vec![0.0; frames * channels];
        for block in output.chunks_mut(OFFLINE_BLOCK_FRAMES * channels.max(1)) {
            graph.lock().render(block, channels);
            let block_frames = block.len() / channels.max(1);
            self.shared
                .frames_rendered
                .fetch_add(block_frames as u64, Ordering::Relaxed);
        }
        output
    }

    /// Renders `duration` worth of frames, discarding the output.
    pub fn advance(&self, duration: Duration) {
        let frames = (duration.as_secs_f64() * f64::from(self.shared.sample_rate)).round() as usize;
        self.render_frames(frames);
    }
}

impl OutputBackend for OfflineBackend {
    fn open(&self, graph: SharedGraph) -> Result<Box<dyn OutputDevice>, DeviceError> {
        *self.shared.graph.lock() = Some(graph);
        *self.shared.state.lock() = if self.shared.start_suspended {
            DeviceState::Suspended
        } else {
            DeviceState::Running
        };
        self.shared.opened.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "Opened offline output ({} ch@{} Hz)",
            self.shared.channels,
            self.shared.sample_rate
        );

        Ok(Box::new(OfflineDevice {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl Clock for OfflineBackend {
    fn now(&self) -> Duration {
        let frames = self.frames_rendered();
        Duration::from_secs_f64(frames as f64 / f64::from(self.shared.sample_rate.max(1)))
    }
}

struct OfflineDevice {
    shared: Arc<OfflineShared>,
}

impl OutputDevice for OfflineDevice {
    fn state(&self) -> DeviceState {
        *self.shared.state.lock()
    }

    fn channels(&self) -> usize {
        self.shared.channels
    }

    fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        if *state == DeviceState::Closed {
            return Err(DeviceError::Closed);
        }
        *state = DeviceState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        let mut state = self.shared.state.lock();
        if *state == DeviceState::Closed {
            return Err(DeviceError::Closed);
        }
        *state = DeviceState::Suspended;
        Ok(())
    }

    fn close(&mut self) {
        *self.shared.state.lock() = DeviceState::Closed;
        self.shared.graph.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::voice_graph::VoiceGraph;
    use crate::messages::SampleBuffer;

    #[test]
    fn test_offline_device_renders_graph_and_advances_clock() {
        let backend = OfflineBackend::new(2, 1_000);
        let (mut graph, _events) = VoiceGraph::new(1.0);
        let sample = SampleBuffer::from_channels(1_000, vec![vec![0.5; 1_000]]).unwrap();
        graph.start_voice("pad-0", sample, 1.0, Duration::ZERO);

        let _device = backend.open(graph.into_shared()).unwrap();
        let output = backend.render_frames(10);

        assert_eq!(output.len(), 20);
        assert!(output.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert_eq!(backend.now(), Duration::from_millis(10));
    }

    #[test]
    fn test_suspended_device_does_not_advance() {
        let backend = OfflineBackend::suspended(2, 1_000);
        let (graph, _events) = VoiceGraph::new(1.0);
        let mut device = backend.open(graph.into_shared()).unwrap();
        assert_eq!(device.state(), DeviceState::Suspended);

        backend.advance(Duration::from_secs(1));
        assert_eq!(backend.now(), Duration::ZERO);

        device.resume().unwrap();
        backend.advance(Duration::from_secs(1));
        assert_eq!(backend.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_closed_device_cannot_resume() {
        let backend = OfflineBackend::new(2, 1_000);
        let (graph, _events) = VoiceGraph::new(1.0);
        let mut device = backend.open(graph.into_shared()).unwrap();

        device.close();
        device.close();

        assert_eq!(backend.state(), DeviceState::Closed);
        assert!(matches!(device.resume(), Err(DeviceError::Closed)));
        assert!(backend.render_frames(16).is_empty());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
