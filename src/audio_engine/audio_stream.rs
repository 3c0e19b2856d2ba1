//! Audio Stream Module
//!
//! CPAL-backed output device:
//! - Default device discovery and stream configuration
//! - Output callback rendering the shared voice graph
//! - Suspend/resume/close mapped onto stream pause/play/drop

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Sample, Stream, StreamConfig};
use env_logger::{Builder, Env};

use crate::audio_engine::device::{DeviceState, OutputBackend, OutputDevice};
use crate::audio_engine::errors::DeviceError;
use crate::audio_engine::voice_graph::SharedGraph;

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Users can override via `RUST_LOG`, e.g. `RUST_LOG=debug` when troubleshooting.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// Opens the host's default output device.
#[derive(Debug, Clone, Copy)]
pub struct CpalBackend {
    buffer_frames: u32,
}

impl CpalBackend {
    pub fn new(buffer_frames: u32) -> Self {
        Self { buffer_frames }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(512)
    }
}

impl OutputBackend for CpalBackend {
    /// Builds a paused output stream that renders `graph`.
    ///
    /// The stream starts suspended; the engine resumes it during initialization.
    fn open(&self, graph: SharedGraph) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|err| DeviceError::Config(err.to_string()))?;
        let sample_rate = config.sample_rate();
        let channels = config.channels();

        log::info!(
            "Opening audio output... ({} ch@{} Hz)",
            channels,
            sample_rate
        );

        let stream_config = StreamConfig {
            channels,
            sample_rate,
            buffer_size: BufferSize::Fixed(self.buffer_frames),
        };

        let output_channels = channels as usize;
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Never block the audio thread on the control side.
                    match graph.try_lock() {
                        Some(mut graph) => graph.render(data, output_channels),
                        None => data.fill(Sample::EQUILIBRIUM),
                    }
                },
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|err| DeviceError::Build(err.to_string()))?;

        // Some hosts start streams immediately; hold output until resume.
        if let Err(err) = stream.pause() {
            log::warn!("Could not pause new output stream: {}", err);
        }

        Ok(Box::new(CpalDevice {
            stream: Some(stream),
            state: DeviceState::Suspended,
            channels: output_channels,
            sample_rate,
        }))
    }
}

/// A running CPAL output stream.
pub struct CpalDevice {
    stream: Option<Stream>,
    state: DeviceState,
    channels: usize,
    sample_rate: u32,
}

impl OutputDevice for CpalDevice {
    fn state(&self) -> DeviceState {
        self.state
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::Closed)?;
        stream
            .play()
            .map_err(|err| DeviceError::Control(err.to_string()))?;
        self.state = DeviceState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        let stream = self.stream.as_ref().ok_or(DeviceError::Closed)?;
        stream
            .pause()
            .map_err(|err| DeviceError::Control(err.to_string()))?;
        self.state = DeviceState::Suspended;
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Closed audio output");
        }
        self.state = DeviceState::Closed;
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::voice_graph::VoiceGraph;

    #[test]
    fn test_logger_setup() {
        // Multiple calls should be safe (though only the first takes effect)
        setup_logger();
        setup_logger();
    }

    #[test]
    fn test_cpal_device_lifecycle() {
        // Actual stream creation requires audio hardware
        if cpal::default_host().default_output_device().is_none() {
            return;
        }

        let (graph, _events) = VoiceGraph::new(0.0);
        let Ok(mut device) = CpalBackend::default().open(graph.into_shared()) else {
            // Expected in many test environments
            return;
        };

        assert_eq!(device.state(), DeviceState::Suspended);
        assert!(device.channels() > 0);

        device.close();
        assert_eq!(device.state(), DeviceState::Closed);
        assert!(matches!(device.resume(), Err(DeviceError::Closed)));
    }
}
