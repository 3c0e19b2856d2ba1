//! The live signal graph: one master gain stage and the active voices routed through it.
//!
//! [`VoiceGraph`] is the only owner of voice nodes. It is shared between the control side and
//! the output device callback as a [`SharedGraph`]; the callback calls [`VoiceGraph::render`],
//! which advances every voice and removes the ones that reach the end of their buffer. Each
//! natural end is announced as a [`GraphEvent::VoiceEnded`] on the graph's event ring.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cpal::Sample;
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_engine::channels::mapped_sample;
use crate::audio_engine::constants::EVENT_QUEUE_CAPACITY;
use crate::audio_engine::voice::{Voice, VoiceHandle, clamp_gain};
use crate::messages::{GraphEvent, SampleBuffer};

/// Graph handle shared with the output device callback.
pub type SharedGraph = Arc<Mutex<VoiceGraph>>;

/// The single gain stage every voice is routed through before the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterBus {
    gain: f32,
}

impl MasterBus {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: clamp_gain(gain),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Sets the gain, clamped to [0, 1]. NaN is ignored.
    pub fn set_gain(&mut self, gain: f32) {
        if gain.is_nan() {
            return;
        }
        self.gain = clamp_gain(gain);
    }
}

/// Active voices keyed by pad id, plus the master bus.
pub struct VoiceGraph {
    master: MasterBus,

    /// At most one voice per pad id.
    active_voices: HashMap<String, Voice>,

    next_voice_id: u64,

    /// Natural-end notifications for the engine.
    events: Producer<GraphEvent>,
}

impl VoiceGraph {
    /// Creates an empty graph with the master bus at `master_gain`.
    ///
    /// Returns the graph and the consumer end of its event ring.
    pub fn new(master_gain: f32) -> (Self, Consumer<GraphEvent>) {
        let (events, consumer) = RingBuffer::new(EVENT_QUEUE_CAPACITY);
        let graph = Self {
            master: MasterBus::new(master_gain),
            active_voices: HashMap::new(),
            next_voice_id: 0,
            events,
        };
        (graph, consumer)
    }

    /// Wraps the graph for sharing with an output device.
    pub fn into_shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn master(&self) -> MasterBus {
        self.master
    }

    pub fn master_gain(&self) -> f32 {
        self.master.gain()
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master.set_gain(gain);
    }

    /// Starts a voice for `pad_id`, replacing any voice already playing on that pad.
    ///
    /// The new voice reads `buffer` from its first frame with a per-voice gain of
    /// `clamp(gain, 0, 1)`. When it reaches the end of the buffer during [`render`](Self::render)
    /// it is removed and a [`GraphEvent::VoiceEnded`] is emitted.
    pub fn start_voice(
        &mut self,
        pad_id: &str,
        buffer: SampleBuffer,
        gain: f32,
        now: Duration,
    ) -> VoiceHandle {
        if let Some(previous) = self.active_voices.remove(pad_id) {
            log::debug!(
                "Replacing voice {} on {} at frame {}",
                previous.id,
                pad_id,
                previous.frame_pos
            );
        }

        self.next_voice_id += 1;
        let voice = Voice::new(self.next_voice_id, pad_id, buffer, gain, now);
        let handle = voice.handle();
        self.active_voices.insert(pad_id.to_string(), voice);
        handle
    }

    /// Halts and removes the voice for `pad_id`.
    ///
    /// Dropping the voice releases its buffer handle immediately. Returns `false` when the pad
    /// had no active voice.
    pub fn stop_voice(&mut self, pad_id: &str) -> bool {
        match self.active_voices.remove(pad_id) {
            Some(voice) => {
                log::debug!("Stopped voice {} on {}", voice.id, pad_id);
                true
            }
            None => false,
        }
    }

    /// Stops every active voice. The graph is always empty afterwards.
    ///
    /// Returns the number of voices that were stopped.
    pub fn stop_all_voices(&mut self) -> usize {
        let stopped = self.active_voices.len();
        for (pad_id, voice) in self.active_voices.drain() {
            log::debug!("Stopped voice {} on {}", voice.id, pad_id);
        }
        stopped
    }

    pub fn is_voice_active(&self, pad_id: &str) -> bool {
        self.active_voices.contains_key(pad_id)
    }

    /// Id of the voice currently playing on `pad_id`.
    pub fn active_voice_id(&self, pad_id: &str) -> Option<u64> {
        self.active_voices.get(pad_id).map(|voice| voice.id)
    }

    pub fn active_voice_count(&self) -> usize {
        self.active_voices.len()
    }

    /// Mixes all active voices into `output`.
    ///
    /// `output` holds interleaved frames with `channels` samples each. Every voice is scaled by
    /// its own gain and then by the master gain. Voices that run out of frames are removed.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(Sample::EQUILIBRIUM);

        if channels == 0 {
            return;
        }

        let frames = output.len() / channels;
        if frames == 0 {
            return;
        }

        let master_gain = self.master.gain();
        let events = &mut self.events;

        self.active_voices.retain(|_, voice| {
            let to_render = voice.remaining_frames().min(frames);
            let gain = voice.gain * master_gain;

            for i in 0..to_render {
                let frame = voice.frame_pos + i;
                let out_base = i * channels;
                for channel in 0..channels {
                    output[out_base + channel] +=
                        mapped_sample(&voice.sample, frame, channel, channels) * gain;
                }
            }
            voice.frame_pos += to_render;

            if voice.is_finished() {
                // A full ring only loses the notification; the engine's watchdog repairs that.
                let _ = events.push(GraphEvent::VoiceEnded { voice_id: voice.id });
                return false;
            }
            true
        });
    }
}
