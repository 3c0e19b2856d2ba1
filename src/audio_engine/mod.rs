//! Audio Engine Module
//!
//! This module provides the pad grid's playback and loading machinery.
//! It is organized into sub-modules, each with a specific responsibility:
//!
//! - [`audio_stream`]: CPAL output device and logger setup
//! - [`device`]: Output device, backend and clock abstractions, plus the offline backend
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Engine error types
//! - [`voice`] / [`voice_graph`]: Live voices and the graph that renders them
//! - [`pad`]: Pad slots and their state machine
//! - [`sample_loader`] / [`resampler`]: Decoding uploaded audio
//!
//! The main [`PlaybackEngine`] struct orchestrates these components behind a plain-data
//! interface for UI collaborators.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rtrb::Consumer;
use serde::Deserialize;

use crate::audio_engine::audio_stream::{CpalBackend, setup_logger};
use crate::audio_engine::constants::{
    DEFAULT_MASTER_GAIN, ERROR_DISPLAY_WINDOW, MAX_SAMPLE_BYTES, NUM_PADS,
};
use crate::audio_engine::device::{
    Clock, DeviceState, OfflineBackend, OutputBackend, OutputDevice, SystemClock,
};
use crate::audio_engine::errors::{EngineError, ErrorKind, SampleLoadError};
use crate::audio_engine::pad::{PadSlot, PadSnapshot};
use crate::audio_engine::resampler::resample_channels;
use crate::audio_engine::sample_loader::{SampleDecoder, label_from_file_name};
use crate::audio_engine::voice::{VoiceHandle, clamp_gain};
use crate::audio_engine::voice_graph::{SharedGraph, VoiceGraph};
use crate::bank;
use crate::messages::{GraphEvent, LoaderEvent, SampleBuffer};
use crate::sample_codec::StoredSample;
use crate::storage::{AppSettings, BankRecord, PersistenceGateway, SETTINGS_KEY, StorageInfo};

pub mod audio_stream;
pub mod channels;
pub mod constants;
pub mod device;
pub mod errors;
pub mod pad;
pub mod resampler;
pub mod sample_loader;
pub mod voice;
pub mod voice_graph;

/// Engine tuning, deserialisable from host configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master gain applied on the first `initialize` unless a volume was set earlier.
    pub master_gain: f32,
    pub pad_count: usize,
    pub max_sample_bytes: usize,
    /// How long a failed load keeps its error on the pad, in milliseconds.
    pub error_display_ms: u64,
    /// Resample decoded audio to the output device's rate.
    pub resample_to_device_rate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_gain: DEFAULT_MASTER_GAIN,
            pad_count: NUM_PADS,
            max_sample_bytes: MAX_SAMPLE_BYTES,
            error_display_ms: ERROR_DISPLAY_WINDOW.as_millis() as u64,
            resample_to_device_rate: true,
        }
    }
}

impl EngineConfig {
    pub fn error_display_window(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }
}

/// Read-only engine summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    pub initialized: bool,
    pub active_voice_count: usize,
    pub device_state: DeviceState,
    pub master_volume: f32,
}

/// Identifies one background load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub pad_id: String,
    pub version: u64,
}

/// State changes reported by [`PlaybackEngine::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum PadEvent {
    Loaded { pad_id: String, label: String },
    LoadFailed {
        pad_id: String,
        kind: ErrorKind,
        message: String,
    },
    /// Playback finished on its own, or the watchdog found the voice gone.
    PlaybackEnded { pad_id: String },
    ErrorCleared { pad_id: String },
}

/// Live output: the device and the graph it renders.
struct Output {
    device: Box<dyn OutputDevice>,
    graph: SharedGraph,
    events: Consumer<GraphEvent>,
}

/// Owns the pad grid, the voice graph and the output device.
///
/// All control calls take `&mut self` and are therefore totally ordered. Decoding runs on
/// background threads; its results, natural voice ends, watchdogs and error expiry are all
/// applied in [`poll`](Self::poll).
pub struct PlaybackEngine {
    config: EngineConfig,
    backend: Box<dyn OutputBackend>,
    clock: Arc<dyn Clock>,
    output: Option<Output>,
    master_gain: f32,
    decoder: SampleDecoder,
    pads: Vec<PadSlot>,
    next_version: u64,
    loader_tx: Sender<LoaderEvent>,
    loader_rx: Receiver<LoaderEvent>,
    pending: Vec<PadEvent>,
    store: Option<PersistenceGateway>,
    current_bank_id: Option<i64>,
}

impl PlaybackEngine {
    pub fn new(config: EngineConfig, backend: Box<dyn OutputBackend>, clock: Arc<dyn Clock>) -> Self {
        let (loader_tx, loader_rx) = mpsc::channel();
        let pads = (0..config.pad_count).map(PadSlot::new).collect();

        Self {
            master_gain: clamp_gain(config.master_gain),
            decoder: SampleDecoder::new(config.max_sample_bytes, None),
            config,
            backend,
            clock,
            output: None,
            pads,
            next_version: 0,
            loader_tx,
            loader_rx,
            pending: Vec::new(),
            store: None,
            current_bank_id: None,
        }
    }

    /// Engine on the host's default output device with wall-clock time.
    pub fn with_default_output(config: EngineConfig) -> Self {
        Self::new(config, Box::new(CpalBackend::default()), Arc::new(SystemClock::new()))
    }

    /// Headless engine whose time advances only as `backend` renders.
    pub fn offline(config: EngineConfig, backend: OfflineBackend) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(backend.clone());
        Self::new(config, Box::new(backend), clock)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens the output device and creates the master bus.
    ///
    /// Calling it again is a no-op apart from resuming a suspended device.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        if self.output.is_some() {
            self.resume_if_suspended();
            return Ok(());
        }

        setup_logger();

        let (graph, events) = VoiceGraph::new(self.master_gain);
        let graph = graph.into_shared();
        let device = self.backend.open(Arc::clone(&graph))?;

        log::info!(
            "Audio engine initialized ({} ch@{} Hz, master {:.2}, state {})",
            device.channels(),
            device.sample_rate(),
            self.master_gain,
            device.state().as_str()
        );

        if self.config.resample_to_device_rate {
            self.decoder = self
                .decoder
                .with_target_sample_rate(Some(device.sample_rate()));
            self.conform_loaded_samples();
        }

        self.output = Some(Output {
            device,
            graph,
            events,
        });
        self.resume_if_suspended();
        Ok(())
    }

    /// Resumes a suspended device. Hosts that gate audio behind a user gesture call this from
    /// the first gesture.
    pub fn unlock(&mut self) -> Result<(), EngineError> {
        let output = self.output.as_mut().ok_or(EngineError::NotReady)?;
        if output.device.state() == DeviceState::Suspended {
            output.device.resume()?;
            log::info!("Audio output resumed");
        }
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), EngineError> {
        let output = self.output.as_mut().ok_or(EngineError::NotReady)?;
        output.device.suspend()?;
        Ok(())
    }

    fn resume_if_suspended(&mut self) {
        if let Err(err) = self.unlock() {
            log::warn!("Audio output stays suspended: {}", err);
        }
    }

    /// Starts decoding `bytes` for `pad_id` on a background thread.
    ///
    /// The pad shows as loading until the result is applied by [`poll`](Self::poll). Input
    /// that fails the type or size check settles the pad as failed immediately.
    pub fn begin_load(
        &mut self,
        pad_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<LoadTicket, EngineError> {
        let index = self.pad_index(pad_id)?;
        self.next_version += 1;
        let version = self.next_version;
        self.pads[index].begin_load(version);

        if let Err(err) = self.decoder.check_input(bytes.len(), mime) {
            log::warn!("Rejected upload for {}: {}", pad_id, err);
            self.settle_failure(index, version, &err);
            return Err(err.into());
        }

        let decoder = self.decoder;
        let loader_tx = self.loader_tx.clone();
        let label = label_from_file_name(file_name);
        let mime = mime.to_string();

        log::debug!("Loading {} into {} (v{})", file_name, pad_id, version);
        thread::spawn(move || {
            let event = match decoder.decode(bytes, &mime) {
                Ok(sample) => LoaderEvent::Success {
                    pad_index: index,
                    version,
                    label,
                    sample,
                },
                Err(error) => LoaderEvent::Error {
                    pad_index: index,
                    version,
                    error,
                },
            };
            let _ = loader_tx.send(event);
        });

        Ok(LoadTicket {
            pad_id: pad_id.to_string(),
            version,
        })
    }

    /// Decodes `bytes` into `pad_id` and waits for the result.
    ///
    /// On failure the pad is left empty with its error set, and the error is returned.
    pub fn load_from_bytes(
        &mut self,
        pad_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<(), EngineError> {
        let ticket = self.begin_load(pad_id, file_name, bytes, mime)?;
        self.wait_for(&ticket)
    }

    fn wait_for(&mut self, ticket: &LoadTicket) -> Result<(), EngineError> {
        loop {
            // The engine holds a sender, so the channel never disconnects.
            let Ok(event) = self.loader_rx.recv() else {
                return Err(EngineError::Superseded(ticket.pad_id.clone()));
            };
            let is_ticket = self.pads.get(event.pad_index()).map(|pad| pad.id.as_str())
                == Some(ticket.pad_id.as_str())
                && event.version() == ticket.version;

            let outcome = self.apply_loader_event(event);
            if is_ticket {
                return outcome;
            }
        }
    }

    fn apply_loader_event(&mut self, event: LoaderEvent) -> Result<(), EngineError> {
        let index = event.pad_index();
        let version = event.version();
        let Some(pad) = self.pads.get(index) else {
            return Ok(());
        };
        let pad_id = pad.id.clone();

        if pad.is_stale(version) {
            log::debug!("Dropped stale load v{} for {}", version, pad_id);
            return Err(EngineError::Superseded(pad_id));
        }

        match event {
            LoaderEvent::Success { label, sample, .. } => {
                let sample = match self.conform(sample) {
                    Ok(sample) => sample,
                    Err(err) => {
                        self.settle_failure(index, version, &err);
                        return Err(err.into());
                    }
                };

                log::info!(
                    "Loaded `{}` into {} ({} ch, {:.2}s)",
                    label,
                    pad_id,
                    sample.channel_count(),
                    sample.duration().as_secs_f64()
                );
                self.persist(&pad_id, &label, &sample);
                self.pads[index].install(version, label.clone(), sample);
                self.pending.push(PadEvent::Loaded { pad_id, label });
                Ok(())
            }
            LoaderEvent::Error { error, .. } => {
                log::warn!("Failed to load sample into {}: {}", pad_id, error);
                self.settle_failure(index, version, &error);
                Err(error.into())
            }
        }
    }

    fn settle_failure(&mut self, index: usize, version: u64, error: &SampleLoadError) {
        let expires_at = self.clock.now() + self.config.error_display_window();
        let pad = &mut self.pads[index];
        let was_playing = pad.is_playing();
        if !pad.fail(version, error.kind(), error.to_string(), expires_at) {
            return;
        }

        if was_playing {
            if let Some(output) = &self.output {
                output.graph.lock().stop_voice(&pad.id);
            }
        }
        self.pending.push(PadEvent::LoadFailed {
            pad_id: pad.id.clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Resamples `sample` to the device rate when the engine is configured to.
    fn conform(&self, sample: SampleBuffer) -> Result<SampleBuffer, SampleLoadError> {
        let Some(target) = self.decoder.target_sample_rate() else {
            return Ok(sample);
        };
        if sample.sample_rate() == target {
            return Ok(sample);
        }

        let channels = sample.channels().map(<[f32]>::to_vec).collect();
        let resampled = resample_channels(
            channels,
            sample.sample_rate(),
            target,
            self.decoder.max_decoded_samples(),
        )?;
        Ok(SampleBuffer::from_channels(target, resampled)?)
    }

    fn conform_loaded_samples(&mut self) {
        for index in 0..self.pads.len() {
            let Some(sample) = self.pads[index].sample.clone() else {
                continue;
            };
            match self.conform(sample) {
                Ok(sample) => self.pads[index].sample = Some(sample),
                Err(err) => log::warn!(
                    "Keeping {} at its native rate: {}",
                    self.pads[index].id,
                    err
                ),
            }
        }
    }

    fn persist(&self, pad_id: &str, label: &str, sample: &SampleBuffer) {
        let Some(store) = &self.store else {
            return;
        };
        let saved = StoredSample::from_buffer(pad_id, label, sample, Utc::now())
            .map_err(EngineError::from)
            .and_then(|record| store.put(&record).map_err(EngineError::from));
        if let Err(err) = saved {
            log::warn!("Sample for {} is session-only: {}", pad_id, err);
        }
    }

    /// Plays the pad's sample from the start, replacing any voice already playing on it.
    pub fn play(&mut self, pad_id: &str) -> Result<VoiceHandle, EngineError> {
        let index = self.pad_index(pad_id)?;
        let output = self.output.as_ref().ok_or(EngineError::NotReady)?;
        let pad = &mut self.pads[index];
        let sample = pad
            .sample
            .clone()
            .ok_or_else(|| EngineError::NoSample(pad_id.to_string()))?;

        let now = self.clock.now();
        let duration = sample.duration();
        let handle = output
            .graph
            .lock()
            .start_voice(&pad.id, sample, pad.gain, now);
        pad.mark_playing(handle.voice_id, now + duration);

        log::debug!("Playing {} (voice {})", pad_id, handle.voice_id);
        Ok(handle)
    }

    /// Stops the pad if it is playing, otherwise plays it. Returns the new voice, if any.
    pub fn toggle(&mut self, pad_id: &str) -> Result<Option<VoiceHandle>, EngineError> {
        let index = self.pad_index(pad_id)?;
        if self.pads[index].is_playing() {
            self.stop(pad_id);
            return Ok(None);
        }
        self.play(pad_id).map(Some)
    }

    /// Stops the pad's voice. Returns `false` when nothing was playing.
    pub fn stop(&mut self, pad_id: &str) -> bool {
        let Ok(index) = self.pad_index(pad_id) else {
            return false;
        };
        self.pads[index].mark_stopped();
        match &self.output {
            Some(output) => output.graph.lock().stop_voice(pad_id),
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for pad in &mut self.pads {
            pad.mark_stopped();
        }
        if let Some(output) = &self.output {
            let stopped = output.graph.lock().stop_all_voices();
            if stopped > 0 {
                log::debug!("Stopped {} voices", stopped);
            }
        }
    }

    /// Sets the master volume, clamped to [0, 1]. Non-finite values are ignored.
    ///
    /// Before `initialize` the value is remembered and applied when the master bus is created.
    pub fn set_master_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            log::debug!("Ignoring master volume {}", volume);
            return;
        }
        self.master_gain = clamp_gain(volume);
        if let Some(output) = &self.output {
            output.graph.lock().set_master_gain(self.master_gain);
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.master_gain
    }

    pub fn status(&self) -> EngineStatus {
        match &self.output {
            Some(output) => EngineStatus {
                initialized: true,
                active_voice_count: output.graph.lock().active_voice_count(),
                device_state: output.device.state(),
                master_volume: self.master_gain,
            },
            None => EngineStatus {
                initialized: false,
                active_voice_count: 0,
                device_state: DeviceState::Uninitialized,
                master_volume: self.master_gain,
            },
        }
    }

    /// Stops every voice and releases the output device. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.stop_all();
        if let Some(mut output) = self.output.take() {
            output.device.close();
            log::info!("Audio engine disposed");
        }
    }

    /// Applies everything that happened since the last call and reports it.
    ///
    /// Drains natural voice ends and finished loads, runs due watchdogs and clears expired
    /// pad errors. Collaborators call this on their UI tick.
    pub fn poll(&mut self) -> Vec<PadEvent> {
        self.drain_graph_events();

        loop {
            match self.loader_rx.try_recv() {
                Ok(event) => {
                    let _ = self.apply_loader_event(event);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let now = self.clock.now();
        self.run_watchdogs(now);
        self.expire_errors(now);

        std::mem::take(&mut self.pending)
    }

    fn drain_graph_events(&mut self) {
        let Some(output) = self.output.as_mut() else {
            return;
        };
        while let Ok(GraphEvent::VoiceEnded { voice_id }) = output.events.pop() {
            // Ends of replaced voices match no pad.
            if let Some(pad) = self
                .pads
                .iter_mut()
                .find(|pad| pad.playing_voice == Some(voice_id))
            {
                pad.mark_stopped();
                self.pending.push(PadEvent::PlaybackEnded {
                    pad_id: pad.id.clone(),
                });
            }
        }
    }

    fn run_watchdogs(&mut self, now: Duration) {
        let graph = self.output.as_ref().map(|output| Arc::clone(&output.graph));

        for pad in &mut self.pads {
            let Some(watchdog) = pad.watchdog else {
                continue;
            };
            if watchdog.due > now {
                continue;
            }

            if pad.playing_voice != Some(watchdog.voice_id) {
                pad.watchdog = None;
                continue;
            }

            let still_active = graph
                .as_ref()
                .is_some_and(|graph| graph.lock().active_voice_id(&pad.id) == Some(watchdog.voice_id));
            if still_active {
                // The natural end will arrive; keep checking until it does.
                continue;
            }

            log::debug!("Watchdog ended playback on {}", pad.id);
            pad.mark_stopped();
            self.pending.push(PadEvent::PlaybackEnded {
                pad_id: pad.id.clone(),
            });
        }
    }

    fn expire_errors(&mut self, now: Duration) {
        for pad in &mut self.pads {
            let expired = pad
                .last_error
                .as_ref()
                .is_some_and(|err| err.expires_at <= now);
            if expired {
                pad.last_error = None;
                self.pending.push(PadEvent::ErrorCleared {
                    pad_id: pad.id.clone(),
                });
            }
        }
    }

    pub fn pads(&self) -> Vec<PadSnapshot> {
        self.pads.iter().map(PadSlot::snapshot).collect()
    }

    pub fn pad(&self, pad_id: &str) -> Option<PadSnapshot> {
        self.pads
            .iter()
            .find(|pad| pad.id == pad_id)
            .map(PadSlot::snapshot)
    }

    /// Sets the gain used by the pad's next voice, clamped to [0, 1].
    pub fn set_pad_gain(&mut self, pad_id: &str, gain: f32) -> Result<f32, EngineError> {
        let index = self.pad_index(pad_id)?;
        let pad = &mut self.pads[index];
        if gain.is_finite() {
            pad.gain = clamp_gain(gain);
        }
        Ok(pad.gain)
    }

    pub fn set_pad_label(&mut self, pad_id: &str, label: &str) -> Result<(), EngineError> {
        let index = self.pad_index(pad_id)?;
        self.pads[index].label = label.to_string();

        if let Some(store) = &self.store {
            let relabeled = store.get(pad_id).and_then(|record| match record {
                Some(mut record) => {
                    record.label = label.to_string();
                    store.put(&record)
                }
                None => Ok(()),
            });
            if let Err(err) = relabeled {
                log::warn!("Label for {} not saved: {}", pad_id, err);
            }
        }
        Ok(())
    }

    /// Stops the pad, removes its sample and deletes its stored record.
    pub fn clear_pad(&mut self, pad_id: &str) -> Result<(), EngineError> {
        let index = self.pad_index(pad_id)?;
        self.stop(pad_id);
        self.pads[index].clear();

        if let Some(store) = &self.store {
            if let Err(err) = store.delete(pad_id) {
                log::warn!("Stored sample for {} not deleted: {}", pad_id, err);
            }
        }
        Ok(())
    }

    /// Uses `store` for persistence. Successful loads are saved to it from now on.
    pub fn attach_store(&mut self, store: PersistenceGateway) {
        if !store.is_available() {
            log::warn!("Attached store is unavailable; samples are session-only");
        }
        self.store = Some(store);
    }

    fn store(&self) -> Result<&PersistenceGateway, EngineError> {
        self.store.as_ref().ok_or(EngineError::NoStore)
    }

    /// Loads every stored record into its pad. Returns how many pads were filled.
    ///
    /// Unreadable rows, records for unknown pads and records that fail to decode are skipped
    /// with a warning.
    pub fn restore_from_store(&mut self) -> Result<usize, EngineError> {
        let rows = self.store()?.scan_all()?;
        let records = rows
            .into_iter()
            .filter_map(|row| {
                row.inspect_err(|err| log::warn!("Skipping unreadable stored sample: {}", err))
                    .ok()
            })
            .collect();
        Ok(self.install_records(records))
    }

    fn install_records(&mut self, records: Vec<StoredSample>) -> usize {
        let mut restored = 0;
        for record in records {
            let Ok(index) = self.pad_index(&record.pad_id) else {
                log::warn!("Skipping stored sample for unknown pad {}", record.pad_id);
                continue;
            };
            let sample = match record.decode_buffer() {
                Ok(sample) => sample,
                Err(err) => {
                    log::warn!("Skipping corrupt stored sample {}: {}", record.pad_id, err);
                    continue;
                }
            };
            let sample = match self.conform(sample) {
                Ok(sample) => sample,
                Err(err) => {
                    log::warn!("Skipping stored sample {}: {}", record.pad_id, err);
                    continue;
                }
            };

            self.next_version += 1;
            let version = self.next_version;
            let pad = &mut self.pads[index];
            pad.begin_load(version);
            if pad.install(version, record.label, sample) {
                restored += 1;
            }
        }
        log::info!("Restored {} stored samples", restored);
        restored
    }

    /// Serializes every stored sample into bank transfer text.
    pub fn export_bank(&self) -> Result<String, EngineError> {
        let records = self.store()?.get_all()?;
        Ok(bank::to_transfer_text(&records, Utc::now())?)
    }

    /// Replaces stored samples with the bank's records and loads them into their pads.
    ///
    /// Nothing changes unless every record in the bank is valid.
    pub fn import_bank(&mut self, text: &str) -> Result<usize, EngineError> {
        let store = self.store()?.clone();
        let records = bank::from_transfer_text(text, Utc::now())?;
        store.put_all(&records)?;
        let count = records.len();
        self.install_records(records);
        log::info!("Imported bank with {} samples", count);
        Ok(count)
    }

    /// Saves the current stored samples as a named bank and makes it current.
    pub fn save_bank(&mut self, name: &str) -> Result<i64, EngineError> {
        let document = self.export_bank()?;
        let id = self.store()?.save_bank(name, &document)?;
        self.current_bank_id = Some(id);
        Ok(id)
    }

    /// Imports a previously saved bank and makes it current.
    pub fn load_bank(&mut self, id: i64) -> Result<usize, EngineError> {
        let document = self
            .store()?
            .get_bank(id)?
            .ok_or_else(|| EngineError::UnknownBank(id))?;
        let count = self.import_bank(&document)?;
        self.current_bank_id = Some(id);
        Ok(count)
    }

    pub fn list_banks(&self) -> Result<Vec<BankRecord>, EngineError> {
        Ok(self.store()?.list_banks()?)
    }

    pub fn current_bank_id(&self) -> Option<i64> {
        self.current_bank_id
    }

    /// Empties the samples, settings and banks tables. Loaded pads keep their samples.
    pub fn clear_store(&mut self) -> Result<(), EngineError> {
        self.store()?.clear()?;
        self.current_bank_id = None;
        Ok(())
    }

    pub fn storage_info(&self) -> Result<StorageInfo, EngineError> {
        Ok(self.store()?.info()?)
    }

    pub fn save_settings(&self) -> Result<(), EngineError> {
        let settings = AppSettings {
            global_volume: self.master_gain,
            current_bank_id: self.current_bank_id,
        };
        self.store()?.put_setting(SETTINGS_KEY, &settings)?;
        Ok(())
    }

    /// Reads saved settings and applies them. Returns the defaults when nothing is saved.
    pub fn load_settings(&mut self) -> Result<AppSettings, EngineError> {
        let settings: AppSettings = self
            .store()?
            .get_setting(SETTINGS_KEY)?
            .unwrap_or_default();
        self.set_master_volume(settings.global_volume);
        self.current_bank_id = settings.current_bank_id;
        Ok(settings)
    }

    fn pad_index(&self, pad_id: &str) -> Result<usize, EngineError> {
        self.pads
            .iter()
            .position(|pad| pad.id == pad_id)
            .ok_or_else(|| EngineError::UnknownPad(pad_id.to_string()))
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
