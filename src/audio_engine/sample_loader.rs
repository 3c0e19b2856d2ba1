//! Audio decoding for uploaded bytes.
//!
//! [`SampleDecoder`] turns an opaque byte blob plus its declared MIME type into a validated
//! [`SampleBuffer`]. It touches neither the store nor the voice graph.

use std::any::Any;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer, codecs::DecoderOptions,
    errors::Error as SymphoniaError, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::channels::deinterleave;
use crate::audio_engine::constants::{
    MAX_DECODE_EXPANSION, MAX_FILE_SAMPLE_RATE, MAX_SAMPLE_BYTES, MIN_FILE_SAMPLE_RATE,
};
use crate::audio_engine::errors::SampleLoadError;
use crate::audio_engine::resampler::resample_channels;
use crate::messages::SampleBuffer;

/// Decodes uploaded audio into sample buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDecoder {
    max_bytes: usize,
    target_sample_rate: Option<u32>,
}

impl Default for SampleDecoder {
    fn default() -> Self {
        Self::new(MAX_SAMPLE_BYTES, None)
    }
}

impl SampleDecoder {
    /// Creates a decoder.
    ///
    /// # Parameters
    ///
    /// - `max_bytes`: Largest input accepted
    /// - `target_sample_rate`: When set, decoded audio at another rate is resampled to it
    pub fn new(max_bytes: usize, target_sample_rate: Option<u32>) -> Self {
        Self {
            max_bytes,
            target_sample_rate: target_sample_rate.filter(|rate| *rate > 0),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn target_sample_rate(&self) -> Option<u32> {
        self.target_sample_rate
    }

    /// Most `f32` samples, across all channels, a decode or resample may produce.
    pub fn max_decoded_samples(&self) -> usize {
        self.max_bytes.saturating_mul(MAX_DECODE_EXPANSION) / std::mem::size_of::<f32>()
    }

    /// Returns a copy of this decoder that resamples to `rate`.
    pub fn with_target_sample_rate(self, rate: Option<u32>) -> Self {
        Self::new(self.max_bytes, rate)
    }

    /// Rejects input that is obviously unusable, before any decode work.
    ///
    /// # Errors
    ///
    /// - [`SampleLoadError::UnsupportedMediaType`] when `mime` is not `audio/*`
    /// - [`SampleLoadError::TooLarge`] when `len` exceeds the limit
    pub fn check_input(&self, len: usize, mime: &str) -> Result<(), SampleLoadError> {
        if audio_subtype(mime).is_none() {
            return Err(SampleLoadError::UnsupportedMediaType(mime.to_string()));
        }
        if len > self.max_bytes {
            return Err(SampleLoadError::TooLarge {
                size: len,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Decodes `bytes` into a sample buffer.
    ///
    /// # Errors
    ///
    /// Input precondition failures are reported as in [`check_input`](Self::check_input).
    /// Anything the decoder rejects, a codec panic, a file rate outside the supported range,
    /// output over [`max_decoded_samples`](Self::max_decoded_samples), and any result with zero
    /// channels or zero frames is a decode error carrying the underlying cause.
    pub fn decode(&self, bytes: Vec<u8>, mime: &str) -> Result<SampleBuffer, SampleLoadError> {
        self.check_input(bytes.len(), mime)?;

        // symphonia asserts on some malformed headers instead of returning an error.
        panic::catch_unwind(AssertUnwindSafe(|| self.decode_checked(bytes, mime))).unwrap_or_else(
            |payload| {
                let message = panic_message(payload.as_ref());
                log::warn!("Decoder panicked on {} input: {}", mime, message);
                Err(SampleLoadError::DecoderPanicked(message))
            },
        )
    }

    fn decode_checked(&self, bytes: Vec<u8>, mime: &str) -> Result<SampleBuffer, SampleLoadError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        hint.mime_type(mime);
        if let Some(ext) = audio_subtype(mime).and_then(extension_for_subtype) {
            hint.with_extension(ext);
        }

        let probed = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or(SampleLoadError::NoDefaultTrack)?;
        let track_id = track.id;
        let file_rate_hz = track
            .codec_params
            .sample_rate
            .ok_or(SampleLoadError::MissingSampleRate)?;
        if !(MIN_FILE_SAMPLE_RATE..=MAX_FILE_SAMPLE_RATE).contains(&file_rate_hz) {
            return Err(SampleLoadError::UnsupportedSampleRate { rate: file_rate_hz });
        }
        let file_channels = track
            .codec_params
            .channels
            .ok_or(SampleLoadError::MissingChannels)?
            .count();

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let limit = self.max_decoded_samples();
        let mut decoded: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(err) => return Err(SampleLoadError::Decode(err)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let audio_buf = decoder.decode(&packet)?;
            let spec = *audio_buf.spec();
            let duration = audio_buf.capacity() as u64;

            let mut sample_buf = SymphoniaSampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(audio_buf);
            let samples = decoded.len().saturating_add(sample_buf.samples().len());
            if samples > limit {
                return Err(SampleLoadError::TooLong { samples, limit });
            }
            decoded.extend_from_slice(sample_buf.samples());
        }

        let mut channels = deinterleave(&decoded, file_channels);
        let frames = channels.first().map_or(0, Vec::len);
        if file_channels == 0 || frames == 0 {
            return Err(SampleLoadError::EmptyAudio {
                channels: file_channels,
                frames,
            });
        }

        let mut sample_rate = file_rate_hz;
        if let Some(target) = self.target_sample_rate {
            if target != file_rate_hz {
                channels = resample_channels(channels, file_rate_hz, target, limit)?;
                sample_rate = target;
            }
        }

        let sample = SampleBuffer::from_channels(sample_rate, channels)?;
        if sample.frame_count() == 0 {
            return Err(SampleLoadError::EmptyAudio {
                channels: sample.channel_count(),
                frames: 0,
            });
        }

        log::debug!(
            "Decoded {} ch, {} frames @ {} Hz ({})",
            sample.channel_count(),
            sample.frame_count(),
            sample.sample_rate(),
            mime
        );

        Ok(sample)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Returns the lowercased subtype of an `audio/*` MIME type, ignoring parameters.
fn audio_subtype(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    let (kind, subtype) = essence.split_once('/')?;
    if !kind.eq_ignore_ascii_case("audio") || subtype.trim().is_empty() {
        return None;
    }
    Some(subtype.trim().to_ascii_lowercase())
}

fn extension_for_subtype(subtype: String) -> Option<&'static str> {
    let ext = match subtype.as_str() {
        "wav" | "wave" | "x-wav" | "vnd.wave" => "wav",
        "mpeg" | "mp3" | "mpeg3" | "x-mpeg-3" => "mp3",
        "flac" | "x-flac" => "flac",
        "ogg" | "vorbis" | "x-vorbis+ogg" => "ogg",
        "aac" | "x-aac" => "aac",
        "mp4" | "m4a" | "x-m4a" => "m4a",
        "aiff" | "x-aiff" => "aiff",
        "webm" => "webm",
        _ => return None,
    };
    Some(ext)
}

/// Pad label derived from an uploaded file name: the name without its last extension.
pub fn label_from_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}
