//! Error types for the audio engine.

use thiserror::Error;

use crate::sample_codec::CodecError;
use crate::storage::StoreError;

/// Coarse error classification handed to collaborators and stored on pad slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input rejected before any work began (bad type, too large, unknown pad).
    InvalidInput,
    /// The codec rejected the data or produced an invalid buffer.
    DecodeError,
    /// Malformed persisted or transfer bytes.
    CorruptData,
    /// Bank document version mismatch.
    IncompatibleFormat,
    /// The host denied storage, or no store is attached.
    StoreUnavailable,
    /// The engine has not been initialized.
    NotReady,
    /// The pad has no sample loaded.
    NoSample,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::DecodeError => "decode error",
            ErrorKind::CorruptData => "corrupt data",
            ErrorKind::IncompatibleFormat => "incompatible format",
            ErrorKind::StoreUnavailable => "store unavailable",
            ErrorKind::NotReady => "not ready",
            ErrorKind::NoSample => "no sample",
        }
    }
}

/// A sample buffer was built with an impossible shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferShapeError {
    #[error("sample buffer has no channels")]
    NoChannels,

    #[error("sample buffer has a zero sample rate")]
    ZeroSampleRate,

    #[error("channel {channel} has {found} frames, expected {expected}")]
    RaggedChannels {
        channel: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur while decoding uploaded audio.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    /// The declared MIME type is not an audio type.
    #[error("unsupported media type `{0}` (expected audio/*)")]
    UnsupportedMediaType(String),

    /// The input exceeds the configured size limit.
    #[error("input is {size} bytes, the limit is {limit} bytes")]
    TooLarge {
        /// Size of the rejected input.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Failed to decode the audio data.
    #[error("failed to decode audio data: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Failed to create resampler.
    #[error("failed to create resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Failed to resample audio.
    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    /// Audio data has no default track.
    #[error("audio data has no default track")]
    NoDefaultTrack,

    /// Audio data is missing sample rate information.
    #[error("audio data is missing a sample rate")]
    MissingSampleRate,

    /// Audio data is missing channel information.
    #[error("audio data is missing channel information")]
    MissingChannels,

    /// The decoder returned without error but produced nothing playable.
    #[error("decoded audio is empty ({channels} channels, {frames} frames)")]
    EmptyAudio { channels: usize, frames: usize },

    /// The file declares a sample rate the engine refuses to work with.
    #[error("sample rate {rate} Hz is outside the supported 1000..=768000 Hz range")]
    UnsupportedSampleRate { rate: u32 },

    /// Decoding or resampling would exceed the decoded-size budget.
    #[error("decoded audio needs {samples} samples, the limit is {limit}")]
    TooLong { samples: usize, limit: usize },

    /// The codec panicked on malformed input.
    #[error("decoder aborted on malformed input: {0}")]
    DecoderPanicked(String),

    /// The decoded channels could not form a valid buffer.
    #[error("decoded audio has an invalid shape: {0}")]
    Shape(#[from] BufferShapeError),
}

impl SampleLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SampleLoadError::UnsupportedMediaType(_) | SampleLoadError::TooLarge { .. } => {
                ErrorKind::InvalidInput
            }
            _ => ErrorKind::DecodeError,
        }
    }
}

/// Errors raised by an output device backend.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("failed to query output configuration: {0}")]
    Config(String),

    #[error("failed to build output stream: {0}")]
    Build(String),

    #[error("failed to control output stream: {0}")]
    Control(String),

    #[error("output device has been closed")]
    Closed,
}

/// Errors returned by [`PlaybackEngine`](crate::audio_engine::PlaybackEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio engine not initialized")]
    NotReady,

    #[error("pad `{0}` has no sample loaded")]
    NoSample(String),

    #[error("unknown pad id `{0}`")]
    UnknownPad(String),

    #[error("no saved bank with id {0}")]
    UnknownBank(i64),

    #[error("no persistent store attached")]
    NoStore,

    /// Returned to the caller whose load lost to a newer one on the same pad.
    ///
    /// Classed as [`ErrorKind::InvalidInput`] only so it has a kind; the input itself was fine
    /// and the pad's own error indicator is never set for it. Use
    /// [`is_superseded`](Self::is_superseded) to tell it apart from a real rejection.
    #[error("load for pad `{0}` was superseded by a newer load")]
    Superseded(String),

    #[error(transparent)]
    Load(#[from] SampleLoadError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotReady | EngineError::Device(_) => ErrorKind::NotReady,
            EngineError::NoSample(_) => ErrorKind::NoSample,
            EngineError::UnknownPad(_) | EngineError::UnknownBank(_) | EngineError::Superseded(_) => {
                ErrorKind::InvalidInput
            }
            EngineError::NoStore | EngineError::Store(_) => ErrorKind::StoreUnavailable,
            EngineError::Load(err) => err.kind(),
            EngineError::Codec(err) => err.kind(),
        }
    }

    /// True when a newer load replaced this one; nothing went wrong with the input.
    pub fn is_superseded(&self) -> bool {
        matches!(self, EngineError::Superseded(_))
    }
}
