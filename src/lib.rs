//! Sample-pad playback engine: decode uploaded audio into pads, trigger one-shot voices through
//! a master bus, and persist samples to a local store or a portable bank document.

pub mod audio_engine;
pub mod bank;
pub mod messages;
pub mod sample_codec;
pub mod storage;

pub use audio_engine::device::{Clock, DeviceState, OfflineBackend, OutputBackend, SystemClock};
pub use audio_engine::errors::{EngineError, ErrorKind};
pub use audio_engine::pad::{PadSnapshot, PadState};
pub use audio_engine::voice::VoiceHandle;
pub use audio_engine::{EngineConfig, EngineStatus, LoadTicket, PadEvent, PlaybackEngine};
pub use messages::SampleBuffer;
pub use storage::{AppSettings, PersistenceGateway, StorageInfo};
