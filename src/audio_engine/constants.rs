//! Audio engine configuration constants and limits.

use std::time::Duration;

/// Number of pad columns in the grid.
pub const GRID_COLUMNS: usize = 4;

/// Number of pad rows in the grid.
pub const GRID_ROWS: usize = 3;

/// Total number of pads in the grid.
pub const NUM_PADS: usize = GRID_COLUMNS * GRID_ROWS;

/// Minimum volume level (silence).
pub const VOLUME_MIN: f32 = 0.0;

/// Maximum volume level (100%).
pub const VOLUME_MAX: f32 = 1.0;

/// Master bus gain established by `initialize`.
pub const DEFAULT_MASTER_GAIN: f32 = 0.7;

/// Per-pad gain a fresh slot starts with.
pub const DEFAULT_PAD_GAIN: f32 = 1.0;

/// Largest upload the decoder accepts (50 MiB).
pub const MAX_SAMPLE_BYTES: usize = 50 * 1024 * 1024;

/// Lowest file sample rate the decoder accepts.
pub const MIN_FILE_SAMPLE_RATE: u32 = 1_000;

/// Highest file sample rate the decoder accepts.
pub const MAX_FILE_SAMPLE_RATE: u32 = 768_000;

/// Decoded `f32` audio may take at most this many times the input byte limit.
pub const MAX_DECODE_EXPANSION: usize = 16;

/// How long a pad keeps showing a load error before it clears itself.
pub const ERROR_DISPLAY_WINDOW: Duration = Duration::from_secs(3);

/// Capacity of the render-path -> engine event ring.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Block size the offline backend renders in.
pub const OFFLINE_BLOCK_FRAMES: usize = 512;

/// Display colors assigned to pads by grid position.
pub const PAD_COLORS: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#06b6d4", "#3b82f6", "#8b5cf6", "#ec4899",
];
