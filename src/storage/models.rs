use serde::{Deserialize, Serialize};

use crate::audio_engine::constants::DEFAULT_MASTER_GAIN;

/// Aggregate size of the samples table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub count: usize,
    pub total_bytes: u64,
}

/// User settings persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub global_volume: f32,
    pub current_bank_id: Option<i64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            global_volume: DEFAULT_MASTER_GAIN,
            current_bank_id: None,
        }
    }
}

/// A saved bank, without its document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankRecord {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}
