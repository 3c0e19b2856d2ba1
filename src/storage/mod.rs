// Persistence module
// SQLite-backed store for sample records, settings and saved banks

mod error;
mod gateway;
mod migrations;
mod models;

pub use error::StoreError;
pub use gateway::{PersistenceGateway, SETTINGS_KEY};
pub use models::{AppSettings, BankRecord, StorageInfo};
