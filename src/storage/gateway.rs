use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::StoreError;
use super::migrations::run_migrations;
use super::models::{BankRecord, StorageInfo};
use crate::sample_codec::StoredSample;

/// Settings key the engine stores [`AppSettings`](super::AppSettings) under.
pub const SETTINGS_KEY: &str = "app";

const SAMPLE_COLUMNS: &str = "pad_id, label, sample_rate, channel_count, frame_count, \
                              channel_data, saved_at, byte_size";

enum StoreState {
    Ready(Mutex<Connection>),
    Unavailable(String),
}

/// Keyed store for sample records, settings and banks.
///
/// Clones share one connection. A gateway that failed to open stays usable as a value, but
/// every operation on it returns [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct PersistenceGateway {
    state: Arc<StoreState>,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.as_ref() {
            StoreState::Ready(_) => f.write_str("PersistenceGateway(ready)"),
            StoreState::Unavailable(reason) => {
                write!(f, "PersistenceGateway(unavailable: {reason})")
            }
        }
    }
}

impl PersistenceGateway {
    /// Opens (creating if needed) the store at `path`.
    pub fn try_open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| StoreError::Unavailable(err.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(unavailable)?;
        run_migrations(&conn).map_err(unavailable)?;
        log::info!("Opened sample store at {}", path.display());
        Ok(Self::ready(conn))
    }

    /// Opens the store at `path`, falling back to the unavailable state on failure.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::try_open(path).unwrap_or_else(|err| {
            log::warn!("Sample store disabled, samples are session-only: {}", err);
            Self::unavailable(err.to_string())
        })
    }

    /// A private in-memory store.
    pub fn open_in_memory() -> Self {
        let opened = Connection::open_in_memory().and_then(|conn| {
            run_migrations(&conn)?;
            Ok(conn)
        });
        match opened {
            Ok(conn) => Self::ready(conn),
            Err(err) => {
                log::warn!("In-memory store unavailable: {}", err);
                Self::unavailable(err.to_string())
            }
        }
    }

    /// A gateway that rejects every operation.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Arc::new(StoreState::Unavailable(reason.into())),
        }
    }

    fn ready(conn: Connection) -> Self {
        Self {
            state: Arc::new(StoreState::Ready(Mutex::new(conn))),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state.as_ref(), StoreState::Ready(_))
    }

    fn connection(&self) -> Result<&Mutex<Connection>, StoreError> {
        match self.state.as_ref() {
            StoreState::Ready(conn) => Ok(conn),
            StoreState::Unavailable(reason) => Err(StoreError::Unavailable(reason.clone())),
        }
    }

    /// Inserts or replaces the record for `sample.pad_id`.
    pub fn put(&self, sample: &StoredSample) -> Result<(), StoreError> {
        let conn = self.connection()?.lock();
        insert_sample(&conn, sample)?;
        Ok(())
    }

    /// Writes every record in one transaction; on error nothing is written.
    pub fn put_all(&self, samples: &[StoredSample]) -> Result<(), StoreError> {
        let mut conn = self.connection()?.lock();
        let tx = conn.transaction()?;
        for sample in samples {
            insert_sample(&tx, sample)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get(&self, pad_id: &str) -> Result<Option<StoredSample>, StoreError> {
        let conn = self.connection()?.lock();
        let row = conn
            .query_row(
                &format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE pad_id = ?1"),
                params![pad_id],
                SampleRow::from_row,
            )
            .optional()?;
        row.map(SampleRow::into_sample).transpose()
    }

    /// Every stored record, in natural pad id order. Fails on the first corrupt row.
    pub fn get_all(&self) -> Result<Vec<StoredSample>, StoreError> {
        self.scan_all()?.into_iter().collect()
    }

    /// Every stored row in natural pad id order, each converted on its own.
    ///
    /// The outer error means the table could not be read; a row that cannot describe a sample
    /// shows up as an inner [`StoreError::CorruptRow`] and leaves the other rows intact.
    pub fn scan_all(&self) -> Result<Vec<Result<StoredSample, StoreError>>, StoreError> {
        let conn = self.connection()?.lock();
        // Natural pad order: `pad-2` before `pad-10`.
        let mut stmt = conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples ORDER BY LENGTH(pad_id), pad_id"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SampleRow::from_row(row).map_err(|err| unreadable_row(row, &err)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|row| row.and_then(SampleRow::into_sample))
            .collect())
    }

    /// Removes the record for `pad_id`. Returns `false` when there was none.
    pub fn delete(&self, pad_id: &str) -> Result<bool, StoreError> {
        let conn = self.connection()?.lock();
        let removed = conn.execute("DELETE FROM samples WHERE pad_id = ?1", params![pad_id])?;
        Ok(removed > 0)
    }

    /// Empties samples, settings and banks in one transaction.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM samples", [])?;
        tx.execute("DELETE FROM settings", [])?;
        tx.execute("DELETE FROM banks", [])?;
        tx.commit()?;
        log::info!("Cleared sample store");
        Ok(())
    }

    pub fn info(&self) -> Result<StorageInfo, StoreError> {
        let conn = self.connection()?.lock();
        let (count, total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(byte_size), 0) FROM samples",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StorageInfo {
            count: usize::try_from(count).unwrap_or_default(),
            total_bytes: u64::try_from(total).unwrap_or_default(),
        })
    }

    /// Stores `value` as JSON under `key`.
    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        let conn = self.connection()?.lock();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, json],
        )?;
        Ok(())
    }

    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let conn = self.connection()?.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Saves a bank document under `name` and returns its id.
    pub fn save_bank(&self, name: &str, document: &str) -> Result<i64, StoreError> {
        let conn = self.connection()?.lock();
        conn.execute(
            "INSERT INTO banks (name, data, created_at) VALUES (?1, ?2, ?3)",
            params![name, document, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_bank(&self, id: i64) -> Result<Option<String>, StoreError> {
        let conn = self.connection()?.lock();
        let document = conn
            .query_row(
                "SELECT data FROM banks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(document)
    }

    pub fn list_banks(&self) -> Result<Vec<BankRecord>, StoreError> {
        let conn = self.connection()?.lock();
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM banks ORDER BY id")?;
        let banks = stmt
            .query_map([], |row| {
                Ok(BankRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(banks)
    }
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn unreadable_row(row: &rusqlite::Row<'_>, err: &rusqlite::Error) -> StoreError {
    StoreError::CorruptRow {
        pad_id: row.get(0).unwrap_or_else(|_| String::from("<unreadable>")),
        reason: err.to_string(),
    }
}

fn insert_sample(conn: &Connection, sample: &StoredSample) -> Result<(), StoreError> {
    let corrupt = |reason: &str| StoreError::CorruptRow {
        pad_id: sample.pad_id.clone(),
        reason: reason.to_string(),
    };
    let channel_count = i64::try_from(sample.channel_count).map_err(|_| corrupt("channel count"))?;
    let frame_count = i64::try_from(sample.frame_count).map_err(|_| corrupt("frame count"))?;
    let byte_size = i64::try_from(sample.byte_size).map_err(|_| corrupt("byte size"))?;

    conn.execute(
        "INSERT INTO samples (pad_id, label, sample_rate, channel_count, frame_count,
                              channel_data, saved_at, byte_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(pad_id) DO UPDATE SET
            label = excluded.label,
            sample_rate = excluded.sample_rate,
            channel_count = excluded.channel_count,
            frame_count = excluded.frame_count,
            channel_data = excluded.channel_data,
            saved_at = excluded.saved_at,
            byte_size = excluded.byte_size",
        params![
            sample.pad_id,
            sample.label,
            i64::from(sample.sample_rate),
            channel_count,
            frame_count,
            sample.channel_data,
            sample.saved_at.to_rfc3339(),
            byte_size,
        ],
    )?;
    Ok(())
}

/// Raw column values, converted to a [`StoredSample`] outside the rusqlite closure.
struct SampleRow {
    pad_id: String,
    label: String,
    sample_rate: i64,
    channel_count: i64,
    frame_count: i64,
    channel_data: Vec<u8>,
    saved_at: String,
    byte_size: i64,
}

impl SampleRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pad_id: row.get(0)?,
            label: row.get(1)?,
            sample_rate: row.get(2)?,
            channel_count: row.get(3)?,
            frame_count: row.get(4)?,
            channel_data: row.get(5)?,
            saved_at: row.get(6)?,
            byte_size: row.get(7)?,
        })
    }

    fn into_sample(self) -> Result<StoredSample, StoreError> {
        let pad_id = self.pad_id;
        let corrupt = |reason: String| StoreError::CorruptRow {
            pad_id: pad_id.clone(),
            reason,
        };

        let sample_rate = u32::try_from(self.sample_rate)
            .map_err(|_| corrupt(format!("sample rate {}", self.sample_rate)))?;
        let channel_count = usize::try_from(self.channel_count)
            .map_err(|_| corrupt(format!("channel count {}", self.channel_count)))?;
        let frame_count = usize::try_from(self.frame_count)
            .map_err(|_| corrupt(format!("frame count {}", self.frame_count)))?;
        let byte_size = usize::try_from(self.byte_size)
            .map_err(|_| corrupt(format!("byte size {}", self.byte_size)))?;
        let saved_at = DateTime::parse_from_rfc3339(&self.saved_at)
            .map_err(|err| corrupt(format!("saved_at: {err}")))?
            .with_timezone(&Utc);

        Ok(StoredSample {
            pad_id: pad_id.clone(),
            label: self.label,
            sample_rate,
            channel_count,
            frame_count,
            channel_data: self.channel_data,
            saved_at,
            byte_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::errors::ErrorKind;
    use crate::messages::SampleBuffer;
    use crate::storage::AppSettings;
    use tempfile::TempDir;

    fn record(pad_id: &str, frames: usize) -> StoredSample {
        let buffer = SampleBuffer::from_channels(44_100, vec![vec![0.25; frames]; 2]).unwrap();
        StoredSample::from_buffer(pad_id, &format!("{pad_id} label"), &buffer, Utc::now())
            .unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = PersistenceGateway::open_in_memory();
        let sample = record("pad-0", 16);

        store.put(&sample).unwrap();
        let loaded = store.get("pad-0").unwrap().unwrap();

        assert_eq!(loaded.channel_data, sample.channel_data);
        assert_eq!(loaded.label, "pad-0 label");
        assert_eq!(loaded.frame_count, 16);
        assert_eq!(loaded.byte_size, sample.byte_size);
        assert_eq!(loaded.saved_at.timestamp(), sample.saved_at.timestamp());
        assert!(store.get("pad-1").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_by_pad_id() {
        let store = PersistenceGateway::open_in_memory();
        store.put(&record("pad-0", 4)).unwrap();
        store.put(&record("pad-0", 8)).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].frame_count, 8);
    }

    #[test]
    fn test_get_all_uses_natural_pad_order() {
        let store = PersistenceGateway::open_in_memory();
        for pad_id in ["pad-10", "pad-2", "pad-0"] {
            store.put(&record(pad_id, 1)).unwrap();
        }

        let ids: Vec<String> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|s| s.pad_id)
            .collect();
        assert_eq!(ids, ["pad-0", "pad-2", "pad-10"]);
    }

    #[test]
    fn test_scan_all_isolates_corrupt_rows() {
        let store = PersistenceGateway::open_in_memory();
        store.put(&record("pad-0", 2)).unwrap();
        store.put(&record("pad-1", 2)).unwrap();
        store.put(&record("pad-2", 2)).unwrap();
        {
            let conn = store.connection().unwrap().lock();
            conn.execute(
                "UPDATE samples SET saved_at = 'garbage' WHERE pad_id = 'pad-1'",
                [],
            )
            .unwrap();
            conn.execute(
                "UPDATE samples SET frame_count = 'many' WHERE pad_id = 'pad-2'",
                [],
            )
            .unwrap();
        }

        let rows = store.scan_all().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().pad_id, "pad-0");
        for (row, pad_id) in rows[1..].iter().zip(["pad-1", "pad-2"]) {
            let err = row.as_ref().unwrap_err();
            assert!(matches!(err, StoreError::CorruptRow { pad_id: id, .. } if id == pad_id));
            assert_eq!(err.kind(), ErrorKind::CorruptData);
        }

        assert_eq!(store.get_all().unwrap_err().kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_put_all_is_atomic() {
        let store = PersistenceGateway::open_in_memory();
        store.put(&record("pad-0", 1)).unwrap();

        let mut batch = vec![record("pad-1", 1), record("pad-2", 1)];
        batch[1].byte_size = usize::MAX;
        assert!(store.put_all(&batch).is_err());

        assert_eq!(store.info().unwrap().count, 1);
        assert!(store.get("pad-1").unwrap().is_none());
    }

    #[test]
    fn test_delete_and_info() {
        let store = PersistenceGateway::open_in_memory();
        let a = record("pad-0", 4);
        let b = record("pad-1", 8);
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        let info = store.info().unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.total_bytes, (a.byte_size + b.byte_size) as u64);

        assert!(store.delete("pad-0").unwrap());
        assert!(!store.delete("pad-0").unwrap());
        assert_eq!(store.info().unwrap().count, 1);
    }

    #[test]
    fn test_clear_empties_every_table() {
        let store = PersistenceGateway::open_in_memory();
        store.put(&record("pad-0", 1)).unwrap();
        store.put_setting(SETTINGS_KEY, &AppSettings::default()).unwrap();
        store.save_bank("live set", "{}").unwrap();

        store.clear().unwrap();

        assert_eq!(store.info().unwrap(), StorageInfo::default());
        assert!(store.get_setting::<AppSettings>(SETTINGS_KEY).unwrap().is_none());
        assert!(store.list_banks().unwrap().is_empty());
    }

    #[test]
    fn test_settings_roundtrip() {
        let store = PersistenceGateway::open_in_memory();
        let settings = AppSettings {
            global_volume: 0.4,
            current_bank_id: Some(3),
        };

        store.put_setting(SETTINGS_KEY, &settings).unwrap();
        assert_eq!(
            store.get_setting::<AppSettings>(SETTINGS_KEY).unwrap(),
            Some(settings)
        );
    }

    #[test]
    fn test_banks() {
        let store = PersistenceGateway::open_in_memory();
        let id = store.save_bank("drums", "{\"formatVersion\":\"2.0.0\"}").unwrap();

        assert_eq!(
            store.get_bank(id).unwrap().as_deref(),
            Some("{\"formatVersion\":\"2.0.0\"}")
        );
        let banks = store.list_banks().unwrap();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].name, "drums");
        assert!(store.get_bank(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("musicpad.db");

        PersistenceGateway::try_open(&path)
            .unwrap()
            .put(&record("pad-5", 3))
            .unwrap();

        let reopened = PersistenceGateway::try_open(&path).unwrap();
        assert_eq!(reopened.get("pad-5").unwrap().unwrap().frame_count, 3);
    }

    #[test]
    fn test_unavailable_store_rejects_everything() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened as a database file.
        let store = PersistenceGateway::open(dir.path());

        assert!(!store.is_available());
        let err = store.get_all().unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(store.put(&record("pad-0", 1)).is_err());
        assert!(store.clear().is_err());
        assert!(store.info().is_err());
    }
}
