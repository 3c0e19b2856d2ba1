// Database migrations
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    // One record per pad; channel_data holds codec bytes
    conn.execute(
        "CREATE TABLE IF NOT EXISTS samples (
            pad_id TEXT PRIMARY KEY NOT NULL,
            label TEXT NOT NULL,
            sample_rate INTEGER NOT NULL,
            channel_count INTEGER NOT NULL,
            frame_count INTEGER NOT NULL,
            channel_data BLOB NOT NULL,
            saved_at TEXT NOT NULL,
            byte_size INTEGER NOT NULL
        )",
        [],
    )?;

    // Key/value JSON settings
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Saved bank documents
    conn.execute(
        "CREATE TABLE IF NOT EXISTS banks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_banks_name ON banks(name)",
        [],
    )?;

    Ok(())
}
