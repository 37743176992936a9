//! Durable alert persistence.
//!
//! Records are append-only: created exactly once per fired alert, never
//! mutated, listed in creation order. An append is atomic from the caller's
//! perspective (one INSERT), so a record either exists in full or not at all.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// Field length clamps, matching the external query-surface schema.
const MAX_ITEM_NAME_LEN: usize = 50;
const MAX_SCREENSHOT_PATH_LEN: usize = 200;

/// A record about to be appended. `id` is assigned by the store.
#[derive(Clone, Debug)]
pub struct NewAlert {
    pub item_name: String,
    pub timestamp: DateTime<Utc>,
    /// Empty when the screenshot write failed; the record is kept regardless.
    pub screenshot_path: String,
}

/// A persisted alert record.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AlertRecord {
    pub id: i64,
    pub item_name: String,
    pub timestamp: DateTime<Utc>,
    pub screenshot_path: String,
}

pub trait AlertStore: Send {
    /// Append one record, returning its assigned id.
    fn append(&mut self, alert: &NewAlert) -> Result<i64>;

    /// All records in creation order.
    fn list_all(&self) -> Result<Vec<AlertRecord>>;
}

fn clamp(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

// ----------------------------------------------------------------------------
// SQLite store
// ----------------------------------------------------------------------------

pub struct SqliteAlertStore {
    conn: Connection,
}

impl SqliteAlertStore {
    pub fn open(db_path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open alert database {}", db_path.display()))?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS alerts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              item_name TEXT NOT NULL,
              timestamp TEXT NOT NULL,
              screenshot_path TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp);
            "#,
        )?;
        Ok(())
    }
}

impl AlertStore for SqliteAlertStore {
    fn append(&mut self, alert: &NewAlert) -> Result<i64> {
        let item_name = clamp(&alert.item_name, MAX_ITEM_NAME_LEN);
        let screenshot_path = clamp(&alert.screenshot_path, MAX_SCREENSHOT_PATH_LEN);
        self.conn.execute(
            "INSERT INTO alerts(item_name, timestamp, screenshot_path) VALUES (?1, ?2, ?3)",
            params![item_name, alert.timestamp.to_rfc3339(), screenshot_path],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_all(&self) -> Result<Vec<AlertRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, item_name, timestamp, screenshot_path FROM alerts ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let item_name: String = row.get(1)?;
            let raw_timestamp: String = row.get(2)?;
            let screenshot_path: String = row.get(3)?;
            let timestamp = DateTime::parse_from_rfc3339(&raw_timestamp)
                .map_err(|e| anyhow!("corrupt alert timestamp '{}': {}", raw_timestamp, e))?
                .with_timezone(&Utc);
            records.push(AlertRecord {
                id,
                item_name,
                timestamp,
                screenshot_path,
            });
        }
        Ok(records)
    }
}

// ----------------------------------------------------------------------------
// In-memory store for tests
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAlertStore {
    records: Vec<AlertRecord>,
    next_id: i64,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }
}

impl AlertStore for InMemoryAlertStore {
    fn append(&mut self, alert: &NewAlert) -> Result<i64> {
        let id = self.next_id;
        self.next_id += 1;
        self.records.push(AlertRecord {
            id,
            item_name: clamp(&alert.item_name, MAX_ITEM_NAME_LEN),
            timestamp: alert.timestamp,
            screenshot_path: clamp(&alert.screenshot_path, MAX_SCREENSHOT_PATH_LEN),
        });
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<AlertRecord>> {
        Ok(self.records.clone())
    }
}
