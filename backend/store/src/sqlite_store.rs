/// SQLite-backed durable advisory store.
///
/// Uses `rusqlite` to persist `PersistedAdvisory` rows in a `disease_advice`
/// table. Rows are only ever inserted; CHECK constraints reject empty fields so
/// a record can never exist without a fully-normalized advisory.
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use cropdoc_core::{ImageRef, NormalizedAdvisory, PersistedAdvisory};

use crate::store::AdvisoryStore;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS disease_advice (
     id           TEXT PRIMARY KEY,
     image        TEXT NOT NULL,
     mime_type    TEXT NOT NULL,
     disease_name TEXT NOT NULL CHECK (length(disease_name) > 0),
     causes       TEXT NOT NULL CHECK (length(causes) > 0),
     treatment    TEXT NOT NULL CHECK (length(treatment) > 0),
     created_at   INTEGER NOT NULL
 );
 CREATE INDEX IF NOT EXISTS idx_disease_advice_image ON disease_advice(image);
 CREATE INDEX IF NOT EXISTS idx_disease_advice_created ON disease_advice(created_at);";

pub struct SqliteAdvisoryStore {
    conn: Mutex<Connection>,
}

impl SqliteAdvisoryStore {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .context("Failed to open SQLite advisory database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize disease_advice schema")?;

        info!("SqliteAdvisoryStore opened at {:?}", path.as_ref());
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Number of stored advisories.
    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM disease_advice", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl AdvisoryStore for SqliteAdvisoryStore {
    async fn save(&self, image: &ImageRef, advisory: NormalizedAdvisory) -> Result<PersistedAdvisory> {
        let record = PersistedAdvisory::new(image, advisory);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO disease_advice (id, image, mime_type, disease_name, causes, treatment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.image,
                record.mime_type,
                record.disease_name,
                record.causes,
                record.treatment,
                record.created_at.timestamp_micros(),
            ],
        )
        .context("Failed to insert advisory")?;
        debug!(id = %record.id, image = %record.image, "Inserted advisory");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PersistedAdvisory>> {
        let conn = self.conn.lock().await;
        let record = conn
            .query_row(
                "SELECT id, image, mime_type, disease_name, causes, treatment, created_at
                 FROM disease_advice WHERE id = ?1",
                params![id.to_string()],
                row_to_advisory,
            )
            .optional()?;
        Ok(record)
    }

    async fn list_for_image(&self, image: &str) -> Result<Vec<PersistedAdvisory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, image, mime_type, disease_name, causes, treatment, created_at
             FROM disease_advice WHERE image = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let records = stmt
            .query_map(params![image], row_to_advisory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Row deserialization helper
// ---------------------------------------------------------------------------

fn row_to_advisory(row: &rusqlite::Row) -> rusqlite::Result<PersistedAdvisory> {
    let id_str: String = row.get(0)?;
    let created_micros: i64 = row.get(6)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?;
    let created_at = DateTime::from_timestamp_micros(created_micros).ok_or_else(|| {
        rusqlite::Error::InvalidParameterName(format!("invalid timestamp {created_micros}"))
    })?;

    Ok(PersistedAdvisory {
        id,
        image: row.get(1)?,
        mime_type: row.get(2)?,
        disease_name: row.get(3)?,
        causes: row.get(4)?,
        treatment: row.get(5)?,
        created_at,
    })
}
