//! SQLite backend for the market store using rusqlite

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use mirror_core::MarketRecord;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, info, instrument};

use crate::{
    backend::StoreBackend,
    error::{EmbeddingError, Result},
};

/// SQLite store for market records and their embeddings
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

fn encode_embedding(embedding: Option<&Vec<f32>>) -> Result<Option<Vec<u8>>> {
    embedding.map(bincode::serialize).transpose().map_err(Into::into)
}

fn decode_embedding(bytes: Option<Vec<u8>>) -> Result<Option<Vec<f32>>> {
    bytes.map(|b| bincode::deserialize(&b)).transpose().map_err(Into::into)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

impl SqliteBackend {
    /// Open (or create) a store at `database_path`
    #[instrument(skip(database_path))]
    pub fn new<P: AsRef<Path> + std::fmt::Debug>(database_path: P) -> Result<Self> {
        info!("Opening market database: {:?}", database_path.as_ref());
        if let Some(parent) = database_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EmbeddingError::Database(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let conn = Connection::open(database_path.as_ref())
            .map_err(|e| EmbeddingError::Database(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_tables()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            EmbeddingError::Database(format!("Failed to create in-memory DB: {}", e))
        })?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS markets (
                market_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                probability REAL NOT NULL,
                embedding BLOB,
                dimension INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_markets_updated
            ON markets(updated_at);
            "#,
        )?;

        info!("Market database tables initialized");
        Ok(())
    }
}

impl StoreBackend for SqliteBackend {
    #[instrument(skip(self, record))]
    fn insert(&self, id: &str, record: &MarketRecord) -> Result<()> {
        let embedding_bytes = encode_embedding(record.embedding.as_ref())?;
        let dimension = record.embedding.as_ref().map(|e| e.len() as i64);
        let now = Utc::now().timestamp();
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO markets
             (market_id, title, probability, embedding, dimension, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                &record.title,
                record.probability,
                embedding_bytes,
                dimension,
                now,
                now,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                EmbeddingError::AlreadyExists(id.to_string())
            } else {
                EmbeddingError::Database(e.to_string())
            }
        })?;

        debug!("Inserted market: {}", id);
        Ok(())
    }

    #[instrument(skip(self))]
    fn select(&self, id: &str) -> Result<MarketRecord> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT title, probability, embedding FROM markets WHERE market_id = ?",
                params![id],
                |row| {
                    let title: String = row.get(0)?;
                    let probability: f64 = row.get(1)?;
                    let embedding: Option<Vec<u8>> = row.get(2)?;
                    Ok((title, probability, embedding))
                },
            )
            .optional()?;

        let (title, probability, embedding) =
            row.ok_or_else(|| EmbeddingError::NotFound(id.to_string()))?;

        Ok(MarketRecord {
            title,
            probability,
            embedding: decode_embedding(embedding)?,
        })
    }

    #[instrument(skip(self, record))]
    fn update(&self, id: &str, record: &MarketRecord) -> Result<()> {
        let embedding_bytes = encode_embedding(record.embedding.as_ref())?;
        let dimension = record.embedding.as_ref().map(|e| e.len() as i64);
        let conn = self.conn.lock();

        let changed = conn.execute(
            "UPDATE markets
             SET title = ?, probability = ?, embedding = ?, dimension = ?, updated_at = ?
             WHERE market_id = ?",
            params![
                &record.title,
                record.probability,
                embedding_bytes,
                dimension,
                Utc::now().timestamp(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(EmbeddingError::NotFound(id.to_string()));
        }

        debug!("Updated market: {}", id);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();

        let changed = conn.execute("DELETE FROM markets WHERE market_id = ?", params![id])?;
        if changed == 0 {
            return Err(EmbeddingError::NotFound(id.to_string()));
        }

        debug!("Deleted market: {}", id);
        Ok(())
    }

    fn contains(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM markets WHERE market_id = ?",
                params![id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM markets", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    fn embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT market_id, embedding
             FROM markets
             WHERE embedding IS NOT NULL
             ORDER BY rowid",
        )?;

        let rows = stmt.query_map([], |row| {
            let market_id: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            Ok((market_id, embedding_bytes))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (market_id, embedding_bytes) = row?;
            let embedding: Vec<f32> = bincode::deserialize(&embedding_bytes)?;
            results.push((market_id, embedding));
        }

        debug!("Loaded {} market embeddings", results.len());
        Ok(results)
    }
}
