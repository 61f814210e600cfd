//! SQLite chunk store with migrations
//!
//! Holds the ingested chunk records the index builder consumes

use crate::corpus::{Chunk, Corpus};
use crate::error::{Result, RerankError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// A chunk awaiting insertion; the database assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub source_id: i64,
    pub file: String,
    pub ordinal: usize,
    pub text: String,
}

/// Chunk database with migration support
pub struct ChunkDatabase {
    pool: DbPool,
}

impl ChunkDatabase {
    /// Open (or create) the chunk database
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RerankError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| RerankError::Pool(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| RerankError::Pool(format!("Failed to get connection: {}", e)))?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };

        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| RerankError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Replace the whole chunk set in one transaction
    ///
    /// Ids restart at 1. On any failure the previous chunk set is untouched.
    pub fn replace_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM chunks;
            DELETE FROM sqlite_sequence WHERE name = 'chunks';
            ",
        )?;
        insert_all(&tx, chunks)?;
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Append chunks in one transaction, returning how many were written
    pub fn insert_chunks(&self, chunks: &[NewChunk]) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        insert_all(&tx, chunks)?;
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Load every chunk ordered by id; the order defines corpus row indices
    pub fn load_corpus(&self) -> Result<Corpus> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, source_id, file, chunk_index, text FROM chunks ORDER BY id")?;

        let chunks = stmt
            .query_map([], |row| {
                let ordinal: i64 = row.get(3)?;
                Ok(Chunk {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    file: row.get(2)?,
                    ordinal: ordinal.max(0) as usize,
                    text: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Corpus::new(chunks))
    }

    /// Number of stored chunks
    pub fn chunk_count(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_all(tx: &rusqlite::Transaction<'_>, chunks: &[NewChunk]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO chunks (source_id, file, chunk_index, text) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for chunk in chunks {
        stmt.execute(params![
            chunk.source_id,
            chunk.file,
            chunk.ordinal as i64,
            chunk.text
        ])?;
    }
    Ok(())
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: chunk table
    r#"
    CREATE TABLE chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL,
        file TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL
    );

    CREATE INDEX idx_chunks_source ON chunks(source_id);
    "#,
];
