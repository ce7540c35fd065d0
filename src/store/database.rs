//! SQLite record store with migrations
//!
//! Canonical storage for document metadata and passage records. Each passage
//! row carries an internal integer id that the lexical and vector indexes
//! use as their document key, plus the embedding as a little-endian f32
//! blob so the in-memory vector index can be rebuilt at open.

use crate::error::{PassimError, Result};
use crate::models::{Document, Passage, PassageCategory};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use tracing::warn;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const MIGRATIONS: &[&str] = &["
    CREATE TABLE documents (
        document_id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        ingested_at TEXT NOT NULL,
        page_count INTEGER NOT NULL DEFAULT 1,
        passage_count INTEGER NOT NULL DEFAULT 0,
        passage_types_found TEXT NOT NULL DEFAULT '[]',
        source_length INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE passages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passage_id TEXT NOT NULL UNIQUE,
        document_id TEXT NOT NULL,
        category TEXT NOT NULL,
        text TEXT NOT NULL,
        section_label TEXT NOT NULL DEFAULT '',
        page_number INTEGER NOT NULL DEFAULT 1,
        char_start INTEGER NOT NULL,
        char_end INTEGER NOT NULL,
        confidence REAL NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX idx_passages_document ON passages(document_id);
    "];

/// Record store over a pooled SQLite connection
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file and configure the pool.
    ///
    /// Schema creation happens separately via [`Database::migrate`].
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PassimError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| PassimError::Pool(e.to_string()))?;

        {
            let conn = pool.get().map_err(|e| PassimError::Pool(e.to_string()))?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| PassimError::Pool(e.to_string()))
    }

    /// Apply pending migrations. Safe to call on every start; applied
    /// versions are recorded and never re-run.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

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

    /// Full upsert of a document record by `document_id`.
    pub fn upsert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn()?;
        let types_json = serde_json::to_string(&doc.passage_types_found)
            .unwrap_or_else(|_| "[]".to_string());

        conn.execute(
            "INSERT INTO documents
                (document_id, filename, ingested_at, page_count, passage_count,
                 passage_types_found, source_length)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(document_id) DO UPDATE SET
                filename = excluded.filename,
                ingested_at = excluded.ingested_at,
                page_count = excluded.page_count,
                passage_count = excluded.passage_count,
                passage_types_found = excluded.passage_types_found,
                source_length = excluded.source_length",
            params![
                doc.document_id,
                doc.filename,
                format_timestamp(&doc.ingested_at),
                doc.page_count,
                doc.passage_count,
                types_json,
                doc.source_length as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let doc = conn
            .query_row(
                "SELECT document_id, filename, ingested_at, page_count, passage_count,
                        passage_types_found, source_length
                 FROM documents WHERE document_id = ?1",
                params![document_id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    /// Documents ordered most-recently-ingested first.
    pub fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, filename, ingested_at, page_count, passage_count,
                    passage_types_found, source_length
             FROM documents
             ORDER BY ingested_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], document_from_row)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    /// Upsert a passage by `passage_id`, returning its internal integer id.
    ///
    /// A re-upserted passage keeps its internal id, so index entries keyed on
    /// it stay valid.
    pub fn upsert_passage(&self, passage: &Passage) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO passages
                (passage_id, document_id, category, text, section_label, page_number,
                 char_start, char_end, confidence, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(passage_id) DO UPDATE SET
                document_id = excluded.document_id,
                category = excluded.category,
                text = excluded.text,
                section_label = excluded.section_label,
                page_number = excluded.page_number,
                char_start = excluded.char_start,
                char_end = excluded.char_end,
                confidence = excluded.confidence,
                embedding = excluded.embedding",
            params![
                passage.passage_id,
                passage.document_id,
                passage.category.as_str(),
                passage.text,
                passage.section_label,
                passage.page_number,
                passage.char_start,
                passage.char_end,
                passage.confidence,
                encode_embedding(&passage.embedding),
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM passages WHERE passage_id = ?1",
            params![passage.passage_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Fetch passages by internal id. Rows whose embedding blob cannot be
    /// decoded are skipped with a warning, never fatal.
    pub fn get_passages_by_internal_ids(&self, ids: &[i64]) -> Result<Vec<(i64, Passage)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, passage_id, document_id, category, text, section_label,
                    page_number, char_start, char_end, confidence, embedding
             FROM passages WHERE id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), passage_parts_from_row)?;

        let mut passages = Vec::new();
        for row in rows {
            let (id, parts) = row?;
            match passage_from_parts(parts) {
                Some(passage) => passages.push((id, passage)),
                None => warn!(internal_id = id, "skipping passage with undecodable embedding"),
            }
        }
        Ok(passages)
    }

    pub fn get_passages_by_document(&self, document_id: &str) -> Result<Vec<Passage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, passage_id, document_id, category, text, section_label,
                    page_number, char_start, char_end, confidence, embedding
             FROM passages WHERE document_id = ?1 ORDER BY char_start ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![document_id], passage_parts_from_row)?;

        let mut passages = Vec::new();
        for row in rows {
            let (id, parts) = row?;
            match passage_from_parts(parts) {
                Some(passage) => passages.push(passage),
                None => warn!(internal_id = id, "skipping passage with undecodable embedding"),
            }
        }
        Ok(passages)
    }

    /// All `(internal id, embedding)` pairs, for vector index rebuild.
    pub fn all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, embedding FROM passages")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;

        let mut embeddings = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            match decode_embedding(&blob) {
                Some(vector) => embeddings.push((id, vector)),
                None => warn!(internal_id = id, "skipping undecodable embedding blob"),
            }
        }
        Ok(embeddings)
    }

    pub fn passage_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Fixed-width RFC 3339 so lexicographic order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let ingested_at: String = row.get(2)?;
    let types_json: String = row.get(5)?;
    let source_length: i64 = row.get(6)?;

    Ok(Document {
        document_id: row.get(0)?,
        filename: row.get(1)?,
        ingested_at: DateTime::parse_from_rfc3339(&ingested_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        page_count: row.get(3)?,
        passage_count: row.get(4)?,
        passage_types_found: serde_json::from_str(&types_json).unwrap_or_default(),
        source_length: source_length.max(0) as usize,
    })
}

/// Raw passage columns before embedding decode
struct PassageParts {
    passage_id: String,
    document_id: String,
    category: String,
    text: String,
    section_label: String,
    page_number: u32,
    char_start: i64,
    char_end: i64,
    confidence: f32,
    embedding_blob: Vec<u8>,
}

fn passage_parts_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, PassageParts)> {
    Ok((
        row.get(0)?,
        PassageParts {
            passage_id: row.get(1)?,
            document_id: row.get(2)?,
            category: row.get(3)?,
            text: row.get(4)?,
            section_label: row.get(5)?,
            page_number: row.get(6)?,
            char_start: row.get(7)?,
            char_end: row.get(8)?,
            confidence: row.get(9)?,
            embedding_blob: row.get(10)?,
        },
    ))
}

fn passage_from_parts(parts: PassageParts) -> Option<Passage> {
    let embedding = decode_embedding(&parts.embedding_blob)?;
    Some(Passage {
        passage_id: parts.passage_id,
        document_id: parts.document_id,
        category: PassageCategory::parse(&parts.category),
        text: parts.text,
        section_label: parts.section_label,
        page_number: parts.page_number,
        char_start: parts.char_start,
        char_end: parts.char_end,
        confidence: parts.confidence,
        embedding,
    })
}
