//! SQLite corpus store with WAL mode and FTS5 lexical search

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::embedding::cosine_similarity;
use crate::error::{Result, SibylError};
use crate::types::{CorpusEntry, EntryId, NewEntry, ScoredEntry, SourceKind};

/// Store configuration
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Database path, ":memory:" for ephemeral stores
    pub db_path: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
        }
    }
}

/// Corpus store wrapping a SQLite connection
pub struct CorpusStore {
    conn: Arc<Mutex<Connection>>,
}

impl CorpusStore {
    /// Open or create a store at the configured path
    pub fn open(config: CorpusConfig) -> Result<Self> {
        let conn = Self::create_connection(&config)?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Ephemeral in-memory store, used in tests
    pub fn open_in_memory() -> Result<Self> {
        Self::open(CorpusConfig::default())
    }

    fn create_connection(config: &CorpusConfig) -> Result<Connection> {
        let conn = if config.db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(&config.db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Connection::open_with_flags(&config.db_path, flags)?
        };

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=30000;
            PRAGMA temp_store=MEMORY;
            PRAGMA foreign_keys=ON;
            "#,
        )?;

        Ok(conn)
    }

    /// Ingest a single entry; returns the stored form
    ///
    /// Entries with identical normalized content are deduplicated: the
    /// existing row is returned untouched.
    pub fn insert(&self, new: NewEntry) -> Result<CorpusEntry> {
        let conn = self.conn.lock();
        insert_entry(&conn, new)
    }

    /// Bulk ingest; returns how many entries were newly stored
    pub fn populate(&self, entries: Vec<NewEntry>) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut stored = 0;
        for entry in entries {
            let hash = content_hash(&entry.content);
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM entries WHERE content_hash = ?1)",
                params![hash],
                |row| row.get(0),
            )?;
            if !exists {
                insert_entry(&tx, entry)?;
                stored += 1;
            }
        }
        tx.commit()?;
        info!(stored, "corpus populate complete");
        Ok(stored)
    }

    /// Fetch one entry by id
    pub fn get(&self, id: &str) -> Result<CorpusEntry> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, source, tags, metadata, embedding FROM entries WHERE id = ?1",
        )?;
        stmt.query_row(params![id], entry_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => SibylError::NotFound(id.to_string()),
                other => other.into(),
            })
    }

    /// Total entry count
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Whether the store holds any entries at all
    pub fn is_populated(&self) -> bool {
        self.count().map(|c| c > 0).unwrap_or(false)
    }

    /// Lexical search via FTS5, BM25-ranked
    ///
    /// BM25 reports better matches as more negative; the rank magnitude is
    /// normalized to [0, 1) so a stronger match always carries the higher
    /// score.
    pub fn text_search(&self, query: &str, limit: usize) -> Result<Vec<ScoredEntry>> {
        let escaped = escape_fts_query(query);
        if escaped.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT e.id, e.content, e.source, e.tags, e.metadata, e.embedding,
                   bm25(entries_fts) AS rank
            FROM entries_fts fts
            JOIN entries e ON fts.rowid = e.rowid
            WHERE entries_fts MATCH ?1
            ORDER BY bm25(entries_fts)
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![escaped, limit as i64], |row| {
            let entry = entry_from_row(row)?;
            let rank: f64 = row.get("rank")?;
            Ok((entry, rank))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (entry, rank) = row?;
            let score = (rank.abs() / (1.0 + rank.abs())) as f32;
            results.push(ScoredEntry { entry, score });
        }
        debug!(query, hits = results.len(), "lexical search");
        Ok(results)
    }

    /// Vector similarity search over entries that carry embeddings
    ///
    /// Scans in-process; corpus sizes here are thousands of short passages,
    /// well within a linear cosine pass.
    pub fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
        if query.is_empty() {
            return Err(SibylError::Search("empty query embedding".to_string()));
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, source, tags, metadata, embedding
             FROM entries WHERE embedding IS NOT NULL",
        )?;

        let rows = stmt.query_map([], entry_from_row)?;
        let mut scored: Vec<ScoredEntry> = Vec::new();
        for row in rows {
            let entry = row?;
            let score = entry
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(query, e))
                .unwrap_or(0.0);
            scored.push(ScoredEntry { entry, score });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        debug!(hits = scored.len(), "vector search");
        Ok(scored)
    }
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            rowid INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'secondary',
            tags TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}',
            embedding TEXT,
            content_hash TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
            content,
            content='entries',
            content_rowid='rowid',
            tokenize='porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
            INSERT INTO entries_fts(rowid, content) VALUES (new.rowid, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS entries_ad AFTER DELETE ON entries BEGIN
            INSERT INTO entries_fts(entries_fts, rowid, content)
            VALUES ('delete', old.rowid, old.content);
        END;
        "#,
    )?;
    Ok(())
}

fn insert_entry(conn: &Connection, new: NewEntry) -> Result<CorpusEntry> {
    let hash = content_hash(&new.content);

    // Dedup: identical content keeps the first ingested row
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM entries WHERE content_hash = ?1",
            params![hash],
            |row| row.get(0),
        )
        .ok();
    if let Some(id) = existing {
        debug!(%id, "duplicate content, returning existing entry");
        let mut stmt = conn.prepare(
            "SELECT id, content, source, tags, metadata, embedding FROM entries WHERE id = ?1",
        )?;
        return Ok(stmt.query_row(params![id], entry_from_row)?);
    }

    let id: EntryId = uuid::Uuid::new_v4().to_string();
    let tags = serde_json::to_string(&new.tags)?;
    let metadata = serde_json::to_string(&new.metadata)?;
    let embedding = new
        .embedding
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO entries (id, content, source, tags, metadata, embedding, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            new.content,
            new.source.to_string(),
            tags,
            metadata,
            embedding,
            hash,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;

    Ok(CorpusEntry {
        id,
        content: new.content,
        source: new.source,
        tags: new.tags,
        metadata: new.metadata,
        embedding: new.embedding,
    })
}

/// Decode a row into an entry, defaulting malformed fields
///
/// A corpus hit missing expected fields is still included rather than
/// failing the whole query.
fn entry_from_row(row: &Row) -> rusqlite::Result<CorpusEntry> {
    let id: String = row.get("id")?;
    let content: String = row.get("content")?;
    let source_str: String = row.get("source").unwrap_or_else(|_| String::new());
    let tags_str: String = row.get("tags").unwrap_or_else(|_| "[]".to_string());
    let metadata_str: String = row.get("metadata").unwrap_or_else(|_| "{}".to_string());
    let embedding_str: Option<String> = row.get("embedding").unwrap_or(None);

    let source: SourceKind = source_str.parse().unwrap_or_default();
    let tags: Vec<String> = serde_json::from_str(&tags_str).unwrap_or_default();
    let metadata: HashMap<String, serde_json::Value> =
        serde_json::from_str(&metadata_str).unwrap_or_default();
    let embedding: Option<Vec<f32>> =
        embedding_str.and_then(|s| serde_json::from_str(&s).ok());

    Ok(CorpusEntry {
        id,
        content,
        source,
        tags,
        metadata,
        embedding,
    })
}

/// Quote each term so FTS5 operators in user text stay inert
///
/// Terms are OR-joined; the porter tokenizer lets "mercy" reach
/// "merciful".
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| term.replace('"', ""))
        .filter(|t| t.len() > 1)
        .map(|term| format!("\"{}\"", term))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn content_hash(content: &str) -> String {
    let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = Sha256::digest(normalized.to_lowercase().as_bytes());
    hex::encode(digest)
}
