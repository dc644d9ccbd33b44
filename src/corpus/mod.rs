//! Corpus store
//!
//! SQLite-backed read-mostly store of corpus entries. Exposes:
//! - lexical search (FTS5 with BM25 ranking)
//! - vector similarity search over precomputed embeddings
//! - bulk ingest with content-hash dedup
//!
//! The store is the source of truth; every entry inside a `ScanResult`
//! traces back to a row that exists here at query time.

mod store;

pub use store::{CorpusConfig, CorpusStore};
