//! Thematic index
//!
//! Pre-groups corpus entries under a fixed vocabulary of themes. The index
//! is rebuilt wholesale and swapped atomically; rebuilding is the only
//! mutation path, so readers always see either the pre- or post-rebuild
//! index, never a half-built one. The serialized form on disk is a cache,
//! never the source of truth.

mod vocabulary;

pub use vocabulary::{Theme, ThemeVocabulary};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::corpus::CorpusStore;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::types::{CorpusEntry, SourceKind};

/// Per-source fetch bounds applied during rebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub primary_per_theme: usize,
    pub secondary_per_theme: usize,
    pub tertiary_per_theme: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            primary_per_theme: 20,
            secondary_per_theme: 10,
            tertiary_per_theme: 5,
        }
    }
}

/// Snapshot of theme membership, insertion order = relevance rank
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThematicIndex {
    entries: HashMap<String, Vec<CorpusEntry>>,
}

impl ThematicIndex {
    pub fn get(&self, theme: &str, limit: usize) -> Vec<CorpusEntry> {
        self.entries
            .get(theme)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|v| v.is_empty())
    }

    pub fn theme_count(&self) -> usize {
        self.entries.len()
    }
}

/// Builds and owns the swappable thematic index
pub struct ThematicIndexer {
    vocabulary: ThemeVocabulary,
    config: IndexConfig,
    index: Arc<RwLock<Arc<ThematicIndex>>>,
}

impl ThematicIndexer {
    pub fn new(vocabulary: ThemeVocabulary, config: IndexConfig) -> Self {
        Self {
            vocabulary,
            config,
            index: Arc::new(RwLock::new(Arc::new(ThematicIndex::default()))),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ThemeVocabulary::default(), IndexConfig::default())
    }

    pub fn vocabulary(&self) -> &ThemeVocabulary {
        &self.vocabulary
    }

    /// Whether any theme currently has members
    pub fn is_built(&self) -> bool {
        !self.index.read().is_empty()
    }

    /// Entries for one theme, in relevance order
    pub fn get_by_theme(&self, theme: &str, limit: usize) -> Vec<CorpusEntry> {
        self.index.read().get(theme, limit)
    }

    /// Rebuild the whole index from the store and swap it in atomically
    ///
    /// One theme's sub-query failing is isolated: logged, its list left
    /// empty or partial, and the rebuild of other themes proceeds.
    /// Idempotent; this is the only way the index changes.
    pub fn rebuild(&self, store: &CorpusStore, embedder: &dyn Embedder) -> Result<()> {
        let mut entries: HashMap<String, Vec<CorpusEntry>> = HashMap::new();

        for theme in self.vocabulary.themes() {
            let members = match self.collect_theme(store, embedder, theme) {
                Ok(members) => members,
                Err(e) => {
                    warn!(theme = %theme.name, error = %e, "theme rebuild failed, leaving empty");
                    Vec::new()
                }
            };
            info!(theme = %theme.name, count = members.len(), "indexed theme");
            entries.insert(theme.name.clone(), members);
        }

        let fresh = Arc::new(ThematicIndex { entries });
        *self.index.write() = fresh;
        Ok(())
    }

    fn collect_theme(
        &self,
        store: &CorpusStore,
        embedder: &dyn Embedder,
        theme: &Theme,
    ) -> Result<Vec<CorpusEntry>> {
        let query = theme.seed_query();

        // Vector pass over a generous pool, lexical fallback when the
        // embedding path is down or yields nothing
        let overfetch = self.config.primary_per_theme
            + self.config.secondary_per_theme
            + self.config.tertiary_per_theme;
        let pool = match embedder
            .embed(&query)
            .and_then(|e| store.vector_search(&e, overfetch * 2))
        {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => store.text_search(&query, overfetch * 2)?,
            Err(e) => {
                warn!(theme = %theme.name, error = %e, "vector pass unavailable, using lexical");
                store.text_search(&query, overfetch * 2)?
            }
        };

        let mut members = Vec::new();
        for (kind, cap) in [
            (SourceKind::Primary, self.config.primary_per_theme),
            (SourceKind::Secondary, self.config.secondary_per_theme),
            (SourceKind::Tertiary, self.config.tertiary_per_theme),
        ] {
            members.extend(
                pool.iter()
                    .filter(|h| h.entry.source == kind)
                    .take(cap)
                    .map(|h| h.entry.clone()),
            );
        }
        Ok(members)
    }

    /// Serialize the current index to disk (cache only)
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.index.read().clone();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(snapshot.as_ref())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a previously serialized index; rebuildable at any time, so a
    /// missing or corrupt cache is not an error worth surfacing
    pub fn load(&self, path: &Path) -> bool {
        match std::fs::read_to_string(path)
            .map_err(crate::error::SibylError::from)
            .and_then(|s| Ok(serde_json::from_str::<ThematicIndex>(&s)?))
        {
            Ok(index) => {
                *self.index.write() = Arc::new(index);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "index cache unusable");
                false
            }
        }
    }
}
