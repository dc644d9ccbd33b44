//! Scanner: retrieval and candidate organization
//!
//! One scan is an ordered fallback chain with named stages, each returning
//! a typed outcome:
//! 1. embed the question (context keywords appended first)
//! 2. vector similarity stage (over-fetch)
//! 3. lexical stage - mandatory fallback, the embedding path may be down
//! 4. partition hits into verses / wisdom, attach thematically related extras
//!
//! A scan never raises; any uncaught failure collapses to
//! `ScanResult::empty()` so retrieval failure cannot crash a conversation.

mod cluster;

pub use cluster::cluster_partition;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::corpus::CorpusStore;
use crate::embedding::Embedder;
use crate::index::ThematicIndexer;
use crate::types::{ConversationTurn, ScanResult, ScoredEntry, SourceKind};

/// Outcome of one retrieval stage
#[derive(Debug)]
pub enum StageOutcome {
    /// Stage produced candidates
    Hit(Vec<ScoredEntry>),
    /// Stage ran but found nothing
    Empty,
    /// Stage could not run (backend unreachable or erroring)
    Unavailable(String),
}

/// How candidates are shaped into the categorized result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Rank-order partition: first primaries, then the rest
    #[default]
    Simple,
    /// Group by embedding clusters first for topical diversity, then
    /// partition; falls back to Simple when too few embedded candidates
    Cluster,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Over-fetch for the vector stage
    pub vector_limit: usize,
    /// Over-fetch for the lexical stage
    pub lexical_limit: usize,
    /// Cap on primary-source passages returned
    pub verses_limit: usize,
    /// Cap on secondary passages returned
    pub wisdom_limit: usize,
    /// Cap on thematically related extras
    pub related_limit: usize,
    /// Recent turns whose questions expand the query
    pub context_turns: usize,
    pub strategy: PartitionStrategy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            vector_limit: 25,
            lexical_limit: 30,
            verses_limit: 5,
            wisdom_limit: 3,
            related_limit: 5,
            context_turns: 2,
            strategy: PartitionStrategy::Simple,
        }
    }
}

/// Retrieves and organizes candidates for one query
pub struct Scanner {
    store: Arc<CorpusStore>,
    embedder: Arc<dyn Embedder>,
    indexer: Arc<ThematicIndexer>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(
        store: Arc<CorpusStore>,
        embedder: Arc<dyn Embedder>,
        indexer: Arc<ThematicIndexer>,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            indexer,
            config,
        }
    }

    /// Produce a categorized, ranked candidate set; never fails
    pub fn scan(&self, question: &str, context: &[ConversationTurn]) -> ScanResult {
        let query = self.expand_query(question, context);

        let (embedding, vector_stage) = self.vector_stage(&query);
        let hits = match vector_stage {
            StageOutcome::Hit(hits) => hits,
            StageOutcome::Empty | StageOutcome::Unavailable(_) => {
                match self.lexical_stage(&query) {
                    StageOutcome::Hit(hits) => hits,
                    StageOutcome::Empty => return ScanResult::empty(),
                    StageOutcome::Unavailable(reason) => {
                        warn!(reason, "lexical stage unavailable, returning empty scan");
                        return ScanResult::empty();
                    }
                }
            }
        };

        let mut result = self.shape(hits);
        result.query_embedding = embedding;
        result.related = self.find_related(&result);
        result
    }

    /// Append keywords from the recent context window to bias retrieval
    fn expand_query(&self, question: &str, context: &[ConversationTurn]) -> String {
        let mut query = question.to_string();
        for turn in context.iter().rev().take(self.config.context_turns) {
            for word in keywords(&turn.question) {
                if !query.to_lowercase().contains(&word) {
                    query.push(' ');
                    query.push_str(&word);
                }
            }
        }
        query
    }

    fn vector_stage(&self, query: &str) -> (Option<Vec<f32>>, StageOutcome) {
        let embedding = match self.embedder.embed(query) {
            Ok(e) if !e.is_empty() => e,
            Ok(_) => return (None, StageOutcome::Empty),
            Err(e) => {
                warn!(error = %e, "embedding unavailable, falling back to lexical");
                return (None, StageOutcome::Unavailable(e.to_string()));
            }
        };

        let outcome = match self.store.vector_search(&embedding, self.config.vector_limit) {
            Ok(hits) if !hits.is_empty() => StageOutcome::Hit(hits),
            Ok(_) => StageOutcome::Empty,
            Err(e) => {
                warn!(error = %e, "vector search failed, falling back to lexical");
                StageOutcome::Unavailable(e.to_string())
            }
        };
        (Some(embedding), outcome)
    }

    fn lexical_stage(&self, query: &str) -> StageOutcome {
        match self.store.text_search(query, self.config.lexical_limit) {
            Ok(hits) if !hits.is_empty() => StageOutcome::Hit(hits),
            Ok(_) => StageOutcome::Empty,
            Err(e) => StageOutcome::Unavailable(e.to_string()),
        }
    }

    /// Partition normalized hits into the categorized shape
    fn shape(&self, hits: Vec<ScoredEntry>) -> ScanResult {
        match self.config.strategy {
            PartitionStrategy::Simple => simple_partition(
                hits,
                self.config.verses_limit,
                self.config.wisdom_limit,
            ),
            PartitionStrategy::Cluster => cluster_partition(
                hits,
                self.config.verses_limit,
                self.config.wisdom_limit,
            ),
        }
    }

    /// Map keywords of the top primary hit through the theme vocabulary to
    /// sibling index entries not already in the result set
    fn find_related(&self, result: &ScanResult) -> Vec<ScoredEntry> {
        let Some(primary) = result.verses.first() else {
            return vec![];
        };
        if !self.indexer.is_built() {
            debug!("thematic index unbuilt, skipping related lookup");
            return vec![];
        }

        let vocabulary = self.indexer.vocabulary();
        let mut theme_names: Vec<String> = Vec::new();
        for word in keywords(&primary.entry.content) {
            for theme in vocabulary.themes_for_keyword(&word) {
                if !theme_names.contains(&theme.name) {
                    theme_names.push(theme.name.clone());
                }
            }
        }

        let seen: std::collections::HashSet<&str> = result
            .all_results
            .iter()
            .map(|r| r.entry.id.as_str())
            .collect();

        let mut related = Vec::new();
        for name in theme_names {
            for entry in self.indexer.get_by_theme(&name, self.config.related_limit) {
                if !seen.contains(entry.id.as_str())
                    && !related.iter().any(|r: &ScoredEntry| r.entry.id == entry.id)
                {
                    related.push(ScoredEntry { entry, score: 0.0 });
                }
            }
        }
        related.truncate(self.config.related_limit);
        related
    }
}

/// Rank-order partition: first K primaries into verses, first M others into
/// wisdom, everything retained in all_results
pub fn simple_partition(
    hits: Vec<ScoredEntry>,
    verses_limit: usize,
    wisdom_limit: usize,
) -> ScanResult {
    let verses = hits
        .iter()
        .filter(|h| h.entry.source == SourceKind::Primary)
        .take(verses_limit)
        .cloned()
        .collect();
    let wisdom = hits
        .iter()
        .filter(|h| h.entry.source != SourceKind::Primary)
        .take(wisdom_limit)
        .cloned()
        .collect();

    ScanResult {
        verses,
        wisdom,
        related: vec![],
        all_results: hits,
        query_embedding: None,
    }
}

/// Lowercased alphabetic words longer than three characters
pub fn keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase()
        })
        .filter(|w| w.len() > 3 && w.chars().all(|c| c.is_alphabetic()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashedEmbedder;
    use crate::error::{Result, SibylError};
    use crate::types::{CorpusEntry, NewEntry};
    use std::collections::HashMap;

    /// Embedder that always fails, simulating a down backend
    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SibylError::Embedding("backend unreachable".to_string()))
        }
        fn dimensions(&self) -> usize {
            0
        }
        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn seeded_scanner(embedder: Arc<dyn Embedder>) -> Scanner {
        let store = Arc::new(CorpusStore::open_in_memory().unwrap());
        let hashed = HashedEmbedder::new(128);
        let passages = [
            ("The merciful one forgives all who repent.", SourceKind::Primary),
            ("Compassion and kindness flow from mercy.", SourceKind::Secondary),
            ("Steadfast patience endures every trial.", SourceKind::Primary),
        ];
        for (text, source) in passages {
            store
                .insert(NewEntry {
                    content: text.to_string(),
                    source,
                    tags: vec![],
                    metadata: HashMap::new(),
                    embedding: hashed.embed(text).ok(),
                })
                .unwrap();
        }
        let indexer = Arc::new(ThematicIndexer::with_defaults());
        indexer.rebuild(&store, &hashed).unwrap();
        Scanner::new(store, embedder, indexer, ScanConfig::default())
    }

    #[test]
    fn test_scan_vector_path() {
        let scanner = seeded_scanner(Arc::new(HashedEmbedder::new(128)));
        let result = scanner.scan("tell me about mercy and forgiveness", &[]);
        assert!(!result.is_empty());
        assert!(result.query_embedding.is_some());
        assert!(!result.verses.is_empty());
    }

    #[test]
    fn test_scan_falls_back_to_lexical_when_embedding_down() {
        let scanner = seeded_scanner(Arc::new(BrokenEmbedder));
        let result = scanner.scan("the merciful one forgives", &[]);
        assert!(!result.is_empty(), "lexical fallback must still return hits");
        assert!(result.query_embedding.is_none());
    }

    #[test]
    fn test_scan_never_errors_on_nonsense() {
        let scanner = seeded_scanner(Arc::new(BrokenEmbedder));
        let result = scanner.scan("xqzt %%% \"AND NEAR(", &[]);
        // Well-defined empty shape, not a crash
        assert!(result.verses.is_empty() || !result.all_results.is_empty());
    }

    #[test]
    fn test_partition_respects_caps_and_sources() {
        let mk = |i: usize, source: SourceKind| ScoredEntry {
            entry: CorpusEntry {
                id: format!("e{}", i),
                content: format!("passage {}", i),
                source,
                tags: vec![],
                metadata: HashMap::new(),
                embedding: None,
            },
            score: 1.0 - i as f32 * 0.1,
        };
        let hits: Vec<ScoredEntry> = (0..8)
            .map(|i| {
                mk(
                    i,
                    if i % 2 == 0 {
                        SourceKind::Primary
                    } else {
                        SourceKind::Secondary
                    },
                )
            })
            .collect();

        let result = simple_partition(hits.clone(), 2, 1);
        assert_eq!(result.verses.len(), 2);
        assert_eq!(result.wisdom.len(), 1);
        assert_eq!(result.all_results.len(), 8);
        assert!(result
            .verses
            .iter()
            .all(|v| v.entry.source == SourceKind::Primary));
        assert!(result
            .wisdom
            .iter()
            .all(|w| w.entry.source != SourceKind::Primary));
    }

    #[test]
    fn test_related_draws_from_theme_index() {
        let scanner = seeded_scanner(Arc::new(HashedEmbedder::new(128)));
        let result = scanner.scan("forgiveness for those who repent", &[]);
        // Every related entry is new to the result set
        for related in &result.related {
            assert!(result
                .all_results
                .iter()
                .all(|r| r.entry.id != related.entry.id));
        }
    }

    #[test]
    fn test_context_expands_query() {
        let scanner = seeded_scanner(Arc::new(HashedEmbedder::new(128)));
        let context = vec![ConversationTurn {
            timestamp: chrono::Utc::now(),
            question: "what does patience mean".to_string(),
            response: "...".to_string(),
        }];
        let expanded = scanner.expand_query("tell me more", &context);
        assert!(expanded.contains("patience"));
    }

    #[test]
    fn test_keywords_filters_short_and_nonalpha() {
        let words = keywords("The merciful one forgives 12:34 all!");
        assert!(words.contains(&"merciful".to_string()));
        assert!(words.contains(&"forgives".to_string()));
        assert!(!words.iter().any(|w| w.contains(':')));
        assert!(!words.contains(&"the".to_string()));
    }
}
