//! Core types for Sibyl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a corpus entry
pub type EntryId = String;

/// Category of a corpus source
///
/// Primary sources carry the tradition's own voice (verses); everything
/// else is commentary or collected wisdom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Primary,
    #[default]
    Secondary,
    Tertiary,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Primary => write!(f, "primary"),
            SourceKind::Secondary => write!(f, "secondary"),
            SourceKind::Tertiary => write!(f, "tertiary"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(SourceKind::Primary),
            "secondary" => Ok(SourceKind::Secondary),
            "tertiary" => Ok(SourceKind::Tertiary),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

/// One retrievable unit of source text
///
/// Immutable once ingested; owned by the corpus store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Stable identifier
    pub id: EntryId,
    /// Passage text
    pub content: String,
    /// Source category
    #[serde(default)]
    pub source: SourceKind,
    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,
    /// Arbitrary metadata as JSON (reference, chapter, translator, ...)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Precomputed embedding, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl CorpusEntry {
    /// Best-effort human-readable reference (e.g. "2:153") from metadata
    pub fn reference(&self) -> String {
        self.metadata
            .get("reference")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

/// A corpus entry carrying a per-query relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: CorpusEntry,
    /// Relevance for the current query, higher is better
    pub score: f32,
}

/// Input shape for ingesting a new corpus entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub content: String,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Categorized, ranked candidate set for one query
///
/// Produced fresh per query; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Primary-source passages
    pub verses: Vec<ScoredEntry>,
    /// Secondary "wisdom" passages
    pub wisdom: Vec<ScoredEntry>,
    /// Thematically related extras not in the direct hit set
    pub related: Vec<ScoredEntry>,
    /// Every normalized hit, rank order preserved
    pub all_results: Vec<ScoredEntry>,
    /// Embedding used for the query, when the vector path was available
    pub query_embedding: Option<Vec<f32>>,
}

impl ScanResult {
    /// The well-defined empty result every failure path collapses to
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.all_results.is_empty()
    }

    /// Whether any candidate comes from a primary source
    pub fn has_primary(&self) -> bool {
        self.all_results
            .iter()
            .any(|r| r.entry.source == SourceKind::Primary)
    }
}

/// Derived signals from one synthesis pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Most dominant detected theme
    pub primary_theme: String,
    /// Dominant themes in importance order
    pub themes: Vec<String>,
    /// Extracted factual sentences
    pub key_facts: Vec<String>,
    /// Representative quotes
    pub quotes: Vec<String>,
    /// Evidence-derived confidence, clamped to [0, 1]
    pub confidence: f32,
    /// Theme-derived mood signal, clamped to [0, 1]
    pub mood_score: f32,
}

/// A synthesized answer: the analysis plus its rendered narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synthesis {
    pub analysis: Analysis,
    /// Narrative draft before persona rendering
    pub content: String,
}

/// One question/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub response: String,
}

/// Status tag attached to every pipeline reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Initializing,
    Empty,
    Error,
}

/// Final rendered response handed back across the conversation boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
}

impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: ReplyStatus::Ok,
        }
    }
}

/// Clamp a score into [lo, hi]
pub fn clamp(value: f32, lo: f32, hi: f32) -> f32 {
    value.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_round_trip() {
        for kind in [
            SourceKind::Primary,
            SourceKind::Secondary,
            SourceKind::Tertiary,
        ] {
            let parsed: SourceKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("scroll".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_empty_scan_result_shape() {
        let result = ScanResult::empty();
        assert!(result.verses.is_empty());
        assert!(result.wisdom.is_empty());
        assert!(result.related.is_empty());
        assert!(result.all_results.is_empty());
        assert!(result.query_embedding.is_none());
        assert!(!result.has_primary());
    }

    #[test]
    fn test_reference_defaults_to_empty() {
        let entry = CorpusEntry {
            id: "e1".into(),
            content: "text".into(),
            source: SourceKind::Secondary,
            tags: vec![],
            metadata: HashMap::new(),
            embedding: None,
        };
        assert_eq!(entry.reference(), "");
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(1.5, 0.1, 0.9), 0.9);
        assert_eq!(clamp(-1.0, 0.1, 0.9), 0.1);
        assert_eq!(clamp(0.5, 0.1, 0.9), 0.5);
    }
}
