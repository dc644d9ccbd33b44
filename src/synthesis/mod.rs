//! Synthesizer: candidate reduction and narrative drafting
//!
//! Reduces a scan's candidate set to one structured analysis (dominant
//! themes, key facts, representative quotes, confidence, mood signal) and
//! renders it into a single narrative draft. Every sub-step is failure
//! tolerant: a degenerate input yields a degraded default, never an abort.

use chrono::{DateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::index::ThemeVocabulary;
use crate::types::{clamp, Analysis, ScanResult, ScoredEntry, SourceKind, Synthesis};

// Bracketed citations, bare chapter:verse references, stray punctuation -
// one alternation, one pass
static NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\b\d+:\d+\b|[^\w\s.,;!?']").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”"#).unwrap());

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "for", "are", "was", "his", "her", "they", "them",
    "their", "who", "which", "have", "has", "had", "not", "but", "from", "all", "you", "your",
    "shall", "unto", "upon", "will", "what", "when", "then", "there",
];

/// Synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Distinctive terms reported as themes
    pub theme_limit: usize,
    /// Cleaned texts considered for fact extraction
    pub fact_candidates: usize,
    /// Minimum sentence length for a key fact, in characters
    pub fact_min_len: usize,
    pub facts_limit: usize,
    pub quotes_limit: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            theme_limit: 5,
            fact_candidates: 10,
            fact_min_len: 20,
            facts_limit: 5,
            quotes_limit: 4,
        }
    }
}

/// Optional summarization collaborator
///
/// Used best-effort when configured; the synthesizer works without it.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> crate::error::Result<String>;
    fn extract_keywords(&self, text: &str) -> crate::error::Result<Vec<String>>;
}

/// Reduces candidate sets to synthesized answers
pub struct Synthesizer {
    vocabulary: ThemeVocabulary,
    config: SynthesisConfig,
    summarizer: Option<Box<dyn Summarizer>>,
}

impl Synthesizer {
    pub fn new(vocabulary: ThemeVocabulary, config: SynthesisConfig) -> Self {
        Self {
            vocabulary,
            config,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Blend a scan into one analysis plus narrative draft
    pub fn blend(&self, scan: &ScanResult) -> Synthesis {
        self.blend_at(scan, Utc::now())
    }

    /// Clock-injected variant for deterministic tests
    pub fn blend_at(&self, scan: &ScanResult, now: DateTime<Utc>) -> Synthesis {
        if scan.is_empty() {
            return Self::contemplation();
        }

        let cleaned: Vec<String> = scan
            .all_results
            .iter()
            .map(|r| clean_text(&r.entry.content))
            .filter(|t| !t.is_empty())
            .collect();

        let themes = self.dominant_themes(&cleaned);
        let key_facts = self.extract_key_facts(&cleaned);
        let quotes = self.extract_quotes(&scan.all_results);

        let confidence = confidence_for(scan.all_results.len());
        let mood_score = self.mood_score(&themes);

        let analysis = Analysis {
            primary_theme: themes
                .first()
                .cloned()
                .unwrap_or_else(|| "divine wisdom".to_string()),
            themes,
            key_facts,
            quotes,
            confidence,
            mood_score,
        };
        let content = self.render_narrative(&analysis, now);

        Synthesis { analysis, content }
    }

    /// The fixed answer when retrieval produced nothing
    fn contemplation() -> Synthesis {
        Synthesis {
            analysis: Analysis {
                primary_theme: "default".to_string(),
                themes: vec![],
                key_facts: vec![],
                quotes: vec![],
                confidence: 0.0,
                mood_score: 0.5,
            },
            content: "I need more time to contemplate this question".to_string(),
        }
    }

    /// Term-importance ranking over cleaned texts; fixed labels when the
    /// input is degenerate
    fn dominant_themes(&self, texts: &[String]) -> Vec<String> {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let mut seen = std::collections::HashSet::new();
            for word in text.to_lowercase().split(|c: char| !c.is_alphabetic()) {
                if word.len() <= 3 || STOPWORDS.contains(&word) {
                    continue;
                }
                *term_freq.entry(word.to_string()).or_insert(0) += 1;
                if seen.insert(word.to_string()) {
                    *doc_freq.entry(word.to_string()).or_insert(0) += 1;
                }
            }
        }

        if term_freq.is_empty() {
            return vec!["divine wisdom".to_string(), "sacred knowledge".to_string()];
        }

        // Terms appearing across documents outrank one-off repetitions
        let mut ranked: Vec<(String, f32)> = term_freq
            .into_iter()
            .map(|(term, tf)| {
                let df = doc_freq.get(&term).copied().unwrap_or(1) as f32;
                let weight = tf as f32 * (1.0 + df.ln());
                (term, weight)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        // Seed-keyword hits are promoted to their theme name
        let mut themes = Vec::new();
        for (term, _) in ranked {
            let label = self
                .vocabulary
                .themes_for_keyword(&term)
                .first()
                .map(|t| t.name.clone())
                .unwrap_or(term);
            if !themes.contains(&label) {
                themes.push(label);
            }
            if themes.len() >= self.config.theme_limit {
                break;
            }
        }
        themes
    }

    /// First sentence of each leading cleaned text, length-filtered
    fn extract_key_facts(&self, texts: &[String]) -> Vec<String> {
        texts
            .iter()
            .take(self.config.fact_candidates)
            .filter_map(|text| {
                let first = text
                    .split(['.', '!', '?'])
                    .next()
                    .unwrap_or_default()
                    .trim();
                (first.len() > self.config.fact_min_len).then(|| first.to_string())
            })
            .take(self.config.facts_limit)
            .collect()
    }

    /// Primary sources quote in full; others contribute quoted substrings
    fn extract_quotes(&self, results: &[ScoredEntry]) -> Vec<String> {
        let mut quotes = Vec::new();
        for result in results {
            if result.entry.source == SourceKind::Primary {
                let cleaned = clean_text(&result.entry.content);
                if !cleaned.is_empty() {
                    quotes.push(cleaned);
                }
            } else {
                for capture in QUOTED_RE.captures_iter(&result.entry.content) {
                    if let Some(q) = capture.get(1).or_else(|| capture.get(2)) {
                        quotes.push(q.as_str().to_string());
                    }
                }
            }
            if quotes.len() >= self.config.quotes_limit {
                break;
            }
        }
        quotes.truncate(self.config.quotes_limit);
        quotes
    }

    /// Neutral baseline, nudged upward when a comfort or mercy theme is
    /// present
    fn mood_score(&self, themes: &[String]) -> f32 {
        let uplifting = themes
            .iter()
            .any(|t| t == "mercy" || t == "comfort");
        clamp(if uplifting { 0.7 } else { 0.5 }, 0.0, 1.0)
    }

    /// Fixed ordered skeleton; opener and closer always emit
    fn render_narrative(&self, analysis: &Analysis, now: DateTime<Utc>) -> String {
        let mut lines = vec![
            if now.hour() < 12 {
                "As the morning light reveals..."
            } else {
                "As the day unfolds..."
            }
            .to_string(),
            "*kneads clay thoughtfully* The scriptures speak of this matter...".to_string(),
        ];

        if !analysis.themes.is_empty() {
            let listed = analysis
                .themes
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("The primary wisdom concerns {}.", listed));
        }

        if !analysis.key_facts.is_empty() {
            lines.push("*shapes words in clay* Know these truths:".to_string());
            lines.extend(analysis.key_facts.iter().take(3).map(|f| format!("- {}", f)));
        }

        if !analysis.quotes.is_empty() {
            lines.push("*etches sacred words* Remember these teachings:".to_string());
            lines.extend(analysis.quotes.iter().take(2).map(|q| format!("* '{}'", q)));
        }

        if let Some(summarizer) = &self.summarizer {
            let body = lines.join(" ");
            if let Ok(summary) = summarizer.summarize(&body) {
                if !summary.is_empty() && summary.len() < body.len() {
                    lines.push(format!("In brief: {}", summary));
                }
            }
        }

        lines.push("*brushes hands* Thus is wisdom preserved across the ages.".to_string());
        lines.join("\n")
    }
}

/// Strip bracketed citations, bare chapter:verse references and stray
/// punctuation, then collapse whitespace
pub fn clean_text(text: &str) -> String {
    let text = NOISE_RE.replace_all(text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Confidence as a saturating function of evidence count
///
/// More corroborating evidence raises confidence but never to certainty.
pub fn confidence_for(count: usize) -> f32 {
    if count == 0 {
        return 0.0;
    }
    clamp((0.8 + count as f32 / 30.0).min(0.95), 0.0, 1.0)
}
