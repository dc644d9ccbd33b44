//! Persona rendering
//!
//! Turns a synthesized answer into the persona's final voice. Template
//! pools are immutable configuration injected at construction; selection
//! uses a seeded RNG so tests are deterministic. Layering is append-only
//! and order-fixed: time-of-day phrase, then mood-tone wrapping, then
//! optional personalization.
//!
//! Also carries the reflex rules: a small regex-keyed table answering
//! greeting/identity/farewell prompts before the retrieval pipeline runs.

mod templates;

pub use templates::{PersonaConfig, Template, TemplatePool};

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::index::ThemeVocabulary;
use crate::mood::MoodTracker;
use crate::types::{ConversationTurn, ScanResult, Synthesis};

/// Voice register, decided by the evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    /// At least one candidate comes from a primary source
    InTradition,
    /// Secondary material only
    Universal,
}

/// Renders synthesized answers in the persona's voice
pub struct PersonaRenderer {
    config: PersonaConfig,
    vocabulary: ThemeVocabulary,
    rng: StdRng,
}

impl PersonaRenderer {
    pub fn new(config: PersonaConfig, vocabulary: ThemeVocabulary) -> Self {
        Self::with_seed(config, vocabulary, rand::random())
    }

    pub fn with_seed(config: PersonaConfig, vocabulary: ThemeVocabulary, seed: u64) -> Self {
        Self {
            config,
            vocabulary,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Check the reflex table before running the full pipeline
    pub fn reflex(&mut self, question: &str) -> Option<String> {
        let lowered = question.to_lowercase();
        for rule in self.config.reflex_rules() {
            if rule.pattern.is_match(&lowered) {
                return rule.responses.choose(&mut self.rng).cloned();
            }
        }
        None
    }

    /// Full rendering: template, time phrase, mood tone, personalization
    pub fn render(
        &mut self,
        synthesis: &Synthesis,
        scan: &ScanResult,
        context: &[ConversationTurn],
        mood: &mut MoodTracker,
    ) -> String {
        self.render_at(synthesis, scan, context, mood, Utc::now())
    }

    pub fn render_at(
        &mut self,
        synthesis: &Synthesis,
        scan: &ScanResult,
        context: &[ConversationTurn],
        mood: &mut MoodTracker,
        now: DateTime<Utc>,
    ) -> String {
        let body = self.compose(synthesis, scan);

        // Fixed layering order
        let timed = format!("{}\n{}", self.time_phrase(now), body);
        let toned = mood.adjust_tone(&timed);
        self.personalize(toned, context, mood)
    }

    /// Select a template and interpolate the synthesized content
    pub fn compose(&mut self, synthesis: &Synthesis, scan: &ScanResult) -> String {
        let voice = if scan.has_primary() {
            Voice::InTradition
        } else {
            Voice::Universal
        };
        let theme = &synthesis.analysis.primary_theme;
        let pool = self.config.pool_for(theme);
        let candidates = pool.templates(voice);

        // High confidence restricts the draw to assertive templates
        let assertive: Vec<&Template> = candidates.iter().filter(|t| t.assertive).collect();
        let chosen: Option<&Template> = if synthesis.analysis.confidence
            > self.config.confidence_threshold
            && !assertive.is_empty()
        {
            assertive.choose(&mut self.rng).copied()
        } else {
            candidates.choose(&mut self.rng)
        };

        let Some(template) = chosen else {
            debug!(theme, "no template available, emitting bare content");
            return synthesis.content.clone();
        };

        // Best-effort interpolation; absent references become empty strings
        let reference = scan
            .verses
            .first()
            .map(|v| v.entry.reference())
            .unwrap_or_default();
        template
            .text
            .replace("{body}", &synthesis.content)
            .replace("{reference}", &reference)
            .replace("{icon}", self.vocabulary.icon(theme))
    }

    fn time_phrase(&self, now: DateTime<Utc>) -> &str {
        if now.hour() < 12 {
            self.config.morning_phrase()
        } else {
            self.config.day_phrase()
        }
    }

    /// Optional closing touches: a previous-theme callback or a mood
    /// acknowledgement; both append-only
    fn personalize(
        &mut self,
        text: String,
        context: &[ConversationTurn],
        mood: &MoodTracker,
    ) -> String {
        let mut out = text;

        if let Some(previous) = context.iter().rev().find_map(|turn| {
            crate::scanner::keywords(&turn.question)
                .into_iter()
                .find(|w| self.vocabulary.get(w).is_some())
        }) {
            out.push_str(&format!(
                "\nYou asked before of {}; the thread continues.",
                previous
            ));
        } else if mood.mood() < 0.4 {
            out.push('\n');
            out.push_str(mood.describe());
        }

        out
    }
}
