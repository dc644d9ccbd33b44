//! Property-based tests for sibyl
//!
//! Verifies invariants that must hold for all inputs:
//! - a scan never panics and always yields the full four-list shape
//! - mood stays clamped and trigger weights behave as declared
//! - confidence is monotone and saturates below certainty
//! - text cleaning normalizes whitespace and strips citations
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

mod scan_properties {
    use super::*;
    use sibyl::corpus::CorpusStore;
    use sibyl::embedding::{Embedder, HashedEmbedder};
    use sibyl::index::ThematicIndexer;
    use sibyl::scanner::{ScanConfig, Scanner};
    use sibyl::types::{NewEntry, SourceKind};
    use std::sync::Arc;

    fn scanner() -> Scanner {
        let store = Arc::new(CorpusStore::open_in_memory().unwrap());
        let embedder = HashedEmbedder::new(64);
        for (text, source) in [
            ("The merciful one forgives all who repent.", SourceKind::Primary),
            ("Patience is bitter but its fruit is sweet.", SourceKind::Secondary),
        ] {
            store
                .insert(NewEntry {
                    content: text.to_string(),
                    source,
                    tags: vec![],
                    metadata: Default::default(),
                    embedding: embedder.embed(text).ok(),
                })
                .unwrap();
        }
        Scanner::new(
            store,
            Arc::new(HashedEmbedder::new(64)),
            Arc::new(ThematicIndexer::with_defaults()),
            ScanConfig::default(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Invariant: scan never panics, for any question text
        #[test]
        fn scan_never_panics(question in "\\PC{0,120}") {
            let scanner = scanner();
            let result = scanner.scan(&question, &[]);
            // The four list fields are always present; embedding is a
            // vector or absent
            prop_assert!(result.verses.len() <= 5);
            prop_assert!(result.wisdom.len() <= 3);
            prop_assert!(result.related.len() <= 5);
            if let Some(e) = &result.query_embedding {
                prop_assert!(!e.is_empty());
            }
        }

        /// Invariant: every categorized entry also appears in all_results
        #[test]
        fn categorized_entries_trace_to_all_results(question in "[a-zA-Z ]{1,60}") {
            let scanner = scanner();
            let result = scanner.scan(&question, &[]);
            for entry in result.verses.iter().chain(result.wisdom.iter()) {
                prop_assert!(result
                    .all_results
                    .iter()
                    .any(|r| r.entry.id == entry.entry.id));
            }
        }
    }
}

mod mood_properties {
    use super::*;
    use chrono::{Duration, Utc};
    use sibyl::mood::{MoodTracker, MOOD_CEILING, MOOD_FLOOR};

    proptest! {
        /// Invariant: mood stays within [0.1, 0.9] for any input sequence
        #[test]
        fn mood_always_clamped(messages in prop::collection::vec("\\PC{0,60}", 1..20)) {
            let mut tracker = MoodTracker::with_seed(1);
            let start = Utc::now();
            for (i, message) in messages.iter().enumerate() {
                tracker.update_at(message, start + Duration::minutes(i as i64));
                prop_assert!(tracker.mood() >= MOOD_FLOOR);
                prop_assert!(tracker.mood() <= MOOD_CEILING);
            }
        }

        /// Invariant: neutral text never moves mood away from neutral
        #[test]
        fn neutral_text_decays_toward_neutral(minutes in 1i64..600) {
            let mut tracker = MoodTracker::with_seed(1);
            let start = Utc::now();
            // Elevate first, then decay with trigger-free text
            tracker.update_at("peace joy love wisdom", start);
            let elevated = tracker.mood();
            tracker.update_at("an ordinary question", start + Duration::minutes(minutes));
            prop_assert!(tracker.mood() <= elevated);
            prop_assert!(tracker.mood() >= MOOD_FLOOR);
        }
    }

    #[test]
    fn negative_weight_exceeds_positive() {
        let now = Utc::now();
        let mut neutral = MoodTracker::with_seed(1);
        let mut positive = MoodTracker::with_seed(1);
        let mut negative = MoodTracker::with_seed(1);
        let mut mixed = MoodTracker::with_seed(1);

        neutral.update_at("an ordinary question", now);
        positive.update_at("what joy", now);
        negative.update_at("what pain", now);
        mixed.update_at("joy and pain together", now);

        assert!(positive.mood() > neutral.mood());
        assert!(negative.mood() < neutral.mood());
        // 0.07 down outweighs 0.05 up
        assert!(mixed.mood() < neutral.mood());
    }
}

mod synthesis_properties {
    use super::*;
    use sibyl::synthesis::{clean_text, confidence_for};

    proptest! {
        /// Invariant: cleaning never panics, collapses whitespace, and
        /// leaves no bracketed citations
        #[test]
        fn clean_text_normalized(text in "\\PC{0,200}") {
            let cleaned = clean_text(&text);
            prop_assert!(!cleaned.contains("  "));
            prop_assert!(!cleaned.starts_with(' '));
            prop_assert!(!cleaned.ends_with(' '));
            prop_assert!(!cleaned.contains('('));
        }

        /// Invariant: cleaned text has no bare chapter:verse references
        #[test]
        fn clean_text_strips_refs(a in 1u32..999, b in 1u32..999) {
            let text = format!("Remember {}:{} always", a, b);
            let cleaned = clean_text(&text);
            let reference = format!("{}:{}", a, b);
            prop_assert!(!cleaned.contains(&reference));
        }

        /// Invariant: confidence is monotone in evidence count, bounded by
        /// 0.95, and zero only for zero evidence
        #[test]
        fn confidence_monotone(n in 0usize..500) {
            let here = confidence_for(n);
            let next = confidence_for(n + 1);
            prop_assert!(next >= here);
            prop_assert!(here <= 0.95);
            if n > 0 {
                prop_assert!(here > 0.0);
            }
        }
    }
}

mod memory_properties {
    use super::*;
    use sibyl::memory::ConversationMemory;

    proptest! {
        /// Invariant: the recent window is the chronological tail of
        /// min(n, total) turns
        #[test]
        fn window_is_chronological_tail(total in 0usize..12, window in 1usize..6) {
            let mut memory = ConversationMemory::ephemeral("prop");
            for i in 0..total {
                memory.record(&format!("q{}", i), "r");
            }
            let recent = memory.recent(window);
            prop_assert_eq!(recent.len(), window.min(total));
            for (offset, turn) in recent.iter().enumerate() {
                let expected = total - recent.len() + offset;
                prop_assert_eq!(turn.question.clone(), format!("q{}", expected));
            }
        }
    }
}
