//! Fixed theme vocabulary
//!
//! Each theme is a name, a set of seed keywords used for index rebuilds
//! and related-passage lookup, and a display icon for the renderer.

use serde::{Deserialize, Serialize};

/// A named topical bucket with seed keywords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub keywords: Vec<String>,
    pub icon: String,
}

impl Theme {
    pub fn new(name: &str, keywords: &[&str], icon: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            icon: icon.to_string(),
        }
    }

    /// Search query built from the theme name and its seeds
    pub fn seed_query(&self) -> String {
        let mut terms = vec![self.name.clone()];
        terms.extend(self.keywords.iter().cloned());
        terms.join(" ")
    }

    /// Whether a lowercased word belongs to this theme
    pub fn matches(&self, word: &str) -> bool {
        self.name == word || self.keywords.iter().any(|k| k == word)
    }
}

/// The fixed working vocabulary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeVocabulary {
    themes: Vec<Theme>,
}

impl Default for ThemeVocabulary {
    fn default() -> Self {
        Self {
            themes: vec![
                Theme::new(
                    "mercy",
                    &["forgive", "compassion", "kindness", "pardon", "merciful"],
                    "🕊",
                ),
                Theme::new(
                    "comfort",
                    &["lonely", "sad", "ease", "distress", "anxiety", "peace"],
                    "🌙",
                ),
                Theme::new(
                    "prophets",
                    &["muhammad", "isa", "musa", "abraham", "david", "solomon"],
                    "📜",
                ),
                Theme::new(
                    "prayer",
                    &["supplication", "dua", "worship", "invocation"],
                    "🤲",
                ),
                Theme::new(
                    "patience",
                    &["perseverance", "steadfast", "endurance", "trials"],
                    "⏳",
                ),
            ],
        }
    }
}

impl ThemeVocabulary {
    pub fn new(themes: Vec<Theme>) -> Self {
        Self { themes }
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.name == name)
    }

    /// Theme names a lowercased keyword maps to
    pub fn themes_for_keyword(&self, word: &str) -> Vec<&Theme> {
        self.themes.iter().filter(|t| t.matches(word)).collect()
    }

    /// Icon for a theme, blank marker when the theme is unknown
    pub fn icon(&self, name: &str) -> &str {
        self.get(name).map(|t| t.icon.as_str()).unwrap_or("✦")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vocabulary_shape() {
        let vocab = ThemeVocabulary::default();
        assert_eq!(vocab.themes().len(), 5);
        assert!(vocab.get("mercy").is_some());
        assert!(vocab.get("astronomy").is_none());
    }

    #[test]
    fn test_keyword_lookup() {
        let vocab = ThemeVocabulary::default();
        let themes = vocab.themes_for_keyword("forgive");
        assert_eq!(themes.len(), 1);
        assert_eq!(themes[0].name, "mercy");

        assert!(vocab.themes_for_keyword("spacecraft").is_empty());
        // Theme names match themselves
        assert_eq!(vocab.themes_for_keyword("patience")[0].name, "patience");
    }

    #[test]
    fn test_seed_query_contains_name_and_seeds() {
        let vocab = ThemeVocabulary::default();
        let q = vocab.get("prayer").unwrap().seed_query();
        assert!(q.contains("prayer"));
        assert!(q.contains("supplication"));
    }

    #[test]
    fn test_unknown_icon_falls_back() {
        let vocab = ThemeVocabulary::default();
        assert_eq!(vocab.icon("unknown"), "✦");
    }
}
