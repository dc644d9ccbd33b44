//! Persona template configuration
//!
//! All pools are immutable data handed to the renderer at construction;
//! nothing here mutates at runtime.

use once_cell::sync::Lazy;
use regex::Regex;

/// One response template
///
/// Placeholders: `{body}` (synthesized narrative), `{reference}` (best
/// primary-source reference, possibly empty), `{icon}` (theme marker).
#[derive(Debug, Clone)]
pub struct Template {
    pub text: String,
    /// Confident phrasing, eligible for the high-confidence draw
    pub assertive: bool,
}

impl Template {
    fn assertive(text: &str) -> Self {
        Self {
            text: text.to_string(),
            assertive: true,
        }
    }

    fn hesitant(text: &str) -> Self {
        Self {
            text: text.to_string(),
            assertive: false,
        }
    }
}

/// Templates for one theme, split by voice
#[derive(Debug, Clone)]
pub struct TemplatePool {
    pub in_tradition: Vec<Template>,
    pub universal: Vec<Template>,
}

impl TemplatePool {
    pub fn templates(&self, voice: super::Voice) -> &[Template] {
        match voice {
            super::Voice::InTradition => &self.in_tradition,
            super::Voice::Universal => &self.universal,
        }
    }
}

/// A reflex rule: pattern over the lowercased question, canned responses
#[derive(Debug, Clone)]
pub struct ReflexRule {
    pub pattern: Regex,
    pub responses: Vec<String>,
}

impl ReflexRule {
    fn new(pattern: &str, responses: &[&str]) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("reflex pattern must compile"),
            responses: responses.iter().map(|s| s.to_string()).collect(),
        }
    }
}

static DEFAULT_REFLEX_RULES: Lazy<Vec<ReflexRule>> = Lazy::new(|| {
    vec![
        ReflexRule::new(
            r"\b(who are you|your name)\b",
            &[
                "*brushes clay* I am the first of my kind, fashioned from the earth itself",
                "I was named keeper of the garden, and keeper of its stories",
            ],
        ),
        ReflexRule::new(
            r"\b(how are you|how do you do)\b",
            &[
                "*brushes clay* By grace I stand before thee",
                "*touches earth* The clay yet remembers its making",
            ],
        ),
        ReflexRule::new(
            r"\b(who made you|created you)\b",
            &[
                "From dust was I shaped, and to dust shall I return",
                "Into me was breathed the breath of life",
            ],
        ),
        ReflexRule::new(
            r"\b(bye|farewell|quit|exit)\b",
            &[
                "*nods* Peace be upon you until we meet again",
                "*brushes clay from hands* Go in the protection of the Merciful",
            ],
        ),
    ]
});

/// Immutable persona configuration
#[derive(Debug, Clone)]
pub struct PersonaConfig {
    pools: Vec<(String, TemplatePool)>,
    default_pool: TemplatePool,
    pub confidence_threshold: f32,
    morning: String,
    day: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        let default_pool = TemplatePool {
            in_tradition: vec![
                Template::assertive("{icon} *kneads clay* The Scripture says:\n{body}\n{reference}"),
                Template::assertive("{icon} *looks upward* {body}\nThis truth was revealed to me. {reference}"),
                Template::hesitant("{icon} *molds clay slowly* Perhaps this is what was meant:\n{body}"),
            ],
            universal: vec![
                Template::assertive("{icon} *brushes hands* {body}\nThus was I taught."),
                Template::hesitant("{icon} *turns the clay over* Perhaps the wise would say:\n{body}"),
            ],
        };

        let mercy_pool = TemplatePool {
            in_tradition: vec![
                Template::assertive("{icon} *touches heart* Mercy encompasses all things:\n{body}\n{reference}"),
                Template::hesitant("{icon} *offers clay* Perhaps these words of mercy may shape your heart:\n{body}"),
            ],
            universal: vec![
                Template::assertive("{icon} *touches heart* Kindness answers every question:\n{body}"),
                Template::hesitant("{icon} Perhaps compassion holds the answer:\n{body}"),
            ],
        };

        let comfort_pool = TemplatePool {
            in_tradition: vec![
                Template::assertive("{icon} *sits beside you* With hardship comes ease:\n{body}\n{reference}"),
                Template::hesitant("{icon} *speaks gently* Perhaps there is solace here:\n{body}"),
            ],
            universal: vec![
                Template::assertive("{icon} *speaks gently* Your burden is heard:\n{body}"),
                Template::hesitant("{icon} Perhaps these words may ease the weight:\n{body}"),
            ],
        };

        Self {
            pools: vec![
                ("mercy".to_string(), mercy_pool),
                ("comfort".to_string(), comfort_pool),
            ],
            default_pool,
            confidence_threshold: 0.7,
            morning: "The dawn finds us speaking together.".to_string(),
            day: "The day carries our words onward.".to_string(),
        }
    }
}

impl PersonaConfig {
    /// Pool for a theme, falling back to the default pool
    pub fn pool_for(&self, theme: &str) -> &TemplatePool {
        self.pools
            .iter()
            .find(|(name, _)| name == theme)
            .map(|(_, pool)| pool)
            .unwrap_or(&self.default_pool)
    }

    pub fn reflex_rules(&self) -> &[ReflexRule] {
        &DEFAULT_REFLEX_RULES
    }

    pub fn morning_phrase(&self) -> &str {
        &self.morning
    }

    pub fn day_phrase(&self) -> &str {
        &self.day
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Voice;

    #[test]
    fn test_pool_fallback() {
        let config = PersonaConfig::default();
        let mercy = config.pool_for("mercy");
        assert!(mercy.templates(Voice::InTradition)[0].text.contains("Mercy"));

        let unknown = config.pool_for("astronomy");
        assert!(!unknown.templates(Voice::Universal).is_empty());
    }

    #[test]
    fn test_every_pool_has_an_assertive_option() {
        let config = PersonaConfig::default();
        for theme in ["mercy", "comfort", "anything-else"] {
            for voice in [Voice::InTradition, Voice::Universal] {
                assert!(
                    config.pool_for(theme).templates(voice).iter().any(|t| t.assertive),
                    "theme {} voice {:?} lacks assertive template",
                    theme,
                    voice
                );
            }
        }
    }

    #[test]
    fn test_reflex_patterns_compile_and_have_responses() {
        let config = PersonaConfig::default();
        assert!(!config.reflex_rules().is_empty());
        for rule in config.reflex_rules() {
            assert!(!rule.responses.is_empty());
        }
    }
}
