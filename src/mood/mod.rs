//! Mood tracking
//!
//! One decaying scalar emotional state per conversation, driven by lexical
//! sentiment triggers in the user's messages. Updating is a pure function
//! of (previous state, elapsed time, new input); no global coupling. The
//! tracker supplies tone modifiers to the renderer.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::types::clamp;

pub const MOOD_FLOOR: f32 = 0.1;
pub const MOOD_CEILING: f32 = 0.9;
pub const MOOD_BASELINE: f32 = 0.7;

const POSITIVE_DELTA: f32 = 0.05;
const NEGATIVE_DELTA: f32 = -0.07;

const POSITIVE_TRIGGERS: &[&str] = &[
    "peace", "joy", "thank", "wisdom", "love", "kind", "merciful", "heaven",
];
const NEGATIVE_TRIGGERS: &[&str] = &[
    "pain", "evil", "suffer", "hate", "death", "sin", "hell", "anger",
];

/// Tone phrase pools per mood band
struct TonePool {
    prefixes: &'static [&'static str],
    suffixes: &'static [&'static str],
}

const TONE_HIGH: TonePool = TonePool {
    prefixes: &["*brightly* ", "*with joy* "],
    suffixes: &[" *smiles*", " *eyes shine*"],
};
const TONE_MEDIUM: TonePool = TonePool {
    prefixes: &["*nods* ", ""],
    suffixes: &["", " *calm*"],
};
const TONE_LOW: TonePool = TonePool {
    prefixes: &["*softly* ", "*quietly* "],
    suffixes: &[" *sighs*", " *bows*"],
};

/// Serializable snapshot of the emotional state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodState {
    pub value: f32,
    pub history: Vec<(DateTime<Utc>, f32)>,
    pub last_update: DateTime<Utc>,
}

/// Decaying emotional state for one conversation
pub struct MoodTracker {
    mood: f32,
    history: Vec<(DateTime<Utc>, f32)>,
    last_update: DateTime<Utc>,
    rng: StdRng,
}

impl MoodTracker {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Seeded constructor for deterministic tone selection in tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            mood: MOOD_BASELINE,
            history: Vec::new(),
            last_update: Utc::now(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mood(&self) -> f32 {
        self.mood
    }

    pub fn state(&self) -> MoodState {
        MoodState {
            value: self.mood,
            history: self.history.clone(),
            last_update: self.last_update,
        }
    }

    /// Fold a new user message into the mood
    pub fn update(&mut self, text: &str) {
        self.update_at(text, Utc::now());
    }

    /// Clock-injected update
    ///
    /// Sentiment deltas are summed per trigger word; the previous mood is
    /// first decayed toward neutral based on elapsed wall time (floor at
    /// half weight after an hour), and the result clamped to [0.1, 0.9].
    pub fn update_at(&mut self, text: &str, now: DateTime<Utc>) {
        let lowered = text.to_lowercase();

        let mut delta = 0.0;
        for trigger in POSITIVE_TRIGGERS {
            if lowered.contains(trigger) {
                delta += POSITIVE_DELTA;
            }
        }
        for trigger in NEGATIVE_TRIGGERS {
            if lowered.contains(trigger) {
                delta += NEGATIVE_DELTA;
            }
        }

        let elapsed = (now - self.last_update).num_seconds().max(0) as f32;
        let decay = (1.0 - elapsed / 3600.0).max(0.5);

        self.mood = clamp(self.mood * decay + delta, MOOD_FLOOR, MOOD_CEILING);
        self.history.push((now, self.mood));
        self.last_update = now;
    }

    /// Fixed descriptive phrase for the current band
    pub fn describe(&self) -> &'static str {
        if self.mood > 0.8 {
            "*eyes bright* My heart is light with remembrance"
        } else if self.mood > 0.6 {
            "*calm demeanor* I am at peace"
        } else if self.mood > 0.4 {
            "*slight sigh* The weight of memory sits with me"
        } else {
            "*bowed head* The sorrows of the world weigh heavy"
        }
    }

    /// Wrap a response with band-appropriate prefix and suffix phrases
    pub fn adjust_tone(&mut self, response: &str) -> String {
        let pool = if self.mood > 0.75 {
            &TONE_HIGH
        } else if self.mood > 0.45 {
            &TONE_MEDIUM
        } else {
            &TONE_LOW
        };
        let prefix = pool.prefixes.choose(&mut self.rng).copied().unwrap_or("");
        let suffix = pool.suffixes.choose(&mut self.rng).copied().unwrap_or("");
        format!("{}{}{}", prefix, response, suffix)
    }
}

impl Default for MoodTracker {
    fn default() -> Self {
        Self::new()
    }
}
