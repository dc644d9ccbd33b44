//! Conversation pipeline
//!
//! The outermost boundary: memory supplies context, the scanner retrieves
//! and organizes candidates, the synthesizer drafts content, the mood
//! tracker adjusts tone, the persona renderer emits final text, and memory
//! records the exchange. Nothing inside a turn is allowed to escape as an
//! error: the worst case is a fixed in-persona apology, and every turn,
//! failed ones included, is recorded.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::corpus::CorpusStore;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::ThematicIndexer;
use crate::memory::ConversationMemory;
use crate::mood::MoodTracker;
use crate::persona::{PersonaConfig, PersonaRenderer};
use crate::scanner::{ScanConfig, Scanner};
use crate::synthesis::{SynthesisConfig, Synthesizer};
use crate::types::{Reply, ReplyStatus};

const INITIALIZING_REPLY: &str = "*clay crumbles* I am still waking up...";
const APOLOGY_REPLY: &str = "*dust falls* My knowledge fails me... ask me again, gently.";

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Directory for per-user conversation archives; in-process only when
    /// unset
    pub archive_dir: Option<PathBuf>,
    /// Seed for per-session RNGs; random when unset
    pub seed: Option<u64>,
    pub scan: ScanConfig,
    pub synthesis: SynthesisConfig,
    pub persona: Option<PersonaConfig>,
}

struct Session {
    mood: MoodTracker,
    memory: ConversationMemory,
    renderer: PersonaRenderer,
}

/// End-to-end question answering pipeline
///
/// Sessions are owned per user; the corpus store and thematic index are the
/// only shared state, both read-mostly.
pub struct Pipeline {
    store: Arc<CorpusStore>,
    indexer: Arc<ThematicIndexer>,
    embedder: Arc<dyn Embedder>,
    scanner: Scanner,
    synthesizer: Synthesizer,
    sessions: DashMap<String, Session>,
    config: PipelineConfig,
    rebuild_attempted: AtomicBool,
}

impl Pipeline {
    pub fn new(
        store: Arc<CorpusStore>,
        embedder: Arc<dyn Embedder>,
        config: PipelineConfig,
    ) -> Self {
        let indexer = Arc::new(ThematicIndexer::with_defaults());
        let scanner = Scanner::new(
            store.clone(),
            embedder.clone(),
            indexer.clone(),
            config.scan.clone(),
        );
        let synthesizer = Synthesizer::new(
            indexer.vocabulary().clone(),
            config.synthesis.clone(),
        );
        Self {
            store,
            indexer,
            embedder,
            scanner,
            synthesizer,
            sessions: DashMap::new(),
            config,
            rebuild_attempted: AtomicBool::new(false),
        }
    }

    pub fn indexer(&self) -> &ThematicIndexer {
        &self.indexer
    }

    /// Rebuild the thematic index now; used at startup and by maintenance
    pub fn rebuild_index(&self) -> Result<()> {
        self.indexer.rebuild(&self.store, self.embedder.as_ref())
    }

    /// Answer one user message
    pub fn respond(&self, user_id: &str, text: &str) -> Reply {
        let question = text.trim();
        if question.is_empty() {
            return Reply {
                text: String::new(),
                status: ReplyStatus::Empty,
            };
        }

        // The pipeline tolerates being asked before the corpus is ready
        if !self.store.is_populated() {
            return Reply {
                text: INITIALIZING_REPLY.to_string(),
                status: ReplyStatus::Initializing,
            };
        }
        self.ensure_index();

        let mut session = self.session(user_id);
        let Session {
            mood,
            memory,
            renderer,
        } = &mut *session;

        mood.update(question);

        // Reflex rules answer identity/greeting prompts without retrieval
        if let Some(reflex) = renderer.reflex(question) {
            memory.record(question, &reflex);
            return Reply::ok(reflex);
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let context = memory.context().to_vec();
            let scan = self.scanner.scan(question, &context);
            let synthesis = self.synthesizer.blend(&scan);
            renderer.render(&synthesis, &scan, &context, mood)
        }));

        let reply = match outcome {
            Ok(text) => Reply::ok(text),
            Err(_) => {
                error!(user = user_id, "pipeline fault, emitting apology");
                Reply {
                    text: APOLOGY_REPLY.to_string(),
                    status: ReplyStatus::Error,
                }
            }
        };

        memory.record(question, &reply.text);
        reply
    }

    /// Recent turns for a user, empty when no session exists yet
    pub fn recent_turns(&self, user_id: &str, n: usize) -> Vec<crate::types::ConversationTurn> {
        self.sessions
            .get(user_id)
            .map(|s| s.memory.recent(n).to_vec())
            .unwrap_or_default()
    }

    /// Attempt an on-demand rebuild when the index is empty at query time;
    /// failure degrades theme-scoped features silently
    fn ensure_index(&self) {
        if self.indexer.is_built() {
            return;
        }
        if self.rebuild_attempted.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("thematic index unbuilt, attempting on-demand rebuild");
        if let Err(e) = self.rebuild_index() {
            warn!(error = %e, "on-demand index rebuild failed, degrading to non-thematic search");
        }
    }

    fn session(&self, user_id: &str) -> dashmap::mapref::one::RefMut<'_, String, Session> {
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| self.create_session(user_id))
    }

    fn create_session(&self, user_id: &str) -> Session {
        let memory = match &self.config.archive_dir {
            Some(dir) => ConversationMemory::open(user_id, dir).unwrap_or_else(|e| {
                warn!(user = user_id, error = %e, "archive unavailable, using ephemeral memory");
                ConversationMemory::ephemeral(user_id)
            }),
            None => ConversationMemory::ephemeral(user_id),
        };
        let persona = self.config.persona.clone().unwrap_or_default();
        let vocabulary = self.indexer.vocabulary().clone();
        let (mood, renderer) = match self.config.seed {
            Some(seed) => (
                MoodTracker::with_seed(seed),
                PersonaRenderer::with_seed(persona, vocabulary, seed),
            ),
            None => (MoodTracker::new(), PersonaRenderer::new(persona, vocabulary)),
        };
        Session {
            mood,
            memory,
            renderer,
        }
    }
}
