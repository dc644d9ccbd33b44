//! Conversation memory
//!
//! Append-only per-user transcript: an unbounded archival log on disk
//! (JSONL, one turn per line) plus a bounded recent-context window fed back
//! into the scanner and renderer. Archive write failures are logged and
//! never fatal; the in-process transcript keeps working.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::types::ConversationTurn;

/// Default recent-context window size
pub const CONTEXT_WINDOW: usize = 3;

/// Ordered, append-only conversation transcript for one user
pub struct ConversationMemory {
    user_id: String,
    turns: Vec<ConversationTurn>,
    archive_path: Option<PathBuf>,
}

impl ConversationMemory {
    /// In-process only transcript (no archive)
    pub fn ephemeral(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            turns: Vec::new(),
            archive_path: None,
        }
    }

    /// Transcript backed by a JSONL archive under `archive_dir`
    ///
    /// Existing archived turns are loaded so context survives restarts.
    pub fn open(user_id: &str, archive_dir: &Path) -> Result<Self> {
        fs::create_dir_all(archive_dir)?;
        let archive_path = archive_dir.join(format!("{}.jsonl", sanitize(user_id)));
        let turns = load_archive(&archive_path);
        Ok(Self {
            user_id: user_id.to_string(),
            turns,
            archive_path: Some(archive_path),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Append one exchange; archives best-effort
    pub fn record(&mut self, question: &str, response: &str) {
        let turn = ConversationTurn {
            timestamp: Utc::now(),
            question: question.to_string(),
            response: response.to_string(),
        };
        if let Some(path) = &self.archive_path {
            if let Err(e) = append_archive(path, &turn) {
                warn!(user = %self.user_id, error = %e, "conversation archive write failed");
            }
        }
        self.turns.push(turn);
    }

    /// The last min(n, total) turns in chronological order
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// The bounded context window fed to the scanner
    pub fn context(&self) -> &[ConversationTurn] {
        self.recent(CONTEXT_WINDOW)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

fn append_archive(path: &Path, turn: &ConversationTurn) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(turn)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// Load archived turns, skipping lines that fail to parse
fn load_archive(path: &Path) -> Vec<ConversationTurn> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };
    BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect()
}

/// Keep user ids filesystem-safe
fn sanitize(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
