//! Sibyl CLI
//!
//! Corpus ingest, index maintenance, and a conversational REPL.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sibyl::corpus::{CorpusConfig, CorpusStore};
use sibyl::embedding::{Embedder, HashedEmbedder};
use sibyl::pipeline::{Pipeline, PipelineConfig};
use sibyl::types::{NewEntry, ReplyStatus};

const EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Parser)]
#[command(name = "sibyl")]
#[command(about = "Themed-persona question answering over a fixed corpus")]
#[command(version)]
struct Cli {
    /// Database path
    #[arg(long, env = "SIBYL_DB_PATH", default_value = "sibyl.db")]
    db_path: String,

    /// Directory for per-user conversation archives; defaults to the
    /// platform data directory
    #[arg(long, env = "SIBYL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a JSON corpus file (array of entries)
    Populate {
        /// Path to the corpus JSON file
        path: PathBuf,
        /// Skip computing embeddings at ingest
        #[arg(long)]
        no_embeddings: bool,
    },
    /// Rebuild the thematic index
    RebuildIndex,
    /// Ask a single question
    Ask {
        question: String,
        /// User identifier for the conversation session
        #[arg(short, long, default_value = "cli")]
        user: String,
    },
    /// Interactive conversation
    Repl {
        #[arg(short, long, default_value = "cli")]
        user: String,
    },
    /// Show corpus statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| dirs::data_dir().map(|d| d.join("sibyl")));
    let index_cache = data_dir.as_ref().map(|d| d.join("index.json"));

    let store = Arc::new(
        CorpusStore::open(CorpusConfig {
            db_path: cli.db_path.clone(),
        })
        .context("failed to open corpus store")?,
    );
    let embedder = Arc::new(HashedEmbedder::new(EMBEDDING_DIMENSIONS));

    match cli.command {
        Commands::Populate {
            path,
            no_embeddings,
        } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut entries: Vec<NewEntry> =
                serde_json::from_str(&raw).context("corpus file must be a JSON array of entries")?;
            if !no_embeddings {
                for entry in &mut entries {
                    if entry.embedding.is_none() {
                        entry.embedding = embedder.embed(&entry.content).ok();
                    }
                }
            }
            let stored = store.populate(entries)?;
            println!("Stored {} new entries ({} total)", stored, store.count()?);
        }
        Commands::RebuildIndex => {
            let pipeline = pipeline(store, embedder, &data_dir);
            pipeline.rebuild_index()?;
            match &index_cache {
                Some(path) => {
                    pipeline.indexer().save(path)?;
                    println!("Thematic index rebuilt, cached at {}", path.display());
                }
                None => println!("Thematic index rebuilt"),
            }
        }
        Commands::Ask { question, user } => {
            let pipeline = pipeline(store, embedder, &data_dir);
            load_index_cache(&pipeline, &index_cache);
            let reply = pipeline.respond(&user, &question);
            print_reply(&reply.text, reply.status);
        }
        Commands::Repl { user } => {
            let pipeline = pipeline(store, embedder, &data_dir);
            load_index_cache(&pipeline, &index_cache);
            println!("Speak, and I shall answer. (exit with 'quit')");
            loop {
                print!("> ");
                io::stdout().flush()?;
                let mut line = String::new();
                if io::stdin().read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    let farewell = pipeline.respond(&user, line);
                    println!("{}", farewell.text);
                    break;
                }
                let reply = pipeline.respond(&user, line);
                print_reply(&reply.text, reply.status);
            }
        }
        Commands::Stats => {
            println!("Entries: {}", store.count()?);
            println!("Populated: {}", store.is_populated());
        }
    }

    Ok(())
}

/// Warm the thematic index from its serialized cache; a missing or stale
/// cache falls through to the on-demand rebuild
fn load_index_cache(pipeline: &Pipeline, index_cache: &Option<PathBuf>) {
    if let Some(path) = index_cache {
        pipeline.indexer().load(path);
    }
}

fn pipeline(
    store: Arc<CorpusStore>,
    embedder: Arc<HashedEmbedder>,
    data_dir: &Option<PathBuf>,
) -> Pipeline {
    let config = PipelineConfig {
        archive_dir: data_dir.clone(),
        ..Default::default()
    };
    Pipeline::new(store, embedder, config)
}

fn print_reply(text: &str, status: ReplyStatus) {
    match status {
        ReplyStatus::Ok => println!("{}", text),
        ReplyStatus::Initializing => println!("[initializing] {}", text),
        ReplyStatus::Empty => {}
        ReplyStatus::Error => eprintln!("{}", text),
    }
}
