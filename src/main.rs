//! Command-line lookup against a JSON translation-memory corpus.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use tm_match::{InMemoryStore, MatchConfig, MatchQuery, TranslationMemory};

#[derive(Debug, Parser)]
#[command(name = "tm-match", about = "Find reusable translations for a source string")]
struct Args {
    /// Corpus file: {"version": n, "entries": [...]}
    #[arg(long)]
    corpus: PathBuf,

    /// Optional JSON file overriding match settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target language code, e.g. "fr".
    #[arg(long)]
    lang: String,

    #[arg(long)]
    context: Option<String>,

    #[arg(long)]
    category: Option<String>,

    /// Maximum number of fuzzy matches to print.
    #[arg(long)]
    limit: Option<usize>,

    /// Source text to look up.
    query: String,
}

#[tokio::main]
async fn main() {
    tm_match::init_tracing();
    if let Err(e) = run(Args::parse()).await {
        error!(error = %e, "lookup failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => MatchConfig::load_from_file(path)?,
        None => MatchConfig::default(),
    };
    let store = Arc::new(InMemoryStore::load_from_file(&args.corpus)?);
    let corpus_version = store.version();
    let limit = args.limit.unwrap_or(config.max_fuzzy_results);
    let memory = TranslationMemory::new(config, store)?;

    let mut query = MatchQuery::new(args.query, args.lang);
    query.context = args.context;
    query.category = args.category;

    let matches = memory.find_fuzzy_matches(&query, limit).await?;
    let candidates: Vec<serde_json::Value> = matches
        .iter()
        .map(|m| {
            serde_json::json!({
                "candidate": m,
                "auto_accept": memory.should_auto_accept(m),
            })
        })
        .collect();
    info!(matches = candidates.len(), corpus_version, "lookup complete");

    let report = serde_json::json!({
        "corpus_version": corpus_version,
        "matches": candidates,
        "cache": memory.cache_stats(),
        "timings_us": memory.metrics().summary(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
