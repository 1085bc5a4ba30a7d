//! `pcodex` - build and query the local retrieval index.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pcodex_core::config::resolve_with_base;
use pcodex_core::{Corpus, MarkdownChunker, Settings};
use pcodex_embed::embedder_from_config;
use pcodex_retrieve::{RetrievalResult, Retriever};
use pcodex_vector::IndexStore;

const LOG_TARGETS: &[&str] = &["pcodex", "pcodex_core", "pcodex_embed", "pcodex_vector", "pcodex_retrieve"];
const SNIPPET_CHARS: usize = 240;

#[derive(Parser)]
#[command(name = "pcodex", version, about = "Grounded retrieval over a folder of personal documents")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and embed the data directory, then atomically replace the index
    Build {
        #[arg(long)]
        data_dir: Option<String>,
        #[arg(long)]
        index_dir: Option<String>,
    },
    /// Retrieve evidence for a question
    Query {
        question: String,
        /// Number of hits (default: retrieval.top_k)
        #[arg(short)]
        k: Option<usize>,
        /// Weak-result threshold on the best similarity (default: retrieval.min_score)
        #[arg(long)]
        min_score: Option<f32>,
        /// Boost chunks whose source name contains this text
        #[arg(long)]
        priority: Option<String>,
        /// Also print the context block and citations
        #[arg(long)]
        context: bool,
        #[arg(long)]
        index_dir: Option<String>,
    },
    /// Show the active index generation
    Status {
        #[arg(long)]
        index_dir: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load().context("loading configuration")?;
    let base = std::env::current_dir().context("resolving working directory")?;

    match cli.command {
        Command::Build { data_dir, index_dir } => {
            let data_dir = data_dir.map_or_else(|| settings.data_dir(&base), |d| resolve_with_base(&base, d));
            build(&settings, &data_dir, &index_path(&settings, &base, index_dir))
        }
        Command::Query { question, k, min_score, priority, context, index_dir } => {
            let mut retrieval = settings.retrieval.clone();
            if priority.is_some() {
                retrieval.priority_source = priority;
            }
            let k = k.unwrap_or(retrieval.top_k);
            let min_score = min_score.unwrap_or(retrieval.min_score);
            let store = IndexStore::new(index_path(&settings, &base, index_dir));
            let index = store.load().context("loading index (run `pcodex build` first)")?;
            let embedder = embedder_from_config(&settings.embedding).context("loading embedder")?;
            let result = Retriever::new(embedder, retrieval).retrieve(&index, &question, k, min_score)?;
            print_result(&result, context);
            Ok(())
        }
        Command::Status { index_dir } => status(&index_path(&settings, &base, index_dir)),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = LOG_TARGETS.iter().map(|t| format!("{t}={level}")).collect::<Vec<_>>().join(",");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn index_path(settings: &Settings, base: &Path, flag: Option<String>) -> PathBuf {
    flag.map_or_else(|| settings.index_dir(base), |d| resolve_with_base(base, d))
}

fn build(settings: &Settings, data_dir: &Path, index_dir: &Path) -> Result<()> {
    let corpus = Corpus::load(data_dir, &settings.chunking.extensions)
        .with_context(|| format!("reading documents from {}", data_dir.display()))?;
    let embedder = embedder_from_config(&settings.embedding).context("loading embedder")?;
    let chunker = MarkdownChunker::new(settings.chunking.clone());
    let store = IndexStore::from_config(index_dir, &settings.index).with_batch_size(settings.embedding.batch_size);
    let index = store.build_corpus(embedder.as_ref(), &chunker, corpus.documents())?;
    info!(index_dir = %index_dir.display(), "build finished");

    println!(
        "Indexed {} chunks from {} documents ({}, {} dims)",
        index.len(),
        corpus.len(),
        index.embedder_id(),
        index.dim()
    );
    if let Some(generation) = index.generation() {
        println!("Generation: {generation}");
    }
    for (name, n) in index.chunk_counts() {
        println!("  {n:>4}  {name}");
    }
    Ok(())
}

fn status(index_dir: &Path) -> Result<()> {
    let status = IndexStore::new(index_dir).status().context("reading index status (run `pcodex build` first)")?;
    println!("Index:      {}", index_dir.display());
    println!("Generation: {}", status.generation);
    println!("Built at:   {}", status.built_at.to_rfc3339());
    println!("Embedder:   {} ({} dims)", status.embedder_id, status.dim);
    println!("Chunks:     {}", status.count);
    println!("Documents:");
    for doc in &status.documents {
        println!("  {:>4}  {}", doc.chunks, doc.name);
    }
    println!("Generations on disk: {}", status.generations.join(", "));
    Ok(())
}

fn print_result(result: &RetrievalResult, show_context: bool) {
    for (rank, hit) in result.hits.iter().enumerate() {
        println!("{}. {}  similarity={:.3} score={:.3}", rank + 1, hit.label(), hit.similarity, hit.score);
        println!("   {}", snippet(hit.text()));
    }
    println!(
        "confidence: top={:.3} mean={:.3} weak={}",
        result.confidence.top, result.confidence.mean, result.weak
    );
    if !result.suggestions.is_empty() {
        println!("suggested documents to expand: {}", result.suggestions.join(", "));
    }
    if let Some(hint) = result.missing_hint() {
        println!("{hint}");
    }
    if show_context && !result.is_empty() {
        println!("\n{}\n\n{}", result.context_block(), result.sources_footer());
    }
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let mut s: String = flat.chars().take(SNIPPET_CHARS).collect();
    s.push_str("...");
    s
}
