use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use devsearch_core::builder::{build_index, BuildConfig, OFFLOAD_THRESHOLD};
use devsearch_core::corpus::read_corpus;
use devsearch_core::merge::merge_index;
use devsearch_core::persist::IndexPaths;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build partial indexes from a crawled corpus and merge them into shards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the corpus and write partial indexes, the document map and metadata
    Build {
        /// Corpus root directory (searched recursively for .json documents)
        #[arg(long, default_value = "developer/DEV")]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Documents per partial index
        #[arg(long, default_value_t = OFFLOAD_THRESHOLD)]
        offload_threshold: usize,
    },
    /// Merge the partial indexes into per-character shards
    Merge {
        /// Index directory written by `build`
        #[arg(long, default_value = "./index")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, index, offload_threshold } => build(&input, &index, offload_threshold),
        Commands::Merge { index } => {
            let summary = merge_index(&IndexPaths::new(&index))?;
            println!(
                "merged {} partial indexes: {} terms, {} postings, {} shards ({} bytes)",
                summary.partials_read, summary.terms, summary.postings, summary.shards_written, summary.bytes_written
            );
            Ok(())
        }
    }
}

fn build(input: &str, index: &str, offload_threshold: usize) -> Result<()> {
    let root = Path::new(input);
    ensure!(root.is_dir(), "corpus directory {} not found", root.display());
    tracing::info!(input, index, offload_threshold, "starting indexing");

    let config = BuildConfig { offload_threshold, ..BuildConfig::default() };
    let meta = build_index(IndexPaths::new(index), read_corpus(root), config)?;
    println!("Total documents indexed: {}", meta.num_docs);
    println!("Partial indexes created: {}", meta.partial_indexes);
    println!("Total unique tokens: {}", meta.unique_terms);
    println!("Bytes written: {}", meta.bytes_written);
    Ok(())
}
