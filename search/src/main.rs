use anyhow::{Context, Result};
use clap::Parser;
use devsearch_core::persist::IndexPaths;
use devsearch_core::query::QueryEngine;
use search::{is_quit, render, SearchSession, DEFAULT_TOP_K};
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search")]
#[command(about = "Interactive boolean AND search over a merged index")]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Number of URLs to display per query
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    /// Per-query time limit in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    println!("Loading Document Map into memory...");
    let engine = QueryEngine::open(IndexPaths::new(&args.index))
        .with_context(|| format!("opening index at {}; run `indexer build` and `indexer merge` first", args.index))?;
    let session = SearchSession::new(engine, Duration::from_millis(args.timeout_ms));

    println!("\nSearch Engine Ready (Type 'quit' to exit)");
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        stdout.write_all(b"\nEnter search query: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        if is_quit(&line) {
            break;
        }
        let response = session.query(&line).await;
        stdout.write_all(render(&response, args.top_k).as_bytes()).await?;
    }
    Ok(())
}
