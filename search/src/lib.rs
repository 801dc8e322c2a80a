use anyhow::Result;
use devsearch_core::query::{QueryEngine, QueryOutcome};
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TOP_K: usize = 5;

pub enum Response {
    Done { query: String, outcome: QueryOutcome, took: Duration },
    TimedOut { query: String, after: Duration },
    Failed { query: String, error: String },
}

/// Runs queries against one opened index, each bounded by `timeout`.
pub struct SearchSession {
    engine: Arc<QueryEngine>,
    timeout: Duration,
}

impl SearchSession {
    pub fn new(engine: QueryEngine, timeout: Duration) -> Self {
        Self { engine: Arc::new(engine), timeout }
    }

    /// Shard loading, intersection and scoring run on the blocking pool. On
    /// expiry the answer is "no results", never a partial ranking.
    pub async fn query(&self, text: &str) -> Response {
        let engine = Arc::clone(&self.engine);
        let owned = text.to_string();
        run_with_timeout(text, self.timeout, move || engine.search(&owned)).await
    }
}

/// Run `search` on the blocking pool and wait at most `timeout` for it.
pub async fn run_with_timeout<F>(text: &str, timeout: Duration, search: F) -> Response
where
    F: FnOnce() -> Result<QueryOutcome> + Send + 'static,
{
    let start = Instant::now();
    let task = tokio::task::spawn_blocking(search);
    let query = text.to_string();
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(outcome))) => {
            let took = start.elapsed();
            tracing::debug!(%query, hits = outcome.hits().len(), took_ms = took.as_secs_f64() * 1000.0, "query answered");
            Response::Done { query, outcome, took }
        }
        Ok(Ok(Err(e))) => {
            tracing::error!(%query, error = %format!("{e:#}"), "query failed");
            Response::Failed { query, error: format!("{e:#}") }
        }
        Ok(Err(join)) => {
            tracing::error!(%query, error = %join, "query task aborted");
            Response::Failed { query, error: join.to_string() }
        }
        Err(_) => {
            tracing::warn!(%query, timeout_ms = timeout.as_millis() as u64, "query timed out");
            Response::TimedOut { query, after: timeout }
        }
    }
}

pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

/// Human-readable answer: a ranked URL list or an explicit zero-result reason.
pub fn render(response: &Response, top_k: usize) -> String {
    let mut out = String::new();
    match response {
        Response::Done { query, outcome, took } => match outcome {
            QueryOutcome::EmptyQuery => out.push_str("Please enter a valid query.\n"),
            QueryOutcome::ShardMissing { shard, .. } => {
                let _ = writeln!(out, "0 results found. (Index file for '{shard}' missing).");
            }
            QueryOutcome::TermNotFound { term } => {
                let _ = writeln!(out, "0 results found. (Word '{term}' not found in index).");
            }
            QueryOutcome::NoMatches => {
                let _ = writeln!(out, "\n--- Search Results ---");
                let _ = writeln!(out, "Query: '{query}'");
                let _ = writeln!(out, "Found 0 valid documents in {:.2} ms", took.as_secs_f64() * 1000.0);
                out.push_str("No documents contained ALL query terms.\n");
            }
            QueryOutcome::Hits(hits) => {
                let _ = writeln!(out, "\n--- Search Results ---");
                let _ = writeln!(out, "Query: '{query}'");
                let _ = writeln!(out, "Found {} valid documents in {:.2} ms", hits.len(), took.as_secs_f64() * 1000.0);
                let _ = writeln!(out, "\nTop {top_k} URLs:");
                for (i, hit) in hits.iter().take(top_k).enumerate() {
                    let url = hit.url.as_deref().unwrap_or("URL not found");
                    let _ = writeln!(out, "{}. {} (score {:.4})", i + 1, url, hit.score);
                }
                let _ = writeln!(out, "{}", "-".repeat(35));
            }
        },
        Response::TimedOut { after, .. } => {
            let _ = writeln!(out, "0 results found. (Query timed out after {} ms).", after.as_millis());
        }
        Response::Failed { error, .. } => {
            let _ = writeln!(out, "Search failed: {error}");
        }
    }
    out
}
