//! Cache-backed summarizer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use super::{AiPrompts, Summarizer};
use crate::cache::{CacheKey, SummaryCache};
use crate::errors::SummarizeError;

/// Wraps a [`Summarizer`] with a shared [`SummaryCache`] keyed on
/// `(context, content)`.
///
/// Prompts are not part of the key: a stored summary is reused even if a
/// later request asks with different prompts.
pub struct CachedSummarizer<S> {
    inner: S,
    cache: Arc<SummaryCache>,
    calls: AtomicU64,
    debug_dir: Option<PathBuf>,
}

impl<S: Summarizer> CachedSummarizer<S> {
    pub fn new(inner: S, cache: Arc<SummaryCache>) -> Self {
        Self {
            inner,
            cache,
            calls: AtomicU64::new(0),
            debug_dir: None,
        }
    }

    /// Write every upstream prompt/response pair to `dir/summary_{n}.txt`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Number of upstream calls made (cache misses that reached `inner`).
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    async fn call_upstream(
        &self,
        context: &str,
        content: &str,
        prompts: &AiPrompts,
    ) -> Result<String, SummarizeError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        info!(call, context_len = context.len(), "Calling summarization API");

        let summary = self
            .inner
            .summarize(context, content, prompts)
            .await
            .inspect_err(|e| {
                if let SummarizeError::RateLimited { retry_after } = e {
                    warn!(call, ?retry_after, "Summarization rate limited");
                }
            })?;

        if let Some(dir) = &self.debug_dir {
            if let Err(e) = write_debug_file(dir, call, context, content, &summary).await {
                warn!(error = %e, "Failed to write summary debug file");
            }
        }
        Ok(summary)
    }
}

async fn write_debug_file(
    dir: &Path,
    call: u64,
    context: &str,
    content: &str,
    summary: &str,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("summary_{}.txt", call));
    let body = format!(
        "Context:\n{}\n\nMessages:\n{}\n\nSummary:\n{}",
        context, content, summary
    );
    tokio::fs::write(&path, body).await?;
    info!(path = %path.display(), "Summary written");
    Ok(path)
}

#[async_trait]
impl<S: Summarizer> Summarizer for CachedSummarizer<S> {
    async fn summarize(
        &self,
        context: &str,
        content: &str,
        prompts: &AiPrompts,
    ) -> Result<String, SummarizeError> {
        let key = CacheKey::from_texts(context, content);
        self.cache
            .get_or_compute(key, || self.call_upstream(context, content, prompts))
            .await
    }
}
