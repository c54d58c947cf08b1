//! Token-mode summary pipeline.
//!
//! [`SummaryPipeline::prepare`] does all of the accounting (chunks, headings,
//! input tokens) before anything is sent upstream, so an info block can be
//! shown first. [`SummaryPipeline::summarize`] then fans the chunks out with
//! bounded parallelism and puts the results back in chunk order.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunking::{BudgetLimit, ChunkSet, Chunker, generate_headings};
use crate::errors::{PipelineError, ValidationError};
use crate::llm::{AiPrompts, ModelCatalog, Summarizer};
use crate::message::ChatMessage;

pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Per-chunk token budget for `model` under `limit`.
pub fn resolve_budget(
    limit: BudgetLimit,
    catalog: &ModelCatalog,
    model: &str,
) -> Result<usize, PipelineError> {
    let info = catalog.lookup(model)?;
    let budget = limit.effective_budget(info.context_length);
    debug!(model, context_length = info.context_length, %limit, budget, "Resolved token budget");
    Ok(budget)
}

/// Chunks and headings for one channel, ready to summarize.
#[derive(Debug)]
pub struct PreparedSummary<'a> {
    pub chunks: ChunkSet<'a, ChatMessage>,
    pub headings: Vec<String>,
}

impl PreparedSummary<'_> {
    pub fn message_count(&self) -> usize {
        self.chunks.message_total()
    }

    pub fn input_tokens(&self) -> usize {
        self.chunks.input_tokens
    }
}

/// One heading plus the summary of its chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarySection {
    pub heading: String,
    pub summary: String,
}

impl SummarySection {
    pub fn block(&self) -> String {
        format!("{}{}", self.heading, self.summary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub sections: Vec<SummarySection>,
    pub message_count: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl SummaryReport {
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(SummarySection::block)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Request details shown before the summaries.
pub fn info_block(message_count: usize, mode: &str, input_tokens: usize, model: &str) -> String {
    format!(
        "Messages: ``{}``\nMode: ``{}``\nTotal Input Tokens: ``{}``\nModel: ``{}``\n",
        message_count, mode, input_tokens, model
    )
}

pub struct SummaryPipeline {
    chunker: Chunker,
    summarizer: Arc<dyn Summarizer>,
    budget: usize,
    max_parallel: usize,
}

impl std::fmt::Debug for SummaryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryPipeline")
            .field("chunker", &self.chunker)
            .field("budget", &self.budget)
            .field("max_parallel", &self.max_parallel)
            .finish()
    }
}

impl SummaryPipeline {
    pub fn new(chunker: Chunker, summarizer: Arc<dyn Summarizer>, budget: usize) -> Self {
        Self {
            chunker,
            summarizer,
            budget,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn prepare<'a>(
        &self,
        guild_id: &str,
        channel_id: &str,
        messages: &'a [ChatMessage],
    ) -> Result<PreparedSummary<'a>, PipelineError> {
        let chunks = self.chunker.chunk(messages, self.budget)?;
        if chunks.is_empty_of_messages() {
            return Err(ValidationError::NoMessages.into());
        }
        let headings = generate_headings(guild_id, channel_id, &chunks);
        info!(
            chunks = chunks.len(),
            messages = chunks.message_total(),
            input_tokens = chunks.input_tokens,
            "Prepared summary"
        );
        Ok(PreparedSummary { chunks, headings })
    }

    pub async fn summarize(
        &self,
        prepared: &PreparedSummary<'_>,
        prompts: &AiPrompts,
    ) -> Result<SummaryReport, PipelineError> {
        let summaries: Vec<String> = stream::iter(prepared.chunks.texts())
            .map(|text| {
                let summarizer = Arc::clone(&self.summarizer);
                async move { summarizer.summarize("", text, prompts).await }
            })
            .buffered(self.max_parallel)
            .try_collect()
            .await?;

        let tokenizer = self.chunker.tokenizer();
        let output_tokens = summaries.iter().map(|s| tokenizer.count_tokens(s)).sum();
        let sections = prepared
            .headings
            .iter()
            .zip(summaries)
            .map(|(heading, summary)| SummarySection {
                heading: heading.clone(),
                summary,
            })
            .collect();

        Ok(SummaryReport {
            sections,
            message_count: prepared.message_count(),
            input_tokens: prepared.input_tokens(),
            output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{CharRatioTokenizer, ChunkMode};
    use crate::errors::SummarizeError;
    use crate::test_util::EchoSummarizer;
    use chrono::{TimeZone, Utc};

    fn messages(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                ChatMessage::new(
                    i.to_string(),
                    "10",
                    "alice",
                    format!("message number {i}"),
                    Utc.with_ymd_and_hms(2025, 1, 4, 10, i as u32, 0).unwrap(),
                )
            })
            .collect()
    }

    fn char_chunker() -> Chunker {
        Chunker::new(ChunkMode::TokenBudget, Arc::new(CharRatioTokenizer::new(1)))
    }

    #[test]
    fn test_resolve_budget() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            resolve_budget(BudgetLimit::Fraction(0.5), &catalog, "gpt-4").unwrap(),
            4096
        );
        assert_eq!(
            resolve_budget(BudgetLimit::Absolute(100), &catalog, "gpt-4o").unwrap(),
            100
        );
        assert!(matches!(
            resolve_budget(BudgetLimit::default(), &catalog, "nope"),
            Err(PipelineError::Chunk(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_empty() {
        let pipeline = SummaryPipeline::new(char_chunker(), Arc::new(EchoSummarizer::default()), 100);
        let err = pipeline.prepare("g", "c", &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::NoMessages)));
    }

    #[test]
    fn test_prepare_counts_before_summarizing() {
        let summarizer = Arc::new(EchoSummarizer::default());
        let pipeline = SummaryPipeline::new(char_chunker(), summarizer.clone(), 60);
        let msgs = messages(6);
        let prepared = pipeline.prepare("g", "10", &msgs).unwrap();

        assert!(prepared.chunks.len() > 1);
        assert_eq!(prepared.headings.len(), prepared.chunks.len());
        assert_eq!(prepared.message_count(), 6);
        assert!(prepared.input_tokens() > 0);
        assert_eq!(summarizer.calls(), 0);
    }

    #[tokio::test]
    async fn test_summarize_keeps_chunk_order() {
        let summarizer = Arc::new(EchoSummarizer {
            delay_ms: 5,
            ..Default::default()
        });
        let pipeline =
            SummaryPipeline::new(char_chunker(), summarizer.clone(), 60).with_max_parallel(3);
        let msgs = messages(10);
        let prepared = pipeline.prepare("g", "10", &msgs).unwrap();
        let report = pipeline.summarize(&prepared, &AiPrompts::default()).await.unwrap();

        assert_eq!(report.sections.len(), prepared.chunks.len());
        assert_eq!(summarizer.calls(), prepared.chunks.len());
        for (section, count) in report.sections.iter().zip(prepared.chunks.message_counts()) {
            assert_eq!(section.summary, format!("summary[{count}]"));
        }
        assert_eq!(report.message_count, 10);
        assert!(report.output_tokens > 0);
        assert!(report.render().starts_with("Summary from **"));
    }

    #[tokio::test]
    async fn test_rate_limit_propagates() {
        let summarizer = Arc::new(EchoSummarizer {
            fail_on: Some("number 3".into()),
            ..Default::default()
        });
        let pipeline = SummaryPipeline::new(char_chunker(), summarizer, 10_000);
        let msgs = messages(5);
        let prepared = pipeline.prepare("g", "10", &msgs).unwrap();
        let err = pipeline
            .summarize(&prepared, &AiPrompts::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Summarize(SummarizeError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_info_block() {
        assert_eq!(
            info_block(3, "token", 120, "gpt-4o"),
            "Messages: ``3``\nMode: ``token``\nTotal Input Tokens: ``120``\nModel: ``gpt-4o``\n"
        );
    }
}
