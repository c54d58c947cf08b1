//! Typed error hierarchy for recap.
//!
//! One enum per subsystem:
//! - `ChunkError`: chunker and budget failures
//! - `SummarizeError`: summarization dependency failures (LLM API)
//! - `PlatformError`: chat platform (history, channel listing, sends)
//! - `ValidationError`: malformed user input, surfaced as a message
//! - `PipelineError`: aggregate used by the summary pipelines

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors from the chunking subsystem.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("Token budget must be positive, got {budget}")]
    InvalidBudget { budget: usize },

    #[error("Chunk size must be positive")]
    InvalidChunkSize,

    #[error("No metadata for model '{name}'")]
    UnknownModel { name: String },
}

/// Errors from the summarization dependency.
///
/// `Clone` so one failed upstream call can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SummarizeError {
    #[error("Rate limit exceeded{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Request to summarization API failed: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    #[error("Malformed response from summarization API: {0}")]
    MalformedResponse(String),

    #[error("No API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl SummarizeError {
    /// True for the throttling variant; callers own any retry policy.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SummarizeError::RateLimited { .. })
    }
}

/// Errors from the chat platform adapter.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Platform returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Missing permission to read channel {channel}")]
    Forbidden { channel: String },

    #[error("Failed to read export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse platform data: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Malformed input. Reported to the caller as a user-visible message and
/// never fatal to the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid time period '{0}': expected a number followed by m, h, d or w (e.g. '1d')")]
    InvalidTimePeriod(String),

    #[error("Invalid timestamp '{0}': expected 'now', RFC 3339 or 'YYYY-MM-DD HH:MM:SS'")]
    InvalidTimestamp(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("There are no messages to summarize")]
    NoMessages,
}

/// Errors surfaced by the summary pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
