//! Summarization backends.
//!
//! | Module    | Purpose                                                 |
//! |-----------|---------------------------------------------------------|
//! | `prompt`  | `AiPrompts`, prompt layout, fence stripping             |
//! | `models`  | Model catalog (`ModelCatalog`, `ModelInfo`)             |
//! | `openai`  | Chat-completions client                                 |
//! | `cached`  | Cache-backed decorator with an optional debug sink      |

pub mod cached;
pub mod models;
pub mod openai;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;

pub use cached::CachedSummarizer;
pub use models::{ModelCatalog, ModelInfo};
pub use openai::OpenAiSummarizer;
pub use prompt::{AiPrompts, build_prompt, strip_fences};

use crate::errors::SummarizeError;

/// Turns a prior-context text and a content text into a summary.
///
/// Implementations report throttling as [`SummarizeError::RateLimited`] and
/// never retry on their own.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        context: &str,
        content: &str,
        prompts: &AiPrompts,
    ) -> Result<String, SummarizeError>;
}

#[async_trait]
impl<S: Summarizer + ?Sized> Summarizer for Arc<S> {
    async fn summarize(
        &self,
        context: &str,
        content: &str,
        prompts: &AiPrompts,
    ) -> Result<String, SummarizeError> {
        (**self).summarize(context, content, prompts).await
    }
}
