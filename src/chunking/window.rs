//! Prior-context windowing for the history summarizer.
//!
//! Prior context is estimated at a flat `assumed_token_length` tokens per
//! line. When that estimate alone exceeds `max_context_tokens`, prior
//! context is cut to the number of lines that fit. Recent lines are then
//! split into fixed-size slices.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::slicer::fixed_slices;
use crate::errors::ChunkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindowSettings {
    pub max_context_tokens: usize,
    pub assumed_token_length: usize,
    pub chunk_size: usize,
}

impl Default for ContextWindowSettings {
    fn default() -> Self {
        Self {
            max_context_tokens: 30_000,
            assumed_token_length: 50,
            chunk_size: super::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow<'a, T> {
    /// Prior context, possibly truncated.
    pub prior: &'a [T],
    /// Recent lines in contiguous slices of `chunk_size`.
    pub slices: Vec<&'a [T]>,
    /// Tokens left for recent lines after prior context; zero when truncated.
    pub budget: usize,
    pub truncated: bool,
}

pub fn plan_context_window<'a, T>(
    prior: &'a [T],
    recent: &'a [T],
    settings: &ContextWindowSettings,
) -> Result<ContextWindow<'a, T>, ChunkError> {
    info!("Chunking for summarization");
    debug!(prior = prior.len(), "Prior context lines");

    let prior_estimate = prior.len().saturating_mul(settings.assumed_token_length);
    let (prior, budget, truncated) = match settings.max_context_tokens.checked_sub(prior_estimate) {
        Some(budget) => (prior, budget, false),
        None => {
            error!(
                lines = prior.len(),
                max_context_tokens = settings.max_context_tokens,
                "Prior messages exceed token limit. Truncating."
            );
            let keep = settings
                .max_context_tokens
                .checked_div(settings.assumed_token_length)
                .unwrap_or(prior.len())
                .min(prior.len());
            (&prior[..keep], 0, true)
        }
    };
    debug!(budget, "Budget for chunk");

    let slices = fixed_slices(recent, settings.chunk_size)?;
    debug!(slices = slices.len(), "Number of slices");

    Ok(ContextWindow {
        prior,
        slices,
        budget,
        truncated,
    })
}
