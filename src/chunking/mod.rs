//! Message chunking for summarization.
//!
//! Converts an ordered message history into chunks that fit a model's
//! context window, along with the metadata needed to build per-chunk
//! headings.
//!
//! | Module      | Purpose                                               |
//! |-------------|-------------------------------------------------------|
//! | `tokenizer` | Token estimation (`Tokenizer`, `CharRatioTokenizer`)  |
//! | `limit`     | Budget limit parsing (`"80%"`, `"12000"`)             |
//! | `budget`    | Token-budget chunker                                  |
//! | `slicer`    | Fixed-size slicer                                     |
//! | `headings`  | Per-chunk headings linking back to source messages    |
//! | `window`    | Prior-context / recent-message windowing              |

pub mod budget;
pub mod headings;
pub mod limit;
pub mod slicer;
pub mod tokenizer;
pub mod window;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use budget::chunk_by_token_budget;
pub use headings::{generate_headings, heading_for};
pub use limit::{BudgetLimit, parse_budget_limit};
pub use slicer::{chunk_by_fixed_count, fixed_slices};
pub use tokenizer::{CharRatioTokenizer, DEFAULT_CHARS_PER_TOKEN, Tokenizer};
pub use window::{ContextWindow, ContextWindowSettings, plan_context_window};

use crate::errors::ChunkError;
use crate::message::HasAuthorAndContent;

/// Share of a model's context length a single chunk may occupy.
pub const DEFAULT_MAX_TOKENS_FRACTION: f64 = 0.8;

/// Default element count per slice for the fixed-size slicer.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// One contiguous run of serialized messages.
#[derive(Debug, Clone)]
pub struct Chunk<'a, M> {
    /// `"<author>: <content>\n"` lines, in input order.
    pub text: String,
    /// Fresh tokenizer count of `text`.
    pub token_count: usize,
    pub message_count: usize,
    /// The message that opened this chunk. `None` only for an empty chunk.
    pub start: Option<&'a M>,
}

impl<'a, M> Chunk<'a, M> {
    pub(crate) fn new<T: Tokenizer + ?Sized>(
        text: String,
        message_count: usize,
        start: Option<&'a M>,
        tokenizer: &T,
    ) -> Self {
        let token_count = tokenizer.count_tokens(&text);
        Self {
            text,
            token_count,
            message_count,
            start,
        }
    }
}

/// The output of a chunking pass.
#[derive(Debug, Clone)]
pub struct ChunkSet<'a, M> {
    /// Never empty: zero valid messages yield a single empty chunk.
    pub chunks: Vec<Chunk<'a, M>>,
    /// Last valid message consumed; the trailing heading boundary.
    pub last: Option<&'a M>,
    /// Sum of `token_count` over all chunks.
    pub input_tokens: usize,
}

impl<'a, M> ChunkSet<'a, M> {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True when no valid message was consumed.
    pub fn is_empty_of_messages(&self) -> bool {
        self.message_total() == 0
    }

    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn message_counts(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.message_count).collect()
    }

    pub fn message_total(&self) -> usize {
        self.chunks.iter().map(|c| c.message_count).sum()
    }

    /// First message of each non-empty chunk.
    pub fn starts(&self) -> Vec<&'a M> {
        self.chunks.iter().filter_map(|c| c.start).collect()
    }

    /// Chunk starts followed by the trailing sentinel (the last message
    /// consumed). Headings are built from consecutive pairs.
    pub fn boundaries(&self) -> Vec<&'a M> {
        let mut out = self.starts();
        out.extend(self.last);
        out
    }
}

/// Which chunking strategy a [`Chunker`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkMode {
    /// Cut on the token budget.
    #[default]
    TokenBudget,
    /// Contiguous runs of a fixed message count, ignoring tokens.
    FixedSize(usize),
}

impl std::fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkMode::TokenBudget => write!(f, "token"),
            ChunkMode::FixedSize(n) => write!(f, "fixed({})", n),
        }
    }
}

/// Config-file spelling of [`ChunkMode`]; the fixed size comes from
/// `chunking.chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkModeKind {
    #[default]
    Token,
    Fixed,
}

impl ChunkModeKind {
    pub fn with_chunk_size(self, chunk_size: usize) -> ChunkMode {
        match self {
            ChunkModeKind::Token => ChunkMode::TokenBudget,
            ChunkModeKind::Fixed => ChunkMode::FixedSize(chunk_size),
        }
    }
}

impl std::str::FromStr for ChunkModeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(ChunkModeKind::Token),
            "fixed" => Ok(ChunkModeKind::Fixed),
            other => anyhow::bail!("Unknown chunk mode '{}': expected 'token' or 'fixed'", other),
        }
    }
}

/// Both chunking strategies behind one entry point.
#[derive(Clone)]
pub struct Chunker {
    mode: ChunkMode,
    tokenizer: Arc<dyn Tokenizer>,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker").field("mode", &self.mode).finish()
    }
}

impl Chunker {
    pub fn new(mode: ChunkMode, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { mode, tokenizer }
    }

    pub fn mode(&self) -> ChunkMode {
        self.mode
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// Chunk `messages`. `token_budget` is ignored in fixed-size mode.
    pub fn chunk<'a, M: HasAuthorAndContent>(
        &self,
        messages: &'a [M],
        token_budget: usize,
    ) -> Result<ChunkSet<'a, M>, ChunkError> {
        match self.mode {
            ChunkMode::TokenBudget => {
                chunk_by_token_budget(messages, token_budget, self.tokenizer.as_ref())
            }
            ChunkMode::FixedSize(size) => {
                chunk_by_fixed_count(messages, size, self.tokenizer.as_ref())
            }
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkMode::default(), Arc::new(CharRatioTokenizer::default()))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{chars, msg};
    use super::*;

    #[test]
    fn test_reference_scenario_split_after_first_message() {
        let messages = vec![
            msg("alice", "hi"),
            msg("bob", "hello there"),
            msg("alice", "bye"),
        ];
        // one token per line, plus a heavy greeting
        let heavy_hi = |s: &str| s.lines().count() + 9 * s.matches("hi\n").count();
        let set = chunk_by_token_budget(&messages, 10, &heavy_hi).unwrap();

        assert_eq!(set.message_counts(), vec![1, 2]);
        let starts = set.starts();
        assert_eq!(starts[0].content.as_deref(), Some("hi"));
        assert_eq!(starts[1].content.as_deref(), Some("hello there"));
    }

    #[test]
    fn test_boundaries_have_trailing_sentinel() {
        let messages = vec![msg("a", "one"), msg("b", "two"), msg("c", "three")];
        let set = chunk_by_token_budget(&messages, 8, &chars).unwrap();
        let ids: Vec<_> = set.boundaries().iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec!["a:one", "b:two", "c:three", "c:three"]);
    }

    #[test]
    fn test_chunker_token_mode() {
        let chunker = Chunker::new(ChunkMode::TokenBudget, Arc::new(chars));
        let messages = vec![msg("a", "xx"), msg("b", "yy")];
        let set = chunker.chunk(&messages, 6).unwrap();
        assert_eq!(set.message_counts(), vec![1, 1]);
    }

    #[test]
    fn test_chunker_fixed_mode_ignores_budget() {
        let chunker = Chunker::new(ChunkMode::FixedSize(2), Arc::new(chars));
        let messages: Vec<_> = (0..5).map(|i| msg("u", &i.to_string())).collect();
        let set = chunker.chunk(&messages, 1).unwrap();
        assert_eq!(set.message_counts(), vec![2, 2, 1]);
    }

    #[test]
    fn test_chunk_mode_kind_parse() {
        assert_eq!("token".parse::<ChunkModeKind>().unwrap(), ChunkModeKind::Token);
        assert_eq!(" FIXED ".parse::<ChunkModeKind>().unwrap(), ChunkModeKind::Fixed);
        assert!("words".parse::<ChunkModeKind>().is_err());
        assert_eq!(
            ChunkModeKind::Fixed.with_chunk_size(7),
            ChunkMode::FixedSize(7)
        );
    }

    #[test]
    fn test_default_chunker_uses_char_ratio() {
        let chunker = Chunker::default();
        assert_eq!(chunker.mode(), ChunkMode::TokenBudget);
        assert_eq!(chunker.tokenizer().count_tokens("abcdefgh"), 2);
    }
}
