//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled            |
//! |-------------|-----------------------------|
//! | `serve`     | `Serve`                     |
//! | `summarize` | `Summarize`, `Chunk`        |
//! | `channels`  | `Channels`, `Digest`        |
//! | `schedule`  | `Schedule`                  |
//! | `config`    | `Config`                    |

pub mod channels;
pub mod config;
pub mod schedule;
pub mod serve;
pub mod summarize;

pub use channels::{cmd_channels, cmd_digest};
pub use config::cmd_config;
pub use schedule::cmd_schedule;
pub use serve::cmd_serve;
pub use summarize::{cmd_chunk, cmd_summarize};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use recap::cache::SummaryCache;
use recap::chunking::{CharRatioTokenizer, ChunkModeKind, Chunker};
use recap::llm::{CachedSummarizer, OpenAiSummarizer};
use recap::platform::{ChatPlatform, DiscordPlatform, ExportPlatform};
use recap::recap_config::RecapConfig;
use tracing_appender::non_blocking::WorkerGuard;

use super::Cli;

pub type AppSummarizer = CachedSummarizer<OpenAiSummarizer>;

/// Load configuration with the global CLI overrides applied.
pub fn load_config(cli: &Cli, project_dir: PathBuf) -> Result<RecapConfig> {
    RecapConfig::with_cli_args(
        project_dir,
        cli.verbose,
        cli.model.clone(),
        cli.budget.as_deref(),
    )
}

/// Logging for one-shot commands: stderr only.
pub fn init_cli_logging(cli: &Cli) -> Option<WorkerGuard> {
    recap::logging::init_tracing(cli.verbose, cli.log_json, None)
}

/// The configured chunker, with `mode` overriding the file setting.
pub fn chunker_for(config: &RecapConfig, mode: Option<&str>) -> Result<Chunker> {
    let Some(mode) = mode else {
        return Ok(config.toml.chunker());
    };
    let kind: ChunkModeKind = mode.parse()?;
    Ok(Chunker::new(
        kind.with_chunk_size(config.toml.chunking.chunk_size),
        Arc::new(CharRatioTokenizer::new(config.toml.chunking.chars_per_token)),
    ))
}

/// OpenAI-compatible summarizer behind the LRU summary cache.
pub fn build_summarizer(config: &RecapConfig) -> Result<Arc<AppSummarizer>> {
    let llm = &config.toml.llm;
    let inner = OpenAiSummarizer::new(
        llm.base_url.clone(),
        config.api_key.clone(),
        llm.model.clone(),
        Duration::from_secs(llm.request_timeout_secs),
    )?;
    let cache = Arc::new(SummaryCache::new(config.toml.cache.maxsize));
    let mut summarizer = CachedSummarizer::new(inner, cache);
    if let Some(dir) = config.debug_dir() {
        summarizer = summarizer.with_debug_dir(dir);
    }
    Ok(Arc::new(summarizer))
}

/// An export file when `input` is given, otherwise Discord.
pub fn open_platform(config: &RecapConfig, input: Option<&Path>) -> Result<Arc<dyn ChatPlatform>> {
    match input {
        Some(path) => Ok(Arc::new(load_export(path)?)),
        None => {
            let token = config
                .discord_token
                .clone()
                .context("DISCORD_TOKEN is not set; pass --input to read an export instead")?;
            Ok(Arc::new(DiscordPlatform::new(token)))
        }
    }
}

pub fn load_export(path: &Path) -> Result<ExportPlatform> {
    ExportPlatform::load(path).with_context(|| format!("Failed to load export {}", path.display()))
}
