//! Configuration for recap, read from `.recap/recap.toml`.
//!
//! Settings are layered: file, then environment (`.env` is loaded first),
//! then CLI flags. Every field has a default, so an empty or missing file
//! is a valid configuration.
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o"
//! request_timeout_secs = 120
//!
//! [chunking]
//! mode = "token"            # or "fixed"
//! max_tokens_fraction = 0.8
//! chunk_size = 1000
//! chars_per_token = 4
//! max_parallel = 4
//!
//! [cache]
//! maxsize = 100
//! debug_dir = ".recap/debug"
//!
//! [history]
//! context_lookback_days = 2
//! max_context_tokens = 30000
//! assumed_token_length = 50
//!
//! [webhook]
//! host = "0.0.0.0"
//! port = 8080
//! summary_timeout_secs = 10
//!
//! [schedule]
//! enabled = true
//! start_date = "2025-01-04"
//! end_date = "2025-04-05"
//! catchup_delay_secs = 60
//! summary_dir = "summaries"
//! file_format = "md"
//! payload_file = "payload.json"
//!
//! [[schedule.weekly]]
//! name = "programming_general_summary"
//! weekday = "Mon"
//! hour = 17
//! channels_to_include = ["programming-general"]
//!
//! [models."my-local-model"]
//! context_length = 32768
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunking::{
    BudgetLimit, CharRatioTokenizer, ChunkModeKind, Chunker, ContextWindowSettings,
    DEFAULT_CHARS_PER_TOKEN, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_TOKENS_FRACTION, parse_budget_limit,
};
use crate::llm::ModelCatalog;
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::schedule::{ScheduleSettings, WeeklyJob};
use crate::summary::SummaryRequest;
use crate::summary::payload::{DEFAULT_CONTEXT_LOOKBACK_DAYS, PayloadSettings};

pub const RECAP_DIR: &str = ".recap";
pub const CONFIG_FILE: &str = "recap.toml";

// ── [llm] ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── [chunking] ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingSection {
    #[serde(default)]
    pub mode: ChunkModeKind,
    /// Share of the model context one chunk may use.
    #[serde(default = "default_max_tokens_fraction")]
    pub max_tokens_fraction: f64,
    /// Messages per chunk in fixed mode, lines per slice in history mode.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_tokens_fraction() -> f64 {
    DEFAULT_MAX_TOKENS_FRACTION
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chars_per_token() -> usize {
    DEFAULT_CHARS_PER_TOKEN
}

fn default_max_parallel() -> usize {
    crate::summary::pipeline::DEFAULT_MAX_PARALLEL
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            mode: ChunkModeKind::default(),
            max_tokens_fraction: default_max_tokens_fraction(),
            chunk_size: default_chunk_size(),
            chars_per_token: default_chars_per_token(),
            max_parallel: default_max_parallel(),
        }
    }
}

// ── [cache] ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_cache_maxsize")]
    pub maxsize: usize,
    /// Where to write prompt/response pairs, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<PathBuf>,
}

fn default_cache_maxsize() -> usize {
    crate::cache::DEFAULT_MAXSIZE
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            maxsize: default_cache_maxsize(),
            debug_dir: None,
        }
    }
}

// ── [history] ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_context_lookback_days")]
    pub context_lookback_days: i64,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_assumed_token_length")]
    pub assumed_token_length: usize,
}

fn default_context_lookback_days() -> i64 {
    DEFAULT_CONTEXT_LOOKBACK_DAYS
}

fn default_max_context_tokens() -> usize {
    ContextWindowSettings::default().max_context_tokens
}

fn default_assumed_token_length() -> usize {
    ContextWindowSettings::default().assumed_token_length
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            context_lookback_days: default_context_lookback_days(),
            max_context_tokens: default_max_context_tokens(),
            assumed_token_length: default_assumed_token_length(),
        }
    }
}

// ── [webhook] ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_summary_timeout_secs")]
    pub summary_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_summary_timeout_secs() -> u64 {
    crate::webhook::api::DEFAULT_SUMMARY_TIMEOUT_SECS
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            summary_timeout_secs: default_summary_timeout_secs(),
        }
    }
}

// ── [schedule] ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSection {
    #[serde(default)]
    pub enabled: bool,
    /// First day periods may open on; today when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day periods may open on; a week after the start when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_catchup_delay_secs")]
    pub catchup_delay_secs: u64,
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,
    #[serde(default = "default_file_format")]
    pub file_format: String,
    /// JSON `SummaryRequest` used as the template for every job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekly: Vec<WeeklyJob>,
}

fn default_catchup_delay_secs() -> u64 {
    60
}

fn default_summary_dir() -> PathBuf {
    PathBuf::from(crate::schedule::task_list::DEFAULT_SUMMARY_DIR)
}

fn default_file_format() -> String {
    crate::schedule::task_list::DEFAULT_FILE_FORMAT.to_string()
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            enabled: false,
            start_date: None,
            end_date: None,
            catchup_delay_secs: default_catchup_delay_secs(),
            summary_dir: default_summary_dir(),
            file_format: default_file_format(),
            payload_file: None,
            weekly: Vec::new(),
        }
    }
}

impl ScheduleSection {
    /// Resolve the date range against `today` and collect the settings
    /// the scheduler runs with.
    pub fn settings(&self, today: NaiveDate) -> ScheduleSettings {
        let start_date = self.start_date.unwrap_or(today);
        let end_date = self
            .end_date
            .unwrap_or(start_date + chrono::Duration::days(7));
        ScheduleSettings {
            start_date,
            end_date,
            catchup_delay: Duration::from_secs(self.catchup_delay_secs),
            weekly: self.weekly.clone(),
        }
    }

    /// The job payload template, or the default request if no file is set.
    pub fn load_payload(&self, base_dir: &Path) -> Result<SummaryRequest> {
        let Some(ref file) = self.payload_file else {
            return Ok(SummaryRequest::default());
        };
        let path = base_dir.join(file);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse payload file: {}", path.display()))
    }
}

// ── [models] ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOverride {
    pub context_length: usize,
}

// ── recap.toml ────────────────────────────────────────────────────────

/// The complete recap.toml structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecapToml {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub history: HistorySection,
    #[serde(default)]
    pub webhook: WebhookSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
    /// Context lengths for models not built in, or corrections to them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, ModelOverride>,
}

impl RecapToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse recap.toml")
    }

    /// Load `recap.toml` from `recap_dir`, or the defaults if it is absent.
    pub fn load_or_default(recap_dir: &Path) -> Result<Self> {
        let config_path = recap_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize recap.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("RECAP_MODEL") {
            self.llm.model = model;
        }
        if let Some(port) = lookup("RECAP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.webhook.port = port,
                Err(_) => debug!(%port, "Ignoring unparseable RECAP_PORT"),
            }
        }
    }

    pub fn budget_limit(&self) -> BudgetLimit {
        BudgetLimit::Fraction(self.chunking.max_tokens_fraction)
    }

    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog::builtin().with_overrides(
            self.models
                .iter()
                .map(|(name, o)| (name.clone(), o.context_length)),
        )
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(
            self.chunking.mode.with_chunk_size(self.chunking.chunk_size),
            Arc::new(CharRatioTokenizer::new(self.chunking.chars_per_token)),
        )
    }

    pub fn context_window(&self) -> ContextWindowSettings {
        ContextWindowSettings {
            max_context_tokens: self.history.max_context_tokens,
            assumed_token_length: self.history.assumed_token_length,
            chunk_size: self.chunking.chunk_size,
        }
    }

    pub fn payload_settings(&self) -> PayloadSettings {
        PayloadSettings {
            window: self.context_window(),
            default_lookback_days: self.history.context_lookback_days,
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let fraction = self.chunking.max_tokens_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            warnings.push(format!(
                "Invalid max_tokens_fraction {}: must be in (0, 1]",
                fraction
            ));
        }
        if self.chunking.chunk_size == 0 {
            warnings.push("chunk_size must be greater than zero".to_string());
        }
        if self.chunking.chars_per_token == 0 {
            warnings.push("chars_per_token must be greater than zero".to_string());
        }
        if self.chunking.max_parallel == 0 {
            warnings.push("max_parallel of 0 is treated as 1".to_string());
        }
        if self.cache.maxsize == 0 {
            warnings.push("cache maxsize of 0 is treated as 1".to_string());
        }
        if self.history.assumed_token_length == 0 {
            warnings.push("assumed_token_length must be greater than zero".to_string());
        }
        if self.history.context_lookback_days < 0 {
            warnings.push(format!(
                "context_lookback_days {} is negative",
                self.history.context_lookback_days
            ));
        }
        if self.webhook.summary_timeout_secs == 0 {
            warnings.push("summary_timeout_secs of 0 times out every request".to_string());
        }
        if self.model_catalog().lookup(&self.llm.model).is_err() {
            warnings.push(format!(
                "Unknown model '{}': add [models.\"{}\"] with its context_length",
                self.llm.model, self.llm.model
            ));
        }
        for (name, o) in &self.models {
            if o.context_length == 0 {
                warnings.push(format!("Model '{}' has a context_length of 0", name));
            }
        }
        if let (Some(start), Some(end)) = (self.schedule.start_date, self.schedule.end_date)
            && end < start
        {
            warnings.push(format!(
                "Schedule end_date {} is before start_date {}",
                end, start
            ));
        }
        for job in &self.schedule.weekly {
            if job.hour > 23 || job.minute > 59 {
                warnings.push(format!(
                    "Weekly job '{}' has an invalid time {:02}:{:02}",
                    job.name, job.hour, job.minute
                ));
            }
        }

        warnings
    }
}

/// Runtime configuration, merged from:
/// 1. recap.toml (project `.recap/`, else the user config dir)
/// 2. Environment variables and `.env`
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct RecapConfig {
    pub project_dir: PathBuf,
    pub recap_dir: PathBuf,
    pub toml: RecapToml,
    pub api_key: Option<String>,
    pub discord_token: Option<String>,
    pub verbose: bool,
    /// CLI override of the budget limit.
    pub cli_budget: Option<BudgetLimit>,
}

/// `recap/recap.toml` under the user config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("recap").join(CONFIG_FILE))
}

impl RecapConfig {
    /// Load configuration for `project_dir`.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let recap_dir = project_dir.join(RECAP_DIR);

        let _ = dotenvy::from_path(project_dir.join(".env"));

        let project_config = recap_dir.join(CONFIG_FILE);
        let mut toml = match user_config_path() {
            Some(user) if !project_config.exists() && user.exists() => {
                debug!(path = %user.display(), "Using user config");
                RecapToml::load(&user)?
            }
            _ => RecapToml::load_or_default(&recap_dir)?,
        };
        toml.apply_env(|key| std::env::var(key).ok());

        Ok(Self {
            project_dir,
            recap_dir,
            toml,
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            discord_token: std::env::var("DISCORD_TOKEN").ok().filter(|k| !k.is_empty()),
            verbose: false,
            cli_budget: None,
        })
    }

    /// Create RecapConfig with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        verbose: bool,
        model: Option<String>,
        budget: Option<&str>,
    ) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        if let Some(model) = model {
            config.toml.llm.model = model;
        }
        config.cli_budget = budget.map(parse_budget_limit).transpose()?;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.recap_dir.join(CONFIG_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.recap_dir.join("logs")
    }

    /// Budget limit (CLI → file → default).
    pub fn budget_limit(&self) -> BudgetLimit {
        self.cli_budget.unwrap_or_else(|| self.toml.budget_limit())
    }

    pub fn model(&self) -> &str {
        &self.toml.llm.model
    }

    /// Schedule summary directory, relative paths resolved against the
    /// project directory.
    pub fn summary_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.schedule.summary_dir)
    }

    pub fn debug_dir(&self) -> Option<PathBuf> {
        self.toml
            .cache
            .debug_dir
            .as_ref()
            .map(|dir| self.project_dir.join(dir))
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if self.api_key.is_none() {
            warnings.push("OPENAI_API_KEY is not set: summaries will fail".to_string());
        }
        warnings
    }
}
