//! Webhook payload model and the guild-wide summary it drives.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::channels::{ChannelFilter, IdOrName, SkipReason, select_channels, skip_reason};
use super::history::summarize_channel_between;
use super::period::{parse_endtime, time_for_dating_back};
use crate::chunking::ContextWindowSettings;
use crate::delivery::log_diagnostic;
use crate::errors::{PipelineError, ValidationError};
use crate::llm::{AiPrompts, Summarizer};
use crate::platform::{ChannelInfo, ChatPlatform, TimeWindow};

pub const DEFAULT_TIME_PERIOD: &str = "1d";
pub const DEFAULT_CONTEXT_LOOKBACK_DAYS: i64 = 2;

fn default_time_period() -> String {
    DEFAULT_TIME_PERIOD.to_string()
}

/// Body of a summary request, from the webhook or a scheduled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    /// `"now"`, RFC 3339 or `YYYY-MM-DD HH:MM:SS`. Absent means now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endtime_to_summarize: Option<String>,
    /// Explicit start; when absent the start is `time_period` before the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starttime_to_summarize: Option<String>,
    #[serde(default = "default_time_period")]
    pub time_period: String,
    #[serde(default)]
    pub ai_prompts: AiPrompts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_lookback_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_channel_id: Option<IdOrName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_ids: Option<Vec<IdOrName>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels_to_include: Option<Vec<IdOrName>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels_to_exclude: Vec<IdOrName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_webhook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_webhook_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl Default for SummaryRequest {
    fn default() -> Self {
        Self {
            endtime_to_summarize: None,
            starttime_to_summarize: None,
            time_period: default_time_period(),
            ai_prompts: AiPrompts::default(),
            context_lookback_days: None,
            diagnostic_channel_id: None,
            guild_ids: None,
            channels_to_include: None,
            channels_to_exclude: Vec::new(),
            target_webhook: None,
            bot_webhook_server: None,
            document_id: None,
        }
    }
}

/// Resolved time bounds of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub prior_start: DateTime<Utc>,
    pub lookback_days: i64,
}

impl SummaryWindow {
    pub fn recent(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

impl SummaryRequest {
    pub fn window(
        &self,
        now: DateTime<Utc>,
        default_lookback_days: i64,
    ) -> Result<SummaryWindow, ValidationError> {
        let end = parse_endtime(self.endtime_to_summarize.as_deref().unwrap_or("now"), now)?;
        let start = match &self.starttime_to_summarize {
            Some(start) => parse_endtime(start, now)?,
            None => time_for_dating_back(end, &self.time_period)?,
        };
        if start > end {
            return Err(ValidationError::InvalidTimePeriod(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        let lookback_days = self.context_lookback_days.unwrap_or(default_lookback_days).max(0);
        let prior_start = Duration::try_days(lookback_days)
            .and_then(|d| start.checked_sub_signed(d))
            .ok_or_else(|| {
                ValidationError::InvalidTimePeriod(format!("{}d lookback", lookback_days))
            })?;
        Ok(SummaryWindow {
            start,
            end,
            prior_start,
            lookback_days,
        })
    }

    pub fn channel_filter(&self) -> ChannelFilter {
        ChannelFilter {
            guilds: self.guild_ids.clone(),
            include: self.channels_to_include.clone(),
            exclude: self.channels_to_exclude.clone(),
        }
    }
}

/// Server-side knobs for payload summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSettings {
    pub window: ContextWindowSettings,
    pub default_lookback_days: i64,
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            window: ContextWindowSettings::default(),
            default_lookback_days: DEFAULT_CONTEXT_LOOKBACK_DAYS,
        }
    }
}

/// Id of the diagnostic channel named by `reference`, if it can be found.
fn resolve_diagnostic_channel(channels: &[ChannelInfo], reference: &IdOrName) -> Option<String> {
    match reference {
        IdOrName::Id(id) => Some(id.to_string()),
        IdOrName::Name(_) => {
            info!(%reference, "Looking up the diagnostic channel by name");
            let found = channels
                .iter()
                .find(|c| reference.matches(&c.id, &c.name))
                .map(|c| c.id.clone());
            if found.is_none() {
                warn!(%reference, "Diagnostic channel not found");
            }
            found
        }
    }
}

/// Text preceding the per-guild summaries.
pub fn summary_header(window: &SummaryWindow) -> String {
    format!(
        "Summary of channels\n\nShowing from {} to {}\n\nPrior context from {} for {} days\n\n",
        window.start.naive_utc(),
        window.end.naive_utc(),
        window.prior_start.naive_utc(),
        window.lookback_days
    )
}

/// Summarize every selected channel of every selected guild.
pub async fn summary_from_payload<P, S>(
    platform: &P,
    summarizer: &S,
    request: &SummaryRequest,
    now: DateTime<Utc>,
    settings: &PayloadSettings,
) -> Result<String, PipelineError>
where
    P: ChatPlatform + ?Sized,
    S: Summarizer + ?Sized,
{
    let window = request.window(now, settings.default_lookback_days)?;
    info!(
        start = %window.start,
        end = %window.end,
        prior = %window.prior_start,
        "Webhook summary started"
    );
    debug!(ai_prompts = ?request.ai_prompts, "Prompts");

    let channels = platform.channels().await?;
    let diagnostic = request
        .diagnostic_channel_id
        .as_ref()
        .and_then(|r| resolve_diagnostic_channel(&channels, r));
    let diagnostic = diagnostic.as_deref();

    let mut response = summary_header(&window);

    for guild in select_channels(&channels, &request.channel_filter()) {
        if guild.channels.is_empty() {
            info!(guild = %guild.guild_name, "No channels to summarize");
        }
        response.push_str(&format!("# GUILD {}\n\n", guild.guild_name));

        for channel in guild.channels {
            log_diagnostic(platform, diagnostic, &format!("CHANNEL {}", channel.name)).await;
            match skip_reason(channel, diagnostic) {
                Some(SkipReason::Unreadable) => {
                    warn!(channel = %channel.name, "Skipping channel due to lack of permissions");
                    response.push_str(&format!(
                        "Skipping channel {} due to lack of permissions\n",
                        channel.name
                    ));
                }
                Some(reason) => {
                    log_diagnostic(platform, diagnostic, &reason.to_string()).await;
                }
                None => {
                    let summary = summarize_channel_between(
                        platform,
                        summarizer,
                        channel,
                        window.recent(),
                        window.prior_start,
                        &request.ai_prompts,
                        &settings.window,
                    )
                    .await?;
                    response.push_str(&summary);
                }
            }
        }
    }

    info!("Summaries done");
    Ok(response)
}
