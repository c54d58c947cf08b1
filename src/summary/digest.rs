//! Guild digests: summarize many channels into one target channel.

use chrono::{DateTime, Utc};
use tracing::info;

use super::channels::Criteria;
use super::history::summarize_channel_between;
use super::period::{format_date, time_for_dating_back};
use crate::chunking::ContextWindowSettings;
use crate::delivery::{MESSAGE_CHUNK_SIZE, split_exact};
use crate::errors::PipelineError;
use crate::llm::{AiPrompts, Summarizer};
use crate::platform::{ChannelInfo, ChatPlatform, TimeWindow};

pub const DIGEST_RECENT_MESSAGES_PROMPT: &str = "Now, please summarize the following conversation, highlighting the most important elements in bold. Using one level of headers and one level of nested bullet points whenever that makes sense. Pay attention to technical and design details. Highlight the most important elements or terms in bold. Include any links to Discord channels. Don't repeat the details of the conversation. Ignore people thanking each other. If I gave you no conversation points just say 'no messages in the time period'.";

/// Markdown prompts used for digests.
pub fn digest_prompts() -> AiPrompts {
    AiPrompts {
        recent_messages_prompt: Some(DIGEST_RECENT_MESSAGES_PROMPT.to_string()),
        ..AiPrompts::markdown()
    }
}

/// Where and over what span a digest runs.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub target_channel_id: String,
    pub time_period: String,
    pub lookback_days: i64,
    pub prompts: AiPrompts,
    pub window: ContextWindowSettings,
}

impl DigestOptions {
    pub fn new(target_channel_id: impl Into<String>) -> Self {
        Self {
            target_channel_id: target_channel_id.into(),
            time_period: super::payload::DEFAULT_TIME_PERIOD.to_string(),
            lookback_days: super::payload::DEFAULT_CONTEXT_LOOKBACK_DAYS,
            prompts: digest_prompts(),
            window: ContextWindowSettings::default(),
        }
    }
}

/// Summarize `source` up to `now` and post the result to the target channel
/// as `**<#id>**` followed by the summary.
pub async fn summarize_to_channel<P, S>(
    platform: &P,
    summarizer: &S,
    source: &ChannelInfo,
    now: DateTime<Utc>,
    options: &DigestOptions,
) -> Result<(), PipelineError>
where
    P: ChatPlatform + ?Sized,
    S: Summarizer + ?Sized,
{
    let target = options.target_channel_id.as_str();
    let start = time_for_dating_back(now, &options.time_period)?;
    let prior_start = time_for_dating_back(start, &format!("{}d", options.lookback_days.max(1)))?;

    info!(channel = %source.name, from = %format_date(start), to = %format_date(now), "Summarizing channel");
    platform
        .send_message(
            target,
            &format!(
                "Summarizing messages from {} between {} and {}",
                source.name,
                format_date(start),
                format_date(now)
            ),
        )
        .await?;

    let summary = summarize_channel_between(
        platform,
        summarizer,
        source,
        TimeWindow::new(start, now),
        prior_start,
        &options.prompts,
        &options.window,
    )
    .await?;

    let response = format!("**<#{}>**\n{}", source.id, summary);
    for piece in split_exact(&response, MESSAGE_CHUNK_SIZE) {
        platform.send_message(target, &piece).await?;
    }
    Ok(())
}

/// Summarize every channel of `guild` (id or name) matching `criteria`.
/// Returns the number of channels summarized.
pub async fn summarize_all<P, S>(
    platform: &P,
    summarizer: &S,
    guild: &str,
    criteria: &Criteria,
    now: DateTime<Utc>,
    options: &DigestOptions,
) -> Result<usize, PipelineError>
where
    P: ChatPlatform + ?Sized,
    S: Summarizer + ?Sized,
{
    let channels: Vec<ChannelInfo> = platform
        .channels()
        .await?
        .into_iter()
        .filter(|c| c.guild_id == guild || c.guild_name == guild)
        .collect();
    let guild_name = channels
        .first()
        .map(|c| c.guild_name.as_str())
        .unwrap_or(guild);
    let start = time_for_dating_back(now, &options.time_period)?;

    platform
        .send_message(
            &options.target_channel_id,
            &format!(
                "\n\nSummarizing all channels (criteria={}) in {}...\n",
                criteria, guild_name
            ),
        )
        .await?;

    let selected = criteria.select(&channels);
    for channel in &selected {
        platform
            .send_message(
                &options.target_channel_id,
                &format!("Summarizing {}... {}", channel.name, start.naive_utc()),
            )
            .await?;
        summarize_to_channel(platform, summarizer, channel, now, options).await?;
    }
    Ok(selected.len())
}
