//! Window-mode summarization of one channel between two instants.
//!
//! Recent messages are rendered as plain lines and summarized against a
//! prior-context block fetched from the preceding lookback window. Slices
//! are sent one at a time, in order.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::period::format_date;
use crate::chunking::{ContextWindowSettings, plan_context_window};
use crate::errors::PipelineError;
use crate::llm::{AiPrompts, Summarizer};
use crate::message::{ChatMessage, HasAuthorAndContent, message_link};
use crate::platform::{ChannelInfo, ChatPlatform, TimeWindow, collect_history};

/// Heading placed above a channel's window summary.
pub fn channel_header(channel: &ChannelInfo, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "<h2>Contents of #{} between {} and {}\n</h2>\n\n",
        channel.name,
        format_date(start),
        format_date(end)
    )
}

/// Render `messages` as `"<author>: <content>"` lines.
///
/// Bot messages and `/` commands are dropped. The first kept message is
/// preceded by a link line pointing at it.
pub fn channel_lines(channel: &ChannelInfo, messages: &[ChatMessage]) -> Vec<String> {
    let mut lines = Vec::new();
    for message in messages {
        if message.author_is_bot || message.is_command() {
            continue;
        }
        let Some(line) = message.formatted_line() else {
            debug!(id = %message.id, "Skipping message without author or content");
            continue;
        };
        if lines.is_empty() {
            let guild_id = message.guild_id.as_deref().unwrap_or(&channel.guild_id);
            let url = message_link(guild_id, &message.channel_id, &message.id);
            lines.push(format!(
                "Discord: <a href='{}'>Link to messages in {}</a>",
                url, channel.guild_name
            ));
        }
        lines.push(line.trim_end_matches('\n').to_string());
    }
    lines
}

async fn fetch_lines<P: ChatPlatform + ?Sized>(
    platform: &P,
    channel: &ChannelInfo,
    window: TimeWindow,
) -> Result<Vec<String>, PipelineError> {
    debug!(channel = %channel.name, start = %window.start, end = %window.end, "Retrieving messages");
    let messages = collect_history(platform, channel, window).await?;
    Ok(channel_lines(channel, &messages))
}

/// Summarize `channel` over `window`, using messages from `prior_start` up
/// to the window start as context. Always returns the header; with no
/// recent messages nothing is sent to the summarizer.
pub async fn summarize_channel_between<P, S>(
    platform: &P,
    summarizer: &S,
    channel: &ChannelInfo,
    window: TimeWindow,
    prior_start: DateTime<Utc>,
    prompts: &AiPrompts,
    settings: &ContextWindowSettings,
) -> Result<String, PipelineError>
where
    P: ChatPlatform + ?Sized,
    S: Summarizer + ?Sized,
{
    let recent = fetch_lines(platform, channel, window).await?;
    info!(
        channel = %channel.name,
        from = %format_date(window.start),
        prior = %format_date(prior_start),
        lines = recent.len(),
        "Messages received"
    );

    let mut response = channel_header(channel, window.start, window.end);

    let prior = if recent.is_empty() {
        Vec::new()
    } else {
        let prior = fetch_lines(platform, channel, TimeWindow::new(prior_start, window.start)).await?;
        if prior.is_empty() {
            debug!("No prior messages found for context");
        }
        prior
    };

    let plan = plan_context_window(&prior, &recent, settings)?;
    let context = plan.prior.join("\n");

    let mut responses = Vec::with_capacity(plan.slices.len());
    for slice in &plan.slices {
        let summary = summarizer.summarize(&context, &slice.join("\n"), prompts).await?;
        responses.push(summary);
    }

    response.push_str(&responses.join("\n"));
    response.push('\n');
    Ok(response)
}
