//! Discord REST v10 adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ChannelInfo, ChannelKind, ChatPlatform, TimeWindow};
use crate::errors::PlatformError;
use crate::message::ChatMessage;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord's epoch (2015-01-01) in milliseconds.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    channel_id: String,
    author: Author,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    fn into_chat_message(self, guild_id: &str) -> ChatMessage {
        let display_name = self
            .member
            .and_then(|m| m.nick)
            .or(self.author.global_name)
            .unwrap_or(self.author.username);
        ChatMessage {
            id: self.id,
            channel_id: self.channel_id,
            guild_id: (!guild_id.is_empty()).then(|| guild_id.to_string()),
            author_id: Some(self.author.id),
            author_name: Some(display_name),
            author_is_bot: self.author.bot,
            content: Some(self.content),
            timestamp: self.timestamp,
        }
    }
}

fn channel_kind(code: u8) -> ChannelKind {
    match code {
        2 | 13 => ChannelKind::Voice,
        4 => ChannelKind::Category,
        15 | 16 => ChannelKind::Forum,
        _ => ChannelKind::Text,
    }
}

/// Smallest snowflake at or after `ts`.
pub fn snowflake_at(ts: DateTime<Utc>) -> u64 {
    let ms = (ts.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    ms << 22
}

pub struct DiscordPlatform {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for DiscordPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordPlatform")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DiscordPlatform {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        channel_name: &str,
    ) -> Result<T, PlatformError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
            .query(query)
            .send()
            .await
            .map_err(PlatformError::Http)?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Forbidden {
                channel: channel_name.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json().await.map_err(PlatformError::Http)
    }

    /// One page of messages after `after`, oldest first.
    async fn page(
        &self,
        channel: &ChannelInfo,
        after: u64,
    ) -> Result<Vec<Message>, PlatformError> {
        let mut page: Vec<Message> = self
            .get_json(
                &format!("/channels/{}/messages", channel.id),
                &[
                    ("after", after.to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                ],
                &channel.name,
            )
            .await?;
        page.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));
        Ok(page)
    }
}

struct Cursor {
    after: u64,
    done: bool,
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn channels(&self) -> Result<Vec<ChannelInfo>, PlatformError> {
        let guilds: Vec<Guild> = self.get_json("/users/@me/guilds", &[], "").await?;
        let mut out = Vec::new();
        for guild in guilds {
            let channels: Vec<Channel> = self
                .get_json(&format!("/guilds/{}/channels", guild.id), &[], "")
                .await?;
            let categories: HashMap<&str, &str> = channels
                .iter()
                .filter(|c| c.kind == 4)
                .map(|c| (c.id.as_str(), c.name.as_str()))
                .collect();
            for c in &channels {
                out.push(ChannelInfo {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    guild_id: guild.id.clone(),
                    guild_name: guild.name.clone(),
                    kind: channel_kind(c.kind),
                    topic: c.topic.clone(),
                    category: c
                        .parent_id
                        .as_deref()
                        .and_then(|p| categories.get(p))
                        .map(|s| s.to_string()),
                    readable: true,
                });
            }
            debug!(guild = %guild.name, channels = channels.len(), "Listed guild channels");
        }
        Ok(out)
    }

    fn history<'a>(
        &'a self,
        channel: &'a ChannelInfo,
        window: TimeWindow,
    ) -> BoxStream<'a, Result<ChatMessage, PlatformError>> {
        let start = Cursor {
            after: snowflake_at(window.start).saturating_sub(1),
            done: false,
        };
        stream::try_unfold(start, move |cursor| async move {
            if cursor.done {
                return Ok::<_, PlatformError>(None);
            }
            let page = self.page(channel, cursor.after).await?;
            let full = page.len() >= PAGE_SIZE;
            let next_after = page
                .last()
                .and_then(|m| m.id.parse::<u64>().ok())
                .unwrap_or(cursor.after);
            let past_end = page.last().is_some_and(|m| m.timestamp > window.end);
            let messages: Vec<ChatMessage> = page
                .into_iter()
                .filter(|m| window.contains(m.timestamp))
                .map(|m| m.into_chat_message(&channel.guild_id))
                .collect();
            let next = Cursor {
                after: next_after,
                done: !full || past_end || next_after == cursor.after,
            };
            Ok(Some((messages, next)))
        })
        .map_ok(|messages| stream::iter(messages.into_iter().map(Ok::<_, PlatformError>)))
        .try_flatten()
        .boxed()
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
        let resp = self
            .client
            .post(format!("{}/channels/{}/messages", self.base_url, channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await
            .map_err(PlatformError::Http)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }
        info!(channel_id, "Message sent");
        Ok(())
    }
}
