//! Chat platform adapters.
//!
//! The summarizer only needs three things from a platform: a channel
//! listing, a chronological message stream for a time window, and a way to
//! post text back. [`ChatPlatform`] captures that; `export` serves a JSON
//! export file, `discord` talks to the Discord REST API.

pub mod discord;
pub mod export;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use discord::DiscordPlatform;
pub use export::ExportPlatform;

use crate::errors::PlatformError;
use crate::message::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
    Category,
    Forum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub guild_name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub topic: Option<String>,
    /// Name of the parent category, if any.
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the bot may read this channel's history.
    #[serde(default = "default_readable")]
    pub readable: bool,
}

fn default_readable() -> bool {
    true
}

impl ChannelInfo {
    pub fn text(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            guild_id: String::new(),
            guild_name: String::new(),
            kind: ChannelKind::Text,
            topic: None,
            category: None,
            readable: true,
        }
    }

    pub fn in_guild(mut self, guild_id: impl Into<String>, guild_name: impl Into<String>) -> Self {
        self.guild_id = guild_id.into();
        self.guild_name = guild_name.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }
}

/// Inclusive time range of messages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// All channels visible to the bot, across guilds.
    async fn channels(&self) -> Result<Vec<ChannelInfo>, PlatformError>;

    /// Messages in `window`, oldest first. Each call starts a fresh stream.
    fn history<'a>(
        &'a self,
        channel: &'a ChannelInfo,
        window: TimeWindow,
    ) -> BoxStream<'a, Result<ChatMessage, PlatformError>>;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError>;
}

/// Drain a channel's history for `window` into memory.
pub async fn collect_history<P: ChatPlatform + ?Sized>(
    platform: &P,
    channel: &ChannelInfo,
    window: TimeWindow,
) -> Result<Vec<ChatMessage>, PlatformError> {
    platform.history(channel, window).try_collect().await
}
