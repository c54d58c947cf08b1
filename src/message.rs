//! Chat message model and the capability traits the chunker consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for links back to individual messages.
pub const MESSAGE_LINK_BASE: &str = "https://discord.com/channels";

/// Anything the chunker can serialize as `"<author>: <content>"`.
///
/// Both fields are optional; messages missing either are skipped by the
/// chunker rather than rejected.
pub trait HasAuthorAndContent {
    fn author_display_name(&self) -> Option<&str>;
    fn content(&self) -> Option<&str>;

    /// The serialized line, or `None` when author or content is missing/empty.
    fn formatted_line(&self) -> Option<String> {
        let author = self.author_display_name().filter(|a| !a.is_empty())?;
        let content = self.content().filter(|c| !c.is_empty())?;
        Some(format!("{}: {}\n", author, content))
    }
}

/// Messages that can be linked to from a heading.
pub trait Linkable {
    fn message_id(&self) -> &str;
}

/// A single message record as delivered by a [`crate::platform::ChatPlatform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_is_bot: bool,
    #[serde(default)]
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message with author and content set.
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            author_id: None,
            author_name: Some(author.into()),
            author_is_bot: false,
            content: Some(content.into()),
            timestamp,
        }
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn from_bot(mut self) -> Self {
        self.author_is_bot = true;
        self
    }

    /// Slash commands addressed to bots.
    pub fn is_command(&self) -> bool {
        self.content.as_deref().is_some_and(|c| c.starts_with('/'))
    }
}

impl HasAuthorAndContent for ChatMessage {
    fn author_display_name(&self) -> Option<&str> {
        self.author_name.as_deref()
    }

    fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

impl Linkable for ChatMessage {
    fn message_id(&self) -> &str {
        &self.id
    }
}

impl<T: HasAuthorAndContent + ?Sized> HasAuthorAndContent for &T {
    fn author_display_name(&self) -> Option<&str> {
        (**self).author_display_name()
    }

    fn content(&self) -> Option<&str> {
        (**self).content()
    }
}

impl<T: Linkable + ?Sized> Linkable for &T {
    fn message_id(&self) -> &str {
        (**self).message_id()
    }
}

/// Build a link to a message.
pub fn message_link(guild_id: &str, channel_id: &str, message_id: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        MESSAGE_LINK_BASE, guild_id, channel_id, message_id
    )
}
