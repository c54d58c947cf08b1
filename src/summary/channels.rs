//! Channel selection.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::platform::ChannelInfo;

/// Name of the legacy output channel, never summarized.
pub const LEGACY_SUMMARY_CHANNEL: &str = "summary";

/// A guild or channel reference in a request: a numeric id or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdOrName {
    Id(u64),
    Name(String),
}

impl IdOrName {
    /// True if this refers to the given id or name. A string that holds an
    /// id also matches.
    pub fn matches(&self, id: &str, name: &str) -> bool {
        match self {
            IdOrName::Id(n) => id == n.to_string(),
            IdOrName::Name(s) => s == id || s == name,
        }
    }
}

impl fmt::Display for IdOrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdOrName::Id(n) => write!(f, "{}", n),
            IdOrName::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for IdOrName {
    fn from(s: &str) -> Self {
        IdOrName::Name(s.to_string())
    }
}

fn any_matches(refs: &[IdOrName], id: &str, name: &str) -> bool {
    refs.iter().any(|r| r.matches(id, name))
}

/// Which channels of which guilds a request covers.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    /// `None` or empty selects every guild.
    pub guilds: Option<Vec<IdOrName>>,
    /// `None` selects every text channel.
    pub include: Option<Vec<IdOrName>>,
    pub exclude: Vec<IdOrName>,
}

/// Text channels of one guild chosen by a [`ChannelFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct GuildChannels<'a> {
    pub guild_id: String,
    pub guild_name: String,
    pub channels: Vec<&'a ChannelInfo>,
}

/// Group `channels` by guild (in first-seen order) and apply `filter`.
/// Guilds with no matching channels are still returned, with an empty list.
pub fn select_channels<'a>(
    channels: &'a [ChannelInfo],
    filter: &ChannelFilter,
) -> Vec<GuildChannels<'a>> {
    let mut out: Vec<GuildChannels<'a>> = Vec::new();

    for channel in channels {
        if let Some(guilds) = filter.guilds.as_ref().filter(|g| !g.is_empty()) {
            if !any_matches(guilds, &channel.guild_id, &channel.guild_name) {
                continue;
            }
        }

        let idx = match out.iter().position(|g| g.guild_id == channel.guild_id) {
            Some(idx) => idx,
            None => {
                out.push(GuildChannels {
                    guild_id: channel.guild_id.clone(),
                    guild_name: channel.guild_name.clone(),
                    channels: Vec::new(),
                });
                out.len() - 1
            }
        };

        if !channel.is_text() {
            continue;
        }
        if let Some(include) = &filter.include {
            if !any_matches(include, &channel.id, &channel.name) {
                debug!(channel = %channel.name, "Skipping channel not in include list");
                continue;
            }
        }
        if any_matches(&filter.exclude, &channel.id, &channel.name) {
            debug!(channel = %channel.name, "Channel is in exclude list");
            continue;
        }
        out[idx].channels.push(channel);
    }

    out
}

/// Why a selected channel is not summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Diagnostic,
    LegacySummary,
    Unreadable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Diagnostic => write!(f, "skipping of processing the diagnostic channel"),
            SkipReason::LegacySummary => write!(f, "skipping of processing the summary channel"),
            SkipReason::Unreadable => write!(f, "lack of permissions"),
        }
    }
}

pub fn skip_reason(channel: &ChannelInfo, diagnostic_channel_id: Option<&str>) -> Option<SkipReason> {
    if diagnostic_channel_id.is_some_and(|d| d == channel.id) {
        Some(SkipReason::Diagnostic)
    } else if channel.name == LEGACY_SUMMARY_CHANNEL {
        Some(SkipReason::LegacySummary)
    } else if !channel.readable {
        Some(SkipReason::Unreadable)
    } else {
        None
    }
}

/// Text channels whose topic lists `tag` after `Tags:` (case-insensitive).
pub fn tagged_channels<'a>(channels: &'a [ChannelInfo], tag: &str) -> Vec<&'a ChannelInfo> {
    let wanted = tag.trim().to_lowercase();
    channels
        .iter()
        .filter(|c| c.is_text())
        .filter(|c| {
            c.topic
                .as_deref()
                .and_then(|topic| topic.rsplit_once("Tags:"))
                .is_some_and(|(_, tags)| {
                    tags.to_lowercase().split(',').any(|t| t.trim() == wanted)
                })
        })
        .collect()
}

/// How channels are picked for a guild-wide summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    Tag(String),
    Category(String),
    All,
}

impl Criteria {
    pub fn new(tag: Option<String>, category: Option<String>) -> Self {
        match (tag, category) {
            (Some(tag), _) => Criteria::Tag(tag),
            (None, Some(category)) => Criteria::Category(category),
            (None, None) => Criteria::All,
        }
    }

    /// Readable text channels matching the criteria, excluding the legacy
    /// summary channel.
    pub fn select<'a>(&self, channels: &'a [ChannelInfo]) -> Vec<&'a ChannelInfo> {
        let candidates: Vec<&ChannelInfo> = match self {
            Criteria::Tag(tag) => tagged_channels(channels, tag),
            Criteria::Category(category) => channels
                .iter()
                .filter(|c| c.category.as_deref() == Some(category.as_str()))
                .collect(),
            Criteria::All => channels.iter().collect(),
        };
        candidates
            .into_iter()
            .filter(|c| {
                if !c.is_text() {
                    debug!(channel = %c.name, kind = ?c.kind, "Skipping non-text channel");
                    return false;
                }
                c.readable && c.name != LEGACY_SUMMARY_CHANNEL
            })
            .collect()
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Tag(tag) => write!(f, "tag ({})", tag),
            Criteria::Category(category) => write!(f, "category ({})", category),
            Criteria::All => write!(f, "all"),
        }
    }
}
