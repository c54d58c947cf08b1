//! Platform backed by a JSON export file.
//!
//! ```json
//! {
//!   "channels": [{"id": "10", "name": "general", "guild_id": "1", "guild_name": "Lab"}],
//!   "messages": [{"id": "100", "channel_id": "10", "author_name": "alice",
//!                 "content": "hi", "timestamp": "2025-01-04T10:00:00Z"}]
//! }
//! ```

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ChannelInfo, ChatPlatform, TimeWindow};
use crate::errors::PlatformError;
use crate::message::ChatMessage;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub channels: Vec<ChannelInfo>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Read-only history from an export, with sends captured in memory.
#[derive(Debug, Default)]
pub struct ExportPlatform {
    data: ExportData,
    sent: Mutex<Vec<(String, String)>>,
}

impl ExportPlatform {
    pub fn new(channels: Vec<ChannelInfo>, messages: Vec<ChatMessage>) -> Self {
        Self {
            data: ExportData { channels, messages },
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, PlatformError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, PlatformError> {
        let data: ExportData = serde_json::from_str(raw)?;
        Ok(Self {
            data,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn data(&self) -> &ExportData {
        &self.data
    }

    /// `(channel_id, text)` pairs passed to `send_message`, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Look up a channel by id or name.
    pub fn find_channel(&self, id_or_name: &str) -> Option<&ChannelInfo> {
        self.data
            .channels
            .iter()
            .find(|c| c.id == id_or_name)
            .or_else(|| self.data.channels.iter().find(|c| c.name == id_or_name))
    }
}

#[async_trait]
impl ChatPlatform for ExportPlatform {
    async fn channels(&self) -> Result<Vec<ChannelInfo>, PlatformError> {
        Ok(self.data.channels.clone())
    }

    fn history<'a>(
        &'a self,
        channel: &'a ChannelInfo,
        window: TimeWindow,
    ) -> BoxStream<'a, Result<ChatMessage, PlatformError>> {
        if !channel.readable {
            return stream::once(async move {
                Err(PlatformError::Forbidden {
                    channel: channel.name.clone(),
                })
            })
            .boxed();
        }

        let mut messages: Vec<&ChatMessage> = self
            .data
            .messages
            .iter()
            .filter(|m| m.channel_id == channel.id && window.contains(m.timestamp))
            .collect();
        messages.sort_by_key(|m| m.timestamp);

        stream::iter(messages.into_iter().map(|m| Ok(m.clone()))).boxed()
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
        info!(channel_id, len = text.len(), "Sending message");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((channel_id.to_string(), text.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::collect_history;
    use chrono::{TimeZone, Utc};

    const EXPORT: &str = r#"{
        "channels": [
            {"id": "10", "name": "general", "guild_id": "1", "guild_name": "Lab"},
            {"id": "11", "name": "secret", "readable": false}
        ],
        "messages": [
            {"id": "3", "channel_id": "10", "author_name": "carol", "content": "late",
             "timestamp": "2025-01-05T09:00:00Z"},
            {"id": "1", "channel_id": "10", "author_name": "alice", "content": "first",
             "timestamp": "2025-01-04T10:00:00Z"},
            {"id": "2", "channel_id": "10", "author_name": "bob", "content": "second",
             "timestamp": "2025-01-04T11:00:00Z"},
            {"id": "9", "channel_id": "11", "author_name": "eve", "content": "hidden",
             "timestamp": "2025-01-04T11:00:00Z"}
        ]
    }"#;

    fn window(day_from: u32, day_to: u32) -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, day_from, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, day_to, 23, 59, 59).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_history_is_filtered_and_chronological() {
        let platform = ExportPlatform::parse(EXPORT).unwrap();
        let general = platform.find_channel("general").unwrap().clone();

        let all = collect_history(&platform, &general, window(1, 31)).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let day = collect_history(&platform, &general, window(4, 4)).await.unwrap();
        assert_eq!(day.len(), 2);
    }

    #[tokio::test]
    async fn test_history_restarts_per_call() {
        let platform = ExportPlatform::parse(EXPORT).unwrap();
        let general = platform.find_channel("10").unwrap().clone();
        let first = collect_history(&platform, &general, window(1, 31)).await.unwrap();
        let second = collect_history(&platform, &general, window(1, 31)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unreadable_channel_is_forbidden() {
        let platform = ExportPlatform::parse(EXPORT).unwrap();
        let secret = platform.find_channel("secret").unwrap().clone();
        let err = collect_history(&platform, &secret, window(1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { ref channel } if channel == "secret"));
    }

    #[tokio::test]
    async fn test_sends_are_recorded() {
        let platform = ExportPlatform::default();
        platform.send_message("42", "hello").await.unwrap();
        assert_eq!(platform.sent(), vec![("42".to_string(), "hello".to_string())]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ExportPlatform::load(Path::new("/nonexistent/export.json")).unwrap_err();
        assert!(matches!(err, PlatformError::Io(_)));
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        assert!(matches!(
            ExportPlatform::parse("not json").unwrap_err(),
            PlatformError::Parse(_)
        ));
    }
}
