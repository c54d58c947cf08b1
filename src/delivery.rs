//! Getting summaries out: platform-sized message pieces, diagnostic posts,
//! and the outbound webhook.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::errors::PlatformError;
use crate::platform::ChatPlatform;

/// Platform message limit, with headroom.
pub const MESSAGE_CHUNK_SIZE: usize = 1900;

/// Split `text` into pieces of at most `limit` characters.
///
/// Whole lines are packed greedily. A line longer than `limit` is wrapped
/// on whitespace, breaking words only when a single word does not fit.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let len = line.chars().count();
        if len > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let options = textwrap::Options::new(limit).break_words(true);
            pieces.extend(
                textwrap::wrap(line, options)
                    .into_iter()
                    .filter(|piece| !piece.is_empty())
                    .map(|piece| piece.into_owned()),
            );
            continue;
        }
        if current_len + len > limit {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(line);
        current_len += len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Hard slices of `limit` characters.
pub fn split_exact(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Post `message` to the diagnostic channel, if there is one. Failures are
/// logged and reported to the same channel, never returned.
pub async fn log_diagnostic<P: ChatPlatform + ?Sized>(
    platform: &P,
    channel_id: Option<&str>,
    message: &str,
) {
    let Some(channel_id) = channel_id else {
        debug!(text = message, "No diagnostic channel");
        return;
    };
    info!(channel_id, text = message, "Diagnostic message");

    for piece in split_exact(message, MESSAGE_CHUNK_SIZE) {
        if let Err(e) = platform.send_message(channel_id, &piece).await {
            error!(channel_id, error = %e, "Error sending diagnostic message");
            let notice = format!("message about {} could not be sent: {}", channel_id, e);
            let _ = platform.send_message(channel_id, &notice).await;
            return;
        }
    }
}

/// JSON body posted to a target webhook.
pub fn webhook_body(message: &str, incoming_payload: &Value, now: DateTime<Utc>) -> Value {
    json!({
        "content": message,
        "timestamp": now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "incoming_payload": incoming_payload,
    })
}

/// Client for forwarding results to a caller-supplied webhook URL.
#[derive(Debug, Clone, Default)]
pub struct OutboundWebhook {
    client: reqwest::Client,
}

impl OutboundWebhook {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Post `message` to `target`. Returns the response status; non-2xx is
    /// not an error.
    pub async fn send(
        &self,
        message: &str,
        target: &str,
        incoming_payload: &Value,
    ) -> Result<u16, PlatformError> {
        let body = webhook_body(message, incoming_payload, Utc::now());
        let resp = self
            .client
            .post(target)
            .json(&body)
            .send()
            .await
            .map_err(PlatformError::Http)?;
        let status = resp.status().as_u16();
        info!(target, status, "Webhook response");
        Ok(status)
    }
}
