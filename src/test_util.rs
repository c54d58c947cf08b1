//! Shared helpers for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;

use crate::errors::SummarizeError;
use crate::llm::{AiPrompts, Summarizer};

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Summarizer double that echoes its input and records every call.
#[derive(Default)]
pub struct EchoSummarizer {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, String)>>,
    /// Fail every call whose content contains this marker.
    pub fail_on: Option<String>,
    /// Delay per call, to exercise concurrency.
    pub delay_ms: u64,
}

impl EchoSummarizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(
        &self,
        context: &str,
        content: &str,
        _prompts: &AiPrompts,
    ) -> Result<String, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((context.to_string(), content.to_string()));
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let Some(marker) = &self.fail_on {
            if content.contains(marker.as_str()) {
                return Err(SummarizeError::RateLimited { retry_after: None });
            }
        }
        Ok(format!("summary[{}]", content.lines().count()))
    }
}
