//! Inbound webhook server.
//!
//! `POST /webhook` takes a [`crate::summary::SummaryRequest`] and answers
//! `{"message": ...}` with the summary, or the timeout message.
//! `GET /health` answers `ok`.

pub mod api;
pub mod server;

pub use api::{AppState, SharedState, TIMEOUT_MESSAGE, api_router, summarize_with_timeout};
pub use server::{ServerConfig, build_router, shutdown_signal, start_server};
