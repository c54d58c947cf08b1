pub mod cache;
pub mod chunking;
pub mod delivery;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod message;
pub mod platform;
pub mod recap_config;
pub mod schedule;
pub mod summary;
pub mod webhook;

#[cfg(test)]
mod test_util;
