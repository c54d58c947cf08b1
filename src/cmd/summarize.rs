//! One-channel summaries and chunking diagnostics: `recap summarize`, `recap chunk`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use recap::chunking::generate_headings;
use recap::llm::{AiPrompts, Summarizer};
use recap::message::ChatMessage;
use recap::platform::{ChannelInfo, ExportPlatform, TimeWindow, collect_history};
use recap::summary::{SummaryPipeline, info_block, resolve_budget, time_for_dating_back};

use super::{Cli, build_summarizer, chunker_for, load_config, load_export};

fn find_channel(platform: &ExportPlatform, channel: &str) -> Result<ChannelInfo> {
    platform
        .find_channel(channel)
        .cloned()
        .with_context(|| format!("No channel '{}' in export", channel))
}

/// Messages of `channel`, limited to the last `period` when given.
async fn load_messages(
    platform: &ExportPlatform,
    channel: &ChannelInfo,
    period: Option<&str>,
) -> Result<Vec<ChatMessage>> {
    let now = Utc::now();
    let window = match period {
        Some(period) => TimeWindow::new(time_for_dating_back(now, period)?, now),
        None => TimeWindow::new(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC),
    };
    Ok(collect_history(platform, channel, window).await?)
}

pub async fn cmd_summarize(
    cli: &Cli,
    project_dir: PathBuf,
    input: &Path,
    channel: &str,
    mode: Option<&str>,
    period: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let platform = load_export(input)?;
    let channel = find_channel(&platform, channel)?;
    let messages = load_messages(&platform, &channel, period).await?;

    let chunker = chunker_for(&config, mode)?;
    let mode_label = chunker.mode().to_string();
    let budget = resolve_budget(
        config.budget_limit(),
        &config.toml.model_catalog(),
        config.model(),
    )?;
    let summarizer = build_summarizer(&config)?;
    let pipeline = SummaryPipeline::new(
        chunker,
        Arc::clone(&summarizer) as Arc<dyn Summarizer>,
        budget,
    )
    .with_max_parallel(config.toml.chunking.max_parallel);

    let prepared = pipeline.prepare(&channel.guild_id, &channel.id, &messages)?;
    let info = info_block(
        prepared.message_count(),
        &mode_label,
        prepared.input_tokens(),
        config.model(),
    );
    eprintln!("{}", info);

    let report = pipeline.summarize(&prepared, &AiPrompts::default()).await?;
    let text = format!("{}\n{}", info, report.render());
    match output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Summary written to {}", path.display());
        }
        None => println!("{}", text),
    }

    let stats = summarizer.cache().stats();
    eprintln!(
        "{} output tokens, {} upstream calls, cache hits {} / misses {}",
        report.output_tokens,
        summarizer.calls(),
        stats.hits,
        stats.misses
    );
    Ok(())
}

pub fn cmd_chunk(
    cli: &Cli,
    project_dir: PathBuf,
    input: &Path,
    channel: &str,
    mode: Option<&str>,
) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let platform = load_export(input)?;
    let channel = find_channel(&platform, channel)?;
    let mut messages: Vec<ChatMessage> = platform
        .data()
        .messages
        .iter()
        .filter(|m| m.channel_id == channel.id)
        .cloned()
        .collect();
    messages.sort_by_key(|m| m.timestamp);

    let chunker = chunker_for(&config, mode)?;
    let budget = resolve_budget(
        config.budget_limit(),
        &config.toml.model_catalog(),
        config.model(),
    )?;
    let chunks = chunker.chunk(&messages, budget)?;

    println!();
    println!(
        "{} #{} ({} mode, budget {} tokens)",
        console::style("Chunks for").bold(),
        channel.name,
        chunker.mode(),
        budget
    );
    println!();
    for (i, chunk) in chunks.chunks.iter().enumerate() {
        println!(
            "  {:>3}. {:>5} messages {:>7} tokens  starts at {}",
            i + 1,
            chunk.message_count,
            chunk.token_count,
            chunk.start.map(|m| m.id.as_str()).unwrap_or("-")
        );
    }
    println!();
    println!("Chunks: {}", chunks.len());
    println!("Messages: {}", chunks.message_total());
    println!("Input tokens: {}", chunks.input_tokens);

    let headings = generate_headings(&channel.guild_id, &channel.id, &chunks);
    if !headings.is_empty() {
        println!();
        for heading in headings {
            print!("{}", heading);
        }
    }
    Ok(())
}
