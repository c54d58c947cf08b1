//! Channel listing and guild digests: `recap channels`, `recap digest`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use recap::platform::ChatPlatform;
use recap::summary::digest::DigestOptions;
use recap::summary::{ChannelFilter, Criteria, select_channels, summarize_all, tagged_channels};
use recap::summary::channels::skip_reason;

use super::{Cli, build_summarizer, load_config, load_export, open_platform};

pub fn cmd_channels(input: &Path, tag: Option<&str>) -> Result<()> {
    let platform = load_export(input)?;
    let channels = &platform.data().channels;

    if let Some(tag) = tag {
        let tagged = tagged_channels(channels, tag);
        println!();
        println!("Channels tagged '{}': {}", tag, tagged.len());
        for channel in tagged {
            println!("  #{} ({})", channel.name, channel.id);
        }
        println!();
        return Ok(());
    }

    for guild in select_channels(channels, &ChannelFilter::default()) {
        println!();
        println!(
            "{} ({})",
            console::style(guild.guild_name).bold(),
            guild.guild_id
        );
        for channel in guild.channels {
            match skip_reason(channel, None) {
                Some(reason) => println!(
                    "  #{} ({})  {}",
                    channel.name,
                    channel.id,
                    console::style(format!("skipped: {}", reason)).dim()
                ),
                None => println!("  #{} ({})", channel.name, channel.id),
            }
        }
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_digest(
    cli: &Cli,
    project_dir: PathBuf,
    input: Option<&Path>,
    guild: &str,
    target: &str,
    tag: Option<String>,
    category: Option<String>,
    period: &str,
) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let summarizer = build_summarizer(&config)?;
    let options = DigestOptions {
        time_period: period.to_string(),
        lookback_days: config.toml.history.context_lookback_days,
        window: config.toml.context_window(),
        ..DigestOptions::new(target)
    };
    let criteria = Criteria::new(tag, category);

    // Export sends are captured, so print them.
    if let Some(path) = input {
        let platform = load_export(path)?;
        let count = summarize_all(
            &platform,
            summarizer.as_ref(),
            guild,
            &criteria,
            Utc::now(),
            &options,
        )
        .await?;
        for (_, text) in platform.sent().iter().filter(|(id, _)| id == target) {
            println!("{}", text);
        }
        println!("Summarized {} channels", count);
        return Ok(());
    }

    let platform: Arc<dyn ChatPlatform> = open_platform(&config, None)?;
    let count = summarize_all(
        platform.as_ref(),
        summarizer.as_ref(),
        guild,
        &criteria,
        Utc::now(),
        &options,
    )
    .await?;
    println!("Summarized {} channels into {}", count, target);
    Ok(())
}
