use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "recap")]
#[command(version, about = "Chat channel summaries with token-bounded chunking and cached LLM calls")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Model to summarize with. Overrides recap.toml and RECAP_MODEL.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Per-chunk token budget (e.g., "80%" of the model context or "12000" tokens)
    #[arg(long, global = true)]
    pub budget: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server, plus the scheduler when enabled
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve history from an export file instead of Discord
        #[arg(long)]
        input: Option<PathBuf>,

        /// Do not start the scheduler even if enabled in recap.toml
        #[arg(long)]
        no_schedule: bool,
    },
    /// Summarize one channel of an export file
    Summarize {
        #[arg(short, long)]
        input: PathBuf,

        /// Channel id or name
        #[arg(short, long)]
        channel: String,

        /// Chunking mode: token or fixed
        #[arg(long)]
        mode: Option<String>,

        /// How far back to go (e.g., "30m", "6h", "1d", "2w"); the whole export when unset
        #[arg(long)]
        period: Option<String>,

        /// Write the summary here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how a channel would be chunked, without calling the model
    Chunk {
        #[arg(short, long)]
        input: PathBuf,

        /// Channel id or name
        #[arg(short, long)]
        channel: String,

        /// Chunking mode: token or fixed
        #[arg(long)]
        mode: Option<String>,
    },
    /// List channels of an export file and whether they would be summarized
    Channels {
        #[arg(short, long)]
        input: PathBuf,

        /// Only channels whose topic carries this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Summarize a guild's channels into one target channel
    Digest {
        /// Export file to read; Discord when unset
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Guild id or name
        #[arg(long)]
        guild: String,

        /// Channel id that receives the digest
        #[arg(long)]
        target: String,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value = "1d")]
        period: String,
    },
    /// Inspect or run scheduled summaries
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ScheduleCommands {
    /// List job periods and whether each has a result
    Periods {
        /// First day (YYYY-MM-DD); recap.toml or today when unset
        #[arg(long)]
        start: Option<chrono::NaiveDate>,
        /// Last day (YYYY-MM-DD); recap.toml or a week after start when unset
        #[arg(long)]
        end: Option<chrono::NaiveDate>,
    },
    /// Run every past job that has no result yet, then exit
    Catchup,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default recap.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Serve {
            port,
            input,
            no_schedule,
        } => {
            cmd::cmd_serve(&cli, project_dir, *port, input.as_deref(), *no_schedule).await?;
        }
        Commands::Summarize {
            input,
            channel,
            mode,
            period,
            output,
        } => {
            let _guard = cmd::init_cli_logging(&cli);
            cmd::cmd_summarize(
                &cli,
                project_dir,
                input,
                channel,
                mode.as_deref(),
                period.as_deref(),
                output.as_deref(),
            )
            .await?;
        }
        Commands::Chunk {
            input,
            channel,
            mode,
        } => {
            let _guard = cmd::init_cli_logging(&cli);
            cmd::cmd_chunk(&cli, project_dir, input, channel, mode.as_deref())?;
        }
        Commands::Channels { input, tag } => {
            cmd::cmd_channels(input, tag.as_deref())?;
        }
        Commands::Digest {
            input,
            guild,
            target,
            tag,
            category,
            period,
        } => {
            let _guard = cmd::init_cli_logging(&cli);
            cmd::cmd_digest(
                &cli,
                project_dir,
                input.as_deref(),
                guild,
                target,
                tag.clone(),
                category.clone(),
                period,
            )
            .await?;
        }
        Commands::Schedule { command } => {
            let _guard = cmd::init_cli_logging(&cli);
            cmd::cmd_schedule(&cli, project_dir, command.clone()).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
