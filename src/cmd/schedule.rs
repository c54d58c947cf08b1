//! Scheduled summary commands: `recap schedule`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Utc;
use recap::schedule::{TaskList, WebhookJobRunner, generate_job_periods, run_catchup};

use super::super::ScheduleCommands;
use super::{Cli, load_config};

pub async fn cmd_schedule(cli: &Cli, project_dir: PathBuf, command: ScheduleCommands) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let schedule = &config.toml.schedule;
    let settings = schedule.settings(Utc::now().date_naive());
    let payload = schedule.load_payload(&config.project_dir)?;
    let mut tasks = TaskList::new(payload)
        .with_summary_dir(config.summary_dir())
        .with_file_format(schedule.file_format.clone());

    match command {
        ScheduleCommands::Periods { start, end } => {
            let (start, default_end) = match start {
                Some(start) => (start, start + chrono::Duration::days(7)),
                None => (settings.start_date, settings.end_date),
            };
            let end = end.unwrap_or(default_end);
            tasks.set_periods(generate_job_periods(start, end));

            println!();
            println!("Job periods from {} to {}", start, end);
            println!();
            for period in tasks.periods() {
                let status = if tasks.job_is_done(period) {
                    console::style("done").green()
                } else {
                    console::style("pending").yellow()
                };
                println!("  {}  {}", period, status);
            }
            println!();
            println!("Periods: {}", tasks.periods().len());
        }
        ScheduleCommands::Catchup => {
            if tasks.default_payload().bot_webhook_server.is_none() {
                bail!(
                    "No bot_webhook_server in the job payload; set [schedule] payload_file in recap.toml"
                );
            }
            tasks.set_periods(generate_job_periods(settings.start_date, settings.end_date));
            let done = run_catchup(&tasks, &WebhookJobRunner::default(), settings.catchup_delay).await?;
            println!("Caught up {} jobs into {}", done, tasks.summary_dir().display());
        }
    }
    Ok(())
}
