//! Webhook server and scheduler: `recap serve`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use recap::recap_config::RecapConfig;
use recap::schedule::{TaskList, WebhookJobRunner, start_scheduler};
use recap::webhook::{AppState, ServerConfig, shutdown_signal, start_server};
use tracing::{error, info, warn};

use super::{Cli, build_summarizer, load_config, open_platform};

const HEALTH_ATTEMPTS: u32 = 50;

pub async fn cmd_serve(
    cli: &Cli,
    project_dir: PathBuf,
    port: Option<u16>,
    input: Option<&Path>,
    no_schedule: bool,
) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let _guard = recap::logging::init_tracing(cli.verbose, cli.log_json, Some(&config.log_dir()));
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let platform = open_platform(&config, input)?;
    let summarizer = build_summarizer(&config)?;
    let mut state = AppState::new(platform, summarizer);
    state.payload_settings = config.toml.payload_settings();
    state.summary_timeout = Duration::from_secs(config.toml.webhook.summary_timeout_secs);

    let server_config = ServerConfig {
        host: config.toml.webhook.host.clone(),
        port: port.unwrap_or(config.toml.webhook.port),
    };

    let scheduler = if config.toml.schedule.enabled && !no_schedule {
        let local = format!("http://127.0.0.1:{}", server_config.port);
        Some(tokio::spawn(run_scheduler(config.clone(), local)))
    } else {
        info!("Scheduler disabled");
        None
    };

    start_server(server_config, Arc::new(state), shutdown_signal()).await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}

/// Poll `/health` until the server answers.
async fn wait_for_server(client: &reqwest::Client, base: &str) -> bool {
    for _ in 0..HEALTH_ATTEMPTS {
        if let Ok(resp) = client.get(format!("{}/health", base)).send().await
            && resp.status().is_success()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

async fn run_scheduler(config: RecapConfig, local: String) {
    let schedule = &config.toml.schedule;
    let mut payload = match schedule.load_payload(&config.project_dir) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "Scheduler not started");
            return;
        }
    };
    if payload.bot_webhook_server.is_none() {
        payload.bot_webhook_server = Some(format!("{}/webhook", local));
    }

    let client = reqwest::Client::new();
    if !wait_for_server(&client, &local).await {
        error!(%local, "Webhook server never became ready, scheduler not started");
        return;
    }

    let tasks = TaskList::new(payload)
        .with_summary_dir(config.summary_dir())
        .with_file_format(schedule.file_format.clone());
    let settings = schedule.settings(Utc::now().date_naive());
    let runner = Arc::new(WebhookJobRunner::new(client));

    match start_scheduler(tasks, runner, &settings).await {
        Ok(handles) => {
            info!(jobs = handles.len(), "Scheduler running");
            futures::future::join_all(handles).await;
        }
        Err(e) => error!(error = %e, "Scheduler stopped"),
    }
}
