//! Running scheduled summaries: catch-up, future periods, weekly jobs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::task_list::TaskList;
use crate::errors::ValidationError;
use crate::summary::{IdOrName, SummaryRequest};

/// Executes one summary payload and returns the text to store.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, payload: &SummaryRequest) -> Result<String>;
}

/// Posts payloads to the bot's own webhook (`bot_webhook_server`).
#[derive(Debug, Clone, Default)]
pub struct WebhookJobRunner {
    client: reqwest::Client,
}

impl WebhookJobRunner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// The `message` field of a JSON reply, or the raw text.
fn extract_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(e) => {
            error!(error = %e, "Error decoding JSON reply");
            body.to_string()
        }
    }
}

#[async_trait]
impl JobRunner for WebhookJobRunner {
    async fn run(&self, payload: &SummaryRequest) -> Result<String> {
        let url = payload
            .bot_webhook_server
            .as_deref()
            .ok_or(ValidationError::MissingField("bot_webhook_server"))?;
        debug!(url, "Sending job payload");

        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", url))?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %text, "Job webhook replied");

        if status.as_u16() != 200 {
            return Ok(format!("Error: {} {}", status.as_u16(), text));
        }
        Ok(extract_message(&text))
    }
}

/// Run `payload` and store its result.
pub async fn perform_job(
    tasks: &TaskList,
    runner: &dyn JobRunner,
    payload: &SummaryRequest,
) -> Result<String> {
    info!(actual_time = %Utc::now().format("%Y-%m-%d %H:%M:%S"), "Performing job");
    let message = runner.run(payload).await?;
    tasks.store_job_result(payload, &message)?;
    Ok(message)
}

/// Work through every past period that has no result yet, oldest first,
/// pausing `delay` between jobs. Stops at the first failure. Returns the
/// number of jobs run.
pub async fn run_catchup(tasks: &TaskList, runner: &dyn JobRunner, delay: Duration) -> Result<usize> {
    let mut done = 0;
    let mut next = tasks.next_catchup_job(Utc::now());

    while let Some(period) = next {
        info!(%period, "Next job period");
        let payload = tasks.payload_for(&period);
        perform_job(tasks, runner, &payload)
            .await
            .with_context(|| format!("Catch-up job {} failed", period))?;
        done += 1;

        next = tasks.next_catchup_job(Utc::now());
        match next {
            Some(_) if !delay.is_zero() => {
                debug!(?delay, "Sleeping before next job");
                tokio::time::sleep(delay).await;
            }
            Some(_) => {}
            None => info!("No more past jobs"),
        }
    }
    Ok(done)
}

fn until(when: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (when - now).to_std().unwrap_or(Duration::ZERO)
}

/// One task per future period, each firing when its period ends.
pub fn schedule_future_jobs(
    tasks: Arc<TaskList>,
    runner: Arc<dyn JobRunner>,
    now: DateTime<Utc>,
) -> Vec<JoinHandle<()>> {
    info!("Scheduling future jobs");
    tasks
        .future_jobs(now)
        .into_iter()
        .map(|period| {
            let tasks = Arc::clone(&tasks);
            let runner = Arc::clone(&runner);
            let wait = until(period.end, now);
            info!(%period, run_at = %period.end, "Scheduled future job");
            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                let payload = tasks.payload_for(&period);
                if let Err(e) = perform_job(&tasks, runner.as_ref(), &payload).await {
                    error!(%period, error = %e, "Scheduled job failed");
                }
            })
        })
        .collect()
}

/// A job repeating every week at a fixed UTC time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyJob {
    pub name: String,
    pub weekday: Weekday,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub channels_to_include: Option<Vec<IdOrName>>,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl WeeklyJob {
    /// Mondays at 17:00, `programming-general` only.
    pub fn programming_general() -> Self {
        Self {
            name: "programming_general_summary".to_string(),
            weekday: Weekday::Mon,
            hour: 17,
            minute: 0,
            channels_to_include: Some(vec![IdOrName::Name("programming-general".to_string())]),
            document_id: Some("programming_general_summary".to_string()),
        }
    }

    /// The first firing strictly after `now`.
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            ValidationError::InvalidTimePeriod(format!("{:02}:{:02}", self.hour, self.minute))
        })?;
        let today = now.date_naive();
        let ahead = (i64::from(self.weekday.num_days_from_monday())
            - i64::from(today.weekday().num_days_from_monday()))
        .rem_euclid(7);
        let candidate = (today + chrono::Duration::days(ahead)).and_time(time).and_utc();
        Ok(if candidate > now {
            candidate
        } else {
            candidate + chrono::Duration::weeks(1)
        })
    }

    /// `default` with this job's channel and document overrides.
    pub fn payload(&self, default: &SummaryRequest) -> SummaryRequest {
        SummaryRequest {
            channels_to_include: self
                .channels_to_include
                .clone()
                .or_else(|| default.channels_to_include.clone()),
            document_id: Some(self.document_id.clone().unwrap_or_else(|| self.name.clone())),
            ..default.clone()
        }
    }
}

/// Run `job` every week until the task is aborted.
pub fn spawn_weekly(tasks: Arc<TaskList>, runner: Arc<dyn JobRunner>, job: WeeklyJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match job.next_occurrence(now) {
                Ok(next) => next,
                Err(e) => {
                    error!(job = %job.name, error = %e, "Invalid weekly job");
                    return;
                }
            };
            info!(job = %job.name, %next, "Weekly job scheduled");
            tokio::time::sleep(until(next, now)).await;

            let payload = job.payload(tasks.default_payload());
            if let Err(e) = perform_job(&tasks, runner.as_ref(), &payload).await {
                error!(job = %job.name, error = %e, "Weekly job failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::generate_job_periods;
    use crate::test_util::spawn_server;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records payloads and answers with a canned message.
    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<SummaryRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run(&self, payload: &SummaryRequest) -> Result<String> {
            self.seen.lock().unwrap().push(payload.clone());
            if self.fail {
                anyhow::bail!("upstream down");
            }
            Ok(format!("summary for {}", payload.document_id.clone().unwrap_or_default()))
        }
    }

    fn tasks(dir: &std::path::Path) -> TaskList {
        let mut tasks = TaskList::new(SummaryRequest::default()).with_summary_dir(dir);
        tasks.set_periods(generate_job_periods(
            NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        ));
        tasks
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(extract_message(r#"{"message": "hello"}"#), "hello");
        assert_eq!(extract_message(r#"{"other": 1}"#), r#"{"other": 1}"#);
        assert_eq!(extract_message("plain"), "plain");
    }

    #[tokio::test]
    async fn test_catchup_runs_all_past_jobs_in_order() {
        let dir = tempdir().unwrap();
        let tasks = tasks(dir.path());
        let runner = RecordingRunner::default();

        let done = run_catchup(&tasks, &runner, Duration::ZERO).await.unwrap();

        assert_eq!(done, 4);
        let ids: Vec<String> = runner
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.document_id.clone().unwrap())
            .collect();
        assert_eq!(ids[0], "2025-01-05_to_2025-01-08");
        assert_eq!(ids[3], "2025-01-12_to_2025-01-15");
        let stored = std::fs::read_to_string(dir.path().join("2025-01-05_2025-01-08.md")).unwrap();
        assert_eq!(stored, "summary for 2025-01-05_to_2025-01-08");

        // everything is done now
        assert_eq!(run_catchup(&tasks, &runner, Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_catchup_stops_on_failure() {
        let dir = tempdir().unwrap();
        let tasks = tasks(dir.path());
        let runner = RecordingRunner {
            fail: true,
            ..Default::default()
        };
        let err = run_catchup(&tasks, &runner, Duration::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("Catch-up job"));
        assert_eq!(runner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_future_jobs_fire_at_period_end() {
        let dir = tempdir().unwrap();
        let now = Utc::now();
        let mut list = TaskList::new(SummaryRequest::default()).with_summary_dir(dir.path());
        let period = crate::schedule::JobPeriod::new(now - chrono::Duration::hours(1), now);
        list.set_periods(vec![period]);
        let runner = Arc::new(RecordingRunner::default());

        let handles = schedule_future_jobs(
            Arc::new(list),
            runner.clone(),
            now - chrono::Duration::milliseconds(20),
        );
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(runner.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_runner_extracts_message() {
        let app = Router::new()
            .route(
                "/webhook",
                post(|| async { axum::Json(serde_json::json!({"message": "weekly digest"})) }),
            )
            .route(
                "/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base = spawn_server(app).await;
        let runner = WebhookJobRunner::default();

        let ok = SummaryRequest {
            bot_webhook_server: Some(format!("{base}/webhook")),
            ..Default::default()
        };
        assert_eq!(runner.run(&ok).await.unwrap(), "weekly digest");

        let broken = SummaryRequest {
            bot_webhook_server: Some(format!("{base}/broken")),
            ..Default::default()
        };
        assert_eq!(runner.run(&broken).await.unwrap(), "Error: 500 boom");

        assert!(runner.run(&SummaryRequest::default()).await.is_err());
    }

    #[test]
    fn test_weekly_next_occurrence() {
        let job = WeeklyJob::programming_general();
        // Saturday
        let sat = Utc.with_ymd_and_hms(2025, 1, 4, 9, 0, 0).unwrap();
        assert_eq!(
            job.next_occurrence(sat).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 6, 17, 0, 0).unwrap()
        );
        // Monday before and after the firing time
        let mon_early = Utc.with_ymd_and_hms(2025, 1, 6, 16, 59, 0).unwrap();
        assert_eq!(
            job.next_occurrence(mon_early).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 6, 17, 0, 0).unwrap()
        );
        let mon_late = Utc.with_ymd_and_hms(2025, 1, 6, 17, 0, 0).unwrap();
        assert_eq!(
            job.next_occurrence(mon_late).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 13, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_rejects_bad_time() {
        let job = WeeklyJob {
            hour: 25,
            ..WeeklyJob::programming_general()
        };
        assert!(job.next_occurrence(Utc::now()).is_err());
    }

    #[test]
    fn test_weekly_payload_overrides() {
        let default = SummaryRequest {
            bot_webhook_server: Some("http://bot/webhook".into()),
            ..Default::default()
        };
        let payload = WeeklyJob::programming_general().payload(&default);
        assert_eq!(
            payload.channels_to_include,
            Some(vec![IdOrName::Name("programming-general".into())])
        );
        assert_eq!(payload.document_id.as_deref(), Some("programming_general_summary"));
        assert_eq!(payload.bot_webhook_server.as_deref(), Some("http://bot/webhook"));
    }

    #[test]
    fn test_weekly_job_from_toml() {
        let job: WeeklyJob = toml::from_str(
            r#"
            name = "ops"
            weekday = "Fri"
            hour = 9
            channels_to_include = ["ops"]
            "#,
        )
        .unwrap();
        assert_eq!(job.weekday, Weekday::Fri);
        assert_eq!(job.minute, 0);
    }
}
