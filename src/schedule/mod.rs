//! Scheduled summaries.
//!
//! | Module      | Purpose                                                 |
//! |-------------|---------------------------------------------------------|
//! | `periods`   | Thu-Sat, Sun-Wed, Wed-Thu windows between two dates     |
//! | `task_list` | Done/due bookkeeping and result files                   |
//! | `runner`    | Catch-up, future-period timers, weekly jobs             |
//!
//! On start the scheduler first works through every past period without
//! a result file, then arms a timer per future period and one loop per
//! weekly job.

pub mod periods;
pub mod runner;
pub mod task_list;

pub use periods::{JobPeriod, generate_job_periods};
pub use runner::{
    JobRunner, WebhookJobRunner, WeeklyJob, perform_job, run_catchup, schedule_future_jobs,
    spawn_weekly,
};
pub use task_list::TaskList;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::info;

/// What to schedule and how fast to catch up.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub catchup_delay: Duration,
    pub weekly: Vec<WeeklyJob>,
}

/// Run catch-up, then arm future and weekly jobs. Returns the handles of
/// the armed tasks; dropping them does not cancel the jobs.
pub async fn start_scheduler(
    mut tasks: TaskList,
    runner: Arc<dyn JobRunner>,
    settings: &ScheduleSettings,
) -> Result<Vec<JoinHandle<()>>> {
    tasks.set_periods(generate_job_periods(settings.start_date, settings.end_date));
    info!(
        periods = tasks.periods().len(),
        start = %settings.start_date,
        end = %settings.end_date,
        "Starting scheduler"
    );

    let done = run_catchup(&tasks, runner.as_ref(), settings.catchup_delay).await?;
    info!(done, "Catch-up finished");

    let tasks = Arc::new(tasks);
    let mut handles = schedule_future_jobs(Arc::clone(&tasks), Arc::clone(&runner), Utc::now());
    for job in &settings.weekly {
        handles.push(spawn_weekly(
            Arc::clone(&tasks),
            Arc::clone(&runner),
            job.clone(),
        ));
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingRunner(AtomicUsize);

    #[async_trait]
    impl JobRunner for CountingRunner {
        async fn run(&self, _payload: &SummaryRequest) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn test_scheduler_catches_up_then_arms_jobs() {
        let dir = tempdir().unwrap();
        let tasks = TaskList::new(SummaryRequest::default()).with_summary_dir(dir.path());
        let runner = Arc::new(CountingRunner::default());
        let settings = ScheduleSettings {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            catchup_delay: Duration::ZERO,
            weekly: vec![WeeklyJob::programming_general()],
        };

        let handles = start_scheduler(tasks, runner.clone(), &settings)
            .await
            .unwrap();

        assert_eq!(runner.0.load(Ordering::SeqCst), 4);
        // all periods are in the past, only the weekly loop is armed
        assert_eq!(handles.len(), 1);
        for handle in handles {
            handle.abort();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }
}
