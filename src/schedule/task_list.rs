//! Which periods are done, which are due, and where results go.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::periods::JobPeriod;
use crate::summary::SummaryRequest;
use crate::summary::period::format_timestamp;

pub const DEFAULT_SUMMARY_DIR: &str = "summaries";
pub const DEFAULT_FILE_FORMAT: &str = "md";

/// A set of periods plus the payload template used to summarize them.
///
/// A period is done when its result file exists, so progress survives
/// restarts without a separate job list.
#[derive(Debug, Clone)]
pub struct TaskList {
    periods: Vec<JobPeriod>,
    default_payload: SummaryRequest,
    summary_dir: PathBuf,
    file_format: String,
}

impl TaskList {
    pub fn new(default_payload: SummaryRequest) -> Self {
        Self {
            periods: Vec::new(),
            default_payload,
            summary_dir: PathBuf::from(DEFAULT_SUMMARY_DIR),
            file_format: DEFAULT_FILE_FORMAT.to_string(),
        }
    }

    pub fn with_summary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.summary_dir = dir.into();
        self
    }

    pub fn with_file_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = format.into();
        self
    }

    pub fn set_periods(&mut self, periods: Vec<JobPeriod>) {
        self.periods = periods;
    }

    pub fn periods(&self) -> &[JobPeriod] {
        &self.periods
    }

    pub fn default_payload(&self) -> &SummaryRequest {
        &self.default_payload
    }

    pub fn summary_dir(&self) -> &Path {
        &self.summary_dir
    }

    fn path_for_stem(&self, stem: &str) -> PathBuf {
        self.summary_dir.join(format!("{}.{}", stem, self.file_format))
    }

    /// `{summary_dir}/{start}_{end}.{format}`.
    pub fn result_path(&self, period: &JobPeriod) -> PathBuf {
        self.path_for_stem(&period.file_stem())
    }

    pub fn job_is_done(&self, period: &JobPeriod) -> bool {
        let path = self.result_path(period);
        let exists = path.exists();
        debug!(path = %path.display(), exists, "Checking for job result");
        exists
    }

    /// The earliest unfinished period, if it has already ended. When the
    /// earliest unfinished period is still running nothing is due.
    pub fn next_catchup_job(&self, now: DateTime<Utc>) -> Option<JobPeriod> {
        for period in &self.periods {
            if self.job_is_done(period) {
                info!(%period, "Job already done");
                continue;
            }
            if now > period.end {
                info!(%period, "Past job due");
                return Some(*period);
            }
            info!(%period, %now, "Nothing due, job ends later than now");
            return None;
        }
        None
    }

    /// Periods that end after `now`.
    pub fn future_jobs(&self, now: DateTime<Utc>) -> Vec<JobPeriod> {
        self.periods
            .iter()
            .filter(|p| p.end > now)
            .copied()
            .collect()
    }

    /// The default payload narrowed to `period`.
    pub fn payload_for(&self, period: &JobPeriod) -> SummaryRequest {
        SummaryRequest {
            starttime_to_summarize: Some(format_timestamp(period.start)),
            endtime_to_summarize: Some(format_timestamp(period.end)),
            document_id: Some(period.document_id()),
            ..self.default_payload.clone()
        }
    }

    /// Where the result of `payload` is stored: by its date range when it
    /// has one, otherwise by its document id.
    pub fn result_path_for_payload(&self, payload: &SummaryRequest) -> Option<PathBuf> {
        let date_of = |ts: &Option<String>| {
            ts.as_deref()
                .and_then(|s| s.split_whitespace().next())
                .map(|d| d.split('T').next().unwrap_or(d).to_string())
        };
        match (
            date_of(&payload.starttime_to_summarize),
            date_of(&payload.endtime_to_summarize),
        ) {
            (Some(start), Some(end)) => Some(self.path_for_stem(&format!("{}_{}", start, end))),
            _ => payload
                .document_id
                .as_deref()
                .map(|id| self.path_for_stem(id)),
        }
    }

    pub fn store_job_result(&self, payload: &SummaryRequest, result: &str) -> Result<PathBuf> {
        let path = self
            .result_path_for_payload(payload)
            .context("Payload has neither a date range nor a document_id")?;
        std::fs::create_dir_all(&self.summary_dir).with_context(|| {
            format!(
                "Failed to create summary directory {}",
                self.summary_dir.display()
            )
        })?;
        std::fs::write(&path, result)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Stored job result");
        Ok(path)
    }
}
