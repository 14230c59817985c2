use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use habit_domain::calendar;
use habit_domain::rollover::{RolloverKind, RolloverReport};
use habit_domain::HabitService;

pub const CLOCK_FILE: &str = "clock.json";

/// Persisted marker of the last calendar date whose rollover has run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClockState {
    pub last_processed: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolloverJob {
    pub date: NaiveDate,
    pub kind: RolloverKind,
}

impl RolloverJob {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            kind: RolloverKind::for_day(calendar::day_index(date)),
        }
    }
}

/// Detects calendar boundaries crossed since the last run and replays them
/// one date at a time.
#[derive(Debug)]
pub struct DayClock {
    path: PathBuf,
    state: ClockState,
    pending_jobs: VecDeque<RolloverJob>,
}

impl DayClock {
    /// Load the clock stored in `dir`, or start an empty one.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create `{}`", dir.display()))?;
        let path = dir.join(CLOCK_FILE);
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("`{}` is not a valid clock file", path.display()))?
        } else {
            ClockState::default()
        };
        Ok(Self {
            path,
            state,
            pending_jobs: VecDeque::new(),
        })
    }

    pub fn last_processed(&self) -> Option<NaiveDate> {
        self.state.last_processed
    }

    pub fn pending(&self) -> usize {
        self.pending_jobs.len()
    }

    pub fn dequeue_job(&mut self) -> Option<RolloverJob> {
        self.pending_jobs.pop_front()
    }

    /// Queue one job per date after the last processed one, up to `today`.
    ///
    /// A clock that has never run just records `today`. A `today` earlier than
    /// the stored date queues nothing.
    #[instrument(skip(self))]
    pub fn catch_up(&mut self, today: NaiveDate) -> Result<usize> {
        let Some(last) = self.state.last_processed else {
            self.state.last_processed = Some(today);
            self.save()?;
            return Ok(0);
        };
        if today < last {
            tracing::warn!(%last, %today, "system date moved backwards; nothing to roll over");
            return Ok(0);
        }

        let mut queued = 0;
        let mut date = last + Duration::days(1);
        while date <= today {
            if !self.pending_jobs.iter().any(|job| job.date == date) {
                self.pending_jobs.push_back(RolloverJob::for_date(date));
                queued += 1;
            }
            date += Duration::days(1);
        }
        if queued > 1 {
            tracing::info!(%last, %today, queued, "replaying missed days");
        }
        Ok(queued)
    }

    /// Run one rollover and record its date once the service has saved it.
    #[instrument(skip(self, service))]
    pub fn perform_job(
        &mut self,
        job: RolloverJob,
        service: &HabitService,
    ) -> Result<RolloverReport> {
        let report = service
            .day_changed(job.date)
            .with_context(|| format!("rollover into {} failed", job.date))?;
        self.state.last_processed = Some(job.date);
        self.save()?;
        Ok(report)
    }

    /// Drain the queue in date order. A failed job stays at the head of the
    /// queue and the clock keeps the last date that succeeded.
    pub fn run_pending(&mut self, service: &HabitService) -> Result<Vec<RolloverReport>> {
        let mut reports = Vec::with_capacity(self.pending_jobs.len());
        while let Some(job) = self.dequeue_job() {
            match self.perform_job(job, service) {
                Ok(report) => reports.push(report),
                Err(err) => {
                    self.pending_jobs.push_front(job);
                    return Err(err);
                }
            }
        }
        Ok(reports)
    }

    fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, raw).with_context(|| format!("failed to write `{}`", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace `{}`", self.path.display()))?;
        Ok(())
    }
}
