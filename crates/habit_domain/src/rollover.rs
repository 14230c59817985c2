use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveRecord;
use crate::calendar::{self, DayIndex};
use crate::error::HabitResult;
use crate::habit::HabitRecord;
use crate::status::Status;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RolloverKind {
    /// Monday through Saturday began.
    Day,
    /// Sunday began; the previous week is frozen.
    Week,
}

impl RolloverKind {
    pub fn for_day(new_day: DayIndex) -> Self {
        if new_day == 0 {
            RolloverKind::Week
        } else {
            RolloverKind::Day
        }
    }
}

/// What happened to one habit during a rollover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HabitRollover {
    pub auto_failed: bool,
    pub new_week: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverReport {
    pub date: NaiveDate,
    pub kind: RolloverKind,
    pub habits_processed: usize,
    pub habits_skipped: usize,
    pub auto_failed: usize,
    pub weeks_started: usize,
}

impl RolloverReport {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            kind: RolloverKind::for_day(calendar::day_index(date)),
            habits_processed: 0,
            habits_skipped: 0,
            auto_failed: 0,
            weeks_started: 0,
        }
    }

    pub fn record(&mut self, outcome: Option<HabitRollover>) {
        match outcome {
            Some(rolled) => {
                self.habits_processed += 1;
                self.auto_failed += usize::from(rolled.auto_failed);
                self.weeks_started += usize::from(rolled.new_week);
            }
            None => self.habits_skipped += 1,
        }
    }
}

/// Applies the transition into `date` to habits one at a time.
#[derive(Debug, Clone, Copy)]
pub struct RolloverEngine {
    date: NaiveDate,
    new_day: DayIndex,
}

impl RolloverEngine {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            new_day: calendar::day_index(date),
        }
    }

    pub fn kind(&self) -> RolloverKind {
        RolloverKind::for_day(self.new_day)
    }

    /// Roll one habit into the new day.
    ///
    /// Returns `None` when the habit was skipped: its archive is finished, or
    /// the habit has already been rolled over (or created) on this date.
    pub fn roll_habit(
        &self,
        habit: &mut HabitRecord,
        archive: &mut ArchiveRecord,
    ) -> HabitResult<Option<HabitRollover>> {
        if !archive.active() {
            return Ok(None);
        }
        if habit.rolled_over_on.is_some_and(|done| done >= self.date) {
            return Ok(None);
        }

        let mut outcome = HabitRollover::default();
        let ended_day = calendar::previous_day(self.new_day);
        if habit.meta.tracking && habit.status(ended_day) == Some(Status::Incomplete) {
            habit.set_status(archive, ended_day, Status::Failed, self.new_day)?;
            outcome.auto_failed = true;
        }

        match self.kind() {
            RolloverKind::Week => {
                habit.reset_statuses();
                let (start, end) = calendar::week_bounds(self.date);
                archive.begin_week(habit.statuses(), start, end)?;
                outcome.new_week = true;
            }
            RolloverKind::Day => habit.sync_button_state(self.new_day),
        }
        habit.rolled_over_on = Some(self.date);

        tracing::debug!(
            habit = %habit.id,
            date = %self.date,
            auto_failed = outcome.auto_failed,
            new_week = outcome.new_week,
            "habit rolled over"
        );
        Ok(Some(outcome))
    }
}
