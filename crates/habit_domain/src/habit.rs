use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::archive::{ArchiveId, ArchiveRecord};
use crate::calendar::{self, DayIndex, WeekDays, DAYS_IN_WEEK};
use crate::error::{HabitError, HabitResult};
use crate::status::{stat_delta, StatDelta, Status};

pub type HabitId = Uuid;

/// User-editable fields mirrored between a habit and its archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitMetadata {
    pub title: String,
    pub color: u8,
    pub priority: u8,
    pub flag: bool,
    pub reminder: Option<NaiveTime>,
    /// Completed-day target; `None` is unbounded.
    pub goal: Option<u32>,
    /// Whether unresolved days fail automatically when they end.
    pub tracking: bool,
}

/// The live week of a habit.
///
/// `days` and `statuses` are kept private so that a day is `Empty` exactly
/// when it is unscheduled; every write goes through the methods below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitRecord {
    pub id: HabitId,
    pub archive_id: ArchiveId,
    #[serde(flatten)]
    pub meta: HabitMetadata,
    days: WeekDays,
    statuses: [Status; DAYS_IN_WEEK],
    pub button_state: bool,
    pub date_created: NaiveDate,
    /// Last calendar date a rollover was applied (or the habit was created).
    #[serde(default)]
    pub rolled_over_on: Option<NaiveDate>,
}

impl HabitRecord {
    pub fn new(
        archive_id: ArchiveId,
        meta: HabitMetadata,
        days: WeekDays,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            archive_id,
            meta,
            days,
            statuses: days.map(Status::seed),
            button_state: false,
            date_created: today,
            rolled_over_on: Some(today),
        }
    }

    /// Rebuild a habit from a stored week; scheduled days are the non-empty ones.
    pub fn from_week(
        archive_id: ArchiveId,
        meta: HabitMetadata,
        statuses: [Status; DAYS_IN_WEEK],
        today: NaiveDate,
    ) -> Self {
        let mut habit = Self {
            id: Uuid::new_v4(),
            archive_id,
            meta,
            days: statuses.map(Status::is_scheduled),
            statuses,
            button_state: false,
            date_created: today,
            rolled_over_on: Some(today),
        };
        habit.sync_button_state(calendar::day_index(today));
        habit
    }

    pub fn days(&self) -> &WeekDays {
        &self.days
    }

    pub fn statuses(&self) -> &[Status; DAYS_IN_WEEK] {
        &self.statuses
    }

    pub fn status(&self, day: DayIndex) -> Option<Status> {
        self.statuses.get(day).copied()
    }

    pub fn is_scheduled(&self, day: DayIndex) -> bool {
        self.days.get(day).copied().unwrap_or(false)
    }

    /// Record a user (or auto-fail) resolution for one scheduled day.
    ///
    /// The counter delta is applied to `archive` before the day is written, and
    /// the archive's current snapshot follows the new status.
    pub fn set_status(
        &mut self,
        archive: &mut ArchiveRecord,
        day: DayIndex,
        status: Status,
        current_day: DayIndex,
    ) -> HabitResult<Status> {
        self.ensure_owned_by(archive)?;
        let day = calendar::ensure_day(day)?;
        if !self.days[day] {
            return Err(HabitError::invariant(format!(
                "{} is not scheduled for `{}`",
                calendar::day_name(day),
                self.meta.title
            )));
        }
        if status == Status::Empty {
            return Err(HabitError::invariant(
                "a scheduled day cannot be set to empty",
            ));
        }

        let old = self.statuses[day];
        archive.update_stats(old, status)?;
        self.statuses[day] = status;
        archive.update_current_snapshot_status(day, status);
        if day == current_day {
            self.button_state = status.is_resolved();
        }
        tracing::debug!(habit = %self.id, day, from = old.label(), to = status.label(), "status changed");
        Ok(old)
    }

    /// Seed a fresh week: `incomplete` where scheduled, `empty` elsewhere.
    ///
    /// Archive counters are left alone.
    pub fn reset_statuses(&mut self) {
        self.statuses = self.days.map(Status::seed);
        self.button_state = false;
    }

    /// Change which days are scheduled, keeping resolutions of days that stay
    /// scheduled. Returns `false` when `new_days` equals the current selection.
    pub fn apply_day_selection_change(
        &mut self,
        archive: &mut ArchiveRecord,
        new_days: WeekDays,
        current_day: DayIndex,
    ) -> HabitResult<bool> {
        self.ensure_owned_by(archive)?;
        if new_days == self.days {
            return Ok(false);
        }

        let mut statuses = self.statuses;
        let mut delta = StatDelta::ZERO;
        for (day, status) in statuses.iter_mut().enumerate() {
            let replacement = match (new_days[day], *status) {
                (false, _) => Status::Empty,
                (true, Status::Completed) => Status::Completed,
                (true, Status::Failed) => Status::Failed,
                (true, Status::Incomplete | Status::Empty) => Status::Incomplete,
            };
            delta += stat_delta(*status, replacement);
            *status = replacement;
        }

        // Counters first: a rejected delta leaves the habit untouched.
        archive.apply_delta(delta)?;
        self.days = new_days;
        self.statuses = statuses;
        archive.update_current_snapshot_statuses(&statuses);
        self.sync_button_state(current_day);
        Ok(true)
    }

    /// Mirror today's resolution into the button state.
    pub fn sync_button_state(&mut self, current_day: DayIndex) {
        self.button_state = self
            .status(current_day)
            .map(Status::is_resolved)
            .unwrap_or(false);
    }

    pub fn scheduled_days(&self) -> impl Iterator<Item = DayIndex> + '_ {
        self.days
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| **scheduled)
            .map(|(day, _)| day)
    }

    fn ensure_owned_by(&self, archive: &ArchiveRecord) -> HabitResult<()> {
        if archive.id != self.archive_id {
            return Err(HabitError::invariant(format!(
                "habit `{}` belongs to archive `{}`, not `{}`",
                self.id, self.archive_id, archive.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn meta(title: &str) -> HabitMetadata {
        HabitMetadata {
            title: title.to_string(),
            color: 2,
            priority: 1,
            flag: false,
            reminder: None,
            goal: None,
            tracking: true,
        }
    }

    // Wednesday.
    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 22).unwrap()
    }

    pub(crate) fn pair(days: WeekDays) -> (HabitRecord, ArchiveRecord) {
        let mut archive = ArchiveRecord::new(meta("Stretch"));
        let habit = HabitRecord::new(archive.id, meta("Stretch"), days, today());
        archive.attach(&habit, today()).unwrap();
        (habit, archive)
    }

    fn assert_empty_iff_unscheduled(habit: &HabitRecord) {
        for (day, status) in habit.statuses().iter().enumerate() {
            assert_eq!(*status == Status::Empty, !habit.days()[day], "day {day}");
        }
    }

    #[test]
    fn new_habit_seeds_statuses_from_days() {
        let (habit, _) = pair([true, false, true, false, false, false, false]);
        assert_eq!(habit.status(0), Some(Status::Incomplete));
        assert_eq!(habit.status(1), Some(Status::Empty));
        assert!(!habit.button_state);
        assert_empty_iff_unscheduled(&habit);
    }

    #[test]
    fn set_status_routes_through_the_ledger() {
        let (mut habit, mut archive) = pair([false, false, true, true, false, false, false]);
        assert_eq!(archive.totals().incomplete, 2);

        habit.set_status(&mut archive, 3, Status::Completed, 3).unwrap();
        assert_eq!(archive.totals().completed, 1);
        assert_eq!(archive.totals().incomplete, 1);
        assert!(habit.button_state);
        assert_eq!(archive.current_snapshot().unwrap().statuses()[3], Status::Completed);

        habit.set_status(&mut archive, 3, Status::Incomplete, 3).unwrap();
        assert_eq!(archive.totals().completed, 0);
        assert_eq!(archive.totals().incomplete, 2);
        assert!(!habit.button_state);
    }

    #[test]
    fn set_status_rejects_unscheduled_days_and_empty() {
        let (mut habit, mut archive) = pair([true, false, false, false, false, false, false]);
        let before = archive.totals();
        assert!(matches!(
            habit.set_status(&mut archive, 1, Status::Completed, 3),
            Err(HabitError::InvariantViolation(_))
        ));
        assert!(matches!(
            habit.set_status(&mut archive, 0, Status::Empty, 3),
            Err(HabitError::InvariantViolation(_))
        ));
        assert_eq!(archive.totals(), before);
        assert_empty_iff_unscheduled(&habit);
    }

    #[test]
    fn set_status_rejects_foreign_archive() {
        let (mut habit, _) = pair([true; DAYS_IN_WEEK]);
        let mut other = ArchiveRecord::new(meta("Other"));
        assert!(habit
            .set_status(&mut other, 0, Status::Completed, 0)
            .is_err());
    }

    #[test]
    fn day_selection_change_swaps_incomplete_days_without_net_change() {
        let (mut habit, mut archive) = pair([true, true, false, false, false, false, false]);
        habit.set_status(&mut archive, 0, Status::Completed, 3).unwrap();
        let before = archive.totals();

        let changed = habit
            .apply_day_selection_change(
                &mut archive,
                [true, false, true, false, false, false, false],
                3,
            )
            .unwrap();

        assert!(changed);
        assert_eq!(archive.totals(), before);
        assert_eq!(
            habit.statuses(),
            &[
                Status::Completed,
                Status::Empty,
                Status::Incomplete,
                Status::Empty,
                Status::Empty,
                Status::Empty,
                Status::Empty,
            ]
        );
        assert_eq!(archive.current_snapshot().unwrap().statuses(), habit.statuses());
        assert_empty_iff_unscheduled(&habit);
    }

    #[test]
    fn unscheduling_a_resolved_day_removes_its_count() {
        let (mut habit, mut archive) = pair([true, true, false, false, false, false, false]);
        habit.set_status(&mut archive, 1, Status::Failed, 3).unwrap();
        habit
            .apply_day_selection_change(
                &mut archive,
                [true, false, false, false, false, false, false],
                3,
            )
            .unwrap();
        assert_eq!(archive.totals().failed, 0);
        assert_eq!(archive.totals().incomplete, 1);
        assert_eq!(archive.success_rate(), 100.0);
    }

    #[test]
    fn unchanged_selection_is_a_no_op() {
        let days = [true, false, false, false, false, false, true];
        let (mut habit, mut archive) = pair(days);
        assert!(!habit
            .apply_day_selection_change(&mut archive, days, 3)
            .unwrap());
    }

    #[test]
    fn reset_statuses_clears_resolutions() {
        let (mut habit, mut archive) = pair([false, false, false, true, false, false, false]);
        habit.set_status(&mut archive, 3, Status::Failed, 3).unwrap();
        habit.reset_statuses();
        assert_eq!(habit.status(3), Some(Status::Incomplete));
        assert!(!habit.button_state);
        assert_eq!(archive.totals().failed, 1);
    }

    #[test]
    fn from_week_derives_days_and_button_state() {
        let mut statuses = [Status::Empty; DAYS_IN_WEEK];
        statuses[3] = Status::Completed;
        statuses[5] = Status::Incomplete;
        let habit = HabitRecord::from_week(Uuid::new_v4(), meta("Read"), statuses, today());
        assert_eq!(habit.days(), &[false, false, false, true, false, true, false]);
        assert!(habit.button_state);
        assert_eq!(habit.scheduled_days().collect::<Vec<_>>(), vec![3, 5]);
    }
}
