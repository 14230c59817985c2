use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{self, DayIndex, WeekDays, DAYS_IN_WEEK};
use crate::error::{HabitError, HabitResult};
use crate::habit::{HabitId, HabitMetadata, HabitRecord};
use crate::status::{stat_delta, StatDelta, Status};

pub type ArchiveId = Uuid;

/// Lifetime completed/failed/incomplete counts of an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatTotals {
    pub completed: u32,
    pub failed: u32,
    pub incomplete: u32,
}

impl StatTotals {
    /// `None` when the delta would take a counter below zero.
    pub fn checked_apply(&self, delta: StatDelta) -> Option<StatTotals> {
        Some(StatTotals {
            completed: shift(self.completed, delta.completed)?,
            failed: shift(self.failed, delta.failed)?,
            incomplete: shift(self.incomplete, delta.incomplete)?,
        })
    }

    pub fn success_rate(&self) -> f64 {
        let resolved = f64::from(self.completed) + f64::from(self.failed);
        if resolved == 0.0 {
            100.0
        } else {
            f64::from(self.completed) / resolved * 100.0
        }
    }
}

fn shift(value: u32, by: i64) -> Option<u32> {
    let shifted = i64::from(value).checked_add(by)?;
    u32::try_from(shifted).ok()
}

/// One week of a habit's history.
///
/// The newest snapshot follows the live habit until the week rolls over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchivedHabitRecord {
    statuses: [Status; DAYS_IN_WEEK],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ArchivedHabitRecord {
    pub fn new(statuses: [Status; DAYS_IN_WEEK], start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            statuses,
            start_date,
            end_date,
        }
    }

    pub fn statuses(&self) -> &[Status; DAYS_IN_WEEK] {
        &self.statuses
    }

    pub fn days(&self) -> WeekDays {
        self.statuses.map(Status::is_scheduled)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn totals(&self) -> StatTotals {
        let mut totals = StatTotals::default();
        for status in self.statuses {
            match status {
                Status::Completed => totals.completed += 1,
                Status::Failed => totals.failed += 1,
                Status::Incomplete => totals.incomplete += 1,
                Status::Empty => {}
            }
        }
        totals
    }
}

/// Durable aggregate of one logical habit: counters, lifecycle flag and the
/// week-by-week history. Outlives the live [`HabitRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveRecord {
    pub id: ArchiveId,
    /// Live habit, if the archive is active.
    pub habit_id: Option<HabitId>,
    #[serde(flatten)]
    pub meta: HabitMetadata,
    active: bool,
    totals: StatTotals,
    success_rate: f64,
    current_week_number: u32,
    /// Newest first.
    snapshots: Vec<ArchivedHabitRecord>,
}

impl ArchiveRecord {
    pub fn new(meta: HabitMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            habit_id: None,
            meta,
            active: true,
            totals: StatTotals::default(),
            success_rate: 100.0,
            current_week_number: 1,
            snapshots: Vec::new(),
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn totals(&self) -> StatTotals {
        self.totals
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn current_week_number(&self) -> u32 {
        self.current_week_number
    }

    pub fn snapshots(&self) -> &[ArchivedHabitRecord] {
        &self.snapshots
    }

    pub fn current_snapshot(&self) -> Option<&ArchivedHabitRecord> {
        self.snapshots.first()
    }

    pub fn goal_reached(&self) -> bool {
        self.meta.goal == Some(self.totals.completed)
    }

    /// Bind a newly created habit: its scheduled days are counted and the
    /// first snapshot is opened for the week containing `today`.
    pub fn attach(&mut self, habit: &HabitRecord, today: NaiveDate) -> HabitResult<()> {
        if habit.archive_id != self.id {
            return Err(HabitError::invariant(format!(
                "habit `{}` does not belong to archive `{}`",
                habit.id, self.id
            )));
        }
        self.seed_week(habit.statuses())?;
        let (start, end) = calendar::week_bounds(today);
        self.create_snapshot(*habit.statuses(), start, end);
        self.habit_id = Some(habit.id);
        Ok(())
    }

    pub fn update_stats(&mut self, old: Status, new: Status) -> HabitResult<()> {
        self.apply_delta(stat_delta(old, new))
    }

    /// Apply a ledger delta to all three counters at once and refresh the
    /// success rate. Nothing changes if any counter would go negative.
    pub fn apply_delta(&mut self, delta: StatDelta) -> HabitResult<()> {
        if delta.is_zero() {
            return Ok(());
        }
        let totals = self.totals.checked_apply(delta).ok_or_else(|| {
            HabitError::invariant(format!(
                "delta {delta:?} underflows counters {:?} of archive `{}`",
                self.totals, self.id
            ))
        })?;
        self.totals = totals;
        self.success_rate = totals.success_rate();
        Ok(())
    }

    pub fn create_snapshot(
        &mut self,
        statuses: [Status; DAYS_IN_WEEK],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) {
        self.snapshots
            .insert(0, ArchivedHabitRecord::new(statuses, start_date, end_date));
    }

    pub fn update_current_snapshot_statuses(&mut self, statuses: &[Status; DAYS_IN_WEEK]) {
        if let Some(snapshot) = self.snapshots.first_mut() {
            snapshot.statuses = *statuses;
        }
    }

    pub fn update_current_snapshot_status(&mut self, day: DayIndex, status: Status) {
        if let Some(slot) = self
            .snapshots
            .first_mut()
            .and_then(|snapshot| snapshot.statuses.get_mut(day))
        {
            *slot = status;
        }
    }

    /// Open the next week: count its seeded days, bump the week number and
    /// push a snapshot for it.
    pub fn begin_week(
        &mut self,
        statuses: &[Status; DAYS_IN_WEEK],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> HabitResult<()> {
        self.seed_week(statuses)?;
        self.current_week_number += 1;
        self.create_snapshot(*statuses, start_date, end_date);
        Ok(())
    }

    /// Mark the archive finished. The caller destroys the returned live habit;
    /// counters and history are kept.
    pub fn finish(&mut self) -> Option<HabitId> {
        self.active = false;
        self.habit_id.take()
    }

    /// Reactivate a finished archive with a brand-new habit whose days come
    /// from the latest snapshot.
    ///
    /// Within the snapshot's week the statuses resume as they were, since the
    /// counters already include them; for a tracked habit, days that passed
    /// while it was finished and are still `incomplete` become `failed`. In a
    /// later week a new week is opened with every scheduled day `incomplete`.
    pub fn restore(&mut self, today: NaiveDate) -> HabitResult<HabitRecord> {
        if self.active {
            return Err(HabitError::invariant(format!(
                "archive `{}` is already active",
                self.id
            )));
        }
        let latest = self.current_snapshot().cloned().ok_or_else(|| {
            HabitError::invariant(format!("archive `{}` has no history to restore", self.id))
        })?;

        let habit = if latest.contains(today) {
            let mut habit =
                HabitRecord::from_week(self.id, self.meta.clone(), *latest.statuses(), today);
            if self.meta.tracking {
                let current_day = calendar::day_index(today);
                for day in 0..current_day {
                    if habit.status(day) == Some(Status::Incomplete) {
                        habit.set_status(self, day, Status::Failed, current_day)?;
                    }
                }
            }
            habit
        } else {
            let habit = HabitRecord::new(self.id, self.meta.clone(), latest.days(), today);
            let (start, end) = calendar::week_bounds(today);
            self.begin_week(habit.statuses(), start, end)?;
            habit
        };

        self.active = true;
        self.habit_id = Some(habit.id);
        tracing::info!(archive = %self.id, habit = %habit.id, "archive restored");
        Ok(habit)
    }

    /// Zero the counters, drop all history and start over from a freshly
    /// seeded week of `habit`.
    pub fn reset_all(&mut self, habit: &mut HabitRecord, today: NaiveDate) -> HabitResult<()> {
        if habit.archive_id != self.id {
            return Err(HabitError::invariant(format!(
                "habit `{}` does not belong to archive `{}`",
                habit.id, self.id
            )));
        }
        self.totals = StatTotals::default();
        self.success_rate = 100.0;
        habit.reset_statuses();
        self.snapshots.clear();
        self.seed_week(habit.statuses())?;
        let (start, end) = calendar::week_bounds(today);
        self.create_snapshot(*habit.statuses(), start, end);
        Ok(())
    }

    fn seed_week(&mut self, statuses: &[Status; DAYS_IN_WEEK]) -> HabitResult<()> {
        let delta = statuses
            .iter()
            .fold(StatDelta::ZERO, |acc, status| acc + stat_delta(Status::Empty, *status));
        self.apply_delta(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::tests::{meta, pair, today};
    use chrono::Duration;

    #[test]
    fn success_rate_defaults_to_hundred() {
        assert_eq!(StatTotals::default().success_rate(), 100.0);
        let totals = StatTotals {
            completed: 3,
            failed: 1,
            incomplete: 9,
        };
        assert_eq!(totals.success_rate(), 75.0);
    }

    #[test]
    fn attach_counts_scheduled_days_and_opens_a_snapshot() {
        let (habit, archive) = pair([true, false, true, false, true, false, false]);
        assert_eq!(archive.totals().incomplete, 3);
        assert_eq!(archive.current_week_number(), 1);
        assert_eq!(archive.habit_id, Some(habit.id));
        let snapshot = archive.current_snapshot().unwrap();
        assert_eq!(snapshot.statuses(), habit.statuses());
        assert!(snapshot.contains(today()));
    }

    #[test]
    fn underflowing_delta_is_rejected_without_mutation() {
        let mut archive = ArchiveRecord::new(meta("Walk"));
        let err = archive.update_stats(Status::Completed, Status::Failed);
        assert!(matches!(err, Err(HabitError::InvariantViolation(_))));
        assert_eq!(archive.totals(), StatTotals::default());
    }

    #[test]
    fn success_rate_tracks_every_update() {
        let (mut habit, mut archive) = pair([true, true, true, true, false, false, false]);
        habit.set_status(&mut archive, 0, Status::Completed, 3).unwrap();
        habit.set_status(&mut archive, 1, Status::Failed, 3).unwrap();
        habit.set_status(&mut archive, 2, Status::Completed, 3).unwrap();
        let totals = archive.totals();
        let expected =
            f64::from(totals.completed) / f64::from(totals.completed + totals.failed) * 100.0;
        assert_eq!(archive.success_rate(), expected);
    }

    #[test]
    fn snapshots_are_newest_first() {
        let mut archive = ArchiveRecord::new(meta("Walk"));
        let first = today();
        let second = first + Duration::days(7);
        archive.create_snapshot([Status::Empty; DAYS_IN_WEEK], first, first);
        archive.create_snapshot([Status::Incomplete; DAYS_IN_WEEK], second, second);
        assert_eq!(archive.current_snapshot().unwrap().start_date, second);
        assert_eq!(archive.snapshots()[1].start_date, first);
    }

    #[test]
    fn finish_then_restore_keeps_counters_and_days() {
        let (mut habit, mut archive) = pair([true, false, false, true, false, false, false]);
        habit.set_status(&mut archive, 0, Status::Completed, 3).unwrap();
        let totals = archive.totals();
        let rate = archive.success_rate();

        assert_eq!(archive.finish(), Some(habit.id));
        assert!(!archive.active());
        assert_eq!(archive.habit_id, None);

        let restored = archive.restore(today()).unwrap();
        assert!(archive.active());
        assert_eq!(archive.totals(), totals);
        assert_eq!(archive.success_rate(), rate);
        assert_eq!(restored.days(), &archive.current_snapshot().unwrap().days());
        assert_eq!(restored.statuses(), habit.statuses());
        assert_ne!(restored.id, habit.id);
        assert_eq!(archive.habit_id, Some(restored.id));
        assert_eq!(archive.snapshots().len(), 1);
    }

    #[test]
    fn restore_fails_tracked_days_missed_while_finished() {
        let (_, mut archive) = pair([false, true, false, false, false, true, false]);
        archive.finish();

        let restored = archive.restore(today()).unwrap();
        assert_eq!(restored.status(1), Some(Status::Failed));
        assert_eq!(restored.status(5), Some(Status::Incomplete));
        assert_eq!(archive.totals().failed, 1);
        assert_eq!(archive.totals().incomplete, 1);
        assert_eq!(
            archive.current_snapshot().unwrap().statuses()[1],
            Status::Failed
        );
    }

    #[test]
    fn untracked_restore_leaves_missed_days_open() {
        let (_, mut archive) = pair([false, true, false, false, false, true, false]);
        archive.meta.tracking = false;
        archive.finish();

        let restored = archive.restore(today()).unwrap();
        assert_eq!(restored.status(1), Some(Status::Incomplete));
        assert_eq!(archive.totals().incomplete, 2);
        assert_eq!(archive.totals().failed, 0);
    }

    #[test]
    fn restore_in_a_later_week_opens_a_new_week() {
        let (mut habit, mut archive) = pair([true, false, false, true, false, false, false]);
        habit.set_status(&mut archive, 0, Status::Completed, 3).unwrap();
        archive.finish();

        let later = today() + Duration::days(14);
        let restored = archive.restore(later).unwrap();
        assert_eq!(restored.status(0), Some(Status::Incomplete));
        assert_eq!(restored.status(3), Some(Status::Incomplete));
        assert_eq!(archive.totals().completed, 1);
        assert_eq!(archive.totals().incomplete, 3);
        assert_eq!(archive.current_week_number(), 2);
        assert_eq!(archive.snapshots().len(), 2);
        assert!(archive.current_snapshot().unwrap().contains(later));
    }

    #[test]
    fn restore_requires_a_finished_archive() {
        let (_, mut archive) = pair([true; DAYS_IN_WEEK]);
        assert!(archive.restore(today()).is_err());
    }

    #[test]
    fn reset_all_starts_history_over() {
        let (mut habit, mut archive) = pair([true, true, false, false, false, false, false]);
        habit.set_status(&mut archive, 0, Status::Failed, 3).unwrap();
        archive.create_snapshot(*habit.statuses(), today(), today());

        archive.reset_all(&mut habit, today()).unwrap();
        assert_eq!(
            archive.totals(),
            StatTotals {
                completed: 0,
                failed: 0,
                incomplete: 2,
            }
        );
        assert_eq!(archive.success_rate(), 100.0);
        assert_eq!(archive.snapshots().len(), 1);
        assert_eq!(archive.current_snapshot().unwrap().statuses(), habit.statuses());
        assert_eq!(habit.status(0), Some(Status::Incomplete));
    }
}
