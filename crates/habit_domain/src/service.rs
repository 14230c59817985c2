use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::instrument;

use crate::archive::{ArchiveId, ArchiveRecord};
use crate::calendar::{self, DayIndex, WeekDays};
use crate::editor::{HabitDraft, HabitEditor, NotificationPlan};
use crate::error::{HabitError, HabitResult};
use crate::events::{EventBus, EventSink, HabitEvent};
use crate::habit::{HabitId, HabitRecord};
use crate::locks::ArchiveLocks;
use crate::notifications::NotificationScheduler;
use crate::repository::{HabitStore, MemoryStore};
use crate::rollover::{RolloverEngine, RolloverReport};
use crate::sort::{self, HomeSort};
use crate::status::Status;

/// Archives split the way the history screen lists them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryView {
    pub active: Vec<ArchiveRecord>,
    pub finished: Vec<ArchiveRecord>,
}

/// Entry point for every mutation of habits and archives.
///
/// Each operation locks the affected archive, applies the change to copies of
/// the records and saves them as one pair before it talks to the notification
/// scheduler. Subscribers are called after the lock is released, so they may
/// call back into the service.
pub struct HabitService {
    store: Arc<dyn HabitStore>,
    notification_scheduler: Option<Box<dyn NotificationScheduler>>,
    events: EventBus,
    locks: ArchiveLocks,
}

pub struct HabitServiceBuilder {
    store: Option<Arc<dyn HabitStore>>,
    notification_scheduler: Option<Box<dyn NotificationScheduler>>,
    events: EventBus,
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            notification_scheduler: None,
            events: EventBus::default(),
        }
    }

    pub fn with_store<S: HabitStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.store = Some(store as Arc<dyn HabitStore>);
        self
    }

    pub fn with_notification_scheduler(mut self, scheduler: Box<dyn NotificationScheduler>) -> Self {
        self.notification_scheduler = Some(scheduler);
        self
    }

    pub fn subscribe(mut self, sink: impl EventSink + 'static) -> Self {
        self.events.subscribe(Box::new(sink));
        self
    }

    /// Without a store the service keeps everything in memory.
    pub fn build(self) -> HabitService {
        HabitService {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn HabitStore>),
            notification_scheduler: self.notification_scheduler,
            events: self.events,
            locks: ArchiveLocks::default(),
        }
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn habits(&self) -> HabitResult<Vec<HabitRecord>> {
        self.store.fetch_habits().map_err(HabitError::persistence)
    }

    pub fn sorted_habits(&self, sort: HomeSort, today: NaiveDate) -> HabitResult<Vec<HabitRecord>> {
        let mut habits = self.habits()?;
        sort::sort_habits(&mut habits, sort, calendar::day_index(today));
        Ok(habits)
    }

    pub fn habit(&self, id: HabitId) -> HabitResult<HabitRecord> {
        self.store
            .fetch_habit(id)
            .map_err(HabitError::persistence)?
            .ok_or(HabitError::NotFound { entity: "habit", id })
    }

    pub fn archives(&self) -> HabitResult<Vec<ArchiveRecord>> {
        self.store.fetch_archives().map_err(HabitError::persistence)
    }

    pub fn archive(&self, id: ArchiveId) -> HabitResult<ArchiveRecord> {
        self.store
            .fetch_archive(id)
            .map_err(HabitError::persistence)?
            .ok_or(HabitError::NotFound {
                entity: "archive",
                id,
            })
    }

    pub fn history(&self) -> HabitResult<HistoryView> {
        let (active, finished): (Vec<_>, Vec<_>) =
            self.archives()?.into_iter().partition(ArchiveRecord::active);
        Ok(HistoryView { active, finished })
    }

    /// Live habits still open on `today` (badge count).
    pub fn due_today_count(&self, today: NaiveDate) -> HabitResult<usize> {
        let day = calendar::day_index(today);
        Ok(self
            .habits()?
            .iter()
            .filter(|habit| habit.status(day) == Some(Status::Incomplete))
            .count())
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create_habit(&self, draft: &HabitDraft, today: NaiveDate) -> HabitResult<HabitRecord> {
        let (habit, archive) = HabitEditor::new(today).create(draft)?;
        let lock = self.locks.handle(archive.id);
        let guard = lock.lock();

        self.persist(&habit, &archive)?;
        self.run_notification_plan(&habit, &HabitEditor::creation_plan(&habit));
        drop(guard);
        tracing::info!(habit = %habit.id, archive = %archive.id, "habit created");
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        Ok(habit)
    }

    #[instrument(skip(self, draft))]
    pub fn edit_habit(
        &self,
        habit_id: HabitId,
        draft: &HabitDraft,
        today: NaiveDate,
    ) -> HabitResult<HabitRecord> {
        draft.validate()?;
        let lock = self.lock_for_habit(habit_id)?;
        let guard = lock.lock();
        let (mut habit, mut archive) = self.load_pair(habit_id)?;

        let outcome = HabitEditor::new(today).apply(&mut habit, &mut archive, draft)?;
        self.persist(&habit, &archive)?;
        self.run_notification_plan(&habit, &outcome.notifications);
        drop(guard);
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        Ok(habit)
    }

    /// Explicit user change of one day's status (tap or long-press menu).
    ///
    /// `GoalReached` fires only for the completion that lands on the goal,
    /// never when an already completed day is set again.
    #[instrument(skip(self))]
    pub fn set_status(
        &self,
        habit_id: HabitId,
        day: DayIndex,
        status: Status,
        today: NaiveDate,
    ) -> HabitResult<HabitRecord> {
        let lock = self.lock_for_habit(habit_id)?;
        let guard = lock.lock();
        let (mut habit, mut archive) = self.load_pair(habit_id)?;

        let previous = habit.set_status(&mut archive, day, status, calendar::day_index(today))?;
        self.persist(&habit, &archive)?;
        drop(guard);
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        if status == Status::Completed && previous != status && archive.goal_reached() {
            tracing::info!(habit = %habit.id, goal = ?archive.meta.goal, "goal reached");
            self.events.emit(HabitEvent::GoalReached { habit_id });
        }
        Ok(habit)
    }

    /// Archive the habit: the live record is deleted, history stays.
    #[instrument(skip(self))]
    pub fn finish_habit(&self, habit_id: HabitId) -> HabitResult<ArchiveRecord> {
        let lock = self.lock_for_habit(habit_id)?;
        let guard = lock.lock();
        let (habit, mut archive) = self.load_pair(habit_id)?;

        archive.finish();
        self.store
            .finish_pair(&archive, habit.id)
            .map_err(HabitError::persistence)?;
        self.run_notification_plan(
            &habit,
            &NotificationPlan {
                delete_days: Some(*habit.days()),
                create: false,
            },
        );
        drop(guard);
        tracing::info!(habit = %habit.id, archive = %archive.id, "habit finished");
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        Ok(archive)
    }

    #[instrument(skip(self))]
    pub fn restore_archive(&self, archive_id: ArchiveId, today: NaiveDate) -> HabitResult<HabitRecord> {
        let lock = self.locks.handle(archive_id);
        let guard = lock.lock();
        let mut archive = self.archive(archive_id)?;

        let habit = archive.restore(today)?;
        self.persist(&habit, &archive)?;
        self.run_notification_plan(&habit, &HabitEditor::creation_plan(&habit));
        drop(guard);
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        Ok(habit)
    }

    /// Wipe an active archive's statistics and history.
    #[instrument(skip(self))]
    pub fn reset_archive(&self, archive_id: ArchiveId, today: NaiveDate) -> HabitResult<ArchiveRecord> {
        let lock = self.locks.handle(archive_id);
        let guard = lock.lock();
        let mut archive = self.archive(archive_id)?;
        let habit_id = archive.habit_id.ok_or_else(|| {
            HabitError::invariant(format!("archive `{archive_id}` has no live habit to reset"))
        })?;
        let mut habit = self.habit(habit_id)?;

        archive.reset_all(&mut habit, today)?;
        self.persist(&habit, &archive)?;
        drop(guard);
        tracing::info!(archive = %archive.id, "archive reset");
        self.events
            .emit_all(&[HabitEvent::HabitsChanged, HabitEvent::HistoryChanged]);
        Ok(archive)
    }

    /// Permanently remove a finished archive and its history.
    #[instrument(skip(self))]
    pub fn delete_archive(&self, archive_id: ArchiveId) -> HabitResult<()> {
        {
            let lock = self.locks.handle(archive_id);
            let _guard = lock.lock();
            let archive = self.archive(archive_id)?;
            if archive.active() {
                return Err(HabitError::invariant(format!(
                    "archive `{archive_id}` is active; finish its habit first"
                )));
            }
            self.store
                .delete_archive(archive_id)
                .map_err(HabitError::persistence)?;
        }
        self.locks.forget(archive_id);
        self.events.emit(HabitEvent::HistoryChanged);
        Ok(())
    }

    /// Apply the calendar transition into `today` to every live habit.
    ///
    /// Each habit is saved together with its archive as soon as it has been
    /// rolled, under the archive lock. Habits already rolled on `today` are
    /// skipped, so a repeated call is harmless, including a retry after a
    /// failed save.
    #[instrument(skip(self))]
    pub fn day_changed(&self, today: NaiveDate) -> HabitResult<RolloverReport> {
        let engine = RolloverEngine::new(today);
        let mut report = RolloverReport::new(today);

        for stored in self.habits()? {
            let lock = self.locks.handle(stored.archive_id);
            let _guard = lock.lock();
            // Re-read under the lock; a concurrent edit may have saved since.
            let Some(mut habit) = self
                .store
                .fetch_habit(stored.id)
                .map_err(HabitError::persistence)?
            else {
                continue;
            };
            let mut archive = self.archive(habit.archive_id)?;
            let outcome = engine.roll_habit(&mut habit, &mut archive)?;
            if outcome.is_some() {
                self.persist(&habit, &archive)?;
            }
            report.record(outcome);
        }

        tracing::info!(
            date = %today,
            kind = ?report.kind,
            processed = report.habits_processed,
            auto_failed = report.auto_failed,
            "rollover complete"
        );
        self.events.emit_all(&[
            HabitEvent::DayChanged,
            HabitEvent::HabitsChanged,
            HabitEvent::HistoryChanged,
        ]);
        Ok(report)
    }

    /// Lock guarding the archive that owns `habit_id`. The owner never
    /// changes, so it is safe to resolve before locking.
    fn lock_for_habit(&self, habit_id: HabitId) -> HabitResult<Arc<Mutex<()>>> {
        let habit = self.habit(habit_id)?;
        Ok(self.locks.handle(habit.archive_id))
    }

    /// Read a habit and its archive. Callers hold the archive lock.
    fn load_pair(&self, habit_id: HabitId) -> HabitResult<(HabitRecord, ArchiveRecord)> {
        let habit = self.habit(habit_id)?;
        let archive = self.archive(habit.archive_id)?;
        if archive.habit_id != Some(habit.id) {
            return Err(HabitError::invariant(format!(
                "archive `{}` does not point back to habit `{}`",
                archive.id, habit.id
            )));
        }
        Ok((habit, archive))
    }

    fn persist(&self, habit: &HabitRecord, archive: &ArchiveRecord) -> HabitResult<()> {
        self.store
            .save_pair(habit, archive)
            .map_err(HabitError::persistence)
    }

    // Best effort: the edit is already durable, so failures are only logged.
    fn run_notification_plan(&self, habit: &HabitRecord, plan: &NotificationPlan) {
        let Some(scheduler) = &self.notification_scheduler else {
            return;
        };
        if let Some(days) = &plan.delete_days {
            if let Err(err) = scheduler.delete_requests(habit.id, days) {
                tracing::warn!(habit = %habit.id, %err, "cancelling reminders failed");
            }
        }
        if plan.create {
            if let Some(time) = habit.meta.reminder {
                let days: &WeekDays = habit.days();
                if let Err(err) = scheduler.create_requests(habit.id, &habit.meta.title, time, days) {
                    tracing::warn!(habit = %habit.id, %err, "scheduling reminders failed");
                }
            }
        }
    }
}
