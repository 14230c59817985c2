use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveRecord;
use crate::calendar::{self, WeekDays, DAYS_IN_WEEK};
use crate::error::{HabitError, HabitResult, ValidationError};
use crate::habit::{HabitMetadata, HabitRecord};

pub const MAX_PRIORITY: u8 = 3;

/// Pending field values for a habit being created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitDraft {
    pub title: String,
    pub color: Option<u8>,
    pub days: WeekDays,
    pub priority: u8,
    pub flag: bool,
    pub reminder: Option<NaiveTime>,
    pub goal: Option<u32>,
    pub tracking: bool,
}

impl HabitDraft {
    pub fn from_habit(habit: &HabitRecord) -> Self {
        let meta = &habit.meta;
        Self {
            title: meta.title.clone(),
            color: Some(meta.color),
            days: *habit.days(),
            priority: meta.priority,
            flag: meta.flag,
            reminder: meta.reminder,
            goal: meta.goal,
            tracking: meta.tracking,
        }
    }

    pub fn validate(&self) -> Result<HabitMetadata, ValidationError> {
        if !self.days.iter().any(|day| *day) {
            return Err(ValidationError::NoDaysSelected);
        }
        let color = self.color.ok_or(ValidationError::NoColor)?;
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if self.priority > MAX_PRIORITY {
            return Err(ValidationError::PriorityOutOfRange(self.priority));
        }
        Ok(HabitMetadata {
            title: title.to_string(),
            color,
            priority: self.priority,
            flag: self.flag,
            reminder: self.reminder,
            goal: self.goal,
            tracking: self.tracking,
        })
    }
}

/// Reminder work the notification scheduler has to do after a save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationPlan {
    /// Days whose pending requests are cancelled.
    pub delete_days: Option<WeekDays>,
    /// Whether requests are created for the habit's current days and reminder.
    pub create: bool,
}

impl NotificationPlan {
    pub fn is_empty(&self) -> bool {
        self.delete_days.is_none() && !self.create
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub days_changed: bool,
    pub notifications: NotificationPlan,
}

/// Applies drafts to habit/archive pairs.
#[derive(Debug, Clone, Copy)]
pub struct HabitEditor {
    today: NaiveDate,
}

impl HabitEditor {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Build a new habit and the archive that owns it.
    pub fn create(&self, draft: &HabitDraft) -> HabitResult<(HabitRecord, ArchiveRecord)> {
        let meta = draft.validate()?;
        let mut archive = ArchiveRecord::new(meta.clone());
        let habit = HabitRecord::new(archive.id, meta, draft.days, self.today);
        archive.attach(&habit, self.today)?;
        Ok((habit, archive))
    }

    pub fn creation_plan(habit: &HabitRecord) -> NotificationPlan {
        NotificationPlan {
            delete_days: None,
            create: habit.meta.reminder.is_some(),
        }
    }

    /// Apply `draft` to an existing pair. Validation runs before any field is
    /// touched; on error both records are left as they were.
    pub fn apply(
        &self,
        habit: &mut HabitRecord,
        archive: &mut ArchiveRecord,
        draft: &HabitDraft,
    ) -> HabitResult<EditOutcome> {
        let meta = draft.validate()?;
        if habit.archive_id != archive.id {
            return Err(HabitError::invariant(format!(
                "habit `{}` does not belong to archive `{}`",
                habit.id, archive.id
            )));
        }

        let old_days = *habit.days();
        let notifications = Self::notification_plan(habit, &meta, &draft.days);
        let days_changed =
            habit.apply_day_selection_change(archive, draft.days, calendar::day_index(self.today))?;

        habit.meta = meta.clone();
        archive.meta = meta;
        archive.habit_id = Some(habit.id);

        if days_changed {
            tracing::debug!(habit = %habit.id, ?old_days, new_days = ?habit.days(), "days changed");
        }
        Ok(EditOutcome {
            days_changed,
            notifications,
        })
    }

    // Requests are keyed by habit id and day, so any change to the reminder or
    // the day set replaces the old requests wholesale.
    fn notification_plan(
        habit: &HabitRecord,
        meta: &HabitMetadata,
        new_days: &[bool; DAYS_IN_WEEK],
    ) -> NotificationPlan {
        let old_days = *habit.days();
        match meta.reminder {
            None => NotificationPlan {
                delete_days: habit.meta.reminder.map(|_| old_days),
                create: false,
            },
            Some(reminder) => {
                if habit.meta.reminder != Some(reminder)
                    || old_days != *new_days
                    || habit.meta.title != meta.title
                {
                    NotificationPlan {
                        delete_days: Some(old_days),
                        create: true,
                    }
                } else {
                    NotificationPlan::default()
                }
            }
        }
    }
}
