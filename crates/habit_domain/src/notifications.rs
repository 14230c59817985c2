use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::calendar::{self, DayIndex, WeekDays};
use crate::habit::HabitId;

/// A repeating weekly reminder for one scheduled day of a habit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderRequest {
    pub identifier: String,
    pub habit_id: HabitId,
    pub title: String,
    pub day: DayIndex,
    pub time: NaiveTime,
}

/// Identifier of the request for `habit_id` on `day`. Cancellation relies on
/// the same identifiers being derived again.
pub fn request_identifier(habit_id: HabitId, day: DayIndex) -> String {
    format!("{habit_id}-{day}")
}

pub fn reminder_requests(
    habit_id: HabitId,
    title: &str,
    time: NaiveTime,
    days: &WeekDays,
) -> Vec<ReminderRequest> {
    days.iter()
        .enumerate()
        .filter(|(_, scheduled)| **scheduled)
        .map(|(day, _)| ReminderRequest {
            identifier: request_identifier(habit_id, day),
            habit_id,
            title: title.to_string(),
            day,
            time,
        })
        .collect()
}

/// Platform-specific reminder delivery implements this trait. Failures are
/// reported back but never undo a saved edit.
pub trait NotificationScheduler: Send + Sync {
    fn create_requests(
        &self,
        habit_id: HabitId,
        title: &str,
        time: NaiveTime,
        days: &WeekDays,
    ) -> Result<()>;

    fn delete_requests(&self, habit_id: HabitId, days: &WeekDays) -> Result<()>;
}

/// Scheduler that only records what would be scheduled in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScheduler;

impl NotificationScheduler for LoggingScheduler {
    fn create_requests(
        &self,
        habit_id: HabitId,
        title: &str,
        time: NaiveTime,
        days: &WeekDays,
    ) -> Result<()> {
        for request in reminder_requests(habit_id, title, time, days) {
            tracing::info!(
                id = %request.identifier,
                day = calendar::day_name(request.day),
                time = %request.time,
                "reminder scheduled"
            );
        }
        Ok(())
    }

    fn delete_requests(&self, habit_id: HabitId, days: &WeekDays) -> Result<()> {
        for (day, _) in days.iter().enumerate().filter(|(_, scheduled)| **scheduled) {
            tracing::info!(id = %request_identifier(habit_id, day), "reminder cancelled");
        }
        Ok(())
    }
}
