use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archive::ArchivedHabitRecord;
use crate::calendar::DayIndex;
use crate::habit::HabitRecord;

/// Orderings offered for the list of live habits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HomeSort {
    Alphabetical,
    Color,
    DateCreated,
    #[default]
    DueToday,
    Flag,
    Priority,
    ReminderTime,
}

impl HomeSort {
    pub const ALL: [HomeSort; 7] = [
        HomeSort::Alphabetical,
        HomeSort::Color,
        HomeSort::DateCreated,
        HomeSort::DueToday,
        HomeSort::Flag,
        HomeSort::Priority,
        HomeSort::ReminderTime,
    ];

    pub fn key(self) -> &'static str {
        match self {
            HomeSort::Alphabetical => "alphabetical",
            HomeSort::Color => "color",
            HomeSort::DateCreated => "date-created",
            HomeSort::DueToday => "due-today",
            HomeSort::Flag => "flag",
            HomeSort::Priority => "priority",
            HomeSort::ReminderTime => "reminder-time",
        }
    }
}

impl FromStr for HomeSort {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        HomeSort::ALL
            .into_iter()
            .find(|sort| sort.key().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown sort `{value}`"))
    }
}

/// Stable sort of `habits`; `current_day` is only consulted for [`HomeSort::DueToday`].
pub fn sort_habits(habits: &mut [HabitRecord], sort: HomeSort, current_day: DayIndex) {
    habits.sort_by(|a, b| compare_habits(a, b, sort, current_day));
}

fn compare_habits(a: &HabitRecord, b: &HabitRecord, sort: HomeSort, current_day: DayIndex) -> Ordering {
    match sort {
        HomeSort::Alphabetical => a.meta.title.to_lowercase().cmp(&b.meta.title.to_lowercase()),
        HomeSort::Color => a.meta.color.cmp(&b.meta.color),
        HomeSort::DateCreated => a.date_created.cmp(&b.date_created),
        HomeSort::DueToday => {
            let rank = |habit: &HabitRecord| habit.status(current_day).map(|status| status.due_rank());
            rank(a).cmp(&rank(b))
        }
        HomeSort::Flag => b.meta.flag.cmp(&a.meta.flag),
        HomeSort::Priority => b.meta.priority.cmp(&a.meta.priority),
        // Habits without a reminder go last.
        HomeSort::ReminderTime => match (a.meta.reminder, b.meta.reminder) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SnapshotSort {
    DateAscending,
    #[default]
    DateDescending,
}

pub fn sort_snapshots(snapshots: &mut [ArchivedHabitRecord], sort: SnapshotSort) {
    match sort {
        SnapshotSort::DateAscending => snapshots.sort_by_key(|snapshot| snapshot.start_date),
        SnapshotSort::DateDescending => {
            snapshots.sort_by(|a, b| b.start_date.cmp(&a.start_date))
        }
    }
}
