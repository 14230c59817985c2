use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Resolution state of a single day in a habit's week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The day is not scheduled.
    Empty,
    Incomplete,
    Completed,
    Failed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Empty,
        Status::Incomplete,
        Status::Completed,
        Status::Failed,
    ];

    /// Status a day starts the week with.
    pub fn seed(scheduled: bool) -> Self {
        if scheduled {
            Status::Incomplete
        } else {
            Status::Empty
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    pub fn is_scheduled(self) -> bool {
        self != Status::Empty
    }

    /// Rank for the "due today" ordering: unresolved first, unscheduled last.
    pub fn due_rank(self) -> u8 {
        match self {
            Status::Incomplete => 0,
            Status::Completed => 1,
            Status::Failed => 2,
            Status::Empty => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Empty => "empty",
            Status::Incomplete => "incomplete",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

/// Signed adjustment to an archive's lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDelta {
    pub completed: i64,
    pub failed: i64,
    pub incomplete: i64,
}

impl StatDelta {
    pub const ZERO: StatDelta = StatDelta {
        completed: 0,
        failed: 0,
        incomplete: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    // Contribution of a single day holding `status` to the counters.
    fn weight(status: Status) -> Self {
        match status {
            Status::Empty => Self::ZERO,
            Status::Incomplete => Self {
                incomplete: 1,
                ..Self::ZERO
            },
            Status::Completed => Self {
                completed: 1,
                ..Self::ZERO
            },
            Status::Failed => Self {
                failed: 1,
                ..Self::ZERO
            },
        }
    }
}

impl Add for StatDelta {
    type Output = StatDelta;

    fn add(self, rhs: StatDelta) -> StatDelta {
        StatDelta {
            completed: self.completed + rhs.completed,
            failed: self.failed + rhs.failed,
            incomplete: self.incomplete + rhs.incomplete,
        }
    }
}

impl AddAssign for StatDelta {
    fn add_assign(&mut self, rhs: StatDelta) {
        *self = *self + rhs;
    }
}

impl Neg for StatDelta {
    type Output = StatDelta;

    fn neg(self) -> StatDelta {
        StatDelta {
            completed: -self.completed,
            failed: -self.failed,
            incomplete: -self.incomplete,
        }
    }
}

impl Sub for StatDelta {
    type Output = StatDelta;

    fn sub(self, rhs: StatDelta) -> StatDelta {
        self + -rhs
    }
}

/// Counter adjustment for moving one day from `old` to `new`.
///
/// Every counter mutation in the crate goes through this function: leaving a
/// status decrements its counter, entering one increments it, and `empty`
/// carries no counter at all.
pub fn stat_delta(old: Status, new: Status) -> StatDelta {
    if old == new {
        return StatDelta::ZERO;
    }
    StatDelta::weight(new) - StatDelta::weight(old)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_statuses_produce_no_delta() {
        for status in Status::ALL {
            assert!(stat_delta(status, status).is_zero());
        }
    }

    #[test]
    fn delta_round_trip_nets_to_zero() {
        for old in Status::ALL {
            for new in Status::ALL {
                let there = stat_delta(old, new);
                let back = stat_delta(new, old);
                assert!((there + back).is_zero(), "{old:?} <-> {new:?}");
            }
        }
    }

    #[test]
    fn resolving_an_incomplete_day_moves_one_count() {
        assert_eq!(
            stat_delta(Status::Incomplete, Status::Failed),
            StatDelta {
                completed: 0,
                failed: 1,
                incomplete: -1,
            }
        );
        assert_eq!(
            stat_delta(Status::Failed, Status::Completed),
            StatDelta {
                completed: 1,
                failed: -1,
                incomplete: 0,
            }
        );
    }

    #[test]
    fn empty_only_touches_the_other_side() {
        assert_eq!(
            stat_delta(Status::Empty, Status::Incomplete),
            StatDelta {
                incomplete: 1,
                ..StatDelta::ZERO
            }
        );
        assert_eq!(
            stat_delta(Status::Completed, Status::Empty),
            StatDelta {
                completed: -1,
                ..StatDelta::ZERO
            }
        );
    }

    #[test]
    fn due_rank_puts_unresolved_first() {
        assert!(Status::Incomplete.due_rank() < Status::Completed.due_rank());
        assert!(Status::Incomplete.due_rank() < Status::Failed.due_rank());
        assert!(Status::Failed.due_rank() < Status::Empty.due_rank());
    }
}
