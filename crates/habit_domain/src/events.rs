use serde::Serialize;

use crate::habit::HabitId;

/// Coarse change notifications; listeners re-fetch what they display.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum HabitEvent {
    HabitsChanged,
    HistoryChanged,
    DayChanged,
    GoalReached { habit_id: HabitId },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &HabitEvent);
}

impl<F> EventSink for F
where
    F: Fn(&HabitEvent) + Send + Sync,
{
    fn emit(&self, event: &HabitEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&self, event: HabitEvent) {
        tracing::trace!(?event, "broadcasting");
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }

    pub fn emit_all(&self, events: &[HabitEvent]) {
        for event in events {
            self.emit(*event);
        }
    }
}
