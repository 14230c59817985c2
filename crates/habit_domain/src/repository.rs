use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::archive::{ArchiveId, ArchiveRecord};
use crate::habit::{HabitId, HabitRecord};

/// Storage for live habits. Saves are expected to be durable on return.
pub trait HabitRepository: Send + Sync {
    fn fetch_habits(&self) -> Result<Vec<HabitRecord>>;

    fn fetch_habit(&self, id: HabitId) -> Result<Option<HabitRecord>>;

    /// Insert or replace.
    fn save_habit(&self, habit: &HabitRecord) -> Result<()>;

    /// Deleting a missing habit is not an error.
    fn delete_habit(&self, id: HabitId) -> Result<()>;
}

/// Storage for archives together with their snapshot history.
pub trait ArchiveRepository: Send + Sync {
    fn fetch_archives(&self) -> Result<Vec<ArchiveRecord>>;

    fn fetch_archive(&self, id: ArchiveId) -> Result<Option<ArchiveRecord>>;

    fn save_archive(&self, archive: &ArchiveRecord) -> Result<()>;

    fn delete_archive(&self, id: ArchiveId) -> Result<()>;
}

/// A store holding both record kinds that commits changes to a habit/archive
/// pair as one unit: after a call returns, either every write of the pair is
/// visible or none is.
pub trait HabitStore: HabitRepository + ArchiveRepository {
    fn save_pair(&self, habit: &HabitRecord, archive: &ArchiveRecord) -> Result<()>;

    /// Save the finished `archive` and delete its former live habit.
    fn finish_pair(&self, archive: &ArchiveRecord, habit_id: HabitId) -> Result<()>;
}

/// Keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    habits: RwLock<HashMap<HabitId, HabitRecord>>,
    archives: RwLock<HashMap<ArchiveId, ArchiveRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn order_habits(habits: &mut [HabitRecord]) {
    habits.sort_by(|a, b| {
        a.date_created
            .cmp(&b.date_created)
            .then_with(|| a.meta.title.cmp(&b.meta.title))
            .then_with(|| a.id.cmp(&b.id))
    });
}

pub(crate) fn order_archives(archives: &mut [ArchiveRecord]) {
    archives.sort_by(|a, b| a.meta.title.cmp(&b.meta.title).then_with(|| a.id.cmp(&b.id)));
}

impl HabitRepository for MemoryStore {
    fn fetch_habits(&self) -> Result<Vec<HabitRecord>> {
        let mut habits: Vec<HabitRecord> = self.habits.read().values().cloned().collect();
        order_habits(&mut habits);
        Ok(habits)
    }

    fn fetch_habit(&self, id: HabitId) -> Result<Option<HabitRecord>> {
        Ok(self.habits.read().get(&id).cloned())
    }

    fn save_habit(&self, habit: &HabitRecord) -> Result<()> {
        self.habits.write().insert(habit.id, habit.clone());
        Ok(())
    }

    fn delete_habit(&self, id: HabitId) -> Result<()> {
        self.habits.write().remove(&id);
        Ok(())
    }
}

impl ArchiveRepository for MemoryStore {
    fn fetch_archives(&self) -> Result<Vec<ArchiveRecord>> {
        let mut archives: Vec<ArchiveRecord> = self.archives.read().values().cloned().collect();
        order_archives(&mut archives);
        Ok(archives)
    }

    fn fetch_archive(&self, id: ArchiveId) -> Result<Option<ArchiveRecord>> {
        Ok(self.archives.read().get(&id).cloned())
    }

    fn save_archive(&self, archive: &ArchiveRecord) -> Result<()> {
        self.archives.write().insert(archive.id, archive.clone());
        Ok(())
    }

    fn delete_archive(&self, id: ArchiveId) -> Result<()> {
        self.archives.write().remove(&id);
        Ok(())
    }
}

// Both maps are locked habits-first for the whole commit.
impl HabitStore for MemoryStore {
    fn save_pair(&self, habit: &HabitRecord, archive: &ArchiveRecord) -> Result<()> {
        let mut habits = self.habits.write();
        let mut archives = self.archives.write();
        archives.insert(archive.id, archive.clone());
        habits.insert(habit.id, habit.clone());
        Ok(())
    }

    fn finish_pair(&self, archive: &ArchiveRecord, habit_id: HabitId) -> Result<()> {
        let mut habits = self.habits.write();
        let mut archives = self.archives.write();
        archives.insert(archive.id, archive.clone());
        habits.remove(&habit_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::tests::pair;

    #[test]
    fn memory_store_round_trips_records() {
        let store = MemoryStore::new();
        let (habit, archive) = pair([true, false, false, false, false, false, false]);
        store.save_habit(&habit).unwrap();
        store.save_archive(&archive).unwrap();

        assert_eq!(store.fetch_habit(habit.id).unwrap(), Some(habit.clone()));
        assert_eq!(store.fetch_archives().unwrap(), vec![archive.clone()]);

        store.delete_habit(habit.id).unwrap();
        store.delete_habit(habit.id).unwrap();
        assert!(store.fetch_habits().unwrap().is_empty());
        assert!(store.fetch_archive(archive.id).unwrap().is_some());
    }

    #[test]
    fn finish_pair_saves_the_archive_and_drops_the_habit() {
        let store = MemoryStore::new();
        let (habit, mut archive) = pair([true; 7]);
        store.save_pair(&habit, &archive).unwrap();

        archive.finish();
        store.finish_pair(&archive, habit.id).unwrap();
        assert!(store.fetch_habit(habit.id).unwrap().is_none());
        let stored = store.fetch_archive(archive.id).unwrap().unwrap();
        assert!(!stored.active());
    }
}
