use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::archive::{ArchiveId, ArchiveRecord};
use crate::habit::{HabitId, HabitRecord};
use crate::repository::{
    order_archives, order_habits, ArchiveRepository, HabitRepository, HabitStore,
};

const HABITS_DIR: &str = "habits";
const ARCHIVES_DIR: &str = "archives";
const JOURNAL_DIR: &str = "journal";

/// Changes to one habit/archive pair. Written to the journal before any
/// record file is touched and removed once all of them have landed.
#[derive(Debug, Serialize, Deserialize)]
struct PairCommit {
    archive: ArchiveRecord,
    habit: Option<HabitRecord>,
    delete_habit: Option<HabitId>,
}

/// One pretty-printed JSON file per record under `<root>/habits` and
/// `<root>/archives`.
///
/// Pair commits go through `<root>/journal`; every read first replays
/// journal entries left behind by an interrupted commit, so readers never see
/// half of a pair.
pub struct JsonStore {
    root: PathBuf,
    writes: Mutex<()>,
}

impl JsonStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [HABITS_DIR, ARCHIVES_DIR, JOURNAL_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("creating store directory {}", path.display()))?;
        }
        let store = Self {
            root,
            writes: Mutex::new(()),
        };
        store.recover()?;
        tracing::debug!(root = %store.root.display(), "json store opened");
        Ok(store)
    }

    fn record_path(&self, dir: &str, id: Uuid) -> PathBuf {
        self.root.join(dir).join(format!("{id}.json"))
    }

    fn read_all<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>> {
        self.recover()?;
        json_files(&self.root.join(dir))?
            .iter()
            .map(|path| read_record(path))
            .collect()
    }

    fn read_one<T: DeserializeOwned>(&self, dir: &str, id: Uuid) -> Result<Option<T>> {
        self.recover()?;
        let path = self.record_path(dir, id);
        if !path.exists() {
            return Ok(None);
        }
        read_record(&path).map(Some)
    }

    fn write<T: Serialize>(&self, dir: &str, id: Uuid, record: &T) -> Result<()> {
        let _guard = self.writes.lock();
        write_file(&self.record_path(dir, id), record)
    }

    fn remove(&self, dir: &str, id: Uuid) -> Result<()> {
        let _guard = self.writes.lock();
        remove_file(&self.record_path(dir, id))
    }

    fn commit(&self, commit: &PairCommit) -> Result<()> {
        let _guard = self.writes.lock();
        self.write_journal(commit)?;
        self.apply(commit)
    }

    fn write_journal(&self, commit: &PairCommit) -> Result<()> {
        write_file(&self.record_path(JOURNAL_DIR, commit.archive.id), commit)
    }

    // Replaying the same entry twice yields the same files.
    fn apply(&self, commit: &PairCommit) -> Result<()> {
        write_file(&self.record_path(ARCHIVES_DIR, commit.archive.id), &commit.archive)?;
        if let Some(habit) = &commit.habit {
            write_file(&self.record_path(HABITS_DIR, habit.id), habit)?;
        }
        if let Some(id) = commit.delete_habit {
            remove_file(&self.record_path(HABITS_DIR, id))?;
        }
        remove_file(&self.record_path(JOURNAL_DIR, commit.archive.id))
    }

    /// Finish every commit an earlier failure left in the journal.
    fn recover(&self) -> Result<()> {
        let _guard = self.writes.lock();
        for path in json_files(&self.root.join(JOURNAL_DIR))? {
            let commit: PairCommit = read_record(&path)?;
            tracing::info!(archive = %commit.archive.id, "replaying interrupted commit");
            self.apply(&commit)?;
        }
        Ok(())
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() && is_json(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("decoding {}", path.display()))
}

// Write to a sibling temp file and rename so readers never see half a file.
fn write_file<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let staging = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(record)?;
    fs::write(&staging, payload).with_context(|| format!("writing {}", staging.display()))?;
    fs::rename(&staging, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

impl HabitRepository for JsonStore {
    fn fetch_habits(&self) -> Result<Vec<HabitRecord>> {
        let mut habits = self.read_all(HABITS_DIR)?;
        order_habits(&mut habits);
        Ok(habits)
    }

    fn fetch_habit(&self, id: HabitId) -> Result<Option<HabitRecord>> {
        self.read_one(HABITS_DIR, id)
    }

    fn save_habit(&self, habit: &HabitRecord) -> Result<()> {
        self.write(HABITS_DIR, habit.id, habit)
    }

    fn delete_habit(&self, id: HabitId) -> Result<()> {
        self.remove(HABITS_DIR, id)
    }
}

impl ArchiveRepository for JsonStore {
    fn fetch_archives(&self) -> Result<Vec<ArchiveRecord>> {
        let mut archives = self.read_all(ARCHIVES_DIR)?;
        order_archives(&mut archives);
        Ok(archives)
    }

    fn fetch_archive(&self, id: ArchiveId) -> Result<Option<ArchiveRecord>> {
        self.read_one(ARCHIVES_DIR, id)
    }

    fn save_archive(&self, archive: &ArchiveRecord) -> Result<()> {
        self.write(ARCHIVES_DIR, archive.id, archive)
    }

    fn delete_archive(&self, id: ArchiveId) -> Result<()> {
        self.remove(ARCHIVES_DIR, id)
    }
}

impl HabitStore for JsonStore {
    fn save_pair(&self, habit: &HabitRecord, archive: &ArchiveRecord) -> Result<()> {
        self.commit(&PairCommit {
            archive: archive.clone(),
            habit: Some(habit.clone()),
            delete_habit: None,
        })
    }

    fn finish_pair(&self, archive: &ArchiveRecord, habit_id: HabitId) -> Result<()> {
        self.commit(&PairCommit {
            archive: archive.clone(),
            habit: None,
            delete_habit: Some(habit_id),
        })
    }
}
