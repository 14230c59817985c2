use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::archive::ArchiveId;

/// One mutex per archive, held for a whole edit or a habit's rollover so a
/// background pass cannot interleave with a foreground edit of the same pair.
#[derive(Default)]
pub struct ArchiveLocks {
    locks: Mutex<HashMap<ArchiveId, Arc<Mutex<()>>>>,
}

impl ArchiveLocks {
    pub fn handle(&self, id: ArchiveId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(id).or_default())
    }

    pub fn forget(&self, id: ArchiveId) {
        self.locks.lock().remove(&id);
    }
}
