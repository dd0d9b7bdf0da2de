use std::path::PathBuf;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stepreplay_core_types::Fingerprint;

use crate::model::Snapshot;

/// Snapshots already read or written by this process.
#[derive(Default)]
pub struct HotIndex {
    pub snapshots: DashMap<Fingerprint, Snapshot>,
    pub paths: DashMap<Fingerprint, PathBuf>,
    pub corrupt: DashMap<Fingerprint, String>,
}

impl HotIndex {
    pub fn upsert(&self, snapshot: Snapshot, path: PathBuf) {
        let key = snapshot.test_fingerprint.clone();
        self.corrupt.remove(&key);
        self.paths.insert(key.clone(), path);
        self.snapshots.insert(key, snapshot);
    }

    /// Keep the first loaded copy; a later write goes through `upsert`.
    pub fn insert_loaded(&self, snapshot: Snapshot, path: PathBuf) -> Snapshot {
        let key = snapshot.test_fingerprint.clone();
        self.paths.entry(key.clone()).or_insert(path);
        match self.snapshots.entry(key) {
            Entry::Occupied(occ) => occ.get().clone(),
            Entry::Vacant(vac) => vac.insert(snapshot).clone(),
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<Snapshot> {
        self.snapshots.get(key).map(|entry| entry.clone())
    }

    pub fn path(&self, key: &Fingerprint) -> Option<PathBuf> {
        self.paths.get(key).map(|entry| entry.clone())
    }

    pub fn mark_corrupt(&self, key: Fingerprint, reason: String) {
        self.snapshots.remove(&key);
        self.corrupt.insert(key, reason);
    }

    pub fn is_corrupt(&self, key: &Fingerprint) -> bool {
        self.corrupt.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
