//! In-memory, ordered record collection.
//!
//! Newest first. Every mutation goes through [`SharedStore::update`], which
//! holds the lock for the duration of one synchronous closure, so snapshot
//! installs, stream merges and mutation results never interleave.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use gate_core::{Provenance, Record, RecordId, RecordKind, RecordPatch, UploadFailure};
use tokio::sync::watch;

/// Result of merging a patch into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Merged,
    /// Unknown id; the caller should resync from a snapshot.
    Missing,
    /// The id was removed locally (upload or delete); the patch is dropped.
    Removed,
    /// The record reached a terminal status and no longer accepts updates.
    Frozen,
}

/// Result of inserting a newly created record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrependOutcome {
    Inserted,
    /// An optimistic placeholder with the same id took the server's fields.
    Confirmed,
    Duplicate,
    /// The id was removed locally and must not reappear.
    Removed,
}

#[derive(Debug, Default)]
pub struct RecordStore {
    order: Vec<RecordId>,
    records: HashMap<RecordId, Record>,
    /// Server ids removed by this client. Late or duplicated events for them
    /// are ignored instead of resurrecting the record.
    removed: HashSet<RecordId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a full snapshot.
    ///
    /// Upload-failure annotations survive for ids still present, and
    /// in-flight placeholders the snapshot does not know yet stay at the head.
    pub fn replace_all(&mut self, records: Vec<Record>) {
        let mut previous = std::mem::take(&mut self.records);
        let previous_order = std::mem::take(&mut self.order);
        let incoming: HashSet<RecordId> = records.iter().map(|r| r.id.clone()).collect();

        for id in previous_order {
            let Some(record) = previous.get(&id) else {
                continue;
            };
            if record.provenance == Provenance::LocalPending && !incoming.contains(&id) {
                if let Some(record) = previous.remove(&id) {
                    self.order.push(id.clone());
                    self.records.insert(id, record);
                }
            }
        }

        for mut record in records {
            if self.removed.contains(&record.id) || self.records.contains_key(&record.id) {
                continue;
            }
            if let Some(old) = previous.remove(&record.id) {
                record.upload_failure = old.upload_failure;
            }
            self.order.push(record.id.clone());
            self.records.insert(record.id.clone(), record);
        }
    }

    /// Merge `patch` into the record with `id`.
    pub fn upsert(&mut self, id: &RecordId, patch: RecordPatch) -> UpsertOutcome {
        match self.records.get_mut(id) {
            Some(record) if record.status.is_terminal() => UpsertOutcome::Frozen,
            Some(record) => {
                record.merge(patch);
                record.provenance = Provenance::ServerConfirmed;
                UpsertOutcome::Merged
            }
            None if self.removed.contains(id) => UpsertOutcome::Removed,
            None => UpsertOutcome::Missing,
        }
    }

    /// Insert `record` at the head unless its id is already present.
    pub fn prepend(&mut self, record: Record) -> PrependOutcome {
        if self.removed.contains(&record.id) {
            return PrependOutcome::Removed;
        }
        match self.records.get_mut(&record.id) {
            Some(existing)
                if existing.provenance == Provenance::LocalPending
                    && record.provenance == Provenance::ServerConfirmed =>
            {
                let upload_failure = existing.upload_failure.take();
                *existing = Record {
                    upload_failure,
                    ..record
                };
                PrependOutcome::Confirmed
            }
            Some(_) => PrependOutcome::Duplicate,
            None => {
                self.order.insert(0, record.id.clone());
                self.records.insert(record.id.clone(), record);
                PrependOutcome::Inserted
            }
        }
    }

    /// Re-key the placeholder `local_id` to the id the server assigned.
    ///
    /// The record stays `LocalPending` until the event stream (or a snapshot)
    /// delivers it. If the stream won the race and the server id is already
    /// present, the placeholder is simply dropped.
    pub fn confirm_placeholder(&mut self, local_id: &RecordId, server: Record) {
        let Some(position) = self.order.iter().position(|id| id == local_id) else {
            let mut record = server;
            record.provenance = Provenance::LocalPending;
            self.prepend(record);
            return;
        };

        self.order.remove(position);
        self.records.remove(local_id);
        if self.records.contains_key(&server.id) || self.removed.contains(&server.id) {
            return;
        }

        let mut record = server;
        record.provenance = Provenance::LocalPending;
        self.order.insert(position, record.id.clone());
        self.records.insert(record.id.clone(), record);
    }

    /// Remove `id`. Server ids are remembered so stale events cannot bring
    /// the record back.
    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        let record = self.records.remove(id)?;
        self.order.retain(|existing| existing != id);
        if !id.is_local() {
            self.removed.insert(id.clone());
        }
        Some(record)
    }

    pub fn mark_upload_failed(&mut self, id: &RecordId, failure: UploadFailure) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.upload_failure = Some(failure);
                true
            }
            None => false,
        }
    }

    pub fn clear_upload_failed(&mut self, id: &RecordId) -> bool {
        match self.records.get_mut(id) {
            Some(record) => record.upload_failure.take().is_some(),
            None => false,
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn was_removed(&self, id: &RecordId) -> bool {
        self.removed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records newest first, optionally restricted to one kind.
    pub fn list(&self, kind: Option<RecordKind>) -> Vec<&Record> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| kind.is_none() || record.kind == kind)
            .collect()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.order.clone()
    }
}

/// Cloneable handle to the store shared by the loader, the stream task and
/// the mutation coordinator.
///
/// Each `update` bumps a revision counter that [`StoreChanges`] observers
/// wait on.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<RecordStore>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SharedStore {
    fn default() -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            inner: Arc::default(),
            revision: Arc::new(revision),
        }
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access. Never hold the guard across `.await`.
    pub fn update<R>(&self, f: impl FnOnce(&mut RecordStore) -> R) -> R {
        let result = {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        };
        self.revision.send_modify(|revision| *revision += 1);
        result
    }

    pub fn changes(&self) -> StoreChanges {
        StoreChanges {
            rx: self.revision.subscribe(),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&RecordStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.read(|store| store.get(id).cloned())
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.read(|store| store.contains(id))
    }

    pub fn len(&self) -> usize {
        self.read(RecordStore::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(RecordStore::is_empty)
    }

    /// Owned copy of the ordered list.
    pub fn list(&self, kind: Option<RecordKind>) -> Vec<Record> {
        self.read(|store| store.list(kind).into_iter().cloned().collect())
    }
}

/// Wakes when the store has been updated since the last observed revision.
#[derive(Debug, Clone)]
pub struct StoreChanges {
    rx: watch::Receiver<u64>,
}

impl StoreChanges {
    pub fn revision(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Wait for the next update. Several updates in a row coalesce into one
    /// wakeup. `None` once every store handle is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
