use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gate_core::Record;
use tracing::{info, warn};

use crate::backend::RecordBackend;
use crate::store::SharedStore;
use crate::wire::WireRecord;

/// Fetches the full record list and installs it into the store.
///
/// Used at session start, after a stream reconnect, and whenever an event
/// references a record the store does not know.
pub struct SnapshotLoader {
    backend: Arc<dyn RecordBackend>,
    store: SharedStore,
    user_id: String,
    loads: AtomicUsize,
}

impl SnapshotLoader {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        store: SharedStore,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            user_id: user_id.into(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Load and install a snapshot, returning what was installed.
    ///
    /// A failed fetch installs an empty list; the error is logged.
    pub async fn load(&self) -> Vec<Record> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let records = match self.backend.list_records(&self.user_id).await {
            Ok(rows) => records_from_wire(rows),
            Err(failure) => {
                warn!(
                    user_id = %self.user_id,
                    %failure,
                    "snapshot load failed; showing an empty list"
                );
                Vec::new()
            }
        };
        self.store.update(|store| store.replace_all(records.clone()));
        info!(count = records.len(), "installed record snapshot");
        records
    }

    /// Number of loads started by this loader.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

/// Convert list rows, dropping canceled rows and duplicate ids.
pub fn records_from_wire(rows: Vec<WireRecord>) -> Vec<Record> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter_map(WireRecord::into_record)
        .filter(|record| seen.insert(record.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::RecordId;
    use serde_json::json;

    #[test]
    fn test_records_from_wire_skips_canceled_and_duplicates() {
        let rows: Vec<WireRecord> = serde_json::from_value(json!([
            {"id": 3, "status": "PENDING", "text": "c"},
            {"id": 2, "status": "CANCELED", "text": "b"},
            {"id": "3", "status": "PENDING", "text": "dup"},
            {"id": 1, "status": "ANALYZED", "text": "a"}
        ]))
        .unwrap();
        let records = records_from_wire(rows);
        let ids: Vec<RecordId> = records.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId::from("3"), RecordId::from("1")]);
    }
}
