use gate_core::LifecycleStatus;
use tracing::debug;

use crate::event::{RecordChange, StreamEvent};
use crate::store::{PrependOutcome, SharedStore, UpsertOutcome};

/// What applying one event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Already present; a redelivered `record_created`.
    Duplicate,
    /// Control frames, and updates to removed or terminal records.
    Ignored,
    /// The event named a record the store does not know; reload the snapshot.
    ResyncNeeded,
}

/// Apply one stream event under a single store lock.
pub fn apply_event(store: &SharedStore, event: StreamEvent) -> ApplyOutcome {
    match event {
        StreamEvent::Connected | StreamEvent::Ping => ApplyOutcome::Ignored,
        StreamEvent::RecordCreated(created) => {
            let id = created.record_id.clone();
            match store.update(|s| s.prepend(created.into_record())) {
                PrependOutcome::Inserted | PrependOutcome::Confirmed => ApplyOutcome::Applied,
                PrependOutcome::Duplicate => ApplyOutcome::Duplicate,
                PrependOutcome::Removed => {
                    debug!(%id, "ignoring record_created for removed record");
                    ApplyOutcome::Ignored
                }
            }
        }
        StreamEvent::AnalysisCompleted(change) | StreamEvent::RecordUpdated(change) => {
            apply_change(store, change)
        }
        StreamEvent::AnalysisFailed(failure) => {
            let id = failure.record_id.clone();
            let outcome = store.update(|s| s.upsert(&id, failure.into_patch()));
            upsert_outcome(outcome, false)
        }
    }
}

fn apply_change(store: &SharedStore, change: RecordChange) -> ApplyOutcome {
    // COMPLETED for an unknown id is this client's own upload arriving after
    // the local removal, or a record uploaded elsewhere; either way it is gone.
    let completes = change.status() == Some(LifecycleStatus::Completed);
    let id = change.record_id.clone();
    let outcome = store.update(|s| s.upsert(&id, change.into_patch()));
    debug!(%id, ?outcome, "applied record change");
    upsert_outcome(outcome, completes)
}

fn upsert_outcome(outcome: UpsertOutcome, completes: bool) -> ApplyOutcome {
    match outcome {
        UpsertOutcome::Merged => ApplyOutcome::Applied,
        UpsertOutcome::Removed | UpsertOutcome::Frozen => ApplyOutcome::Ignored,
        UpsertOutcome::Missing if completes => ApplyOutcome::Ignored,
        UpsertOutcome::Missing => ApplyOutcome::ResyncNeeded,
    }
}
