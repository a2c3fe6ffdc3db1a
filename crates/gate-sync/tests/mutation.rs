mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{FakeBackend, eventually, failure, frame, row};
use gate_config::{CalendarCredential, CredentialStore};
use gate_core::{FailureKind, LifecycleStatus, PreconditionError, RecordId, SyncError};
use gate_sync::{
    ApplyOutcome, CalendarCredentials, MutationCoordinator, NewInput, RecordRevision,
    SharedStore, StaticCredential, StreamEvent, UploadReceipt, apply_event, records_from_wire,
};
use serde_json::{Value, json};

fn analyzed(id: u64, kind: &str) -> Value {
    json!({
        "id": id,
        "type": kind,
        "text": format!("input {id}"),
        "status": "ANALYZED",
        "result": {"type": kind, "summary": format!("summary {id}")},
        "created_at": "2026-10-15T08:00:00Z"
    })
}

fn pending(id: u64) -> Value {
    json!({"id": id, "text": format!("input {id}"), "status": "PENDING"})
}

fn seeded_store(rows: Vec<Value>) -> SharedStore {
    let store = SharedStore::new();
    let records = records_from_wire(rows.into_iter().map(row).collect());
    store.update(|s| s.replace_all(records));
    store
}

fn valid_credential() -> Arc<dyn CalendarCredentials> {
    Arc::new(StaticCredential(Some(CalendarCredential::new(
        "ya29.valid",
        Some(Utc::now() + Duration::hours(1)),
    ))))
}

fn coordinator(
    backend: &Arc<FakeBackend>,
    store: &SharedStore,
    credentials: Arc<dyn CalendarCredentials>,
) -> MutationCoordinator {
    MutationCoordinator::new(backend.clone(), store.clone(), credentials, "user-1")
}

fn id(raw: &str) -> RecordId {
    RecordId::from(raw)
}

#[tokio::test]
async fn create_shows_placeholder_then_server_id() {
    let backend = FakeBackend::new();
    let store = seeded_store(vec![pending(1)]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let created = coordinator
        .create(NewInput::text("dinner with Sam friday"))
        .await
        .unwrap();

    assert_eq!(created, id("100"));
    let ids = store.read(|s| s.ids());
    assert_eq!(ids, vec![id("100"), id("1")]);
    let record = store.get(&created).unwrap();
    assert!(record.is_local(), "awaits confirmation from the stream");
    assert_eq!(record.display_text, "dinner with Sam friday");
    assert_eq!(backend.submits(), vec![Some("dinner with Sam friday".to_string())]);
}

#[tokio::test]
async fn create_failure_removes_placeholder() {
    let backend = FakeBackend::new();
    backend.push_submit(Err(failure(FailureKind::ServerError, Some(500))));
    let store = seeded_store(vec![pending(1)]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let err = coordinator.create(NewInput::text("x")).await.unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::ServerError));
    assert_eq!(store.read(|s| s.ids()), vec![id("1")]);
}

#[tokio::test]
async fn create_rejects_empty_input_without_network() {
    let backend = FakeBackend::new();
    let store = SharedStore::new();
    let coordinator = coordinator(&backend, &store, valid_credential());

    let err = coordinator.create(NewInput::text("  ")).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Precondition(PreconditionError::EmptyInput)
    ));
    assert!(backend.submits().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn upload_success_removes_record() {
    let backend = FakeBackend::new();
    backend.push_upload(Ok(UploadReceipt {
        destination: Some("notion".into()),
        link: Some("https://notion.so/p1".into()),
        external_id: Some("p1".into()),
    }));
    let store = seeded_store(vec![analyzed(1, "MEMO"), pending(2)]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let receipt = coordinator.upload(&id("1"), None).await.unwrap();

    assert_eq!(receipt.link.as_deref(), Some("https://notion.so/p1"));
    assert!(!store.contains(&id("1")));
    assert!(store.read(|s| s.was_removed(&id("1"))));
    assert_eq!(backend.uploads().len(), 1);
    assert_eq!(backend.uploads()[0].token, None, "memo uploads carry no calendar token");
}

#[tokio::test]
async fn upload_failure_keeps_record_with_reason() {
    let backend = FakeBackend::new();
    backend.push_upload(Err(failure(FailureKind::IntegrationNotConnected, Some(400))));
    let store = seeded_store(vec![analyzed(1, "MEMO")]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let err = coordinator.upload(&id("1"), None).await.unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::IntegrationNotConnected));
    let record = store.get(&id("1")).unwrap();
    assert!(record.upload_failed());
    assert_eq!(
        record.fail_reason(),
        Some(FailureKind::IntegrationNotConnected.user_message())
    );
}

#[tokio::test]
async fn retry_clears_previous_failure() {
    let backend = FakeBackend::new();
    backend.push_upload(Err(failure(FailureKind::Timeout, None)));
    let store = seeded_store(vec![analyzed(1, "MEMO")]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    coordinator.upload(&id("1"), None).await.unwrap_err();
    assert!(store.get(&id("1")).unwrap().upload_failed());

    coordinator.upload(&id("1"), None).await.unwrap();
    assert!(store.is_empty());
    assert_eq!(backend.uploads().len(), 2);
}

#[tokio::test]
async fn upload_of_pending_record_is_rejected_without_network() {
    let backend = FakeBackend::new();
    let store = seeded_store(vec![pending(1)]);
    let before = store.list(None);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let err = coordinator.upload(&id("1"), None).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Precondition(PreconditionError::NotAnalyzed {
            status: LifecycleStatus::Pending,
            ..
        })
    ));
    assert!(backend.uploads().is_empty());
    assert_eq!(store.list(None), before);
}

#[tokio::test]
async fn calendar_upload_without_credential_fails_fast() {
    let backend = FakeBackend::new();
    let store = seeded_store(vec![analyzed(1, "CALENDAR")]);
    let coordinator = coordinator(&backend, &store, Arc::new(StaticCredential(None)));

    let err = coordinator.upload(&id("1"), None).await.unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::CredentialMissing));
    assert!(backend.uploads().is_empty());
    let record = store.get(&id("1")).unwrap();
    assert_eq!(
        record.upload_failure.as_ref().map(|f| f.kind),
        Some(FailureKind::CredentialMissing)
    );
}

#[tokio::test]
async fn calendar_upload_with_expired_credential_fails_fast() {
    let backend = FakeBackend::new();
    let store = seeded_store(vec![analyzed(1, "CALENDAR")]);
    let expired = StaticCredential(Some(CalendarCredential::new(
        "ya29.old",
        Some(Utc::now() - Duration::minutes(5)),
    )));
    let coordinator = coordinator(&backend, &store, Arc::new(expired));

    let err = coordinator.upload(&id("1"), None).await.unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::CredentialExpired));
    assert!(backend.uploads().is_empty());
    assert!(store.contains(&id("1")));
}

#[tokio::test]
async fn calendar_upload_sends_stored_token() {
    let dir = tempfile::tempdir().unwrap();
    let credentials = CredentialStore::new(dir.path().join("credentials.toml"));
    credentials
        .save(&CalendarCredential::new("ya29.from-disk", None))
        .unwrap();

    let backend = FakeBackend::new();
    let store = seeded_store(vec![analyzed(1, "CALENDAR")]);
    let coordinator = coordinator(&backend, &store, Arc::new(credentials));

    coordinator.upload(&id("1"), None).await.unwrap();

    assert_eq!(backend.uploads()[0].token.as_deref(), Some("ya29.from-disk"));
}

#[tokio::test]
async fn final_data_type_overrides_destination() {
    let backend = FakeBackend::new();
    let store = seeded_store(vec![analyzed(1, "CALENDAR")]);
    let coordinator = coordinator(&backend, &store, Arc::new(StaticCredential(None)));
    let edited = json!({"type": "MEMO", "summary": "edited"})
        .as_object()
        .cloned();

    coordinator.upload(&id("1"), edited.clone()).await.unwrap();

    let calls = backend.uploads();
    assert_eq!(calls[0].request.final_data, edited);
    assert_eq!(calls[0].token, None);
}

#[tokio::test]
async fn upload_many_reports_each_outcome() {
    let backend = FakeBackend::new();
    backend.push_upload(Ok(UploadReceipt::default()));
    backend.push_upload(Err(failure(FailureKind::ServerError, Some(502))));
    let store = seeded_store(vec![analyzed(1, "MEMO"), analyzed(2, "MEMO"), pending(3)]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let summary = coordinator
        .upload_many(&[id("1"), id("2"), id("3")])
        .await;

    assert_eq!(summary.succeeded, vec![id("1")]);
    assert_eq!(summary.failed.len(), 2);
    assert_eq!(summary.failed[0].kind, Some(FailureKind::ServerError));
    assert_eq!(summary.failed[1].kind, None);
    assert_eq!(summary.message("uploaded"), "1 uploaded, 2 failed");
    assert_eq!(store.read(|s| s.ids()), vec![id("2"), id("3")]);
}

#[tokio::test]
async fn delete_removes_only_after_confirmation() {
    let backend = FakeBackend::new();
    backend.push_delete(Err(failure(FailureKind::NetworkUnreachable, None)));
    let store = seeded_store(vec![pending(1), pending(2)]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let err = coordinator.delete(&id("1")).await.unwrap_err();
    assert_eq!(err.failure_kind(), Some(FailureKind::NetworkUnreachable));
    assert!(store.contains(&id("1")));

    let summary = coordinator.delete_many(&[id("1"), id("2")]).await;
    assert!(summary.is_clean());
    assert!(store.is_empty());
    assert_eq!(backend.deletes().len(), 3);
}

#[tokio::test]
async fn revise_merges_server_row() {
    let backend = FakeBackend::with_rows(vec![analyzed(1, "MEMO")]);
    let store = seeded_store(vec![analyzed(1, "MEMO")]);
    let coordinator = coordinator(&backend, &store, valid_credential());

    let changed = coordinator
        .revise(
            &id("1"),
            RecordRevision {
                text: Some("buy oat milk".into()),
                analysis_data: None,
            },
        )
        .await
        .unwrap();

    assert!(changed);
    let record = store.get(&id("1")).unwrap();
    assert_eq!(record.input_text.as_deref(), Some("buy oat milk"));
    assert_eq!(record.display_text, "summary 1");

    assert!(!coordinator
        .revise(&id("1"), RecordRevision::default())
        .await
        .unwrap());
}

#[tokio::test]
async fn stream_update_during_upload_does_not_resurrect_record() {
    let backend = FakeBackend::new();
    let release = backend.hold_next_upload();
    let store = seeded_store(vec![analyzed(1, "MEMO")]);
    let coordinator = coordinator(&backend, &store, valid_credential());
    let target = id("1");

    let (store_ref, backend_ref, target_ref) = (&store, &backend, &target);
    let (result, ()) = tokio::join!(coordinator.upload(&target, None), async move {
        eventually(|| backend_ref.uploads().len() == 1).await;
        let edited = StreamEvent::parse(&frame(
            "record_updated",
            json!({
                "record_id": 1,
                "status": "ANALYZED",
                "analysis_data": {"summary": "edited elsewhere"}
            }),
        ))
        .unwrap();
        assert_eq!(apply_event(store_ref, edited), ApplyOutcome::Applied);
        let mid_flight = store_ref.get(target_ref).unwrap();
        assert_eq!(mid_flight.display_text, "edited elsewhere");
        assert!(!mid_flight.upload_failed());
        release.send(()).unwrap();
    });

    result.unwrap();
    assert!(!store.contains(&target));
    assert!(store.read(|s| s.was_removed(&target)));

    let late = StreamEvent::parse(&frame(
        "analysis_completed",
        json!({"record_id": 1, "status": "ANALYZED", "analysis_data": {"summary": "late"}}),
    ))
    .unwrap();
    assert_eq!(apply_event(&store, late), ApplyOutcome::Ignored);
    assert!(store.is_empty());
}
