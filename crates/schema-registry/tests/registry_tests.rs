use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use schema_registry::{ChangeOutcome, ProbeStatus, RegistryError, SchemaRegistry};
use schema_sensing::{TypeTag, compute_fingerprint, field_paths, infer};
use schema_store::{
    FileSchemaStore, MemSchemaStore, SchemaStore, StoreError, StoreResult,
};
use serde_json::json;
use tempfile::tempdir;

fn at(minutes: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn mem_registry(limit: usize) -> SchemaRegistry {
    SchemaRegistry::new(Arc::new(MemSchemaStore::default()), limit)
}

/// Store whose writes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemSchemaStore,
    failing: AtomicBool,
}

#[async_trait]
impl SchemaStore for FlakyStore {
    async fn read_raw(&self) -> StoreResult<Option<Vec<u8>>> {
        self.inner.read_raw().await
    }

    async fn write_raw(&self, bytes: &[u8]) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write_raw(bytes).await
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

#[tokio::test]
async fn cold_start_is_not_found() {
    let reg = mem_registry(10);
    assert_eq!(reg.load().await.unwrap(), 0);
    assert!(reg.get("GET /v3/profiles").is_none());
    assert!(reg.list().is_empty());
}

#[tokio::test]
async fn same_body_is_idempotent() {
    let reg = mem_registry(10);
    let body = json!({"id": "u1", "level": 5});

    let first = reg.record("GET /v3/profiles", infer(&body), 200, at(0)).await;
    let second = reg.record("GET /v3/profiles", infer(&body), 200, at(1)).await;

    assert!(matches!(first, ChangeOutcome::FirstObservation { sequence: 1, .. }));
    assert!(matches!(second, ChangeOutcome::Unchanged { sequence: 1, .. }));
    assert_eq!(first.fingerprint(), second.fingerprint());

    let record = reg.get("GET /v3/profiles").unwrap();
    assert_eq!(record.history.len(), 2);
    assert_eq!(record.last_checked_at, at(1));
    assert!(record.last_changed_at.is_none());
}

#[tokio::test]
async fn profile_gains_nullable_xp() {
    let reg = mem_registry(10);

    let first = reg
        .record("GET /v3/profiles", infer(&json!({"id": "u1", "level": 5})), 200, at(0))
        .await;
    let second = reg
        .record(
            "GET /v3/profiles",
            infer(&json!({"id": "u1", "level": 5, "xp": null})),
            200,
            at(60),
        )
        .await;

    let ChangeOutcome::Changed { previous, fingerprint, sequence } = &second else {
        panic!("expected change, got {second:?}");
    };
    assert_eq!(previous, first.fingerprint());
    assert_ne!(fingerprint, first.fingerprint());
    assert_eq!(*sequence, 2);

    let record = reg.get("/v3/profiles").unwrap();
    assert_eq!(&record.fingerprint, fingerprint);
    assert_eq!(record.previous_fingerprint(), Some(first.fingerprint()));
    assert_eq!(record.last_changed_at, Some(at(60)));
    assert_eq!(record.distinct_fingerprints(), 2);

    let xp = field_paths(&record.current)
        .into_iter()
        .find(|p| p.path == "xp")
        .unwrap();
    assert_eq!(xp.type_tag, TypeTag::Null);
    assert!(xp.nullable);
}

#[tokio::test]
async fn history_keeps_most_recent_entries_oldest_first() {
    let limit = 3;
    let reg = mem_registry(limit);

    let mut fingerprints = Vec::new();
    for i in 0..(limit + 4) {
        let mut body = serde_json::Map::new();
        body.insert(format!("f{i}"), json!(i));
        let outcome = reg
            .record("GET /grow", infer(&serde_json::Value::Object(body)), 200, at(i as i64))
            .await;
        fingerprints.push(outcome.fingerprint().to_string());
    }

    let record = reg.get("GET /grow").unwrap();
    let kept: Vec<_> = record.history.iter().map(|h| h.fingerprint.clone()).collect();
    assert_eq!(kept, fingerprints[fingerprints.len() - limit..].to_vec());
    assert_eq!(record.history[0].observed_at, at(4));
    assert_eq!(record.sequence, (limit + 4) as u64);
}

#[tokio::test]
async fn failure_updates_status_without_touching_schema() {
    let reg = mem_registry(10);
    let outcome = reg.record("GET /a", infer(&json!({"x": 1})), 200, at(0)).await;

    assert!(
        reg.record_failure("GET /a", ProbeStatus::Http(503), Some("unavailable".into()), at(5))
            .await
    );

    let record = reg.get("GET /a").unwrap();
    assert_eq!(record.fingerprint, outcome.fingerprint());
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.last_status, ProbeStatus::Http(503));
    assert_eq!(record.last_error.as_deref(), Some("unavailable"));
    assert!(!record.is_available());

    // success clears the error
    reg.record("GET /a", infer(&json!({"x": 2})), 200, at(10)).await;
    let record = reg.get("GET /a").unwrap();
    assert!(record.last_error.is_none());
    assert!(record.is_available());
}

#[tokio::test]
async fn failure_on_unknown_endpoint_is_noop() {
    let reg = mem_registry(10);
    assert!(!reg.record_failure("GET /nope", ProbeStatus::Timeout, None, at(0)).await);
    assert!(reg.get("GET /nope").is_none());
}

#[tokio::test]
async fn ids_are_normalized() {
    let reg = mem_registry(10);
    reg.record("get /v3/profiles/", infer(&json!({})), 200, at(0)).await;

    assert!(reg.get("GET /v3/profiles").is_some());
    assert!(reg.get("/v3/profiles").is_some());
    assert_eq!(reg.list()[0].endpoint_id, "GET /v3/profiles");
}

#[tokio::test]
async fn clear_removes_records() {
    let reg = mem_registry(10);
    reg.record("GET /a", infer(&json!(1)), 200, at(0)).await;
    reg.record("GET /b", infer(&json!(2)), 200, at(0)).await;

    assert!(reg.clear("GET /a").await);
    assert!(!reg.clear("GET /a").await);
    assert_eq!(reg.len(), 1);

    assert_eq!(reg.clear_all().await, 1);
    assert!(reg.is_empty());
}

#[tokio::test]
async fn persist_and_reload_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schemas/schemas.json");

    let reg = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    reg.record("GET /b", infer(&json!({"items": [{"id": 1}]})), 200, at(0)).await;
    reg.record("GET /a", infer(&json!({"n": null})), 200, at(1)).await;
    reg.record_failure("GET /a", ProbeStatus::NetworkError, Some("reset".into()), at(2))
        .await;
    reg.persist().await.unwrap();

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], json!(1));
    assert!(on_disk["endpoints"]["GET /a"].is_object());

    let restarted = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    assert_eq!(restarted.load().await.unwrap(), 2);

    for id in ["GET /a", "GET /b"] {
        assert_eq!(restarted.get(id), reg.get(id));
    }
    let a = restarted.get("GET /a").unwrap();
    assert_eq!(a.last_status, ProbeStatus::NetworkError);
    assert_eq!(a.fingerprint, compute_fingerprint(&a.current));
}

#[tokio::test]
async fn corrupt_file_loads_empty_and_is_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schemas.json");
    std::fs::write(&path, b"{\"version\": 1, \"endpoints\": ").unwrap();

    let reg = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    assert_eq!(reg.load().await.unwrap(), 0);

    reg.record("GET /a", infer(&json!({"ok": true})), 200, at(0)).await;
    reg.persist().await.unwrap();

    let reloaded = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    assert_eq!(reloaded.load().await.unwrap(), 1);
}

#[tokio::test]
async fn unreadable_store_fails_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schemas.json");
    std::fs::create_dir(&path).unwrap();

    let reg = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    let err = reg.load().await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Store {
            source: StoreError::Io(_),
            ..
        }
    ));
}

#[tokio::test]
async fn corrupt_record_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("schemas.json");

    let reg = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    reg.record("GET /good", infer(&json!({"a": 1})), 200, at(0)).await;
    reg.persist().await.unwrap();

    let mut doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    doc["endpoints"]["GET /bad"] = json!({"endpoint_id": "GET /bad"});
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    let reloaded = SchemaRegistry::new(Arc::new(FileSchemaStore::new(&path).unwrap()), 10);
    assert_eq!(reloaded.load().await.unwrap(), 1);
    assert!(reloaded.get("GET /good").is_some());
    assert!(reloaded.get("GET /bad").is_none());
}

#[tokio::test]
async fn failed_persist_keeps_memory_and_retries_everything() {
    let store = Arc::new(FlakyStore::default());
    let reg = SchemaRegistry::new(store.clone(), 10);

    reg.record("GET /a", infer(&json!({"a": 1})), 200, at(0)).await;
    store.failing.store(true, Ordering::SeqCst);

    let err = reg.persist().await.unwrap_err();
    assert!(matches!(err, RegistryError::Store { .. }));
    assert!(err.to_string().contains("flaky"));
    assert!(reg.get("GET /a").is_some());

    reg.record("GET /b", infer(&json!({"b": 1})), 200, at(1)).await;
    store.failing.store(false, Ordering::SeqCst);
    reg.persist().await.unwrap();

    let reloaded = SchemaRegistry::new(store.clone(), 10);
    assert_eq!(reloaded.load().await.unwrap(), 2);
}

#[tokio::test]
async fn readers_see_published_snapshot() {
    let reg = Arc::new(mem_registry(10));
    let writer = {
        let reg = reg.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                reg.record(&format!("GET /e{i}"), infer(&json!({"i": i})), 200, at(i))
                    .await;
            }
        })
    };

    // a reader's snapshot is always internally consistent
    while !writer.is_finished() {
        for record in reg.list() {
            assert_eq!(record.fingerprint, compute_fingerprint(&record.current));
        }
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
    assert_eq!(reg.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_records_are_serialized() {
    let reg = Arc::new(mem_registry(32));
    let writers: Vec<_> = (0..16)
        .map(|i| {
            let reg = reg.clone();
            tokio::spawn(async move {
                let mut body = serde_json::Map::new();
                body.insert(format!("f{i}"), json!(i));
                reg.record("GET /shared", infer(&serde_json::Value::Object(body)), 200, at(i))
                    .await
            })
        })
        .collect();

    let mut changed = 0;
    for writer in writers {
        if writer.await.unwrap().is_changed() {
            changed += 1;
        }
    }

    // every observation added a field, so each one after the first is a change
    let record = reg.get("GET /shared").unwrap();
    assert_eq!(changed, 15);
    assert_eq!(record.sequence, 16);
    assert_eq!(record.history.len(), 16);
    assert_eq!(record.current.field_count(), 16);
    assert_eq!(record.fingerprint, compute_fingerprint(&record.current));
}
