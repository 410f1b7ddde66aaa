use std::collections::BTreeMap;
use std::sync::Arc;

use apiwatch_config::parse_endpoint_ref;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use schema_sensing::{FieldSchema, compute_fingerprint, unify};
use schema_store::{SchemaStore, SchemaStoreExt, StoreError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{RegistryError, RegistryResult};
use crate::record::{
    ChangeOutcome, DOCUMENT_VERSION, EndpointSchema, HistoryEntry, ProbeStatus,
    RawRegistryDocument, RegistryDocument,
};

type Records = BTreeMap<String, Arc<EndpointSchema>>;

/// Endpoint id → schema record, backed by a [`SchemaStore`].
///
/// Mutations go through a single async write gate and publish a fresh map;
/// readers clone the current `Arc` and never wait on writers.
pub struct SchemaRegistry {
    store: Arc<dyn SchemaStore>,
    history_limit: usize,
    write_gate: Mutex<()>,
    records: RwLock<Arc<Records>>,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn SchemaStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit: history_limit.max(1),
            write_gate: Mutex::new(()),
            records: RwLock::new(Arc::new(Records::new())),
        }
    }

    fn snapshot(&self) -> Arc<Records> {
        self.records.read().clone()
    }

    fn publish(&self, records: Records) {
        *self.records.write() = Arc::new(records);
    }

    /// Replace in-memory state with the persisted document.
    ///
    /// Missing document is a cold start. An unreadable document is logged
    /// and treated as empty; the next persist overwrites it. Returns the
    /// number of records loaded.
    pub async fn load(&self) -> RegistryResult<usize> {
        let _g = self.write_gate.lock().await;

        let records = match self.store.read::<RawRegistryDocument>().await {
            Ok(None) => {
                info!(store = %self.store.describe(), "no persisted schemas, starting empty");
                Records::new()
            }
            Ok(Some(doc)) => self.decode(doc),
            Err(StoreError::Serde(e)) => {
                warn!(store = %self.store.describe(), error = %e, "corrupt schema store, ignoring contents");
                Records::new()
            }
            Err(source) => return Err(self.store_error(source)),
        };

        let count = records.len();
        self.publish(records);
        info!(store = %self.store.describe(), endpoints = count, "schema registry loaded");
        Ok(count)
    }

    fn decode(&self, doc: RawRegistryDocument) -> Records {
        if doc.version != DOCUMENT_VERSION {
            warn!(
                store = %self.store.describe(),
                version = doc.version,
                expected = DOCUMENT_VERSION,
                "unsupported schema store version, ignoring contents"
            );
            return Records::new();
        }

        let mut records = Records::new();
        for (id, value) in doc.endpoints {
            match serde_json::from_value::<EndpointSchema>(value) {
                Ok(mut record) => {
                    trim_history(&mut record.history, self.history_limit);
                    records.insert(id, Arc::new(record));
                }
                Err(e) => {
                    warn!(endpoint = %id, error = %e, "skipping corrupt schema record")
                }
            }
        }
        records
    }

    /// Write every record to the store in one atomic replace.
    ///
    /// On failure the in-memory state is untouched and the next call
    /// rewrites everything.
    pub async fn persist(&self) -> RegistryResult<()> {
        let _g = self.write_gate.lock().await;
        let records = self.snapshot();

        let doc = RegistryDocument {
            version: DOCUMENT_VERSION,
            endpoints: records
                .iter()
                .map(|(id, record)| (id.as_str(), record.as_ref()))
                .collect(),
        };

        self.store
            .write(&doc)
            .await
            .map_err(|source| self.store_error(source))?;
        debug!(store = %self.store.describe(), endpoints = records.len(), "schema registry persisted");
        Ok(())
    }

    fn store_error(&self, source: StoreError) -> RegistryError {
        RegistryError::Store {
            backend: self.store.describe(),
            source,
        }
    }

    /// Current record for an endpoint id (`GET /path`) or bare path.
    pub fn get(&self, endpoint: &str) -> Option<Arc<EndpointSchema>> {
        let id = parse_endpoint_ref(endpoint);
        self.snapshot().get(&id).cloned()
    }

    /// All records, ordered by endpoint id.
    pub fn list(&self) -> Vec<Arc<EndpointSchema>> {
        self.snapshot().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Fold a successful observation into the registry.
    pub async fn record(
        &self,
        endpoint: &str,
        inferred: FieldSchema,
        http_status: u16,
        observed_at: DateTime<Utc>,
    ) -> ChangeOutcome {
        let _g = self.write_gate.lock().await;
        let id = parse_endpoint_ref(endpoint);
        let mut records = Records::clone(&self.snapshot());

        let (record, outcome) = match records.get(&id) {
            None => {
                let record =
                    first_record(&id, inferred, http_status, observed_at);
                info!(
                    endpoint = %id,
                    fingerprint = %record.fingerprint,
                    "new schema discovered"
                );
                let outcome = ChangeOutcome::FirstObservation {
                    fingerprint: record.fingerprint.clone(),
                    sequence: record.sequence,
                };
                (record, outcome)
            }
            Some(existing) => {
                let mut record = EndpointSchema::clone(existing);
                let merged = unify(&record.current, &inferred);
                let fingerprint = compute_fingerprint(&merged);

                let outcome = if fingerprint == record.fingerprint {
                    debug!(endpoint = %id, fingerprint = %fingerprint, "schema unchanged");
                    ChangeOutcome::Unchanged {
                        fingerprint: fingerprint.clone(),
                        sequence: record.sequence,
                    }
                } else {
                    let previous =
                        std::mem::replace(&mut record.fingerprint, fingerprint.clone());
                    record.current = merged;
                    record.sequence += 1;
                    record.last_changed_at = Some(observed_at);
                    info!(
                        endpoint = %id,
                        old_fp = %previous,
                        new_fp = %fingerprint,
                        sequence = record.sequence,
                        "schema changed"
                    );
                    ChangeOutcome::Changed {
                        previous,
                        fingerprint: fingerprint.clone(),
                        sequence: record.sequence,
                    }
                };

                record.history.push(HistoryEntry {
                    fingerprint,
                    observed_at,
                    http_status,
                });
                trim_history(&mut record.history, self.history_limit);
                record.last_checked_at = observed_at;
                record.last_status = ProbeStatus::Http(http_status);
                record.last_error = None;
                (record, outcome)
            }
        };

        records.insert(id, Arc::new(record));
        self.publish(records);
        outcome
    }

    /// Note a failed probe on an existing record.
    ///
    /// Records are only created by successful probes, so an unknown
    /// endpoint is left alone and `false` is returned.
    pub async fn record_failure(
        &self,
        endpoint: &str,
        status: ProbeStatus,
        error: Option<String>,
        observed_at: DateTime<Utc>,
    ) -> bool {
        let _g = self.write_gate.lock().await;
        let id = parse_endpoint_ref(endpoint);
        let mut records = Records::clone(&self.snapshot());

        let Some(existing) = records.get(&id) else {
            debug!(endpoint = %id, status = %status, "failure on unseen endpoint, nothing recorded");
            return false;
        };

        let mut record = EndpointSchema::clone(existing);
        record.last_checked_at = observed_at;
        record.last_status = status;
        record.last_error = error;
        records.insert(id, Arc::new(record));
        self.publish(records);
        true
    }

    /// Drop one endpoint's record. Durable after the next [`persist`](Self::persist).
    pub async fn clear(&self, endpoint: &str) -> bool {
        let _g = self.write_gate.lock().await;
        let id = parse_endpoint_ref(endpoint);
        let mut records = Records::clone(&self.snapshot());
        let existed = records.remove(&id).is_some();
        if existed {
            info!(endpoint = %id, "schema record cleared");
            self.publish(records);
        }
        existed
    }

    /// Drop every record, returning how many were removed.
    pub async fn clear_all(&self) -> usize {
        let _g = self.write_gate.lock().await;
        let count = self.snapshot().len();
        self.publish(Records::new());
        info!(cleared = count, "schema registry cleared");
        count
    }
}

fn first_record(
    id: &str,
    inferred: FieldSchema,
    http_status: u16,
    observed_at: DateTime<Utc>,
) -> EndpointSchema {
    let fingerprint = compute_fingerprint(&inferred);
    let (method, path) = id.split_once(' ').unwrap_or(("GET", id));

    EndpointSchema {
        endpoint_id: id.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        current: inferred,
        fingerprint: fingerprint.clone(),
        sequence: 1,
        history: vec![HistoryEntry {
            fingerprint,
            observed_at,
            http_status,
        }],
        first_seen: observed_at,
        last_changed_at: None,
        last_checked_at: observed_at,
        last_status: ProbeStatus::Http(http_status),
        last_error: None,
    }
}

fn trim_history(history: &mut Vec<HistoryEntry>, limit: usize) {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}
