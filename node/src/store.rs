//! In-memory document store with atomic batch commits and live queries.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use valdore_common::backend::{
    CollectionPath, Document, DocumentId, DocumentPath, FieldValue, Fields, Query, Snapshot,
    SnapshotSender, Subscription, WriteOp,
};
use valdore_common::error::BackendError;

use crate::query;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Insertion sequence, used to break ordering ties.
    pub seq: u64,
    pub fields: Fields,
}

/// Everything the store holds. Serializable so the node can snapshot it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    next_seq: u64,
    collections: BTreeMap<CollectionPath, BTreeMap<DocumentId, StoredDocument>>,
}

impl StoreState {
    pub fn get(&self, path: &DocumentPath) -> Option<Document> {
        self.collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|stored| Document {
                id: path.id.clone(),
                fields: stored.fields.clone(),
            })
    }

    /// Documents of one collection, in insertion order.
    fn documents(&self, collection: &CollectionPath) -> Vec<Document> {
        let Some(docs) = self.collections.get(collection) else {
            return Vec::new();
        };
        let mut stored: Vec<(&DocumentId, &StoredDocument)> = docs.iter().collect();
        stored.sort_by_key(|(_, d)| d.seq);
        stored
            .into_iter()
            .map(|(id, d)| Document {
                id: id.clone(),
                fields: d.fields.clone(),
            })
            .collect()
    }

    pub fn run_query(&self, q: &Query) -> Vec<Document> {
        query::evaluate(q, &self.documents(&q.collection))
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    /// Validate the whole batch against a staged overlay, then write it.
    /// Nothing is written if any op fails. Returns the touched collections.
    fn apply(&mut self, writes: &[WriteOp]) -> Result<BTreeSet<CollectionPath>, BackendError> {
        let mut staged: BTreeMap<DocumentPath, Fields> = BTreeMap::new();

        for write in writes {
            let path = write.path();
            let current = match staged.get(path) {
                Some(fields) => Some(fields.clone()),
                None => self.get(path).map(|d| d.fields),
            };

            match write {
                WriteOp::Create { fields, .. } => {
                    if current.is_some() {
                        return Err(BackendError::AlreadyExists(path.to_string()));
                    }
                    staged.insert(path.clone(), fields.clone());
                }
                WriteOp::Update { fields, .. } => {
                    let mut doc = current.ok_or_else(|| BackendError::NotFound(path.to_string()))?;
                    for (name, change) in fields {
                        let next = match change {
                            FieldValue::Set(value) => value.clone(),
                            FieldValue::Increment(by) => increment(doc.get(name), *by, path, name)?,
                            FieldValue::Decrement(by) => decrement(doc.get(name), *by, path, name)?,
                        };
                        doc.insert(name.clone(), next);
                    }
                    staged.insert(path.clone(), doc);
                }
            }
        }

        let mut touched = BTreeSet::new();
        for (path, fields) in staged {
            let docs = self.collections.entry(path.collection.clone()).or_default();
            match docs.get_mut(&path.id) {
                Some(existing) => existing.fields = fields,
                None => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    docs.insert(path.id.clone(), StoredDocument { seq, fields });
                }
            }
            touched.insert(path.collection);
        }
        Ok(touched)
    }
}

fn current_integer(current: Option<&Value>, path: &DocumentPath, field: &str) -> Result<i64, BackendError> {
    match current {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| {
            BackendError::InvalidUpdate(format!("cannot count on non-integer field `{field}` of {path}"))
        }),
    }
}

fn increment(
    current: Option<&Value>,
    by: i64,
    path: &DocumentPath,
    field: &str,
) -> Result<Value, BackendError> {
    current_integer(current, path, field)?
        .checked_add(by)
        .map(Value::from)
        .ok_or_else(|| BackendError::InvalidUpdate(format!("field `{field}` of {path} would overflow")))
}

/// Subtract `by` but never go below zero.
fn decrement(
    current: Option<&Value>,
    by: u64,
    path: &DocumentPath,
    field: &str,
) -> Result<Value, BackendError> {
    let n = current_integer(current, path, field)?;
    let by = i64::try_from(by).unwrap_or(i64::MAX);
    Ok(Value::from(n.saturating_sub(by).max(0)))
}

struct Subscriber {
    query: Query,
    last: Vec<Document>,
    tx: SnapshotSender,
}

/// Shared document store. All commits serialize on the state lock, and
/// live queries are notified before the lock is released.
#[derive(Default)]
pub struct DocumentStore {
    state: RwLock<StoreState>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    commits: AtomicU64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    pub async fn export(&self) -> StoreState {
        self.state.read().await.clone()
    }

    pub async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, BackendError> {
        path.validate()?;
        Ok(self.state.read().await.get(path))
    }

    pub async fn query(&self, q: &Query) -> Result<Vec<Document>, BackendError> {
        q.collection.validate()?;
        Ok(self.state.read().await.run_query(q))
    }

    /// Apply a batch atomically. Returns the number of writes applied.
    pub async fn commit(&self, writes: Vec<WriteOp>) -> Result<usize, BackendError> {
        if writes.is_empty() {
            return Ok(0);
        }
        for write in &writes {
            write.path().validate()?;
        }

        let mut state = self.state.write().await;
        let touched = state.apply(&writes)?;
        let n = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(commit = n, writes = writes.len(), collections = touched.len(), "batch committed");

        self.notify(&state, &touched);
        Ok(writes.len())
    }

    /// Attach a live query. The current result is queued before this returns.
    pub async fn subscribe(self: &Arc<Self>, q: Query) -> Result<Subscription, BackendError> {
        q.collection.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();

        // Hold the read lock until registered so no commit slips between the
        // initial result and the first notification.
        let state = self.state.read().await;
        let current = state.run_query(&q);
        let _ = tx.send(Ok(Snapshot::diff(&[], current.clone())));

        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        debug!(subscriber = id, collection = %q.collection, "live query attached");
        self.subscribers.insert(
            id,
            Subscriber {
                query: q,
                last: current,
                tx,
            },
        );
        drop(state);

        let store = Arc::downgrade(self);
        Ok(Subscription::new(rx, move || {
            if let Some(store) = store.upgrade() {
                store.subscribers.remove(&id);
                debug!(subscriber = id, "live query detached");
            }
        }))
    }

    fn notify(&self, state: &StoreState, touched: &BTreeSet<CollectionPath>) {
        let mut closed = Vec::new();
        for mut entry in self.subscribers.iter_mut() {
            let id = *entry.key();
            let sub = entry.value_mut();
            if !touched.contains(&sub.query.collection) {
                continue;
            }
            let current = state.run_query(&sub.query);
            if current == sub.last {
                continue;
            }
            let snapshot = Snapshot::diff(&sub.last, current.clone());
            sub.last = current;
            if sub.tx.send(Ok(snapshot)).is_err() {
                closed.push(id);
            }
        }
        for id in closed {
            warn!(subscriber = id, "dropping live query with closed receiver");
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub async fn document_count(&self) -> usize {
        self.state.read().await.document_count()
    }
}
