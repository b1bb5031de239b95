use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use crate::error::{AuthError, BackendError};
use crate::identity::AuthUser;

/// Store-assigned document identifier.
pub type DocumentId = String;

/// Top-level fields of a document.
pub type Fields = Map<String, Value>;

/// Length of generated document ids (same shape the hosted store assigns).
const DOCUMENT_ID_LEN: usize = 20;

/// Generate a fresh random document id.
pub fn new_document_id() -> DocumentId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

/// Slash-separated path to a collection, e.g. `conversations` or
/// `conversations/{id}/messages`. Always an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// A sub-collection nested under document `id` of this collection.
    pub fn child(&self, id: &str, name: &str) -> Self {
        Self(format!("{}/{id}/{name}", self.0))
    }

    pub fn doc(&self, id: impl Into<DocumentId>) -> DocumentPath {
        DocumentPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        let segments: Vec<&str> = self.0.split('/').collect();
        if segments.len() % 2 == 0 || segments.iter().any(|s| s.is_empty()) {
            return Err(BackendError::InvalidPath(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentPath {
    pub collection: CollectionPath,
    pub id: DocumentId,
}

impl DocumentPath {
    pub fn validate(&self) -> Result<(), BackendError> {
        self.collection.validate()?;
        if self.id.is_empty() || self.id.contains('/') {
            return Err(BackendError::InvalidPath(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A stored document: its id plus its top-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the fields into a model type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serialize a model type into document fields. The value must serialize to
/// a JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, BackendError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(BackendError::InvalidUpdate(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A collection scan with equality filters, ordering and an optional limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: CollectionPath,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            equals: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document passes every filter. A missing field never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|f| doc.get(&f.field) == Some(&f.equals))
    }
}

/// One field change inside an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Set(Value),
    /// Add to a numeric field, treating a missing field as 0.
    Increment(i64),
    /// Subtract from a counter, stopping at 0.
    Decrement(u64),
}

/// A single write inside an atomic batch commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    /// Create a document. Fails if it already exists.
    Create { path: DocumentPath, fields: Fields },
    /// Change fields of an existing document. Fails if it is missing.
    Update {
        path: DocumentPath,
        fields: BTreeMap<String, FieldValue>,
    },
}

impl WriteOp {
    pub fn create<T: Serialize>(path: DocumentPath, value: &T) -> Result<Self, BackendError> {
        Ok(WriteOp::Create {
            path,
            fields: encode(value)?,
        })
    }

    pub fn update(path: DocumentPath) -> Self {
        WriteOp::Update {
            path,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field. Valid on both creates and updates.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        match &mut self {
            WriteOp::Create { fields, .. } => {
                fields.insert(field.to_string(), value.into());
            }
            WriteOp::Update { fields, .. } => {
                fields.insert(field.to_string(), FieldValue::Set(value.into()));
            }
        }
        self
    }

    /// Increment a numeric field. On a create this adds to the value being
    /// written.
    pub fn increment(mut self, field: &str, by: i64) -> Self {
        match &mut self {
            WriteOp::Create { fields, .. } => {
                let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
                fields.insert(field.to_string(), Value::from(current + by));
            }
            WriteOp::Update { fields, .. } => {
                fields.insert(field.to_string(), FieldValue::Increment(by));
            }
        }
        self
    }

    /// Lower a counter by `by`, never below zero. On a create this lowers
    /// the value being written.
    pub fn decrement(mut self, field: &str, by: u64) -> Self {
        match &mut self {
            WriteOp::Create { fields, .. } => {
                let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
                let by = i64::try_from(by).unwrap_or(i64::MAX);
                fields.insert(field.to_string(), Value::from(current.saturating_sub(by).max(0)));
            }
            WriteOp::Update { fields, .. } => {
                fields.insert(field.to_string(), FieldValue::Decrement(by));
            }
        }
        self
    }

    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Create { path, .. } | WriteOp::Update { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// Full result of a live query plus the changes since the previous delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: Vec<Document>,
    pub changes: Vec<DocumentChange>,
}

impl Snapshot {
    /// Build a snapshot of `current`, with changes computed against `previous`.
    pub fn diff(previous: &[Document], current: Vec<Document>) -> Self {
        let before: HashMap<&str, &Document> =
            previous.iter().map(|d| (d.id.as_str(), d)).collect();
        let mut changes = Vec::new();

        for doc in &current {
            match before.get(doc.id.as_str()) {
                None => changes.push(DocumentChange {
                    kind: ChangeKind::Added,
                    document: doc.clone(),
                }),
                Some(old) if old.fields != doc.fields => changes.push(DocumentChange {
                    kind: ChangeKind::Modified,
                    document: doc.clone(),
                }),
                Some(_) => {}
            }
        }

        for old in previous {
            if !current.iter().any(|d| d.id == old.id) {
                changes.push(DocumentChange {
                    kind: ChangeKind::Removed,
                    document: old.clone(),
                });
            }
        }

        Self {
            documents: current,
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot, BackendError>>;

/// Handle to a live query. Dropping it detaches the listener.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Snapshot, BackendError>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Result<Snapshot, BackendError>>,
        on_drop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Wait for the next delivery. `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Result<Snapshot, BackendError>> {
        self.rx.recv().await
    }

    /// Take an already-delivered snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Result<Snapshot, BackendError>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.on_drop.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.on_drop.is_some())
            .finish()
    }
}

/// Contract of the hosted authentication + document database service.
///
/// Implemented in-process by `valdore-node` and over HTTP/WebSocket by the
/// client's remote backend.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// The signed-in account, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Auth-state notifications: yields the account or `None` on every change.
    fn auth_changes(&self) -> watch::Receiver<Option<AuthUser>>;

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, BackendError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError>;

    /// Apply all writes atomically, or none of them.
    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), BackendError>;

    /// Attach a live query. The current result is delivered first.
    async fn subscribe(&self, query: Query) -> Result<Subscription, BackendError>;

    /// Short name for logs, e.g. `memory` or `remote`.
    fn backend_name(&self) -> &str;
}
