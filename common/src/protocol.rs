//! JSON wire types shared by the node's HTTP/WebSocket API and the remote
//! client backend.

use serde::{Deserialize, Serialize};

use crate::backend::{Document, DocumentPath, Query, Snapshot, WriteOp};
use crate::error::{AuthError, BackendError};
use crate::identity::AuthUser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Returned by sign-up and sign-in; `token` goes in `Authorization: Bearer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub path: DocumentPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: Query,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub writes: Vec<WriteOp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub applied: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents: usize,
    pub subscribers: usize,
}

/// Pushed by the node over the `/subscribe` WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    Snapshot { snapshot: Snapshot },
    Error { error: ErrorBody },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidPath,
    InvalidUpdate,
    Unauthenticated,
    Auth,
    Transport,
    Codec,
}

/// Error payload of every failed API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub auth: Option<AuthError>,
}

impl ErrorBody {
    pub fn auth(error: &AuthError) -> Self {
        Self {
            kind: ErrorKind::Auth,
            message: error.to_string(),
            auth: Some(error.clone()),
        }
    }

    /// Rebuild the store error on the receiving side.
    pub fn into_backend_error(self) -> BackendError {
        match self.kind {
            ErrorKind::NotFound => BackendError::NotFound(self.message),
            ErrorKind::AlreadyExists => BackendError::AlreadyExists(self.message),
            ErrorKind::InvalidPath => BackendError::InvalidPath(self.message),
            ErrorKind::InvalidUpdate => BackendError::InvalidUpdate(self.message),
            ErrorKind::Unauthenticated => BackendError::Unauthenticated,
            ErrorKind::Auth | ErrorKind::Transport | ErrorKind::Codec => {
                BackendError::Transport(self.message)
            }
        }
    }

    /// Rebuild the auth error on the receiving side.
    pub fn into_auth_error(self) -> AuthError {
        self.auth.unwrap_or(AuthError::Other(self.message))
    }
}

impl From<&BackendError> for ErrorBody {
    fn from(error: &BackendError) -> Self {
        // Not-found and already-exists carry the bare path so the receiver
        // can rebuild the same variant.
        let (kind, message) = match error {
            BackendError::NotFound(path) => (ErrorKind::NotFound, path.clone()),
            BackendError::AlreadyExists(path) => (ErrorKind::AlreadyExists, path.clone()),
            BackendError::InvalidPath(path) => (ErrorKind::InvalidPath, path.clone()),
            BackendError::InvalidUpdate(msg) => (ErrorKind::InvalidUpdate, msg.clone()),
            BackendError::Unauthenticated => (ErrorKind::Unauthenticated, error.to_string()),
            BackendError::Transport(msg) => (ErrorKind::Transport, msg.clone()),
            BackendError::Codec(e) => (ErrorKind::Codec, e.to_string()),
        };
        Self {
            kind,
            message,
            auth: None,
        }
    }
}
