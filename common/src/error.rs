use serde::{Deserialize, Serialize};

/// Errors from document-store operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors reported by the authentication provider.
///
/// The variants mirror the small fixed set of provider codes the storefront
/// knows how to explain to a user; anything else lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", content = "message", rename_all = "kebab-case")]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error("invalid email")]
    InvalidEmail,

    #[error("email already in use")]
    EmailAlreadyInUse,

    #[error("weak password")]
    WeakPassword,

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Stable provider code, e.g. `auth/user-not-found`.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "auth/user-not-found",
            AuthError::WrongPassword => "auth/wrong-password",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::Other(_) => "auth/internal-error",
        }
    }
}
