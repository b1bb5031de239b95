use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Prefix marking a locally generated guest token.
pub const GUEST_PREFIX: &str = "guest_";

/// Random bytes behind a guest token (hex-encoded to 32 chars).
const GUEST_TOKEN_BYTES: usize = 16;

/// Display label used for conversations owned by a guest.
pub const DEFAULT_GUEST_LABEL: &str = "invitado@valdore.com";

/// Identifier of whoever owns a conversation: an account uid or a guest token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_guest(&self) -> bool {
        is_guest_token(&self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed-in account as reported by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AuthUser {
    /// Name shown in the header greeting: the display name, else the local
    /// part of the email.
    pub fn greeting_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    Account,
    Guest,
}

/// Who is using the storefront on this page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    /// Email for accounts, the guest marker for guests.
    pub label: String,
    pub kind: ActorKind,
    /// False when a guest token could not be written to local storage, so
    /// the next load will fork a new identity.
    pub persisted: bool,
}

impl Actor {
    pub fn account(user: &AuthUser) -> Self {
        Self {
            id: ActorId(user.uid.clone()),
            label: user.email.clone(),
            kind: ActorKind::Account,
            persisted: true,
        }
    }

    pub fn guest(token: String, label: &str, persisted: bool) -> Self {
        Self {
            id: ActorId(token),
            label: label.to_string(),
            kind: ActorKind::Guest,
            persisted,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.kind == ActorKind::Guest
    }
}

/// Generate a fresh guest token from the OS random source.
pub fn generate_guest_token() -> String {
    let mut bytes = [0u8; GUEST_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{GUEST_PREFIX}{}", hex::encode(bytes))
}

/// Whether `s` has the exact shape produced by [`generate_guest_token`].
pub fn is_guest_token(s: &str) -> bool {
    s.strip_prefix(GUEST_PREFIX).is_some_and(|rest| {
        rest.len() == GUEST_TOKEN_BYTES * 2 && rest.chars().all(|c| c.is_ascii_hexdigit())
    })
}
