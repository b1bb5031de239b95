use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::DocumentId;

pub const FIELD_SENDER: &str = "sender";
pub const FIELD_SENT_AT: &str = "sent_at";
pub const FIELD_READ: &str = "read";

/// Messages longer than this are rendered with the long-message style.
pub const LONG_MESSAGE_CHARS: usize = 200;

pub type MessageId = DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Customer,
    Admin,
}

impl SenderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderRole::Customer => "customer",
            SenderRole::Admin => "admin",
        }
    }

    /// The party expected to read what this role sends.
    pub fn counterpart(self) -> SenderRole {
        match self {
            SenderRole::Customer => SenderRole::Admin,
            SenderRole::Admin => SenderRole::Customer,
        }
    }
}

/// A message inside a conversation. New messages always start unread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub body: String,
    pub sender: SenderRole,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(body: impl Into<String>, sender: SenderRole, now: DateTime<Utc>) -> Self {
        Self {
            body: body.into(),
            sender,
            sent_at: now,
            read: false,
        }
    }

    pub fn is_long(&self) -> bool {
        self.body.chars().count() > LONG_MESSAGE_CHARS
    }
}
