use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{CollectionPath, DocumentId, DocumentPath};
use crate::identity::{Actor, ActorId};
use crate::message::SenderRole;

/// Top-level collection holding one document per support thread.
pub const CONVERSATIONS: &str = "conversations";

/// Sub-collection of a conversation holding its messages.
pub const MESSAGES: &str = "messages";

pub const FIELD_OWNER_ID: &str = "owner_id";
pub const FIELD_LAST_MESSAGE_AT: &str = "last_message_at";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_UNREAD_BY_ADMIN: &str = "unread_by_admin";
pub const FIELD_UNREAD_BY_CUSTOMER: &str = "unread_by_customer";

pub type ConversationId = DocumentId;

pub fn conversations() -> CollectionPath {
    CollectionPath::root(CONVERSATIONS)
}

pub fn conversation_path(id: &str) -> DocumentPath {
    conversations().doc(id)
}

pub fn messages(conversation: &str) -> CollectionPath {
    conversations().child(conversation, MESSAGES)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }
}

/// A customer-support thread between one customer (or guest) and staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub owner_id: ActorId,
    pub owner_label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_message_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ConversationStatus,
    /// Customer messages the admin has not read yet.
    #[serde(default)]
    pub unread_by_admin: u32,
    /// Admin messages the customer has not read yet.
    #[serde(default)]
    pub unread_by_customer: u32,
}

impl Conversation {
    pub fn new(owner: &Actor, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner.id.clone(),
            owner_label: owner.label.clone(),
            created_at: now,
            last_message_at: now,
            status: ConversationStatus::Active,
            unread_by_admin: 0,
            unread_by_customer: 0,
        }
    }

    /// Unread counter as seen by `viewer`.
    pub fn unread_for(&self, viewer: SenderRole) -> u32 {
        match viewer {
            SenderRole::Admin => self.unread_by_admin,
            SenderRole::Customer => self.unread_by_customer,
        }
    }
}

/// Field holding the unread counter that `viewer` clears by reading.
pub fn unread_field_for(viewer: SenderRole) -> &'static str {
    match viewer {
        SenderRole::Admin => FIELD_UNREAD_BY_ADMIN,
        SenderRole::Customer => FIELD_UNREAD_BY_CUSTOMER,
    }
}
