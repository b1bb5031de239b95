use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::CollectionPath;

pub const CONTACT_MESSAGES: &str = "contact-messages";

pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_READ: &str = "read";
pub const FIELD_READ_AT: &str = "read_at";

pub fn contact_messages() -> CollectionPath {
    CollectionPath::root(CONTACT_MESSAGES)
}

/// A message left through the public contact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub read_at: Option<DateTime<Utc>>,
}
