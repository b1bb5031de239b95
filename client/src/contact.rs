use chrono::Utc;
use tracing::info;
use valdore_common::backend::{new_document_id, Backend, DocumentId, WriteOp};
use valdore_common::contact::{contact_messages, ContactMessage};
use valdore_common::validate::is_valid_email;

use crate::error::{ClientError, ValidationError};

/// Fields of the public contact form as typed by the visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [&self.name, &self.email, &self.subject, &self.message];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(ValidationError::MissingFields);
        }
        if !is_valid_email(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(())
    }

    fn to_message(&self) -> ContactMessage {
        let phone = self.phone.trim();
        ContactMessage {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
            subject: self.subject.trim().to_string(),
            body: self.message.trim().to_string(),
            created_at: Utc::now(),
            read: false,
            read_at: None,
        }
    }
}

/// Validate and store a contact message. Nothing is sent if validation fails.
pub async fn submit<B: Backend>(backend: &B, form: &ContactForm) -> Result<DocumentId, ClientError> {
    form.validate()?;
    let id = new_document_id();
    backend
        .commit(vec![WriteOp::create(
            contact_messages().doc(id.clone()),
            &form.to_message(),
        )?])
        .await?;
    info!(id = %id, "contact message received");
    Ok(id)
}
