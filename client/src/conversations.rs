//! Queries and writes against `conversations` and their `messages`.

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use valdore_common::backend::{
    new_document_id, Backend, Direction, Document, DocumentId, Query, Subscription, WriteOp,
};
use valdore_common::chat::{
    self, conversation_path, conversations, unread_field_for, Conversation, ConversationId,
    ConversationStatus, FIELD_LAST_MESSAGE_AT, FIELD_OWNER_ID,
};
use valdore_common::error::BackendError;
use valdore_common::identity::{Actor, ActorId};
use valdore_common::message::{self, Message, MessageId, SenderRole, FIELD_SENDER, FIELD_SENT_AT};

/// Decode documents, skipping (and logging) any that do not fit `T`.
pub fn decode_documents<T: DeserializeOwned>(docs: &[Document]) -> Vec<(DocumentId, T)> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(value) => Some((doc.id.clone(), value)),
            Err(e) => {
                warn!(id = %doc.id, "skipping malformed document: {e}");
                None
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct ConversationStore<B> {
    backend: B,
}

impl<B: Backend> ConversationStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Most recent conversation owned by `owner`, if any.
    pub async fn find_for_actor(
        &self,
        owner: &ActorId,
    ) -> Result<Option<(ConversationId, Conversation)>, BackendError> {
        let query = Query::new(conversations())
            .where_eq(FIELD_OWNER_ID, owner.as_str())
            .order_by(FIELD_LAST_MESSAGE_AT, Direction::Descending)
            .limit(1);
        let docs = self.backend.query(&query).await?;
        match docs.first() {
            Some(doc) => Ok(Some((doc.id.clone(), doc.decode()?))),
            None => Ok(None),
        }
    }

    /// Create a conversation together with its first customer message.
    pub async fn start_conversation(
        &self,
        owner: &Actor,
        first_message: &str,
    ) -> Result<ConversationId, BackendError> {
        let now = Utc::now();
        let id = new_document_id();
        let conversation = Conversation::new(owner, now);
        let message = Message::new(first_message, SenderRole::Customer, now);

        self.backend
            .commit(vec![
                WriteOp::create(conversation_path(&id), &conversation)?
                    .increment(unread_field_for(SenderRole::Admin), 1),
                WriteOp::create(chat::messages(&id).doc(new_document_id()), &message)?,
            ])
            .await?;
        debug!(conversation = %id, owner = %owner.id, "conversation started");
        Ok(id)
    }

    /// Write a message, bump the conversation's last-message time and count
    /// it as unread for the other party, all in one batch.
    pub async fn append(
        &self,
        conversation: &str,
        sender: SenderRole,
        body: &str,
    ) -> Result<MessageId, BackendError> {
        let now = Utc::now();
        let message_id = new_document_id();
        let message = Message::new(body, sender, now);

        self.backend
            .commit(vec![
                WriteOp::create(chat::messages(conversation).doc(message_id.clone()), &message)?,
                WriteOp::update(conversation_path(conversation))
                    .set(FIELD_LAST_MESSAGE_AT, now.timestamp_millis())
                    .increment(unread_field_for(sender.counterpart()), 1),
            ])
            .await?;
        Ok(message_id)
    }

    fn unread_query(conversation: &str, sender: SenderRole) -> Query {
        Query::new(chat::messages(conversation))
            .where_eq(FIELD_SENDER, sender.as_str())
            .where_eq(message::FIELD_READ, false)
    }

    /// Flag every unread message from `sender` as read and lower the
    /// reader's counter by that many. Messages that land between the query
    /// and the commit stay counted. Returns how many messages changed; no
    /// write happens when there were none.
    pub async fn mark_read(&self, conversation: &str, sender: SenderRole) -> Result<usize, BackendError> {
        let unread = self
            .backend
            .query(&Self::unread_query(conversation, sender))
            .await?;
        if unread.is_empty() {
            return Ok(0);
        }

        let messages = chat::messages(conversation);
        let mut writes: Vec<WriteOp> = unread
            .iter()
            .map(|doc| WriteOp::update(messages.doc(doc.id.clone())).set(message::FIELD_READ, true))
            .collect();
        let marked = u64::try_from(unread.len()).unwrap_or(u64::MAX);
        writes.push(
            WriteOp::update(conversation_path(conversation))
                .decrement(unread_field_for(sender.counterpart()), marked),
        );
        self.backend.commit(writes).await?;
        debug!(conversation, count = unread.len(), "marked messages read");
        Ok(unread.len())
    }

    /// Count unread messages from `sender` with a query of its own.
    pub async fn count_unread(&self, conversation: &str, sender: SenderRole) -> Result<usize, BackendError> {
        Ok(self
            .backend
            .query(&Self::unread_query(conversation, sender))
            .await?
            .len())
    }

    pub async fn set_status(&self, conversation: &str, status: ConversationStatus) -> Result<(), BackendError> {
        self.backend
            .commit(vec![
                WriteOp::update(conversation_path(conversation)).set(chat::FIELD_STATUS, status.as_str())
            ])
            .await
    }

    /// Live feed of one conversation's messages, oldest first.
    pub async fn subscribe_messages(&self, conversation: &str) -> Result<Subscription, BackendError> {
        self.backend
            .subscribe(Query::new(chat::messages(conversation)).order_by(FIELD_SENT_AT, Direction::Ascending))
            .await
    }

    /// Live feed of every conversation, most recent activity first.
    pub async fn subscribe_all(&self) -> Result<Subscription, BackendError> {
        self.backend
            .subscribe(Query::new(conversations()).order_by(FIELD_LAST_MESSAGE_AT, Direction::Descending))
            .await
    }
}
