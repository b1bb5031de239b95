//! Back-office chat console: every conversation, one open thread.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use valdore_common::backend::{Backend, ChangeKind, Snapshot, Subscription};
use valdore_common::chat::{Conversation, ConversationId, ConversationStatus};
use valdore_common::message::{Message, MessageId, SenderRole};

use crate::conversations::{decode_documents, ConversationStore};
use crate::error::{ClientError, ValidationError};
use crate::format::{relative_time, time_of_day};

pub const EMPTY_LIST_TEXT: &str = "No hay conversaciones";

/// Owner ids are shown truncated to this many characters.
const OWNER_ID_PREVIEW: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    /// Conversations with unread customer messages.
    Unanswered,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub id: ConversationId,
    pub owner_label: String,
    pub owner_id_preview: String,
    pub last_message: String,
    pub status: ConversationStatus,
    pub unread: u32,
    pub has_unread: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Loading,
    Error(String),
    Empty(&'static str),
    Rows(Vec<ConversationRow>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub id: MessageId,
    pub body: String,
    pub from_admin: bool,
    pub time: String,
    pub read: bool,
    pub long: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub conversation_id: ConversationId,
    pub owner_label: String,
    pub owner_id: String,
    pub messages: Vec<ThreadRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleView {
    pub list: ListView,
    pub thread: Option<ThreadView>,
}

pub struct AdminChatConsole<B> {
    store: ConversationStore<B>,
    list_feed: Option<Subscription>,
    message_feed: Option<Subscription>,
    list_state: ListState,
    conversations: Vec<(ConversationId, Conversation)>,
    /// Counts from a manual recount, shown until the conversation changes.
    recounted: HashMap<ConversationId, u32>,
    selected: Option<ConversationId>,
    messages: Vec<(MessageId, Message)>,
    search: String,
    filter: StatusFilter,
}

impl<B: Backend> AdminChatConsole<B> {
    pub fn new(backend: B) -> Self {
        Self {
            store: ConversationStore::new(backend),
            list_feed: None,
            message_feed: None,
            list_state: ListState::Loading,
            conversations: Vec::new(),
            recounted: HashMap::new(),
            selected: None,
            messages: Vec::new(),
            search: String::new(),
            filter: StatusFilter::All,
        }
    }

    pub async fn load(backend: B) -> Self {
        debug!(backend = backend.backend_name(), "loading chat console");
        let mut console = Self::new(backend);
        console.reload().await;
        console
    }

    /// Replace the conversation-list feed. On failure the list shows an
    /// error until the next reload.
    pub async fn reload(&mut self) {
        self.list_feed = None;
        self.list_state = ListState::Loading;
        match self.store.subscribe_all().await {
            Ok(feed) => self.list_feed = Some(feed),
            Err(e) => {
                warn!("failed to subscribe to conversations: {e}");
                self.list_state = ListState::Error(e.to_string());
            }
        }
        self.drain_updates();
    }

    pub fn list_state(&self) -> &ListState {
        &self.list_state
    }

    pub fn conversations(&self) -> &[(ConversationId, Conversation)] {
        &self.conversations
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn messages(&self) -> &[(MessageId, Message)] {
        &self.messages
    }

    /// Unread customer messages for a conversation as currently shown.
    pub fn unread_for(&self, id: &str) -> u32 {
        if let Some(count) = self.recounted.get(id) {
            return *count;
        }
        self.conversations
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, c)| c.unread_for(SenderRole::Admin))
            .unwrap_or(0)
    }

    /// Open a thread: swap the message feed and mark customer messages read.
    pub async fn select(&mut self, id: &str) -> Result<(), ClientError> {
        self.message_feed = None;
        self.messages.clear();
        self.selected = None;

        let feed = match self.store.subscribe_messages(id).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(conversation = id, "failed to subscribe to messages: {e}");
                return Err(e.into());
            }
        };
        self.message_feed = Some(feed);
        self.selected = Some(id.to_string());

        match self.store.mark_read(id, SenderRole::Customer).await {
            Ok(_) => {
                self.recounted.remove(id);
            }
            Err(e) => warn!(conversation = id, "failed to mark messages read: {e}"),
        }
        self.drain_updates();
        Ok(())
    }

    /// Reply in the selected thread. Blank text is ignored.
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(());
        }
        let id = self
            .selected
            .clone()
            .ok_or(ValidationError::NoConversationSelected)?;
        self.store.append(&id, SenderRole::Admin, body).await?;
        self.drain_updates();
        Ok(())
    }

    pub async fn set_status(&mut self, id: &str, status: ConversationStatus) -> Result<(), ClientError> {
        self.store.set_status(id, status).await?;
        self.drain_updates();
        Ok(())
    }

    /// Recompute every unread count with one query per conversation.
    pub async fn recount(&mut self) -> Result<(), ClientError> {
        let ids: Vec<ConversationId> = self.conversations.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            let count = self.store.count_unread(&id, SenderRole::Customer).await?;
            self.recounted.insert(id, u32::try_from(count).unwrap_or(u32::MAX));
        }
        debug!(conversations = self.recounted.len(), "unread counts recounted");
        Ok(())
    }

    pub fn set_search(&mut self, search: &str) {
        self.search = search.trim().to_lowercase();
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    fn apply_list(&mut self, snapshot: &Snapshot) {
        for change in &snapshot.changes {
            if change.kind != ChangeKind::Added {
                self.recounted.remove(&change.document.id);
            }
        }
        self.conversations = decode_documents(&snapshot.documents);
        self.list_state = ListState::Ready;
    }

    /// Apply every delivery already queued on both feeds.
    pub fn drain_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Some(delivery) = self.list_feed.as_mut().and_then(Subscription::try_next) {
            match delivery {
                Ok(snapshot) => {
                    self.apply_list(&snapshot);
                    applied += 1;
                }
                Err(e) => {
                    warn!("conversation list feed error: {e}");
                    self.list_state = ListState::Error(e.to_string());
                }
            }
        }
        while let Some(delivery) = self.message_feed.as_mut().and_then(Subscription::try_next) {
            match delivery {
                Ok(snapshot) => {
                    self.messages = decode_documents(&snapshot.documents);
                    applied += 1;
                }
                Err(e) => warn!("message feed error: {e}"),
            }
        }
        applied
    }

    /// Wait until either feed delivers, then apply everything queued.
    /// Returns false when no feed is attached or both have closed.
    pub async fn next_update(&mut self) -> bool {
        let delivery = match (self.list_feed.as_mut(), self.message_feed.as_mut()) {
            (None, None) => return false,
            (Some(list), None) => list.next().await.map(|d| (true, d)),
            (None, Some(thread)) => thread.next().await.map(|d| (false, d)),
            (Some(list), Some(thread)) => tokio::select! {
                d = list.next() => d.map(|d| (true, d)),
                d = thread.next() => d.map(|d| (false, d)),
            },
        };
        match delivery {
            Some((true, Ok(snapshot))) => self.apply_list(&snapshot),
            Some((false, Ok(snapshot))) => self.messages = decode_documents(&snapshot.documents),
            Some((is_list, Err(e))) => {
                warn!("console feed error: {e}");
                if is_list {
                    self.list_state = ListState::Error(e.to_string());
                }
            }
            None => return false,
        }
        self.drain_updates();
        true
    }

    fn matches(&self, id: &str, conversation: &Conversation) -> bool {
        let passes_filter = match self.filter {
            StatusFilter::All => true,
            StatusFilter::Unanswered => self.unread_for(id) > 0,
            StatusFilter::Active => conversation.status == ConversationStatus::Active,
        };
        passes_filter
            && (self.search.is_empty()
                || conversation.owner_label.to_lowercase().contains(&self.search)
                || conversation.owner_id.as_str().to_lowercase().contains(&self.search))
    }

    pub fn view(&self, now: DateTime<Utc>) -> ConsoleView {
        let list = match &self.list_state {
            ListState::Loading => ListView::Loading,
            ListState::Error(e) => ListView::Error(e.clone()),
            ListState::Ready => {
                let rows: Vec<ConversationRow> = self
                    .conversations
                    .iter()
                    .filter(|(id, c)| self.matches(id, c))
                    .map(|(id, c)| {
                        let unread = self.unread_for(id);
                        ConversationRow {
                            id: id.clone(),
                            owner_label: c.owner_label.clone(),
                            owner_id_preview: c.owner_id.as_str().chars().take(OWNER_ID_PREVIEW).collect(),
                            last_message: relative_time(c.last_message_at, now),
                            status: c.status,
                            unread,
                            has_unread: unread > 0,
                            selected: self.selected.as_deref() == Some(id.as_str()),
                        }
                    })
                    .collect();
                if rows.is_empty() {
                    ListView::Empty(EMPTY_LIST_TEXT)
                } else {
                    ListView::Rows(rows)
                }
            }
        };

        let thread = self.selected.as_ref().map(|id| {
            let owner = self.conversations.iter().find(|(cid, _)| cid == id).map(|(_, c)| c);
            ThreadView {
                conversation_id: id.clone(),
                owner_label: owner.map(|c| c.owner_label.clone()).unwrap_or_default(),
                owner_id: owner.map(|c| c.owner_id.to_string()).unwrap_or_default(),
                messages: self
                    .messages
                    .iter()
                    .map(|(mid, m)| ThreadRow {
                        id: mid.clone(),
                        body: m.body.clone(),
                        from_admin: m.sender == SenderRole::Admin,
                        time: time_of_day(m.sent_at),
                        read: m.read,
                        long: m.is_long(),
                    })
                    .collect(),
            }
        });

        ConsoleView { list, thread }
    }
}
