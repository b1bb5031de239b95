//! Customer chat bubble.

use tracing::{debug, warn};
use valdore_common::backend::{Backend, Snapshot, Subscription};
use valdore_common::chat::ConversationId;
use valdore_common::identity::Actor;
use valdore_common::message::{Message, MessageId, SenderRole};

use crate::conversations::{decode_documents, ConversationStore};
use crate::error::ClientError;
use crate::format::time_of_day;

pub const WELCOME_TEXT: &str = "¡Hola! ¿En qué podemos ayudarte?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    /// Open with no conversation yet; the welcome text is shown.
    OpenEmpty,
    /// Open on an attached conversation.
    OpenActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: MessageId,
    pub body: String,
    pub from_admin: bool,
    pub time: String,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub state: WidgetState,
    /// Hidden when zero.
    pub badge: Option<usize>,
    pub welcome: Option<&'static str>,
    pub messages: Vec<MessageRow>,
}

/// One visitor's chat widget. Open/closed is tracked apart from the
/// conversation feed, so a closed widget keeps its feed and a live badge.
pub struct ChatWidget<B> {
    store: ConversationStore<B>,
    actor: Actor,
    open: bool,
    conversation: Option<ConversationId>,
    feed: Option<Subscription>,
    messages: Vec<(MessageId, Message)>,
    badge: usize,
}

impl<B: Backend> ChatWidget<B> {
    pub fn new(backend: B, actor: Actor) -> Self {
        Self {
            store: ConversationStore::new(backend),
            actor,
            open: false,
            conversation: None,
            feed: None,
            messages: Vec::new(),
            badge: 0,
        }
    }

    /// Build a closed widget and attach the actor's existing conversation,
    /// if any, so the badge is live from page load. Lookup failures are
    /// logged and leave the widget without a conversation.
    pub async fn load(backend: B, actor: Actor) -> Self {
        debug!(backend = backend.backend_name(), actor = %actor.id, "loading chat widget");
        let mut widget = Self::new(backend, actor);
        match widget.store.find_for_actor(&widget.actor.id).await {
            Ok(Some((id, _))) => {
                if let Err(e) = widget.attach(id).await {
                    warn!("failed to attach conversation feed: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("failed to look up conversation: {e}"),
        }
        widget.drain_updates();
        widget
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn state(&self) -> WidgetState {
        match (self.open, &self.conversation) {
            (false, _) => WidgetState::Closed,
            (true, None) => WidgetState::OpenEmpty,
            (true, Some(_)) => WidgetState::OpenActive,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn badge(&self) -> usize {
        self.badge
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_deref()
    }

    pub fn messages(&self) -> &[(MessageId, Message)] {
        &self.messages
    }

    /// Open the widget and mark admin replies read. Marking is best effort.
    pub async fn open(&mut self) {
        self.open = true;
        self.badge = 0;
        if let Some(id) = &self.conversation {
            if let Err(e) = self.store.mark_read(id, SenderRole::Admin).await {
                warn!(conversation = %id, "failed to mark replies read: {e}");
            }
        }
        self.drain_updates();
    }

    pub fn close(&mut self) {
        self.open = false;
        self.recompute_badge();
    }

    pub async fn toggle(&mut self) {
        if self.open {
            self.close();
        } else {
            self.open().await;
        }
    }

    /// Send a customer message, creating the conversation on first use.
    /// Blank text is ignored without touching the backend.
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(());
        }

        match self.conversation.clone() {
            Some(id) => {
                self.store.append(&id, SenderRole::Customer, body).await?;
            }
            None => {
                let id = match self.store.find_for_actor(&self.actor.id).await? {
                    Some((id, _)) => {
                        self.store.append(&id, SenderRole::Customer, body).await?;
                        id
                    }
                    None => self.store.start_conversation(&self.actor, body).await?,
                };
                self.attach(id).await?;
            }
        }
        self.drain_updates();
        Ok(())
    }

    /// Switch to `id`. Nothing changes unless its feed could be opened.
    async fn attach(&mut self, id: ConversationId) -> Result<(), ClientError> {
        let feed = self.store.subscribe_messages(&id).await?;
        debug!(conversation = %id, "widget attached");
        self.messages.clear();
        self.feed = Some(feed);
        self.conversation = Some(id);
        Ok(())
    }

    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.messages = decode_documents(&snapshot.documents);
        self.recompute_badge();
    }

    fn recompute_badge(&mut self) {
        self.badge = if self.open {
            0
        } else {
            self.messages
                .iter()
                .filter(|(_, m)| m.sender == SenderRole::Admin && !m.read)
                .count()
        };
    }

    /// Apply every snapshot already delivered. Returns how many were applied.
    pub fn drain_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Some(delivery) = self.feed.as_mut().and_then(Subscription::try_next) {
            match delivery {
                Ok(snapshot) => {
                    self.apply_snapshot(&snapshot);
                    applied += 1;
                }
                Err(e) => warn!("conversation feed error: {e}"),
            }
        }
        applied
    }

    /// Wait for the next delivery. Returns false once there is no feed.
    pub async fn next_update(&mut self) -> bool {
        let Some(feed) = self.feed.as_mut() else {
            return false;
        };
        match feed.next().await {
            Some(Ok(snapshot)) => {
                self.apply_snapshot(&snapshot);
                true
            }
            Some(Err(e)) => {
                warn!("conversation feed error: {e}");
                true
            }
            None => {
                self.feed = None;
                false
            }
        }
    }

    pub fn view(&self) -> WidgetView {
        let state = self.state();
        WidgetView {
            state,
            badge: (self.badge > 0).then_some(self.badge),
            welcome: (state != WidgetState::Closed && self.messages.is_empty()).then_some(WELCOME_TEXT),
            messages: self
                .messages
                .iter()
                .map(|(id, m)| MessageRow {
                    id: id.clone(),
                    body: m.body.clone(),
                    from_admin: m.sender == SenderRole::Admin,
                    time: time_of_day(m.sent_at),
                    read: m.read,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valdore_common::identity::DEFAULT_GUEST_LABEL;
    use valdore_node::memory::MemoryBackend;
    use valdore_node::Node;

    fn guest() -> Actor {
        Actor::guest("guest_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into(), DEFAULT_GUEST_LABEL, true)
    }

    async fn widget() -> (ChatWidget<MemoryBackend>, MemoryBackend) {
        let node = Node::new();
        let admin = node.connect();
        (ChatWidget::load(node.connect(), guest()).await, admin)
    }

    #[tokio::test]
    async fn failed_attach_leaves_no_conversation() {
        let (mut w, _) = widget().await;
        assert!(w.attach("a/b".into()).await.is_err());
        assert!(w.conversation_id().is_none());

        w.send("Hola").await.unwrap();
        assert!(w.conversation_id().is_some_and(|id| id != "a/b"));
    }

    #[tokio::test]
    async fn opens_empty_then_active_after_first_send() {
        let (mut w, _) = widget().await;
        assert_eq!(w.state(), WidgetState::Closed);

        w.open().await;
        assert_eq!(w.state(), WidgetState::OpenEmpty);
        assert_eq!(w.view().welcome, Some(WELCOME_TEXT));

        w.send("Hola").await.unwrap();
        assert_eq!(w.state(), WidgetState::OpenActive);
        let view = w.view();
        assert!(view.welcome.is_none());
        assert_eq!(view.messages.len(), 1);
        assert!(!view.messages[0].from_admin);
    }

    #[tokio::test]
    async fn blank_messages_are_ignored() {
        let (mut w, admin) = widget().await;
        w.open().await;
        w.send("   \n").await.unwrap();
        assert_eq!(admin.commit_count(), 0);
        assert!(w.conversation_id().is_none());
    }

    #[tokio::test]
    async fn second_send_reuses_conversation() {
        let (mut w, admin) = widget().await;
        w.open().await;
        w.send("Hola").await.unwrap();
        let first = w.conversation_id().map(str::to_string);
        w.send("¿Siguen abiertos?").await.unwrap();
        assert_eq!(w.conversation_id().map(str::to_string), first);
        assert_eq!(w.messages().len(), 2);
        assert_eq!(admin.commit_count(), 2);
    }

    #[tokio::test]
    async fn badge_counts_admin_replies_only_while_closed() {
        let (mut w, admin) = widget().await;
        w.open().await;
        w.send("Hola").await.unwrap();
        w.close();

        let store = ConversationStore::new(admin.clone());
        let id = w.conversation_id().unwrap().to_string();
        store.append(&id, SenderRole::Admin, "Buenas").await.unwrap();
        w.drain_updates();
        assert_eq!(w.badge(), 1);
        assert_eq!(w.view().badge, Some(1));

        w.open().await;
        assert_eq!(w.badge(), 0);
        assert!(w.messages().iter().all(|(_, m)| m.read || m.sender == SenderRole::Customer));
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let (mut w, admin) = widget().await;
        w.open().await;
        w.send("Hola").await.unwrap();
        w.close();
        let id = w.conversation_id().unwrap().to_string();
        ConversationStore::new(admin.clone())
            .append(&id, SenderRole::Admin, "Buenas")
            .await
            .unwrap();

        w.toggle().await;
        let commits = admin.commit_count();
        w.toggle().await;
        w.toggle().await;
        assert!(w.is_open());
        assert_eq!(admin.commit_count(), commits);
    }

    #[tokio::test]
    async fn load_attaches_existing_conversation_while_closed() {
        let node = Node::new();
        let mut first = ChatWidget::load(node.connect(), guest()).await;
        first.open().await;
        first.send("Hola").await.unwrap();
        let id = first.conversation_id().unwrap().to_string();
        drop(first);

        let reloaded = ChatWidget::load(node.connect(), guest()).await;
        assert_eq!(reloaded.state(), WidgetState::Closed);
        assert_eq!(reloaded.conversation_id(), Some(id.as_str()));
        assert_eq!(reloaded.messages().len(), 1);
        assert_eq!(node.store.subscriber_count(), 1);
    }
}
