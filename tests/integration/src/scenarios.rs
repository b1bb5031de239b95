//! Flows shared by the in-process and served-node test suites.

use valdore_common::backend::{Backend, Query};
use valdore_common::chat::{conversation_path, conversations, messages, Conversation, ConversationStatus};
use valdore_common::message::SenderRole;

use crate::harness::TestHarness;

pub const GREETING: &str = "Hola";
pub const REPLY: &str = "¡Hola! ¿En qué te ayudamos?";

/// A guest says hello, the admin answers, the guest's closed widget shows
/// the badge and opening it reads the reply.
pub async fn greeting_and_reply<B: Backend + Clone>(h: &mut TestHarness<B>) {
    h.guest.send(GREETING).await;
    let id = h
        .guest
        .widget
        .conversation_id()
        .map(str::to_string)
        .unwrap_or_else(|| panic!("sending should attach a conversation"));

    let stored: Conversation = h
        .guest
        .backend
        .get(&conversation_path(&id))
        .await
        .unwrap()
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(stored.status, ConversationStatus::Active);
    assert_eq!(stored.owner_id, h.guest.widget.actor().id);

    h.admin
        .wait_until("the new conversation", |c| {
            c.conversations().len() == 1 && c.unread_for(&id) == 1
        })
        .await;

    h.admin.console.select(&id).await.unwrap();
    h.admin
        .wait_until("the thread and cleared counter", |c| {
            c.messages().len() == 1 && c.unread_for(&id) == 0
        })
        .await;
    h.admin.console.send(REPLY).await.unwrap();
    h.admin
        .wait_until("the reply in the thread", |c| c.messages().len() == 2)
        .await;

    assert!(!h.guest.widget.is_open());
    h.guest
        .wait_until("the unread badge", |w| w.badge() == 1)
        .await;
    assert_eq!(h.guest.widget.view().badge, Some(1));

    h.guest.widget.open().await;
    assert_eq!(h.guest.widget.badge(), 0);
    h.guest
        .wait_until("the reply marked read", |w| {
            w.messages()
                .iter()
                .any(|(_, m)| m.sender == SenderRole::Admin && m.body == REPLY && m.read)
        })
        .await;

    let commits = h.node.store.commit_count();
    h.guest.widget.close();
    h.guest.widget.open().await;
    assert_eq!(h.node.store.commit_count(), commits, "second open must not write");

    let conversation: Conversation = h
        .guest
        .backend
        .get(&conversation_path(&id))
        .await
        .unwrap()
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(conversation.unread_by_customer, 0);
    assert_eq!(conversation.unread_by_admin, 0);
}

/// Sending twice from one visitor keeps one conversation.
pub async fn repeat_sends_reuse_conversation<B: Backend + Clone>(h: &mut TestHarness<B>) {
    h.guest.send("¿Tienen café molido?").await;
    let first = h.guest.widget.conversation_id().map(str::to_string);
    h.guest.send("Para prensa francesa").await;
    assert_eq!(h.guest.widget.conversation_id().map(str::to_string), first);

    let id = first.unwrap_or_else(|| panic!("no conversation attached"));
    let all = h.guest.backend.query(&Query::new(conversations())).await.unwrap();
    assert_eq!(all.len(), 1);
    let thread = h.guest.backend.query(&Query::new(messages(&id))).await.unwrap();
    assert_eq!(thread.len(), 2);
}
