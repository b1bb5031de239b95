use std::time::Duration;

use valdore_client::console::StatusFilter;
use valdore_client::widget::{WidgetState, WELCOME_TEXT};
use valdore_common::backend::{Backend, Query};
use valdore_common::chat::{conversations, ConversationStatus};
use valdore_common::identity::ActorKind;
use valdore_integration::harness::TestHarness;
use valdore_integration::scenarios;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn guest_greeting_is_answered() {
    let mut h = TestHarness::setup().await;
    scenarios::greeting_and_reply(&mut h).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeat_sends_reuse_conversation() {
    let mut h = TestHarness::setup().await;
    scenarios::repeat_sends_reuse_conversation(&mut h).await;
}

/// A reload finds the visitor's conversation again through the stored
/// guest id, and the next message lands in it.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_reattaches_existing_conversation() {
    let mut h = TestHarness::setup().await;
    let actor_before = h.guest.widget.actor().id.clone();
    h.guest.send("Hola").await;
    let id = h.guest.widget.conversation_id().map(str::to_string);

    h.guest.reload().await;
    assert_eq!(h.guest.widget.actor().id, actor_before);
    assert_eq!(h.guest.widget.conversation_id().map(str::to_string), id);
    assert_eq!(h.guest.widget.messages().len(), 1);
    assert_eq!(h.guest.widget.state(), WidgetState::Closed);

    h.guest.send("Sigo aquí").await;
    let all = h.guest.backend.query(&Query::new(conversations())).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cleared_storage_starts_a_new_identity() {
    let mut h = TestHarness::setup().await;
    let before = h.guest.widget.actor().id.clone();
    h.guest.send("Hola").await;

    h.guest.storage.clear();
    h.guest.reload().await;
    assert_ne!(h.guest.widget.actor().id, before);
    assert!(h.guest.widget.conversation_id().is_none());

    h.guest.widget.open().await;
    let view = h.guest.widget.view();
    assert_eq!(view.state, WidgetState::OpenEmpty);
    assert_eq!(view.welcome, Some(WELCOME_TEXT));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signed_in_customer_is_labelled_by_email() {
    let mut h = TestHarness::setup().await;
    assert_eq!(h.ana.widget.actor().kind, ActorKind::Account);
    h.ana.send("¿Cuándo llega mi pedido?").await;
    let id = h.ana.widget.conversation_id().map(str::to_string).unwrap();

    h.admin
        .wait_until("ana's conversation", |c| c.conversations().len() == 1)
        .await;
    let (_, conversation) = &h.admin.console.conversations()[0];
    assert_eq!(conversation.owner_label, "ana@cafe.co");
    assert_eq!(h.admin.row_ids(), vec![id]);
}

/// The list always shows the most recently active conversation first,
/// whichever side wrote last.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_list_follows_latest_activity() {
    let mut h = TestHarness::setup().await;
    let mut luis = h.new_guest("luis").await;

    h.guest.send("Primero").await;
    let first = h.guest.widget.conversation_id().map(str::to_string).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    luis.send("Segundo").await;
    let second = luis.widget.conversation_id().map(str::to_string).unwrap();

    h.admin
        .wait_until("both conversations", |c| c.conversations().len() == 2)
        .await;
    assert_eq!(h.admin.row_ids(), vec![second.clone(), first.clone()]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.admin.console.select(&first).await.unwrap();
    h.admin.console.send("Te respondo primero").await.unwrap();
    h.admin
        .wait_until("the replied thread on top", |c| {
            c.conversations().first().map(|(id, _)| id.as_str()) == Some(first.as_str())
        })
        .await;
    assert_eq!(h.admin.row_ids(), vec![first.clone(), second.clone()]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    luis.send("¿Hola?").await;
    h.admin
        .wait_until("luis back on top", |c| {
            c.conversations().first().map(|(id, _)| id.as_str()) == Some(second.as_str())
        })
        .await;
    assert_eq!(h.admin.row_ids(), vec![second, first]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_conversations_leave_the_active_filter() {
    let mut h = TestHarness::setup().await;
    h.guest.send("Gracias, ya está").await;
    let id = h.guest.widget.conversation_id().map(str::to_string).unwrap();
    h.admin
        .wait_until("the conversation", |c| c.conversations().len() == 1)
        .await;

    h.admin.console.set_status(&id, ConversationStatus::Closed).await.unwrap();
    h.admin
        .wait_until("the closed status", |c| {
            c.conversations()[0].1.status == ConversationStatus::Closed
        })
        .await;

    h.admin.console.set_filter(StatusFilter::Active);
    assert!(h.admin.row_ids().is_empty());
    h.admin.console.set_filter(StatusFilter::Unanswered);
    assert_eq!(h.admin.row_ids(), vec![id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recount_matches_denormalized_counters() {
    let mut h = TestHarness::setup().await;
    h.guest.send("Uno").await;
    h.guest.send("Dos").await;
    h.ana.send("Tres").await;
    let guest_conv = h.guest.widget.conversation_id().map(str::to_string).unwrap();
    let ana_conv = h.ana.widget.conversation_id().map(str::to_string).unwrap();

    h.admin
        .wait_until("both counters", |c| {
            c.unread_for(&guest_conv) == 2 && c.unread_for(&ana_conv) == 1
        })
        .await;
    h.admin.console.recount().await.unwrap();
    assert_eq!(h.admin.console.unread_for(&guest_conv), 2);
    assert_eq!(h.admin.console.unread_for(&ana_conv), 1);
}
