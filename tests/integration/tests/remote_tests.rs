//! The same flows as `chat_tests`, with every participant talking to a
//! served node over HTTP and WebSocket.

use valdore_client::cart::Cart;
use valdore_client::orders::{checkout, my_orders};
use valdore_common::backend::Backend;
use valdore_integration::harness::TestHarness;
use valdore_integration::scenarios;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn guest_greeting_is_answered_over_the_wire() {
    let mut h = TestHarness::setup_remote().await;
    scenarios::greeting_and_reply(&mut h).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeat_sends_reuse_conversation_over_the_wire() {
    let mut h = TestHarness::setup_remote().await;
    scenarios::repeat_sends_reuse_conversation(&mut h).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sessions_are_per_connection() {
    let h = TestHarness::setup_remote().await;
    assert_eq!(h.ana.backend.current_user().map(|u| u.email), Some("ana@cafe.co".into()));
    assert!(h.guest.backend.current_user().is_none());
    assert_eq!(h.node.auth.account_count(), 2);

    let mut cart = Cart::load(h.ana.storage.clone());
    cart.add("Café de Origen 500g", 32_000);
    checkout(&h.ana.backend, &mut cart, None).await.unwrap();
    assert_eq!(my_orders(&h.ana.backend).await.unwrap().len(), 1);

    h.ana.backend.sign_out().await.unwrap();
    assert!(my_orders(&h.ana.backend).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_feeds_detach_on_the_node() {
    let mut h = TestHarness::setup_remote().await;
    h.guest.send("Hola").await;
    let id = h.guest.widget.conversation_id().map(str::to_string).unwrap();
    h.admin.console.select(&id).await.unwrap();
    let attached = h.node.store.subscriber_count();
    assert!(attached >= 3);

    drop(h.admin);
    let deadline = tokio::time::Instant::now() + valdore_integration::TIMEOUT;
    while h.node.store.subscriber_count() > attached - 2 {
        assert!(tokio::time::Instant::now() < deadline, "node kept the admin feeds");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
