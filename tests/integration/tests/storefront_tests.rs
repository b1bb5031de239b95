use std::sync::Arc;

use valdore_client::auth::AdminGuard;
use valdore_client::cart::{Cart, EMPTY_CART_TEXT};
use valdore_client::contact::{submit, ContactForm};
use valdore_client::dashboard::AdminDashboard;
use valdore_client::orders::{checkout, my_orders};
use valdore_client::storage::{LocalStorage, MemoryStorage, SharedStorage, KEY_ADMIN_EMAIL, KEY_IS_ADMIN};
use valdore_client::{ClientError, ValidationError};
use valdore_common::backend::{Backend, Query};
use valdore_common::order::{orders, OrderStatus};
use valdore_integration::harness::TestHarness;

fn contact(email: &str) -> ContactForm {
    ContactForm {
        name: "Luis".into(),
        email: email.into(),
        phone: "3001234567".into(),
        subject: "Mayoreo".into(),
        message: "¿Venden por kilo?".into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cart_survives_reload_and_tracks_totals() {
    let h = TestHarness::setup().await;
    let storage: SharedStorage = h.ana.storage.clone();

    let mut cart = Cart::load(storage.clone());
    cart.add("Café de Origen 500g", 32_000);
    cart.add("Café de Origen 500g", 32_000);
    cart.add("Filtro de tela", 8_500);
    cart.change_quantity(1, 2);
    assert_eq!(cart.total(), 2 * 32_000 + 3 * 8_500);

    let mut reloaded = Cart::load(storage);
    assert_eq!(reloaded.total(), cart.total());
    assert_eq!(reloaded.item_count(), 5);
    reloaded.remove(0);
    reloaded.remove(0);
    let view = reloaded.view();
    assert_eq!(view.empty_message, Some(EMPTY_CART_TEXT));
    assert!(!view.checkout_visible);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checkout_requires_a_session() {
    let h = TestHarness::setup().await;
    let visitor = h.connect();
    let mut cart = Cart::load(h.guest.storage.clone());
    cart.add("Café de Origen 500g", 32_000);

    let err = checkout(&visitor, &mut cart, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthenticated));
    assert_eq!(cart.item_count(), 1);
    assert!(visitor.query(&Query::new(orders())).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn checkout_writes_one_pending_order() {
    let h = TestHarness::setup().await;
    let mut cart = Cart::load(h.ana.storage.clone());
    let err = checkout(&h.ana.backend, &mut cart, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::EmptyCart)));

    cart.add("Café de Origen 500g", 32_000);
    cart.add("Prensa francesa", 95_000);
    let id = checkout(&h.ana.backend, &mut cart, None).await.unwrap();
    assert!(cart.is_empty());
    assert!(Cart::load(h.ana.storage.clone()).is_empty());

    let history = my_orders(&h.ana.backend).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
    assert_eq!(history[0].order.status, OrderStatus::Pending);
    assert_eq!(history[0].order.total, 127_000);
    assert_eq!(history[0].formatted_total(), "$127.000");
    assert_eq!(history[0].status_label(), "Pendiente");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dashboard_counts_unique_customers() {
    let h = TestHarness::setup().await;
    for _ in 0..2 {
        let mut cart = Cart::load(h.ana.storage.clone());
        cart.add("Café de Origen 500g", 32_000);
        checkout(&h.ana.backend, &mut cart, None).await.unwrap();
    }
    submit(&h.guest.backend, &contact("luis@cafe.co")).await.unwrap();
    submit(&h.guest.backend, &contact("luis@cafe.co")).await.unwrap();

    let mut dashboard = AdminDashboard::load(h.admin.backend.clone()).await.unwrap();
    let stats = dashboard.stats();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.pending_orders, 2);
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.unread_messages, 2);
    assert_eq!(stats.unique_customers, 2);

    let (first, _) = dashboard.orders()[0].clone();
    dashboard.change_order_status(&first, OrderStatus::Completed).await.unwrap();
    let (message, _) = dashboard.contacts()[0].clone();
    dashboard.mark_contact_read(&message).await.unwrap();
    dashboard.refresh().await.unwrap();
    assert_eq!(dashboard.stats().pending_orders, 1);
    assert_eq!(dashboard.stats().unread_messages, 1);

    let history = my_orders(&h.ana.backend).await.unwrap();
    assert!(history.iter().any(|o| o.order.status == OrderStatus::Completed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn guard_admits_the_logged_in_admin_only() {
    let h = TestHarness::setup().await;
    let guard = AdminGuard::new(h.admin.storage.clone(), h.config.clone());
    let session = guard.check().unwrap();
    assert_eq!(session.email, valdore_integration::ADMIN_EMAIL);

    let forged = Arc::new(MemoryStorage::new());
    forged.set_item(KEY_IS_ADMIN, "true").unwrap();
    forged.set_item(KEY_ADMIN_EMAIL, "ana@cafe.co").unwrap();
    let guard = AdminGuard::new(forged.clone(), h.config.clone());
    assert!(guard.check().is_none());
    assert!(forged.get_item(KEY_IS_ADMIN).unwrap().is_none());
    assert!(forged.get_item(KEY_ADMIN_EMAIL).unwrap().is_none());
}
