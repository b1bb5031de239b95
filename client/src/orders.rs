//! Checkout and the signed-in customer's order history.

use chrono::Utc;
use tracing::info;
use valdore_common::backend::{new_document_id, Backend, Query, WriteOp};
use valdore_common::currency::format_amount;
use valdore_common::order::{orders, CustomerDetails, Order, OrderId, OrderStatus, FIELD_UID};

use crate::cart::Cart;
use crate::conversations::decode_documents;
use crate::error::{ClientError, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub short_id: String,
    pub order: Order,
}

impl OrderSummary {
    pub fn new(id: OrderId, order: Order) -> Self {
        Self {
            short_id: Order::short_id(&id).to_string(),
            id,
            order,
        }
    }

    pub fn status_label(&self) -> &'static str {
        self.order.status.label()
    }

    pub fn formatted_total(&self) -> String {
        format_amount(self.order.total)
    }
}

/// Place an order for the cart's contents and empty the cart.
pub async fn checkout<B: Backend>(
    backend: &B,
    cart: &mut Cart,
    customer: Option<CustomerDetails>,
) -> Result<OrderId, ClientError> {
    let user = backend.current_user().ok_or(ClientError::Unauthenticated)?;
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }

    let items = cart.lines().to_vec();
    let order = Order {
        uid: user.uid.clone(),
        email: user.email.clone(),
        total: Order::computed_total(&items),
        items,
        created_at: Utc::now(),
        status: OrderStatus::Pending,
        updated_at: None,
        customer,
    };

    let id = new_document_id();
    backend
        .commit(vec![WriteOp::create(orders().doc(id.clone()), &order)?])
        .await?;
    cart.clear();
    info!(order = Order::short_id(&id), total = order.total, "order placed");
    Ok(id)
}

/// The signed-in customer's orders, newest first. Sorted here so the store
/// needs no composite index.
pub async fn my_orders<B: Backend>(backend: &B) -> Result<Vec<OrderSummary>, ClientError> {
    let user = backend.current_user().ok_or(ClientError::Unauthenticated)?;
    let docs = backend
        .query(&Query::new(orders()).where_eq(FIELD_UID, user.uid.as_str()))
        .await?;
    let mut summaries: Vec<OrderSummary> = decode_documents::<Order>(&docs)
        .into_iter()
        .map(|(id, order)| OrderSummary::new(id, order))
        .collect();
    summaries.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
    Ok(summaries)
}
