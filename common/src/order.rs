use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{CollectionPath, DocumentId};

pub const ORDERS: &str = "orders";

pub const FIELD_UID: &str = "uid";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

/// Characters of the document id shown as the order number.
const SHORT_ID_LEN: usize = 8;

pub type OrderId = DocumentId;

pub fn orders() -> CollectionPath {
    CollectionPath::root(ORDERS)
}

/// Fulfilment status set by staff. Orders without a stored status are pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl OrderStatus {
    pub fn all() -> &'static [OrderStatus] {
        &[
            OrderStatus::Pending,
            OrderStatus::InProgress,
            OrderStatus::Completed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pendiente",
            OrderStatus::InProgress => "En Proceso",
            OrderStatus::Completed => "Completado",
        }
    }
}

/// One product line: also the shape of a cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: String,
    /// Whole pesos.
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderLine {
    /// Saturates at `u64::MAX`.
    pub fn subtotal(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

/// Delivery details collected by the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub uid: String,
    pub email: String,
    pub items: Vec<OrderLine>,
    pub total: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
}

impl Order {
    pub fn computed_total(items: &[OrderLine]) -> u64 {
        items
            .iter()
            .map(OrderLine::subtotal)
            .fold(0, u64::saturating_add)
    }

    /// Leading characters of an order id, used as the visible order number.
    pub fn short_id(id: &str) -> &str {
        match id.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &id[..end],
            None => id,
        }
    }
}
