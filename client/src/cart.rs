use tracing::warn;
use valdore_common::currency::format_amount;
use valdore_common::order::{Order, OrderLine};

use crate::storage::{SharedStorage, KEY_CART};

pub const EMPTY_CART_TEXT: &str = "Tu carrito está vacío";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub product: String,
    pub unit_price: String,
    pub quantity: u32,
    pub subtotal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub empty_message: Option<&'static str>,
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub item_count: u32,
    pub checkout_visible: bool,
}

/// Shopping cart mirrored to local storage after every change.
pub struct Cart {
    lines: Vec<OrderLine>,
    storage: SharedStorage,
}

impl Cart {
    /// Restore the stored cart. Unreadable or corrupt data gives an empty cart.
    pub fn load(storage: SharedStorage) -> Self {
        let lines = match storage.get_item(KEY_CART) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("discarding corrupt stored cart: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("cannot read stored cart: {e}");
                Vec::new()
            }
        };
        Self { lines, storage }
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit of `product`, merging with an existing line.
    pub fn add(&mut self, product: &str, unit_price: u64) {
        match self.lines.iter_mut().find(|l| l.product == product) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(OrderLine {
                product: product.to_string(),
                unit_price,
                quantity: 1,
            }),
        }
        self.save();
    }

    pub fn remove(&mut self, index: usize) -> Option<OrderLine> {
        if index >= self.lines.len() {
            return None;
        }
        let line = self.lines.remove(index);
        self.save();
        Some(line)
    }

    /// Adjust a line's quantity; the line goes away at zero or below.
    pub fn change_quantity(&mut self, index: usize, delta: i32) {
        let Some(line) = self.lines.get_mut(index) else {
            return;
        };
        let next = i64::from(line.quantity) + i64::from(delta);
        if next <= 0 {
            self.lines.remove(index);
        } else {
            line.quantity = u32::try_from(next).unwrap_or(u32::MAX);
        }
        self.save();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.save();
    }

    pub fn total(&self) -> u64 {
        Order::computed_total(&self.lines)
    }

    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).fold(0, u32::saturating_add)
    }

    fn save(&self) {
        let json = match serde_json::to_string(&self.lines) {
            Ok(json) => json,
            Err(e) => {
                warn!("cannot encode cart: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(KEY_CART, &json) {
            warn!("cannot persist cart: {e}");
        }
    }

    pub fn view(&self) -> CartView {
        CartView {
            empty_message: self.is_empty().then_some(EMPTY_CART_TEXT),
            lines: self
                .lines
                .iter()
                .map(|l| CartLineView {
                    product: l.product.clone(),
                    unit_price: format_amount(l.unit_price),
                    quantity: l.quantity,
                    subtotal: format_amount(l.subtotal()),
                })
                .collect(),
            total: format_amount(self.total()),
            item_count: self.item_count(),
            checkout_visible: !self.is_empty(),
        }
    }
}
