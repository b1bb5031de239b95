//! Back-office dashboard: orders, contact messages and headline numbers.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};
use valdore_common::backend::{Backend, Direction, DocumentId, Query, WriteOp};
use valdore_common::contact::{self, contact_messages, ContactMessage};
use valdore_common::currency::format_amount;
use valdore_common::order::{self, orders, Order, OrderId, OrderStatus};

use crate::conversations::decode_documents;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DashboardTab {
    #[default]
    Orders,
    Messages,
    Chat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_orders: usize,
    pub pending_orders: usize,
    pub total_messages: usize,
    pub unread_messages: usize,
    /// Distinct order uids plus contact emails.
    pub unique_customers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub id: OrderId,
    pub short_id: String,
    pub email: String,
    pub total: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRow {
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub tab: DashboardTab,
    pub stats: DashboardStats,
    pub orders: Vec<OrderRow>,
    pub messages: Vec<ContactRow>,
}

pub struct AdminDashboard<B> {
    backend: B,
    orders: Vec<(OrderId, Order)>,
    contacts: Vec<(DocumentId, ContactMessage)>,
    tab: DashboardTab,
    status_filter: Option<OrderStatus>,
    date_filter: Option<NaiveDate>,
}

impl<B: Backend> AdminDashboard<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            orders: Vec::new(),
            contacts: Vec::new(),
            tab: DashboardTab::default(),
            status_filter: None,
            date_filter: None,
        }
    }

    pub async fn load(backend: B) -> Result<Self, ClientError> {
        let mut dashboard = Self::new(backend);
        dashboard.refresh().await?;
        Ok(dashboard)
    }

    /// Reload orders and contact messages, newest first.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let order_docs = self
            .backend
            .query(&Query::new(orders()).order_by(order::FIELD_CREATED_AT, Direction::Descending))
            .await
            .inspect_err(|e| warn!("failed to load orders: {e}"))?;
        let contact_docs = self
            .backend
            .query(&Query::new(contact_messages()).order_by(contact::FIELD_CREATED_AT, Direction::Descending))
            .await
            .inspect_err(|e| warn!("failed to load contact messages: {e}"))?;

        self.orders = decode_documents(&order_docs);
        self.contacts = decode_documents(&contact_docs);
        debug!(orders = self.orders.len(), contacts = self.contacts.len(), "dashboard refreshed");
        Ok(())
    }

    pub fn tab(&self) -> DashboardTab {
        self.tab
    }

    pub fn set_tab(&mut self, tab: DashboardTab) {
        self.tab = tab;
    }

    /// `None` shows every status.
    pub fn set_status_filter(&mut self, status: Option<OrderStatus>) {
        self.status_filter = status;
    }

    /// Keep only orders created on this UTC calendar day.
    pub fn set_date_filter(&mut self, date: Option<NaiveDate>) {
        self.date_filter = date;
    }

    pub fn orders(&self) -> &[(OrderId, Order)] {
        &self.orders
    }

    pub fn contacts(&self) -> &[(DocumentId, ContactMessage)] {
        &self.contacts
    }

    pub fn filtered_orders(&self) -> Vec<&(OrderId, Order)> {
        self.orders
            .iter()
            .filter(|(_, o)| self.status_filter.is_none_or(|s| o.status == s))
            .filter(|(_, o)| self.date_filter.is_none_or(|d| o.created_at.date_naive() == d))
            .collect()
    }

    pub async fn change_order_status(&mut self, id: &str, status: OrderStatus) -> Result<(), ClientError> {
        let now = Utc::now();
        self.backend
            .commit(vec![WriteOp::update(orders().doc(id))
                .set(order::FIELD_STATUS, status.as_str())
                .set(order::FIELD_UPDATED_AT, now.timestamp_millis())])
            .await?;
        if let Some((_, order)) = self.orders.iter_mut().find(|(oid, _)| oid == id) {
            order.status = status;
            order.updated_at = Some(now);
        }
        Ok(())
    }

    pub async fn mark_contact_read(&mut self, id: &str) -> Result<(), ClientError> {
        let now = Utc::now();
        self.backend
            .commit(vec![WriteOp::update(contact_messages().doc(id))
                .set(contact::FIELD_READ, true)
                .set(contact::FIELD_READ_AT, now.timestamp_millis())])
            .await?;
        if let Some((_, msg)) = self.contacts.iter_mut().find(|(cid, _)| cid == id) {
            msg.read = true;
            msg.read_at = Some(now);
        }
        Ok(())
    }

    pub async fn mark_contact_unread(&mut self, id: &str) -> Result<(), ClientError> {
        self.backend
            .commit(vec![
                WriteOp::update(contact_messages().doc(id)).set(contact::FIELD_READ, false)
            ])
            .await?;
        if let Some((_, msg)) = self.contacts.iter_mut().find(|(cid, _)| cid == id) {
            msg.read = false;
        }
        Ok(())
    }

    pub fn stats(&self) -> DashboardStats {
        let mut customers: HashSet<&str> = self.orders.iter().map(|(_, o)| o.uid.as_str()).collect();
        customers.extend(self.contacts.iter().map(|(_, c)| c.email.as_str()));
        DashboardStats {
            total_orders: self.orders.len(),
            pending_orders: self
                .orders
                .iter()
                .filter(|(_, o)| o.status == OrderStatus::Pending)
                .count(),
            total_messages: self.contacts.len(),
            unread_messages: self.contacts.iter().filter(|(_, c)| !c.read).count(),
            unique_customers: customers.len(),
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            tab: self.tab,
            stats: self.stats(),
            orders: self
                .filtered_orders()
                .into_iter()
                .map(|(id, o)| OrderRow {
                    id: id.clone(),
                    short_id: Order::short_id(id).to_string(),
                    email: o.email.clone(),
                    total: format_amount(o.total),
                    status: o.status,
                    status_label: o.status.label(),
                    created: o.created_at.format("%d/%m/%Y %H:%M").to_string(),
                })
                .collect(),
            messages: self
                .contacts
                .iter()
                .map(|(id, c)| ContactRow {
                    id: id.clone(),
                    name: c.name.clone(),
                    email: c.email.clone(),
                    subject: c.subject.clone(),
                    read: c.read,
                })
                .collect(),
        }
    }
}
