//! Valdore node: the document database and authentication service the
//! storefront talks to, runnable in-process or behind HTTP/WebSocket.

pub mod auth;
pub mod memory;
pub mod persist;
pub mod query;
pub mod server;
pub mod store;

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthService;
use crate::memory::MemoryBackend;
use crate::persist::NodeSnapshot;
use crate::store::DocumentStore;

pub struct Node {
    pub store: Arc<DocumentStore>,
    pub auth: AuthService,
    closing: watch::Sender<bool>,
}

impl Node {
    pub fn new() -> Arc<Self> {
        Self::from_snapshot(NodeSnapshot::default())
    }

    pub fn from_snapshot(snapshot: NodeSnapshot) -> Arc<Self> {
        let (closing, _) = watch::channel(false);
        Arc::new(Self {
            store: Arc::new(DocumentStore::from_state(snapshot.store)),
            auth: AuthService::from_accounts(snapshot.accounts),
            closing,
        })
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            store: self.store.export().await,
            accounts: self.auth.export(),
        }
    }

    /// Open an in-process client session (one per simulated browser).
    pub fn connect(self: &Arc<Self>) -> MemoryBackend {
        MemoryBackend::new(self.clone())
    }

    /// Signal long-lived connections to wind down.
    pub fn close(&self) {
        self.closing.send_replace(true);
    }

    pub fn closing(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }
}
