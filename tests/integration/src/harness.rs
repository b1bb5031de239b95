use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use valdore_client::auth::admin_login;
use valdore_client::config::ClientConfig;
use valdore_client::console::{AdminChatConsole, ListView};
use valdore_client::identity::resolve_actor;
use valdore_client::remote::RemoteBackend;
use valdore_client::storage::{MemoryStorage, SharedStorage};
use valdore_client::widget::ChatWidget;
use valdore_common::backend::Backend;
use valdore_common::identity::DEFAULT_GUEST_LABEL;
use valdore_node::memory::MemoryBackend;
use valdore_node::Node;

use crate::{connect_memory, connect_remote, init_tracing, serve, ADMIN_EMAIL, PASSWORD, TIMEOUT};

/// A storefront visitor with their own session, storage and chat widget.
pub struct Customer<B> {
    pub name: String,
    pub backend: B,
    pub storage: Arc<MemoryStorage>,
    pub widget: ChatWidget<B>,
}

impl<B: Backend + Clone> Customer<B> {
    /// Resolve the visitor's identity and load the widget, as on page load.
    pub async fn arrive(name: &str, backend: B, storage: Arc<MemoryStorage>) -> Self {
        let actor = resolve_actor(&backend, storage.as_ref(), DEFAULT_GUEST_LABEL);
        let widget = ChatWidget::load(backend.clone(), actor).await;
        Self {
            name: name.to_string(),
            backend,
            storage,
            widget,
        }
    }

    /// Reload the page with the same storage and session.
    pub async fn reload(&mut self) {
        let actor = resolve_actor(&self.backend, self.storage.as_ref(), DEFAULT_GUEST_LABEL);
        self.widget = ChatWidget::load(self.backend.clone(), actor).await;
    }

    pub async fn send(&mut self, text: &str) {
        self.widget
            .send(text)
            .await
            .unwrap_or_else(|e| panic!("{} failed to send {text:?}: {e}", self.name));
    }

    /// Apply live updates until `check` holds.
    pub async fn wait_until(&mut self, what: &str, check: impl Fn(&ChatWidget<B>) -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !check(&self.widget) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.widget.next_update()).await {
                Ok(true) => {}
                Ok(false) => panic!("{}: feed closed while waiting for {what}", self.name),
                Err(_) => panic!("{}: timed out waiting for {what}", self.name),
            }
        }
    }
}

/// A signed-in back-office user with the chat console open.
pub struct Admin<B> {
    pub backend: B,
    pub storage: SharedStorage,
    pub console: AdminChatConsole<B>,
}

impl<B: Backend + Clone> Admin<B> {
    pub async fn login(backend: B, config: &ClientConfig) -> Self {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        admin_login(&backend, &storage, config, ADMIN_EMAIL, PASSWORD)
            .await
            .unwrap_or_else(|e| panic!("admin login failed: {e}"));
        let console = AdminChatConsole::load(backend.clone()).await;
        Self {
            backend,
            storage,
            console,
        }
    }

    /// Ids of the rows the console currently shows, top to bottom.
    pub fn row_ids(&self) -> Vec<String> {
        match self.console.view(Utc::now()).list {
            ListView::Rows(rows) => rows.into_iter().map(|r| r.id).collect(),
            _ => Vec::new(),
        }
    }

    pub async fn wait_until(&mut self, what: &str, check: impl Fn(&AdminChatConsole<B>) -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !check(&self.console) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.console.next_update()).await {
                Ok(true) => {}
                Ok(false) => panic!("admin: feeds closed while waiting for {what}"),
                Err(_) => panic!("admin: timed out waiting for {what}"),
            }
        }
    }
}

/// One node plus the usual cast:
/// - `guest`: an anonymous visitor,
/// - `ana`: a registered customer, signed in,
/// - `admin`: the back office.
pub struct TestHarness<B> {
    pub node: Arc<Node>,
    pub config: ClientConfig,
    pub guest: Customer<B>,
    pub ana: Customer<B>,
    pub admin: Admin<B>,
    connect: Box<dyn Fn() -> B + Send + Sync>,
}

impl TestHarness<MemoryBackend> {
    /// Participants talk to the node in-process.
    pub async fn setup() -> Self {
        let node = Node::new();
        let connector = node.clone();
        Self::setup_with(node, move || connect_memory(&connector)).await
    }
}

impl TestHarness<RemoteBackend> {
    /// Participants talk to a served node over HTTP and WebSocket.
    pub async fn setup_remote() -> Self {
        let node = Node::new();
        let base_url = serve(&node).await;
        Self::setup_with(node, move || connect_remote(&base_url)).await
    }
}

impl<B: Backend + Clone> TestHarness<B> {
    async fn setup_with(node: Arc<Node>, connect: impl Fn() -> B + Send + Sync + 'static) -> Self {
        init_tracing();
        let config = ClientConfig::default();

        let admin_backend = connect();
        admin_backend
            .sign_up(ADMIN_EMAIL, PASSWORD, Some("Administración"))
            .await
            .unwrap_or_else(|e| panic!("admin sign-up failed: {e}"));
        admin_backend
            .sign_out()
            .await
            .unwrap_or_else(|e| panic!("admin sign-out failed: {e}"));
        let admin = Admin::login(admin_backend, &config).await;

        let ana_backend = connect();
        ana_backend
            .sign_up("ana@cafe.co", PASSWORD, Some("Ana"))
            .await
            .unwrap_or_else(|e| panic!("ana sign-up failed: {e}"));
        let ana = Customer::arrive("ana", ana_backend, Arc::new(MemoryStorage::new())).await;

        let guest = Customer::arrive("guest", connect(), Arc::new(MemoryStorage::new())).await;

        Self {
            node,
            config,
            guest,
            ana,
            admin,
            connect: Box::new(connect),
        }
    }

    /// Another anonymous visitor with empty storage.
    pub async fn new_guest(&self, name: &str) -> Customer<B> {
        Customer::arrive(name, (self.connect)(), Arc::new(MemoryStorage::new())).await
    }

    /// A fresh, signed-out session on the same node.
    pub fn connect(&self) -> B {
        (self.connect)()
    }
}
