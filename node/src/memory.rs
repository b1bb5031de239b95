use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;
use valdore_common::backend::{Backend, Document, DocumentPath, Query, Subscription, WriteOp};
use valdore_common::error::{AuthError, BackendError};
use valdore_common::identity::AuthUser;

use crate::Node;

struct Session {
    token: Mutex<Option<String>>,
    user: watch::Sender<Option<AuthUser>>,
}

/// In-process [`Backend`] bound to one client session. Clones share the
/// session; [`Node::connect`] opens a new one.
#[derive(Clone)]
pub struct MemoryBackend {
    node: Arc<Node>,
    session: Arc<Session>,
}

impl MemoryBackend {
    pub fn new(node: Arc<Node>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            node,
            session: Arc::new(Session {
                token: Mutex::new(None),
                user,
            }),
        }
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Number of batches the shared store has committed.
    pub fn commit_count(&self) -> u64 {
        self.node.store.commit_count()
    }

    fn start_session(&self, token: String, user: AuthUser) -> AuthUser {
        if let Ok(mut slot) = self.session.token.lock() {
            if let Some(old) = slot.replace(token) {
                self.node.auth.sign_out(&old);
            }
        }
        self.session.user.send_replace(Some(user.clone()));
        user
    }
}

impl Backend for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let (token, user) = self.node.auth.sign_up(email, password, display_name)?;
        Ok(self.start_session(token, user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let (token, user) = self.node.auth.sign_in(email, password)?;
        Ok(self.start_session(token, user))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self
            .session
            .token
            .lock()
            .map_err(|_| BackendError::Transport("session lock poisoned".into()))?
            .take();
        if let Some(token) = token {
            self.node.auth.sign_out(&token);
            debug!("memory session signed out");
        }
        self.session.user.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.user.borrow().clone()
    }

    fn auth_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.user.subscribe()
    }

    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, BackendError> {
        self.node.store.get(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        self.node.store.query(query).await
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), BackendError> {
        self.node.store.commit(writes).await.map(|_| ())
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription, BackendError> {
        self.node.store.subscribe(query).await
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
