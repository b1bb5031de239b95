//! [`Backend`] over a `valdore-node` server: JSON over HTTP for auth and
//! document calls, one WebSocket per live query.

use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use valdore_common::backend::{Backend, Document, DocumentPath, Query, Subscription, WriteOp};
use valdore_common::error::{AuthError, BackendError};
use valdore_common::identity::AuthUser;
use valdore_common::protocol::{
    CommitRequest, CommitResponse, ErrorBody, ErrorKind, GetRequest, GetResponse, QueryRequest,
    QueryResponse, SessionResponse, SignInRequest, SignUpRequest, SubscriptionEvent,
};

use crate::config::ClientConfig;

struct Session {
    token: Mutex<Option<String>>,
    user: watch::Sender<Option<AuthUser>>,
}

/// Clones share one session, like tabs of one browser.
#[derive(Clone)]
pub struct RemoteBackend {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

fn transport(message: impl ToString) -> ErrorBody {
    ErrorBody {
        kind: ErrorKind::Transport,
        message: message.to_string(),
        auth: None,
    }
}

impl RemoteBackend {
    pub fn new(base_url: &str) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(Session {
                token: Mutex::new(None),
                user,
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.node_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn subscribe_url(&self) -> String {
        let ws_base = match self.base_url.split_once("://") {
            Some(("https", rest)) => format!("wss://{rest}"),
            Some((_, rest)) => format!("ws://{rest}"),
            None => format!("ws://{}", self.base_url),
        };
        format!("{ws_base}/subscribe")
    }

    fn token(&self) -> Option<String> {
        self.session.token.lock().ok().and_then(|t| t.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode either the success body or the node's
    /// error payload.
    async fn call<Resp: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Resp, ErrorBody> {
        let response = self.authorized(request).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return response.json::<Resp>().await.map_err(transport);
        }
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(body),
            Err(_) => Err(transport(format!("node answered {status}"))),
        }
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(&self, path: &str, body: &Req) -> Result<Resp, ErrorBody> {
        self.call(self.http.post(self.url(path)).json(body)).await
    }

    /// Adopt a new session token. A token it replaces is signed out on the
    /// node so it does not linger there.
    async fn start_session(&self, session: SessionResponse) -> AuthUser {
        let previous = match self.session.token.lock() {
            Ok(mut token) => token.replace(session.token),
            Err(_) => None,
        };
        if let Some(previous) = previous {
            self.release(&previous).await;
        }
        self.session.user.send_replace(Some(session.user.clone()));
        session.user
    }

    /// Best-effort `POST /auth/sign-out` for `token`.
    async fn release(&self, token: &str) {
        let request = self.http.post(self.url("/auth/sign-out")).bearer_auth(token);
        match request.send().await {
            Ok(resp) if !resp.status().is_success() => {
                debug!(status = %resp.status(), "node did not know this session");
            }
            Ok(_) => {}
            Err(e) => warn!("sign-out request failed: {e}"),
        }
    }

    /// Ask the node whether the stored token still names an account.
    pub async fn refresh_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let me: valdore_common::protocol::MeResponse = self
            .call(self.http.get(self.url("/auth/me")))
            .await
            .map_err(ErrorBody::into_backend_error)?;
        self.session.user.send_replace(me.user.clone());
        Ok(me.user)
    }

    pub async fn health(&self) -> Result<valdore_common::protocol::HealthResponse, BackendError> {
        self.call(self.http.get(self.url("/health")))
            .await
            .map_err(ErrorBody::into_backend_error)
    }
}

impl Backend for RemoteBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthUser, AuthError> {
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let session: SessionResponse = self
            .post("/auth/sign-up", &request)
            .await
            .map_err(ErrorBody::into_auth_error)?;
        Ok(self.start_session(session).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let request = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: SessionResponse = self
            .post("/auth/sign-in", &request)
            .await
            .map_err(ErrorBody::into_auth_error)?;
        Ok(self.start_session(session).await)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = match self.session.token.lock() {
            Ok(mut token) => token.take(),
            Err(_) => None,
        };
        if let Some(token) = token {
            self.release(&token).await;
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
        let response: GetResponse = self
            .post("/documents/get", &GetRequest { path: path.clone() })
            .await
            .map_err(ErrorBody::into_backend_error)?;
        Ok(response.document)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, BackendError> {
        let response: QueryResponse = self
            .post("/documents/query", &QueryRequest { query: query.clone() })
            .await
            .map_err(ErrorBody::into_backend_error)?;
        Ok(response.documents)
    }

    async fn commit(&self, writes: Vec<WriteOp>) -> Result<(), BackendError> {
        let _: CommitResponse = self
            .post("/documents/commit", &CommitRequest { writes })
            .await
            .map_err(ErrorBody::into_backend_error)?;
        Ok(())
    }

    /// Opens a socket, sends the query and waits for the first event, so a
    /// rejected query fails here rather than on the feed.
    async fn subscribe(&self, query: Query) -> Result<Subscription, BackendError> {
        let url = self.subscribe_url();
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| BackendError::Transport(format!("connect {url}: {e}")))?;
        let (mut sink, mut stream) = socket.split();

        sink.send(WsMessage::text(serde_json::to_string(&query)?))
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let first = loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => break decode_event(text.as_str())?,
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(BackendError::Transport("subscription closed by node".into()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BackendError::Transport(e.to_string())),
            }
        };
        let first = first?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(first));

        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = stream.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let delivery = decode_event(text.as_str()).unwrap_or_else(Err);
                            if tx.send(delivery).is_err() {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = tx.send(Err(BackendError::Transport(e.to_string())));
                            break;
                        }
                    },
                    _ = tx.closed() => break,
                }
            }
            let _ = sink.send(WsMessage::Close(None)).await;
            debug!("remote subscription closed");
        });

        Ok(Subscription::new(rx, move || pump.abort()))
    }

    fn backend_name(&self) -> &str {
        "remote"
    }
}

/// Outer error: the frame itself is unreadable. Inner: the node reported one.
fn decode_event(text: &str) -> Result<Result<valdore_common::backend::Snapshot, BackendError>, BackendError> {
    match serde_json::from_str::<SubscriptionEvent>(text)? {
        SubscriptionEvent::Snapshot { snapshot } => Ok(Ok(snapshot)),
        SubscriptionEvent::Error { error } => Ok(Err(error.into_backend_error())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_follows_http_scheme() {
        assert_eq!(
            RemoteBackend::new("http://127.0.0.1:3020/").subscribe_url(),
            "ws://127.0.0.1:3020/subscribe"
        );
        assert_eq!(
            RemoteBackend::new("https://tienda.valdore.com").subscribe_url(),
            "wss://tienda.valdore.com/subscribe"
        );
    }

    #[test]
    fn node_errors_decode_from_events() {
        let event = SubscriptionEvent::Error {
            error: ErrorBody::from(&BackendError::InvalidPath("a/b".into())),
        };
        let text = serde_json::to_string(&event).unwrap();
        let inner = decode_event(&text).unwrap();
        assert!(matches!(inner, Err(BackendError::InvalidPath(p)) if p == "a/b"));
        assert!(decode_event("not json").is_err());
    }

    async fn served() -> (std::sync::Arc<valdore_node::Node>, RemoteBackend) {
        let node = valdore_node::Node::new();
        let (addr, _) = valdore_node::server::spawn(node.clone(), "127.0.0.1:0").await.unwrap();
        (node, RemoteBackend::new(&format!("http://{addr}")))
    }

    #[tokio::test]
    async fn session_follows_sign_in_and_out() {
        let (node, backend) = served().await;
        let user = backend.sign_up("ana@cafe.co", "secreto1", Some("Ana")).await.unwrap();
        assert_eq!(backend.current_user(), Some(user.clone()));
        assert_eq!(backend.refresh_user().await.unwrap(), Some(user));

        backend.sign_out().await.unwrap();
        assert!(backend.current_user().is_none());
        let err = backend.sign_in("ana@cafe.co", "otra").await.unwrap_err();
        assert_eq!(err, AuthError::WrongPassword);
        assert_eq!(node.auth.account_count(), 1);
    }

    #[tokio::test]
    async fn signing_in_again_releases_the_old_token() {
        let (node, backend) = served().await;
        backend.sign_up("ana@cafe.co", "secreto1", None).await.unwrap();
        backend.sign_in("ana@cafe.co", "secreto1").await.unwrap();
        backend.sign_in("ana@cafe.co", "secreto1").await.unwrap();
        assert_eq!(node.auth.session_count(), 1);

        backend.sign_out().await.unwrap();
        assert_eq!(node.auth.session_count(), 0);
    }

    #[tokio::test]
    async fn live_query_streams_commits() {
        let (_node, backend) = served().await;
        let query = Query::new(valdore_common::contact::contact_messages());
        let mut feed = backend.subscribe(query).await.unwrap();
        let initial = feed.next().await.unwrap().unwrap();
        assert!(initial.documents.is_empty());

        let path = valdore_common::contact::contact_messages().doc("c1");
        let missing = WriteOp::update(path.clone()).set("read", true);
        let err = backend.commit(vec![missing]).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));

        backend
            .commit(vec![WriteOp::create(path, &serde_json::json!({ "read": false })).unwrap()])
            .await
            .unwrap();
        let update = tokio::time::timeout(std::time::Duration::from_secs(5), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(update.documents.len(), 1);
        assert_eq!(update.documents[0].id, "c1");
    }

    #[tokio::test]
    async fn rejected_query_fails_subscribe() {
        let (_node, backend) = served().await;
        let bad = Query::new(valdore_common::backend::CollectionPath::root(""));
        assert!(backend.subscribe(bad).await.is_err());
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let backend = RemoteBackend::new("http://127.0.0.1:9");
        let err = backend
            .query(&Query::new(valdore_common::chat::conversations()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
        assert!(backend.current_user().is_none());
    }
}
