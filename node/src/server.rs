//! HTTP + WebSocket surface of the node.
//!
//! Auth and document calls are JSON `POST`s; live queries run over
//! `/subscribe`, where the client sends one [`Query`] as a text frame and
//! then receives a [`SubscriptionEvent`] per change until either side closes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use valdore_common::backend::Query;
use valdore_common::error::{AuthError, BackendError};
use valdore_common::protocol::{
    CommitRequest, CommitResponse, ErrorBody, GetRequest, GetResponse, HealthResponse,
    MeResponse, QueryRequest, QueryResponse, SessionResponse, SignInRequest, SignUpRequest,
    SubscriptionEvent,
};

use crate::Node;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Backend(e) => match e {
                BackendError::NotFound(_) => StatusCode::NOT_FOUND,
                BackendError::AlreadyExists(_) => StatusCode::CONFLICT,
                BackendError::Unauthenticated => StatusCode::UNAUTHORIZED,
                BackendError::InvalidPath(_)
                | BackendError::InvalidUpdate(_)
                | BackendError::Codec(_) => StatusCode::BAD_REQUEST,
                BackendError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => match e {
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::WrongPassword => StatusCode::UNAUTHORIZED,
                AuthError::EmailAlreadyInUse => StatusCode::CONFLICT,
                AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
                AuthError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, %status, "request rejected");
        }
        let body = match &self {
            ApiError::Backend(e) => ErrorBody::from(e),
            ApiError::Auth(e) => ErrorBody::auth(e),
        };
        (status, Json(body)).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ─── Auth handlers ───────────────────────────────────────────────────────────

async fn sign_up_handler(
    State(node): State<Arc<Node>>,
    Json(req): Json<SignUpRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (token, user) = node
        .auth
        .sign_up(&req.email, &req.password, req.display_name.as_deref())?;
    Ok(Json(SessionResponse { token, user }))
}

async fn sign_in_handler(
    State(node): State<Arc<Node>>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (token, user) = node.auth.sign_in(&req.email, &req.password)?;
    Ok(Json(SessionResponse { token, user }))
}

async fn sign_out_handler(
    State(node): State<Arc<Node>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(BackendError::Unauthenticated)?;
    if !node.auth.sign_out(token) {
        return Err(BackendError::Unauthenticated.into());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn me_handler(State(node): State<Arc<Node>>, headers: HeaderMap) -> Json<MeResponse> {
    let user = bearer_token(&headers).and_then(|t| node.auth.user_for(t));
    Json(MeResponse { user })
}

// ─── Document handlers ───────────────────────────────────────────────────────

async fn get_handler(
    State(node): State<Arc<Node>>,
    Json(req): Json<GetRequest>,
) -> Result<Json<GetResponse>, ApiError> {
    let document = node.store.get(&req.path).await?;
    Ok(Json(GetResponse { document }))
}

async fn query_handler(
    State(node): State<Arc<Node>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let documents = node.store.query(&req.query).await?;
    Ok(Json(QueryResponse { documents }))
}

async fn commit_handler(
    State(node): State<Arc<Node>>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let applied = node.store.commit(req.writes).await?;
    Ok(Json(CommitResponse { applied }))
}

async fn health_handler(State(node): State<Arc<Node>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        documents: node.store.document_count().await,
        subscribers: node.store.subscriber_count(),
    })
}

// ─── Live queries ────────────────────────────────────────────────────────────

async fn subscribe_handler(ws: WebSocketUpgrade, State(node): State<Arc<Node>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, node))
}

async fn send_event(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    event: &SubscriptionEvent,
) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            error!("failed to encode subscription event: {e}");
            false
        }
    }
}

async fn handle_socket(socket: WebSocket, node: Arc<Node>) {
    let (mut sink, mut stream) = socket.split();

    // First frame is the query.
    let query = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Query>(&text) {
                Ok(query) => break query,
                Err(e) => {
                    let error = ErrorBody::from(&BackendError::from(e));
                    send_event(&mut sink, &SubscriptionEvent::Error { error }).await;
                    return;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => return,
        }
    };

    let mut subscription = match node.store.subscribe(query).await {
        Ok(sub) => sub,
        Err(e) => {
            let error = ErrorBody::from(&e);
            send_event(&mut sink, &SubscriptionEvent::Error { error }).await;
            return;
        }
    };

    let mut closing = node.closing();
    loop {
        tokio::select! {
            delivery = subscription.next() => {
                let event = match delivery {
                    Some(Ok(snapshot)) => SubscriptionEvent::Snapshot { snapshot },
                    Some(Err(e)) => SubscriptionEvent::Error { error: ErrorBody::from(&e) },
                    None => break,
                };
                if !send_event(&mut sink, &event).await {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            _ = closing.changed() => break,
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    debug!("subscription socket closed");
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub fn router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/auth/sign-up", post(sign_up_handler))
        .route("/auth/sign-in", post(sign_in_handler))
        .route("/auth/sign-out", post(sign_out_handler))
        .route("/auth/me", get(me_handler))
        .route("/documents/get", post(get_handler))
        .route("/documents/query", post(query_handler))
        .route("/documents/commit", post(commit_handler))
        .route("/subscribe", get(subscribe_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(node)
}

/// Bind `addr` and serve in the background. Used by tests with port 0.
pub async fn spawn(node: Arc<Node>, addr: &str) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = router(node);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("server stopped: {e}");
        }
    });
    info!(addr = %local, "valdore node serving");
    Ok((local, handle))
}
