use super::auth::{Credential, require_api_key};
use super::mcp::McpServer;
use super::session::SessionRegistry;
use crate::config::SseConfig;
use crate::error::Result;
use axum::{
    Router,
    extract::{Extension, Query, State},
    http::StatusCode,
    middleware,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGE_PATH: &str = "/message";

#[derive(Clone)]
pub struct SseState {
    server: Arc<McpServer>,
    sessions: SessionRegistry,
}

impl SseState {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Both routes sit behind the API key gate.
pub fn router(state: SseState, api_key: Option<String>) -> Router {
    let api_key: Option<Arc<str>> = api_key.filter(|k| !k.is_empty()).map(Arc::from);

    Router::new()
        .route(SSE_PATH, get(open_stream))
        .route(MESSAGE_PATH, post(post_message))
        .route_layer(middleware::from_fn_with_state(api_key, require_api_key))
        .with_state(state)
}

/// Serve MCP over SSE until `shutdown` resolves.
pub async fn serve_sse(
    server: Arc<McpServer>,
    config: &SseConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        auth = config.api_key.is_some(),
        "SSE server listening on http://{addr}{SSE_PATH}"
    );

    let app = router(SseState::new(server), config.api_key.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("SSE server stopped");
    Ok(())
}

async fn open_stream(
    State(state): State<SseState>,
    Extension(credential): Extension<Credential>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (guard, rx) = state.sessions.open(credential);
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGE_PATH}?sessionId={}", guard.id()));

    // The guard lives inside the stream so the session ends with the connection.
    let messages = UnboundedReceiverStream::new(rx).map(move |message| {
        let _session = &guard;
        Ok::<_, Infallible>(Event::default().event("message").data(message))
    });

    Sse::new(stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages))
        .keep_alive(KeepAlive::default())
}

async fn post_message(
    State(state): State<SseState>,
    Extension(credential): Extension<Credential>,
    Query(query): Query<MessageQuery>,
    frame: String,
) -> Response {
    // A session only accepts messages carrying the credential that opened it.
    if !state.sessions.is_owned_by(&query.session_id, &credential) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "session not found"})),
        )
            .into_response();
    }

    // Replies travel over the session's stream, so tool calls run detached
    // from this request.
    let SseState { server, sessions } = state;
    let session_id = query.session_id;
    tokio::spawn(async move {
        if let Some(reply) = server.handle_frame(&frame).await
            && !sessions.send(&session_id, reply)
        {
            tracing::debug!(session_id = %session_id, "Session closed before reply was sent");
        }
    });

    StatusCode::ACCEPTED.into_response()
}
