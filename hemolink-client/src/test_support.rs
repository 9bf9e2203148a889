//! Test doubles shared by the unit tests: an in-process backend, a scripted
//! unread API and an in-memory transport.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use shared::models::{ChannelId, CommunityMessage, MessageSender, UnreadChannelEntry, UnreadSnapshot};
use tokio::{net::TcpListener, task::JoinHandle};
use url::Url;

use crate::{
    api::UnreadApi,
    error::{ClientError, ClientResult},
    transport::{ChannelScope, MessagingTransport, TransportEvents},
};

pub(crate) const GOOD_TOKEN: &str = "good-token";

const DEFAULT_SNAPSHOT: &str = r#"{
    "success": true,
    "data": {
        "communities": [
            {"communityId": "c1", "communityName": "Donors North", "unreadCount": 2},
            {"communityId": "c2", "communityName": "Volunteers", "unreadCount": 0}
        ],
        "totalUnread": 2
    }
}"#;

/// Shared state of the in-process backend.
#[derive(Clone)]
pub(crate) struct BackendState {
    snapshot_body: Arc<Mutex<String>>,
    marked: Arc<Mutex<Vec<String>>>,
    pub unread_hits: Arc<AtomicUsize>,
    pub community_hits: Arc<AtomicUsize>,
    pub fail_mark_read: Arc<AtomicBool>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self::with_snapshot(DEFAULT_SNAPSHOT)
    }
}

impl BackendState {
    pub fn with_snapshot(body: &str) -> Self {
        Self {
            snapshot_body: Arc::new(Mutex::new(body.to_string())),
            marked: Arc::new(Mutex::new(Vec::new())),
            unread_hits: Arc::new(AtomicUsize::new(0)),
            community_hits: Arc::new(AtomicUsize::new(0)),
            fail_mark_read: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn marked_read(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {GOOD_TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "message": "Not authorized"})),
    )
        .into_response()
}

async fn unread_counts(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.unread_hits.fetch_add(1, Ordering::SeqCst);
    let body = state.snapshot_body.lock().unwrap().clone();
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn mark_read(
    State(state): State<BackendState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if state.fail_mark_read.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": "database unavailable"})),
        )
            .into_response();
    }
    state.marked.lock().unwrap().push(channel_id);
    Json(json!({"success": true})).into_response()
}

async fn communities(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.community_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "success": true,
        "data": [
            {"_id": "c1", "name": "Donors North", "memberCount": 120},
            {"_id": "c2", "name": "Volunteers"}
        ]
    }))
    .into_response()
}

/// Serves the community endpoints on an ephemeral local port.
pub(crate) async fn spawn_backend(state: BackendState) -> (Url, JoinHandle<()>) {
    let app = Router::new()
        .route("/api/communities", get(communities))
        .route("/api/communities/messages/unread-counts", get(unread_counts))
        .route("/api/communities/{channel_id}/messages/mark-read", post(mark_read))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (Url::parse(&format!("http://{addr}/")).unwrap(), handle)
}

pub(crate) fn snapshot(counts: &[(&str, u64)]) -> UnreadSnapshot {
    UnreadSnapshot::new(
        counts
            .iter()
            .map(|(id, count)| UnreadChannelEntry::new(*id, format!("Community {id}"), *count))
            .collect(),
    )
}

pub(crate) fn message_from(sender: &str) -> CommunityMessage {
    CommunityMessage {
        id: format!("msg-from-{sender}"),
        sender: MessageSender {
            id: sender.into(),
            name: None,
        },
        content: "Can anyone cover the Saturday drive?".to_string(),
        created_at: None,
    }
}

/// Let spawned tasks run to their next suspension point.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Scripted [`UnreadApi`]: queued responses first, then the fallback snapshot.
pub(crate) struct FakeUnreadApi {
    scripted: Mutex<VecDeque<(Duration, ClientResult<UnreadSnapshot>)>>,
    fallback: Mutex<ClientResult<UnreadSnapshot>>,
    marked: Mutex<Vec<ChannelId>>,
    pub refresh_calls: AtomicUsize,
    pub fail_mark_read: AtomicBool,
}

impl FakeUnreadApi {
    pub fn new(initial: UnreadSnapshot) -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(initial)),
            marked: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            fail_mark_read: AtomicBool::new(false),
        })
    }

    pub fn set_fallback(&self, result: ClientResult<UnreadSnapshot>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn push(&self, delay: Duration, result: ClientResult<UnreadSnapshot>) {
        self.scripted.lock().unwrap().push_back((delay, result));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn marked(&self) -> Vec<ChannelId> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnreadApi for FakeUnreadApi {
    async fn unread_counts(&self, token: &str) -> ClientResult<UnreadSnapshot> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if token != GOOD_TOKEN {
            return Err(ClientError::status("fake", 401, "Not authorized"));
        }
        let scripted = self.scripted.lock().unwrap().pop_front();
        let (delay, result) =
            scripted.unwrap_or_else(|| (Duration::ZERO, self.fallback.lock().unwrap().clone()));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn mark_read(&self, _token: &str, channel_id: &ChannelId) -> ClientResult<()> {
        self.marked.lock().unwrap().push(channel_id.clone());
        if self.fail_mark_read.load(Ordering::SeqCst) {
            Err(ClientError::status("fake", 500, "database unavailable"))
        } else {
            Ok(())
        }
    }
}

/// In-memory [`MessagingTransport`] that lets tests push events.
#[derive(Default)]
pub(crate) struct FakeTransport {
    handlers: Mutex<Option<Arc<dyn TransportEvents>>>,
    subscriptions: Mutex<Vec<ChannelScope>>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_connect.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    fn handlers(&self) -> Option<Arc<dyn TransportEvents>> {
        self.handlers.lock().unwrap().clone()
    }

    pub fn emit(&self, message: CommunityMessage, channel_id: &str) {
        if let Some(handlers) = self.handlers() {
            handlers.on_new_message(message, ChannelId::from(channel_id));
        }
    }

    pub fn emit_error(&self, error: ClientError) {
        if let Some(handlers) = self.handlers() {
            handlers.on_error(error);
        }
    }

    pub fn subscriptions(&self) -> Vec<ChannelScope> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingTransport for FakeTransport {
    async fn connect(&self, _token: &str) -> ClientResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            let err = ClientError::transport("connection refused");
            if let Some(handlers) = self.handlers() {
                handlers.on_error(err.clone());
            }
            return Err(err);
        }
        if let Some(handlers) = self.handlers() {
            handlers.on_connection_established();
        }
        Ok(())
    }

    async fn subscribe(&self, scope: ChannelScope) -> ClientResult<()> {
        self.subscriptions.lock().unwrap().push(scope);
        Ok(())
    }

    async fn unsubscribe(&self, scope: ChannelScope) -> ClientResult<()> {
        self.subscriptions.lock().unwrap().retain(|existing| existing != &scope);
        Ok(())
    }

    fn set_handlers(&self, handlers: Arc<dyn TransportEvents>) {
        *self.handlers.lock().unwrap() = Some(handlers);
    }
}
