//! TTL request cache with in-flight request coalescing.
//!
//! Successful JSON `GET` responses are remembered for a fixed TTL and replayed
//! without touching the network. Identical requests issued while one is still
//! pending share that pending result instead of hitting the backend twice.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, trace};

use crate::error::ClientResult;

type InFlight = Shared<BoxFuture<'static, ClientResult<CachedResponse>>>;

/// Method, headers and body of a request routed through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(body: Option<String>) -> Self {
        Self {
            method: Method::POST,
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }
}

/// A fully buffered response, either fresh from the network or replayed from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    status: StatusCode,
    body: Vec<u8>,
    from_cache: bool,
}

impl CachedResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            from_cache: false,
        }
    }

    fn replayed(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            from_cache: true,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether this response was synthesized from a cache entry.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Performs the underlying network call for the cache.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn execute(&self, url: &str, options: &RequestOptions) -> ClientResult<CachedResponse>;
}

/// [`HttpFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn execute(&self, url: &str, options: &RequestOptions) -> ClientResult<CachedResponse> {
        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(CachedResponse::new(status, body.to_vec()))
    }
}

#[derive(Debug)]
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

struct CacheInner {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl CacheInner {
    fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let mut entries = lock(&self.entries);
        let expired = entries.get(key)?.stored_at.elapsed() > self.ttl;
        if expired {
            entries.remove(key);
            trace!(key, "evicted expired cache entry");
            return None;
        }
        let body = serde_json::to_vec(&entries.get(key)?.payload).ok()?;
        Some(CachedResponse::replayed(body))
    }

    fn store(&self, key: String, payload: Value) {
        lock(&self.entries).insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    fn clear_expired(&self) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() <= self.ttl);
        before - entries.len()
    }
}

/// Request de-duplication layer shared by data-fetching call sites.
///
/// Cloning is cheap; clones share entries and in-flight requests.
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<CacheInner>,
    fetcher: Arc<dyn HttpFetcher>,
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("ttl", &self.inner.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl RequestCache {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
            fetcher,
        }
    }

    pub fn with_client(client: reqwest::Client, ttl: Duration) -> Self {
        Self::new(Arc::new(ReqwestFetcher::new(client)), ttl)
    }

    /// Fetches `url`, answering from the cache or an identical pending request when possible.
    ///
    /// Only successful `GET` responses with a JSON body are stored. Anything else
    /// is passed through to the caller untouched.
    pub async fn fetch(&self, url: &str, options: RequestOptions) -> ClientResult<CachedResponse> {
        let key = cache_key(url, &options);

        if let Some(hit) = self.inner.lookup(&key) {
            debug!(key = %key, "request served from cache");
            return Ok(hit);
        }

        let pending = {
            let mut in_flight = lock(&self.inner.in_flight);
            if let Some(pending) = in_flight.get(&key) {
                debug!(key = %key, "joining in-flight request");
                pending.clone()
            } else {
                let pending = perform(
                    Arc::clone(&self.fetcher),
                    Arc::downgrade(&self.inner),
                    key.clone(),
                    url.to_string(),
                    options,
                )
                .boxed()
                .shared();
                in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await
    }

    pub fn clear(&self) {
        lock(&self.inner.entries).clear();
    }

    /// Drops entries older than the TTL and keeps fresh ones.
    pub fn clear_expired(&self) {
        let removed = self.inner.clear_expired();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweeps expired entries every `period` until the last cache handle is dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.clear_expired();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

async fn perform(
    fetcher: Arc<dyn HttpFetcher>,
    cache: Weak<CacheInner>,
    key: String,
    url: String,
    options: RequestOptions,
) -> ClientResult<CachedResponse> {
    let result = fetcher.execute(&url, &options).await;

    if let Some(inner) = cache.upgrade() {
        if let Ok(response) = &result
            && options.method == Method::GET
            && response.is_success()
        {
            match serde_json::from_slice::<Value>(response.body()) {
                Ok(payload) => inner.store(key.clone(), payload),
                Err(err) => debug!(key = %key, error = %err, "response is not JSON; not caching"),
            }
        }
        lock(&inner.in_flight).remove(&key);
    }

    result
}

fn cache_key(url: &str, options: &RequestOptions) -> String {
    format!(
        "{}:{}:{}",
        options.method,
        url,
        options.body.as_deref().unwrap_or_default()
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
