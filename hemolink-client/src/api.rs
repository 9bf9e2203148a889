use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    config::client::Config,
    models::{ApiEnvelope, ChannelId, CommunitySummary, UnreadSnapshot},
};
use tracing::debug;
use url::Url;

use crate::{
    cache::{RequestCache, RequestOptions},
    error::{ClientError, ClientResult},
};

const USER_AGENT: &str = "hemolink-client";
const UNREAD_COUNTS_PATH: &str = "api/communities/messages/unread-counts";
const COMMUNITIES_PATH: &str = "api/communities";

/// REST operations the unread store depends on.
#[async_trait]
pub trait UnreadApi: Send + Sync {
    /// Reads the authoritative unread snapshot for the token's user.
    async fn unread_counts(&self, token: &str) -> ClientResult<UnreadSnapshot>;

    /// Persists the read state of one channel.
    async fn mark_read(&self, token: &str, channel_id: &ChannelId) -> ClientResult<()>;
}

/// API client for the Hemolink backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    cache: RequestCache,
}

impl ApiClient {
    /// Create a client for `config.api_base_url` with its own request cache.
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;
        let cache = RequestCache::with_client(client.clone(), config.cache_ttl());
        Ok(Self::with_parts(config.api_base_url.clone(), client, cache))
    }

    /// Create a client from pre-built parts, sharing `cache` with other call sites.
    pub fn with_parts(base_url: Url, client: Client, cache: RequestCache) -> Self {
        Self {
            base_url,
            client,
            cache,
        }
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::InvalidUrl {
                path: path.to_string(),
                message: err.to_string(),
            })
    }

    fn channel_url(&self, channel_id: &ChannelId, tail: &[&str]) -> ClientResult<Url> {
        let mut url = self.api_url(COMMUNITIES_PATH)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl {
                path: COMMUNITIES_PATH.to_string(),
                message: "base URL cannot carry path segments".to_string(),
            })?
            .pop_if_empty()
            .push(channel_id.as_str())
            .extend(tail);
        Ok(url)
    }

    fn authorized(request: RequestBuilder, token: &str) -> RequestBuilder {
        request.bearer_auth(token)
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> ClientResult<ApiEnvelope<T>> {
        let url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(url, status.as_u16(), &body));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET` a JSON document through the request cache.
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> ClientResult<T> {
        let url = self.api_url(path)?;
        let mut options = RequestOptions::get();
        if let Some(token) = token {
            options = options.with_bearer(token);
        }

        let response = self.cache.fetch(url.as_str(), options).await?;
        if !response.is_success() {
            return Err(ClientError::status(
                url.as_str(),
                response.status().as_u16(),
                &response.text(),
            ));
        }
        response.json()
    }

    /// Communities the authenticated user belongs to.
    pub async fn communities(&self, token: &str) -> ClientResult<Vec<CommunitySummary>> {
        let envelope: ApiEnvelope<Vec<CommunitySummary>> =
            self.get_cached(COMMUNITIES_PATH, Some(token)).await?;
        into_data(envelope)
    }
}

#[async_trait]
impl UnreadApi for ApiClient {
    async fn unread_counts(&self, token: &str) -> ClientResult<UnreadSnapshot> {
        let url = self.api_url(UNREAD_COUNTS_PATH)?;
        let response = Self::authorized(self.client.get(url), token).send().await?;
        let envelope = Self::read_envelope::<UnreadSnapshot>(response).await?;
        let snapshot = into_data(envelope)?;
        debug!(
            channels = snapshot.channels().len(),
            total_unread = snapshot.total_unread(),
            "fetched unread snapshot"
        );
        Ok(snapshot)
    }

    async fn mark_read(&self, token: &str, channel_id: &ChannelId) -> ClientResult<()> {
        let url = self.channel_url(channel_id, &["messages", "mark-read"])?;
        let response = Self::authorized(self.client.post(url), token).send().await?;
        let envelope = Self::read_envelope::<serde_json::Value>(response).await?;
        if envelope.success {
            Ok(())
        } else {
            Err(rejected(envelope.message))
        }
    }
}

fn into_data<T>(envelope: ApiEnvelope<T>) -> ClientResult<T> {
    if !envelope.success {
        return Err(rejected(envelope.message));
    }
    envelope.data.ok_or_else(|| ClientError::Decode {
        message: "response is missing `data`".to_string(),
    })
}

fn rejected(message: Option<String>) -> ClientError {
    ClientError::Rejected {
        message: message.unwrap_or_else(|| "no reason given".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BackendState, spawn_backend};
    use std::sync::atomic::Ordering;

    fn client_for(base: Url) -> ApiClient {
        let mut config = Config::with_defaults();
        config.api_base_url = base;
        ApiClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn unread_counts_sends_bearer_and_parses_snapshot() {
        let state = BackendState::with_snapshot(r#"{
            "success": true,
            "data": {
                "communities": [
                    {"communityId": "c1", "communityName": "North", "unreadCount": 2},
                    {"communityId": "c2", "communityName": "South", "unreadCount": 0}
                ],
                "totalUnread": 2
            }
        }"#);
        let (base, _server) = spawn_backend(state.clone()).await;
        let client = client_for(base);

        let snapshot = client.unread_counts("good-token").await.unwrap();

        assert_eq!(snapshot.total_unread(), 2);
        assert_eq!(snapshot.unread_for(&ChannelId::from("c1")), Some(2));
        assert_eq!(state.unread_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unread_counts_rejects_bad_token() {
        let (base, _server) = spawn_backend(BackendState::default()).await;
        let client = client_for(base);

        let err = client.unread_counts("wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_rejected() {
        let state = BackendState::with_snapshot(r#"{"success": false, "message": "suspended"}"#);
        let (base, _server) = spawn_backend(state).await;
        let client = client_for(base);

        let err = client.unread_counts("good-token").await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Rejected {
                message: "suspended".to_string()
            }
        );
    }

    #[tokio::test]
    async fn mark_read_posts_to_channel_endpoint() {
        let state = BackendState::default();
        let (base, _server) = spawn_backend(state.clone()).await;
        let client = client_for(base);

        client
            .mark_read("good-token", &ChannelId::from("c1"))
            .await
            .unwrap();

        assert_eq!(state.marked_read(), vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn mark_read_surfaces_server_failure() {
        let state = BackendState::default();
        state.fail_mark_read.store(true, Ordering::SeqCst);
        let (base, _server) = spawn_backend(state).await;
        let client = client_for(base);

        let err = client
            .mark_read("good-token", &ChannelId::from("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn communities_are_served_from_cache_on_repeat() {
        let state = BackendState::default();
        let (base, _server) = spawn_backend(state.clone()).await;
        let client = client_for(base);

        let first = client.communities("good-token").await.unwrap();
        let second = client.communities("good-token").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].name, "Donors North");
        assert_eq!(state.community_hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.cache().len(), 1);
    }

    #[test]
    fn channel_ids_are_encoded_as_one_segment() {
        let client = client_for(Url::parse("http://localhost:5000/").unwrap());
        let url = client
            .channel_url(&ChannelId::from("a/b c"), &["messages", "mark-read"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/communities/a%2Fb%20c/messages/mark-read"
        );
    }
}
