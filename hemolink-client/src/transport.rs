//! Real-time transport contract.
//!
//! The WebSocket client itself lives outside this crate. The message context
//! only needs to connect, subscribe and receive events through
//! [`TransportEvents`].

use std::sync::Arc;

use async_trait::async_trait;
use shared::models::{ChannelId, CommunityMessage};

use crate::error::{ClientError, ClientResult};

/// What a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelScope {
    /// Every community the authenticated user belongs to.
    All,
    Channel(ChannelId),
}

/// Callbacks invoked by the transport as events arrive.
///
/// Implementations must not block; they run on the transport's dispatch path.
pub trait TransportEvents: Send + Sync {
    /// A message was posted to `channel_id`.
    fn on_new_message(&self, message: CommunityMessage, channel_id: ChannelId);

    fn on_connection_established(&self) {}

    fn on_error(&self, error: ClientError) {
        let _ = error;
    }
}

/// Connection to the real-time messaging backend.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Opens the connection, or reuses an open one.
    async fn connect(&self, token: &str) -> ClientResult<()>;

    async fn subscribe(&self, scope: ChannelScope) -> ClientResult<()>;

    async fn unsubscribe(&self, scope: ChannelScope) -> ClientResult<()>;

    /// Replaces the registered event handlers.
    fn set_handlers(&self, handlers: Arc<dyn TransportEvents>);
}

/// Transport used when no real-time backend is configured.
///
/// Every connection attempt fails, so consumers fall back to polling.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTransport;

#[async_trait]
impl MessagingTransport for DisabledTransport {
    async fn connect(&self, _token: &str) -> ClientResult<()> {
        Err(ClientError::transport("real-time transport is not configured"))
    }

    async fn subscribe(&self, _scope: ChannelScope) -> ClientResult<()> {
        Err(ClientError::transport("real-time transport is not configured"))
    }

    async fn unsubscribe(&self, _scope: ChannelScope) -> ClientResult<()> {
        Ok(())
    }

    fn set_handlers(&self, _handlers: Arc<dyn TransportEvents>) {}
}
