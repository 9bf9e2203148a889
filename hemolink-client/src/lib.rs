#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Client-side messaging core for Hemolink.
//!
//! [`unread::UnreadStore`] tracks per-community unread counts,
//! [`context::MessageContext`] binds it to the session and the real-time
//! transport, and [`cache::RequestCache`] collapses repeated GET requests.

pub mod api;
pub mod cache;
pub mod context;
pub mod error;
pub mod session;
pub mod transport;
pub mod unread;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, UnreadApi};
pub use cache::{CachedResponse, RequestCache, RequestOptions};
pub use context::{MessageContext, ProviderPhase};
pub use error::{ClientError, ClientResult};
pub use session::{Session, SessionWatch};
pub use transport::{ChannelScope, DisabledTransport, MessagingTransport, TransportEvents};
pub use unread::{RefreshOutcome, UnreadStore};
