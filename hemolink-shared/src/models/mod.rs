pub mod community;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;
pub mod unread;

pub use community::CommunitySummary;
pub use envelope::ApiEnvelope;
pub use errors::ErrorResponse;
pub use ids::{ChannelId, UserId};
pub use message::{CommunityMessage, MessageSender};
pub use unread::{UnreadChannelEntry, UnreadSnapshot};
