use serde::{Deserialize, Serialize};

use super::ChannelId;

/// A community the authenticated user belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySummary {
    #[serde(alias = "_id")]
    pub id: ChannelId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
}
