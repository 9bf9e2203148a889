use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ChannelId;

/// Unread state of a single channel as captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadChannelEntry {
    #[serde(alias = "communityId")]
    pub channel_id: ChannelId,
    /// Label captured at snapshot time; may be stale.
    #[serde(default, alias = "communityName")]
    pub channel_name: String,
    #[serde(default)]
    pub unread_count: u64,
}

impl UnreadChannelEntry {
    pub fn new(channel_id: impl Into<ChannelId>, channel_name: impl Into<String>, unread_count: u64) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            unread_count,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default, alias = "communities")]
    channels: Vec<UnreadChannelEntry>,
}

/// Per-channel unread counts plus their total.
///
/// `total_unread` is derived: every constructor and mutator recomputes it from
/// `channels`, so it always equals the sum of the per-channel counts. A
/// `totalUnread` supplied by the server is ignored in favour of that sum.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct UnreadSnapshot {
    channels: Vec<UnreadChannelEntry>,
    total_unread: u64,
}

impl From<RawSnapshot> for UnreadSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        Self::new(raw.channels)
    }
}

impl UnreadSnapshot {
    /// Builds a snapshot, keeping the first entry for any duplicated channel id.
    pub fn new(channels: Vec<UnreadChannelEntry>) -> Self {
        let mut seen = HashSet::with_capacity(channels.len());
        let channels: Vec<_> = channels
            .into_iter()
            .filter(|entry| seen.insert(entry.channel_id.clone()))
            .collect();

        let mut snapshot = Self {
            channels,
            total_unread: 0,
        };
        snapshot.recompute_total();
        snapshot
    }

    pub fn channels(&self) -> &[UnreadChannelEntry] {
        &self.channels
    }

    pub fn total_unread(&self) -> u64 {
        self.total_unread
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<&UnreadChannelEntry> {
        self.channels
            .iter()
            .find(|entry| &entry.channel_id == channel_id)
    }

    pub fn unread_for(&self, channel_id: &ChannelId) -> Option<u64> {
        self.get(channel_id).map(|entry| entry.unread_count)
    }

    /// Adds one unread message to a known channel.
    ///
    /// Returns `false` without touching the snapshot when the channel is unknown.
    pub fn increment(&mut self, channel_id: &ChannelId) -> bool {
        let Some(entry) = self
            .channels
            .iter_mut()
            .find(|entry| &entry.channel_id == channel_id)
        else {
            return false;
        };
        entry.unread_count = entry.unread_count.saturating_add(1);
        self.recompute_total();
        true
    }

    /// Zeroes the unread count of a channel. Returns `false` if it is unknown.
    pub fn mark_read(&mut self, channel_id: &ChannelId) -> bool {
        let Some(entry) = self
            .channels
            .iter_mut()
            .find(|entry| &entry.channel_id == channel_id)
        else {
            return false;
        };
        entry.unread_count = 0;
        self.recompute_total();
        true
    }

    fn recompute_total(&mut self) {
        self.total_unread = self
            .channels
            .iter()
            .map(|entry| entry.unread_count)
            .fold(0_u64, u64::saturating_add);
    }
}
