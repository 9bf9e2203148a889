//! Client-side unread-count aggregation.
//!
//! [`UnreadStore`] owns the single [`UnreadSnapshot`] for the signed-in user.
//! It is seeded from the REST snapshot, nudged by real-time increments and
//! optimistic mark-read updates, and replaced wholesale on every refresh.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use shared::models::{ChannelId, UnreadSnapshot};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    api::UnreadApi,
    error::{ClientError, ClientResult},
    session::SessionWatch,
};

/// What happened to the snapshot after a call to [`UnreadStore::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched snapshot replaced the previous one.
    Applied,
    /// No session was active, so the snapshot was cleared.
    Cleared,
    /// A newer refresh, a logout or an unmount superseded this one.
    Discarded,
    /// The fetch failed; the previous snapshot was kept.
    Failed(ClientError),
}

struct StoreInner {
    api: Arc<dyn UnreadApi>,
    session: SessionWatch,
    snapshot: watch::Sender<Option<UnreadSnapshot>>,
    /// Bumped by every refresh and every clear. A fetch result only lands if
    /// the generation it started under is still current.
    generation: AtomicU64,
    /// Counts refreshes that finished under the current generation, whether
    /// they applied a snapshot or failed.
    settled: watch::Sender<u64>,
    mounted: AtomicBool,
}

/// Observable unread counts for the current session.
///
/// Clones share state. The snapshot is `None` while nobody is signed in or
/// before the first successful refresh.
#[derive(Clone)]
pub struct UnreadStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for UnreadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadStore")
            .field("snapshot", &*self.inner.snapshot.borrow())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

impl UnreadStore {
    pub fn new(api: Arc<dyn UnreadApi>, session: SessionWatch) -> Self {
        let (snapshot, _rx) = watch::channel(None);
        let (settled, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                api,
                session,
                snapshot,
                generation: AtomicU64::new(0),
                settled,
                mounted: AtomicBool::new(true),
            }),
        }
    }

    pub fn session(&self) -> &SessionWatch {
        &self.inner.session
    }

    pub fn snapshot(&self) -> Option<UnreadSnapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver that is notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<UnreadSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    /// Total unread messages, `0` when there is no snapshot.
    pub fn total_unread(&self) -> u64 {
        self.inner
            .snapshot
            .borrow()
            .as_ref()
            .map_or(0, UnreadSnapshot::total_unread)
    }

    pub fn unread_for(&self, channel_id: &ChannelId) -> Option<u64> {
        self.inner
            .snapshot
            .borrow()
            .as_ref()
            .and_then(|snapshot| snapshot.unread_for(channel_id))
    }

    /// Receiver that ticks whenever a refresh that was still current settles,
    /// by applying a snapshot or by failing.
    ///
    /// Superseded, cleared and unmounted refreshes never tick it.
    pub fn subscribe_settled(&self) -> watch::Receiver<u64> {
        self.inner.settled.subscribe()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_mounted() && self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn mark_settled(&self) {
        self.inner.settled.send_modify(|count| *count = count.wrapping_add(1));
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Replace the snapshot with the server's authoritative counts.
    ///
    /// Without a session the snapshot is cleared and no request is made.
    /// Failures are logged and leave the current snapshot untouched.
    pub async fn refresh(&self) -> RefreshOutcome {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(session) = self.inner.session.current() else {
            self.inner.snapshot.send_replace(None);
            return RefreshOutcome::Cleared;
        };

        match self.inner.api.unread_counts(session.token()).await {
            Ok(snapshot) => {
                if !self.is_mounted() {
                    debug!(generation, "store unmounted; dropping unread snapshot");
                    return RefreshOutcome::Discarded;
                }
                let current = self.inner.generation.load(Ordering::SeqCst);
                if current != generation {
                    debug!(generation, current, "superseded unread snapshot discarded");
                    return RefreshOutcome::Discarded;
                }
                debug!(
                    generation,
                    total_unread = snapshot.total_unread(),
                    "applied unread snapshot"
                );
                self.inner.snapshot.send_replace(Some(snapshot));
                self.mark_settled();
                RefreshOutcome::Applied
            }
            Err(err) => {
                warn!(
                    error = %err,
                    generation,
                    "failed to refresh unread counts; keeping previous snapshot"
                );
                if self.is_current(generation) {
                    self.mark_settled();
                }
                RefreshOutcome::Failed(err)
            }
        }
    }

    /// Zero `channel_id` locally, then persist the read state in the background.
    ///
    /// The local update is applied before this returns. The returned handle
    /// resolves with the server's answer; a failure is logged and the local
    /// zero stays in place until the next refresh. Returns `None` when no
    /// session is active, in which case nothing is sent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mark_channel_read(&self, channel_id: &ChannelId) -> Option<JoinHandle<ClientResult<()>>> {
        self.inner.snapshot.send_if_modified(|snapshot| {
            snapshot.as_mut().is_some_and(|snapshot| {
                let had_unread = snapshot.unread_for(channel_id).is_some_and(|count| count > 0);
                snapshot.mark_read(channel_id) && had_unread
            })
        });

        let Some(session) = self.inner.session.current() else {
            debug!(channel_id = %channel_id, "no session; mark-read not sent");
            return None;
        };

        let api = Arc::clone(&self.inner.api);
        let channel_id = channel_id.clone();
        Some(tokio::spawn(async move {
            let result = api.mark_read(session.token(), &channel_id).await;
            if let Err(err) = &result {
                warn!(channel_id = %channel_id, error = %err, "failed to persist read state");
            }
            result
        }))
    }

    /// Count one new message in `channel_id`.
    ///
    /// Channels missing from the snapshot are ignored; the next refresh picks
    /// them up. Returns whether the snapshot changed.
    pub fn increment_channel(&self, channel_id: &ChannelId) -> bool {
        let applied = self
            .inner
            .snapshot
            .send_if_modified(|snapshot| snapshot.as_mut().is_some_and(|s| s.increment(channel_id)));
        if !applied {
            debug!(channel_id = %channel_id, "dropping increment for unknown channel");
        }
        applied
    }

    /// Drop the snapshot and invalidate any refresh still in flight.
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.snapshot.send_replace(None);
    }

    /// Stop accepting asynchronous results. Local mutations still apply.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }
}
