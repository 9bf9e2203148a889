//! Session-bound message context.
//!
//! [`MessageContext`] is mounted once per application. It follows the
//! [`SessionWatch`]: on sign-in it loads the unread snapshot, connects the
//! real-time transport and starts periodic reconciliation; on sign-out it
//! clears everything. Incoming messages bump the unread count of their
//! channel unless the signed-in user sent them.

use std::{sync::Arc, time::Duration};

use shared::{
    config::client::Config,
    models::{ChannelId, CommunityMessage, UnreadSnapshot, UserId},
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    api::{ApiClient, UnreadApi},
    error::{ClientError, ClientResult},
    session::{Session, SessionWatch},
    transport::{ChannelScope, MessagingTransport, TransportEvents},
    unread::{RefreshOutcome, UnreadStore},
};

/// Lifecycle of the provider as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderPhase {
    /// Mounted, but the background task has not read the session yet.
    #[default]
    Uninitialized,
    /// A session is active and the first snapshot is being fetched.
    Loading,
    Ready,
    LoggedOut,
}

impl ProviderPhase {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Loading)
    }
}

/// Routes transport events into the unread store.
struct UnreadEventRouter {
    store: UnreadStore,
}

impl TransportEvents for UnreadEventRouter {
    fn on_new_message(&self, message: CommunityMessage, channel_id: ChannelId) {
        let Some(session) = self.store.session().current() else {
            trace!(channel_id = %channel_id, "message received while signed out");
            return;
        };
        if message.is_from(&session.user_id) {
            trace!(channel_id = %channel_id, "ignoring own message");
            return;
        }
        self.store.increment_channel(&channel_id);
    }

    fn on_connection_established(&self) {
        info!("real-time messaging connected");
    }

    fn on_error(&self, error: ClientError) {
        warn!(error = %error, "real-time messaging error");
    }
}

/// Unread state bound to the session and the real-time transport.
///
/// Dropping the context stops the background task and discards any result
/// that arrives afterwards.
pub struct MessageContext {
    store: UnreadStore,
    phase: watch::Receiver<ProviderPhase>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageContext")
            .field("phase", &*self.phase.borrow())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl MessageContext {
    /// Build the REST client from `config` and mount a context on it.
    pub fn from_config(
        config: &Config,
        session: SessionWatch,
        transport: Arc<dyn MessagingTransport>,
    ) -> ClientResult<Self> {
        let api: Arc<dyn UnreadApi> = Arc::new(ApiClient::from_config(config)?);
        let store = UnreadStore::new(api, session);
        Ok(Self::mount(store, transport, config.refresh_interval()))
    }

    /// Start following the store's session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(
        store: UnreadStore,
        transport: Arc<dyn MessagingTransport>,
        refresh_interval: Duration,
    ) -> Self {
        let (phase_tx, phase) = watch::channel(ProviderPhase::Uninitialized);
        let shutdown = CancellationToken::new();

        transport.set_handlers(Arc::new(UnreadEventRouter {
            store: store.clone(),
        }));

        let driver = Driver {
            store: store.clone(),
            transport,
            phase: phase_tx,
            refresh_interval,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(driver.run());

        Self {
            store,
            phase,
            shutdown,
            task: Some(task),
        }
    }

    pub fn store(&self) -> &UnreadStore {
        &self.store
    }

    pub fn snapshot(&self) -> Option<UnreadSnapshot> {
        self.store.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<UnreadSnapshot>> {
        self.store.subscribe()
    }

    pub fn phase(&self) -> ProviderPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ProviderPhase> {
        self.phase.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.phase().is_loading()
    }

    pub fn total_unread(&self) -> u64 {
        self.store.total_unread()
    }

    pub fn unread_for(&self, channel_id: &ChannelId) -> Option<u64> {
        self.store.unread_for(channel_id)
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.store.refresh().await
    }

    pub fn mark_channel_read(
        &self,
        channel_id: &ChannelId,
    ) -> Option<JoinHandle<ClientResult<()>>> {
        self.store.mark_channel_read(channel_id)
    }

    /// Stop the background task and wait for it to exit.
    pub async fn unmount(mut self) {
        self.shutdown.cancel();
        self.store.unmount();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "message context task ended abnormally");
        }
    }
}

impl Drop for MessageContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.store.unmount();
    }
}

struct Driver {
    store: UnreadStore,
    transport: Arc<dyn MessagingTransport>,
    phase: watch::Sender<ProviderPhase>,
    refresh_interval: Duration,
    shutdown: CancellationToken,
}

impl Driver {
    async fn run(self) {
        let mut sessions = self.store.session().subscribe();
        let mut settled = self.store.subscribe_settled();
        let mut active: Option<UserId> = None;
        let mut ticker: Option<Interval> = None;

        let initial = sessions.borrow_and_update().clone();
        settled.mark_unchanged();
        match initial {
            Some(session) => {
                active = Some(session.user_id.clone());
                ticker = Some(self.start_session(session));
            }
            None => {
                self.phase.send_replace(ProviderPhase::LoggedOut);
                debug!("mounted without a session");
            }
        }

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("message context shutting down");
                    break;
                }
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = sessions.borrow_and_update().clone();
                    match current {
                        Some(session) if active.as_ref() == Some(&session.user_id) => {
                            trace!(user_id = %session.user_id, "session refreshed for same user");
                        }
                        Some(session) => {
                            if active.is_some() {
                                self.end_session();
                            }
                            // Settles from an earlier session say nothing about this one.
                            settled.mark_unchanged();
                            active = Some(session.user_id.clone());
                            ticker = Some(self.start_session(session));
                        }
                        None => {
                            active = None;
                            ticker = None;
                            self.end_session();
                        }
                    }
                }
                changed = settled.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    settled.mark_unchanged();
                    if active.is_some() {
                        self.finish_loading();
                    }
                }
                () = next_tick(&mut ticker) => {
                    self.spawn_reconcile();
                }
            }
        }
    }

    fn start_session(&self, session: Session) -> Interval {
        info!(user_id = %session.user_id, "session started; loading unread counts");
        self.phase.send_replace(ProviderPhase::Loading);

        let store = self.store.clone();
        tokio::spawn(async move {
            let outcome = store.refresh().await;
            trace!(?outcome, "initial unread load finished");
        });

        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.connect(session.token()).await {
                warn!(error = %err, "real-time messaging unavailable; relying on periodic refresh");
                return;
            }
            if let Err(err) = transport.subscribe(ChannelScope::All).await {
                warn!(error = %err, "failed to subscribe to community channels");
            }
        });

        let mut ticker = time::interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// `Loading` ends with the first refresh of the session that applies or
    /// fails, whichever refresh that turns out to be.
    fn finish_loading(&self) {
        let finished = self.phase.send_if_modified(|phase| {
            let loading = *phase == ProviderPhase::Loading;
            if loading {
                *phase = ProviderPhase::Ready;
            }
            loading
        });
        if finished {
            debug!("unread counts ready");
        }
    }

    fn end_session(&self) {
        self.store.clear();
        self.phase.send_replace(ProviderPhase::LoggedOut);
        info!("session ended; unread counts cleared");
    }

    fn spawn_reconcile(&self) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let outcome = store.refresh().await;
            trace!(?outcome, "periodic unread refresh finished");
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
