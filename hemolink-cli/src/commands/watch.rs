use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use client::{
    ApiClient, DisabledTransport, MessageContext, MessagingTransport, ProviderPhase, Session,
    SessionWatch, UnreadApi, UnreadStore,
};
use shared::config::client::Config;
use tracing::info;

use super::{AuthArgs, unread::print_snapshot};

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// User the token belongs to; their own messages are not counted
    #[arg(long, env = "HEMOLINK_USER_ID")]
    pub user: String,
}

/// Runs the message context with periodic refresh and prints every change
/// until Ctrl-C.
pub async fn watch(config: &Config, args: WatchArgs) -> Result<()> {
    let api = ApiClient::from_config(config).context("failed to build API client")?;
    let sweeper = api.cache().spawn_sweeper(config.cache_sweep_interval());

    let session = SessionWatch::authenticated(Session::new(args.user, args.auth.token));
    let store = UnreadStore::new(Arc::new(api) as Arc<dyn UnreadApi>, session.clone());
    let transport: Arc<dyn MessagingTransport> = Arc::new(DisabledTransport);
    let context = MessageContext::mount(store, transport, config.refresh_interval());

    let mut snapshots = context.subscribe_snapshot();
    let mut phase = context.subscribe_phase();
    info!(
        refresh_interval_secs = config.unread.refresh_interval_secs,
        "watching unread counts"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                match snapshot {
                    Some(snapshot) => print_snapshot(&snapshot),
                    None => println!("Signed out."),
                }
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *phase.borrow_and_update();
                if current == ProviderPhase::Ready && context.snapshot().is_none() {
                    println!(
                        "Unread counts unavailable; retrying every {}s.",
                        config.unread.refresh_interval_secs
                    );
                }
            }
        }
    }

    session.sign_out();
    context.unmount().await;
    sweeper.abort();
    Ok(())
}
