use anyhow::{Context, Result};
use clap::Args;
use client::{ApiClient, UnreadApi};
use shared::{config::client::Config, models::ChannelId};

use super::AuthArgs;

#[derive(Args, Debug)]
pub struct MarkReadArgs {
    /// Community whose messages should be marked as read
    pub channel: String,

    #[command(flatten)]
    pub auth: AuthArgs,
}

pub async fn mark_read(config: &Config, args: MarkReadArgs) -> Result<()> {
    let api = ApiClient::from_config(config).context("failed to build API client")?;
    let channel_id = ChannelId::new(args.channel);
    api.mark_read(&args.auth.token, &channel_id)
        .await
        .with_context(|| format!("failed to mark {channel_id} as read"))?;
    println!("Marked {channel_id} as read");
    Ok(())
}
