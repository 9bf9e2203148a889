use anyhow::{Context, Result};
use clap::Args;
use client::{ApiClient, UnreadApi};
use shared::{config::client::Config, models::UnreadSnapshot};

use super::AuthArgs;

#[derive(Args, Debug)]
pub struct UnreadArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn show_unread(config: &Config, args: UnreadArgs) -> Result<()> {
    let api = ApiClient::from_config(config).context("failed to build API client")?;
    let snapshot = api
        .unread_counts(&args.auth.token)
        .await
        .context("failed to fetch unread counts")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_snapshot(&snapshot);
    }
    Ok(())
}

pub fn print_snapshot(snapshot: &UnreadSnapshot) {
    if snapshot.is_empty() {
        println!("No communities.");
        return;
    }
    for entry in snapshot.channels() {
        let name = if entry.channel_name.is_empty() {
            entry.channel_id.as_str()
        } else {
            entry.channel_name.as_str()
        };
        println!("{:>5}  {name} ({})", entry.unread_count, entry.channel_id);
    }
    println!("total unread: {}", snapshot.total_unread());
}
