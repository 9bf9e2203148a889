use anyhow::{Context, Result};
use clap::Args;
use client::ApiClient;
use shared::config::client::Config;

use super::AuthArgs;

#[derive(Args, Debug)]
pub struct CommunitiesArgs {
    #[command(flatten)]
    pub auth: AuthArgs,
}

pub async fn list_communities(config: &Config, args: CommunitiesArgs) -> Result<()> {
    let api = ApiClient::from_config(config).context("failed to build API client")?;
    let communities = api
        .communities(&args.auth.token)
        .await
        .context("failed to fetch communities")?;

    if communities.is_empty() {
        println!("No communities.");
    }
    for community in &communities {
        match community.member_count {
            Some(members) => println!("{}  {} ({members} members)", community.id, community.name),
            None => println!("{}  {}", community.id, community.name),
        }
    }
    Ok(())
}
