use std::path::PathBuf;

use clap::Args;
use directories::BaseDirs;

pub mod communities;
pub mod completion;
pub mod config;
pub mod mark_read;
pub mod unread;
pub mod watch;

/// Credentials shared by every command that talks to the backend.
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Bearer token issued by the Hemolink auth service
    #[arg(long, env = "HEMOLINK_TOKEN", hide_env_values = true)]
    pub token: String,
}

/// `config.yaml` in the user's config directory, when it exists.
pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("hemolink").join("config.yaml"))
        .filter(|path| path.exists())
}
