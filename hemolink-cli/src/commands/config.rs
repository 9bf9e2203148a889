use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use shared::config::client::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Format of the generated file
    #[arg(
        long,
        short,
        default_value = "yaml",
        help = "Format of the configuration file to generate (yaml, json or toml). Defaults to yaml."
    )]
    pub format: String,

    /// Where to write the file
    #[arg(long, short, help = "Output path. Defaults to config.<format> in the current directory.")]
    pub output: Option<PathBuf>,
}

/// Writes the default configuration in the requested format.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(args: &ConfigArgs) -> Result<()> {
    let config = Config::with_defaults();
    let format = args.format.trim().to_ascii_lowercase();

    let (serialized, extension) = match format.as_str() {
        "yaml" | "yml" => (serde_yml::to_string(&config)?, "yaml"),
        "json" => (serde_json::to_string_pretty(&config)?, "json"),
        "toml" => (toml::to_string_pretty(&config)?, "toml"),
        other => bail!("unsupported format '{other}'. Use 'yaml', 'json' or 'toml'."),
    };

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("config.{extension}")));
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write configuration to {}", path.display()))?;

    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(())
}
