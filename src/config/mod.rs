mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Dispatchers `run` can hand holders to.
pub const DISPATCHERS: &[&str] = &["local", "renderfarm"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelforge.toml",
        "~/.config/reelforge/config.toml",
        "/etc/reelforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if !DISPATCHERS.contains(&config.dispatch.default.as_str()) {
        anyhow::bail!(
            "Unknown default dispatcher '{}' (expected one of: {})",
            config.dispatch.default,
            DISPATCHERS.join(", ")
        );
    }

    if config.renderfarm.command.trim().is_empty() {
        anyhow::bail!("Render farm command cannot be empty");
    }

    if let Some(priority) = config.renderfarm.priority {
        if !(0..=100).contains(&priority) {
            anyhow::bail!("Render farm priority must be between 0 and 100, got {}", priority);
        }
    }

    if config.renderfarm.split_size == Some(0) {
        anyhow::bail!("Render farm split_size must be positive");
    }

    if let Some(executable) = &config.dispatch.executable {
        if !executable.exists() {
            tracing::warn!("Dispatch executable does not exist: {:?}", executable);
        }
    }

    Ok(())
}
