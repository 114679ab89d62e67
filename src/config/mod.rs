mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in validate_config(&config)? {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from default locations, if one exists
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Option<Config>> {
    if let Some(path) = custom_path {
        return load_config(path).map(Some);
    }

    let default_paths = [
        "./segmux.toml",
        "~/.config/segmux/config.toml",
        "/etc/segmux/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path).map(Some);
        }
    }

    Ok(None)
}

/// Validate configuration, returning non-fatal warnings
pub fn validate_config(config: &Config) -> Result<Vec<String>> {
    let recorder = config
        .muxer_config()
        .context("Invalid recorder parameters")?;

    if recorder.backend.is_empty() {
        anyhow::bail!("Recorder backend name is missing");
    }

    recorder
        .check_tracks()
        .context("Invalid recorder track sections")?;

    if config.queues.video_capacity == 0 || config.queues.audio_capacity == 0 {
        anyhow::bail!("Queue capacities cannot be 0");
    }

    let mut warnings = recorder.validate();
    if config.params.is_some() && config.recorder != segmux_record::MuxerConfig::default() {
        warnings.push("both `params` and `[recorder]` are set; `params` wins".into());
    }
    for key in config.unknown.keys() {
        warnings.push(format!("unknown config section `{key}` ignored"));
    }

    Ok(warnings)
}
