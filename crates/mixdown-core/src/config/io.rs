//! YAML load/save for configuration types

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file
///
/// A missing file yields the defaults. An unreadable or malformed file is
/// logged and also yields the defaults, so a bad config never blocks a mix.
///
/// ```ignore
/// let config: MixerConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::debug!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    let parsed = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))
        .and_then(|contents| {
            serde_yaml::from_str::<T>(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", path))
        });

    match parsed {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MixStrategy, MixerConfig};

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: MixerConfig = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, MixerConfig::default());
    }

    #[test]
    fn test_load_malformed_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "packet_queue_capacity: [not, a, number").unwrap();

        let config: MixerConfig = load_config(&path);
        assert_eq!(config, MixerConfig::default());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = MixerConfig {
            packet_queue_capacity: 32,
            strategy: MixStrategy::Sum,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: MixerConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
