//! Standard locations for mixdown files

use std::path::PathBuf;

/// Default configuration file
///
/// Returns `<config dir>/mixdown/config.yaml`, falling back to
/// `~/.mixdown/config.yaml` and finally the working directory.
pub fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join("mixdown").join("config.yaml");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mixdown")
        .join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_ends_with_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("mixdown/config.yaml") || path.ends_with(".mixdown/config.yaml"));
    }
}
