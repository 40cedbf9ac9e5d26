//! Mixer configuration
//!
//! Settings live in a single YAML file (`~/.config/mixdown/config.yaml` by
//! default). Every field has a default, so a partial file or no file at all
//! is valid.

mod io;
mod mixer;
mod paths;

pub use io::{load_config, save_config};
pub use mixer::{MixStrategy, MixerConfig};
pub use paths::default_config_path;
