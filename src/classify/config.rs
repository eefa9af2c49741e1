use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Name of the optional classifier config file at the project root.
pub const CONFIG_FILE: &str = "trace.config.yaml";

/// User overrides applied as the final classification phase.
///
/// Both lists are path prefixes. `include_override` wins when a path matches
/// both.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path prefixes forced non-production.
    pub exclude_from_analysis: Vec<String>,
    /// Path prefixes forced production.
    pub include_override: Vec<String>,
}

impl ClassifierConfig {
    /// Load configuration from `trace.config.yaml` in the given root.
    ///
    /// A missing file is not an error; unreadable or malformed YAML logs a
    /// warning and acts as an empty config.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yaml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(path = %config_path.display(), error = %err, "failed to parse classifier config, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "failed to read classifier config, using defaults");
                Self::default()
            }
        }
    }
}
