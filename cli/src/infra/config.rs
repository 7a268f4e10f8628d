//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::Result;
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::{ConfigError, DeployConfig};

/// Config file used when neither `--config` nor `HOIST_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "hoist.yaml";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
#[derive(Debug, Clone, Default)]
pub struct YamlConfigStore {
    explicit: Option<PathBuf>,
}

impl YamlConfigStore {
    /// `explicit` comes from `--config` and beats `HOIST_CONFIG`.
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<DeployConfig> {
        let path = self.path();
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(DeployConfig::default());
            }
            Err(e) => return Err(unreadable(e.to_string()).into()),
        };
        if content.trim().is_empty() {
            return Ok(DeployConfig::default());
        }
        serde_yaml::from_str(&content).map_err(|e| unreadable(e.to_string()).into())
    }

    fn path(&self) -> PathBuf {
        if let Some(p) = &self.explicit {
            return p.clone();
        }
        if let Ok(val) = std::env::var("HOIST_CONFIG") {
            if !val.is_empty() {
                return PathBuf::from(val);
            }
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}
