//! Engine configuration
//!
//! Stored in `~/.config/textflow/config.yaml`. Every field has a default, so
//! a partial file (or none at all) is fine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scan::{Algorithm, DEFAULT_MIN_PARTITION};
use crate::syntax::InjectionMapping;

/// Line-break scanner selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub algorithm: Algorithm,
    /// More than one enables the partitioned multithreaded wrapper
    pub threads: usize,
    /// Smallest partition handed to a scanner thread, in bytes
    pub min_partition: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            threads: 1,
            min_partition: DEFAULT_MIN_PARTITION,
        }
    }
}

/// Highlight worker / client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// How long the client waits for the worker to report ready
    pub init_timeout_ms: u64,
    /// Samples kept per metric by the performance tracker
    pub perf_window: usize,
    pub injections: InjectionMapping,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: 5_000,
            perf_window: 32,
            injections: InjectionMapping::default(),
        }
    }
}

impl HighlightConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scanner: ScannerConfig,
    pub highlight: HighlightConfig,
}

impl EngineConfig {
    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = crate::config_paths::config_file() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        Self::load_from(&path)
    }

    /// Load a specific config file, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
