//! Service configuration
//!
//! TOML-backed settings for the engine and the cache policy. Everything
//! defaults to the conservative choice: no debug mode, and a zero cache
//! ceiling (never cache) until an operator raises it.

use anyhow::Context;
use latex_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Cache admission policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Largest value, in bytes, the cache will admit. Zero means never
    /// cache.
    #[serde(default)]
    pub max_bytes: usize,
    /// Also offer freshly compiled data URLs for admission. Off by
    /// default: data URLs routinely blow past any sane ceiling.
    #[serde(default)]
    pub cache_data_url_on_save: bool,
    /// Serve the `pdf` field as a store-relative path, which is small
    /// enough to cache.
    #[serde(default = "default_true")]
    pub pdf_returns_relative_path: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_bytes: 0,
            cache_data_url_on_save: false,
            pdf_returns_relative_path: true,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }
}
