//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::toolchain::LATEXMK;

/// Configuration for the compile pipeline, set once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Preserve working directories and dump submitted sources for
    /// inspection instead of cleaning up.
    #[serde(default)]
    pub debug: bool,
    /// Where sources are dumped when `debug` is set.
    #[serde(default)]
    pub source_dump_dir: Option<PathBuf>,
    /// Subprocess timeout in milliseconds; 0 disables the timeout
    /// (default: 60_000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Explicit path to the latexmk driver when it is not on `$PATH`.
    #[serde(default)]
    pub latexmk_path: Option<String>,
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            source_dump_dir: None,
            timeout_ms: default_timeout_ms(),
            latexmk_path: None,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn latexmk(&self) -> &str {
        self.latexmk_path.as_deref().unwrap_or(LATEXMK)
    }
}
