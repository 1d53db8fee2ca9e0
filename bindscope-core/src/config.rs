//! Configuration for bindscope

use crate::search::SearchMode;
use crate::BindscopeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Bindscope Configuration

[search]
# Emit a progress event (and yield to the host) every N visited nodes
progress_every = 10
# Mode used when none is given: "direct" or "representative-only"
default_mode = "direct"
# Skip invisible nodes together with their subtrees
skip_hidden = true
# Skip locked nodes together with their subtrees
skip_locked = true

[logging]
# tracing filter directive (RUST_LOG takes precedence)
filter = "warn"
"#;

/// Bindscope configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    #[serde(default)]
    pub default_mode: SearchMode,
    #[serde(default = "default_true")]
    pub skip_hidden: bool,
    #[serde(default = "default_true")]
    pub skip_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_progress_every() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_filter() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
            default_mode: SearchMode::default(),
            skip_hidden: true,
            skip_locked: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl SearchConfig {
    /// Progress cadence, never below one visit
    pub fn progress_every(&self) -> usize {
        self.progress_every.max(1)
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    pub fn with_pruning(mut self, skip_hidden: bool, skip_locked: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self.skip_locked = skip_locked;
        self
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(BindscopeError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| BindscopeError::ConfigParse(e.to_string()))
    }
}
