//! Engine configuration loading and config file resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, XrefError};
use crate::logic::{default_tables, load_tables, LogicTableRegistry};

/// Environment variable pointing at an alternate config file.
pub const CONFIG_ENV_VAR: &str = "XREFMATE_CONFIG";

/// Tunables shared by the CLI, the batch driver and the QC fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Items in flight at once in a batch run
    pub batch_concurrency: usize,
    /// Missing attributes at or above this weight are flagged as critical
    pub critical_weight: f64,
    /// Log ids per feedback lookup query
    pub feedback_lookup_batch: usize,
    /// Cap on log rows fetched for one QC analysis
    pub max_log_rows: usize,
    /// Custom logic tables file; the embedded tables are used when unset
    pub logic_tables: Option<PathBuf>,
    /// Fallback tracing filter when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: crate::batch::DEFAULT_BATCH_CONCURRENCY,
            critical_weight: crate::matching::DEFAULT_CRITICAL_WEIGHT,
            feedback_lookup_batch: 500,
            max_log_rows: 5000,
            logic_tables: None,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| XrefError::Config(format!("Invalid config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. Relative `logic_tables` paths resolve against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            XrefError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;
        if let (Some(tables), Some(dir)) = (config.logic_tables.as_ref(), path.parent()) {
            if tables.is_relative() {
                config.logic_tables = Some(dir.join(tables));
            }
        }
        Ok(config)
    }

    /// Resolve and load the active config.
    ///
    /// Priority order:
    /// 1. Explicit path (e.g. a CLI flag)
    /// 2. `XREFMATE_CONFIG` environment variable
    /// 3. `<config dir>/xrefmate/config.toml` if it exists
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_concurrency == 0 {
            return Err(XrefError::Config(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.feedback_lookup_batch == 0 {
            return Err(XrefError::Config(
                "feedback_lookup_batch must be at least 1".to_string(),
            ));
        }
        if self.max_log_rows == 0 {
            return Err(XrefError::Config("max_log_rows must be at least 1".to_string()));
        }
        if !self.critical_weight.is_finite() || self.critical_weight < 0.0 {
            return Err(XrefError::Config(format!(
                "critical_weight must be a non-negative number, got {}",
                self.critical_weight
            )));
        }
        Ok(())
    }

    /// Build the registry from the configured tables file, or the embedded
    /// defaults.
    pub fn load_registry(&self) -> Result<LogicTableRegistry> {
        let tables = match &self.logic_tables {
            Some(path) => load_tables(path).map_err(|e| XrefError::Config(format!("{:#}", e)))?,
            None => default_tables(),
        };
        LogicTableRegistry::new(tables)
    }
}

/// Default per-user config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("xrefmate").join("config.toml"))
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path().filter(|p| p.exists())
}
