//! Engine configuration
//!
//! Loaded from TOML, either as a bare table or under a `[materialize]`
//! section:
//!
//! ```toml
//! [materialize]
//! number_of_processes = 4
//! chunksize = 50000
//! coerce_float = true
//! run_timeout_secs = 600
//! ```
//!
//! Unset fields take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default number of rows per batch requested from a source
pub const DEFAULT_CHUNKSIZE: usize = 100_000;

/// Materialization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializeConfig {
    /// Worker pool size; `1` runs partitions sequentially
    pub number_of_processes: usize,
    /// Maximum rows per batch
    pub chunksize: usize,
    /// Deliver decimal columns as floating point
    pub coerce_float: bool,
    /// Upper bound on a whole run, in seconds
    pub run_timeout_secs: Option<u64>,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            number_of_processes: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            chunksize: DEFAULT_CHUNKSIZE,
            coerce_float: false,
            run_timeout_secs: None,
        }
    }
}

/// Config file layout with an optional `[materialize]` section.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    materialize: Option<MaterializeConfig>,
}

impl MaterializeConfig {
    /// Parse TOML text. A `[materialize]` section takes precedence over
    /// top-level keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| EngineError::Config(format!("invalid config: {}", e)))?;
        let config = match file.materialize {
            Some(section) => section,
            None => toml::from_str(text)
                .map_err(|e| EngineError::Config(format!("invalid config: {}", e)))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_processes == 0 {
            return Err(EngineError::Config(
                "number_of_processes must be at least 1".to_string(),
            ));
        }
        if self.chunksize == 0 {
            return Err(EngineError::Config("chunksize must be at least 1".to_string()));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(EngineError::Config(
                "run_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_processes(mut self, number_of_processes: usize) -> Self {
        self.number_of_processes = number_of_processes;
        self
    }

    pub fn with_chunksize(mut self, chunksize: usize) -> Self {
        self.chunksize = chunksize;
        self
    }

    pub fn with_coerce_float(mut self, coerce_float: bool) -> Self {
        self.coerce_float = coerce_float;
        self
    }

    /// Bound the whole run. The limit is stored in whole seconds: fractions
    /// are truncated and anything under one second becomes one second.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Run time limit, if any
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
