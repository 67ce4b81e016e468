//! Phasing configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use vigil_store_lmdb::environment::REQUIRED_DBS;
use vigil_types::PhasingParams;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for the phasing subsystem of a node.
///
/// Can be loaded from a TOML file via [`PhasingConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhasingConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum size of the LMDB memory map, in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Maximum number of named LMDB databases.
    #[serde(default = "default_lmdb_max_dbs")]
    pub lmdb_max_dbs: u32,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether resolution outcomes are published on the event bus.
    #[serde(default = "default_true")]
    pub emit_events: bool,

    /// Consensus constants. Every node on a network must agree on these.
    #[serde(default)]
    pub params: PhasingParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./vigil_data")
}

fn default_lmdb_map_size() -> usize {
    1024 * 1024 * 1024
}

fn default_lmdb_max_dbs() -> u32 {
    REQUIRED_DBS
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PhasingConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// The configured log format. Unknown names are rejected by [`validate`](Self::validate).
    pub fn log_format(&self) -> LogFormat {
        match self.log_format.as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if !matches!(self.log_format.as_str(), "human" | "json") {
            return Err(NodeError::Config(format!(
                "unknown log format {:?}, expected \"human\" or \"json\"",
                self.log_format
            )));
        }
        if self.lmdb_max_dbs < REQUIRED_DBS {
            return Err(NodeError::Config(format!(
                "lmdb_max_dbs must be at least {REQUIRED_DBS}, got {}",
                self.lmdb_max_dbs
            )));
        }
        if self.params.max_finish_horizon == 0 {
            return Err(NodeError::Config("max_finish_horizon must be positive".into()));
        }
        Ok(())
    }
}

impl Default for PhasingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            lmdb_max_dbs: default_lmdb_max_dbs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            emit_events: default_true(),
            params: PhasingParams::default(),
        }
    }
}
