//! Run options and persistent configuration.
//!
//! [`RunOptions`] control a single script run. [`CraftscriptConfig`] is stored
//! in `~/.craftscript/config.json` and supplies default run options plus the
//! directories of the file-backed waypoint and function stores.
//!
//! # Example
//!
//! ```no_run
//! use craftscript_core::config::CraftscriptConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = CraftscriptConfig::load();
//! assert!(config.run.op_limit > 0);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns `~/.craftscript`, or `None` when no home directory is known.
pub fn craftscript_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".craftscript"))
}

/// Options for one script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Maximum number of atomic commands a run may dispatch.
    pub op_limit: u64,
    /// Radius used for auto-scans and unpinned `block(...)` conditions.
    pub default_scan_radius: u32,
    /// Rescan the world before commands whose handlers ask for it.
    pub auto_scan_before_ops: bool,
    /// Terminate the run on the first failed command.
    pub stop_on_failure: bool,
    /// Maximum nesting of macro and custom function calls.
    pub max_call_depth: usize,
    /// Total loop iterations allowed across the run.
    pub max_loop_iterations: u64,
    /// Emit trace events on the journal.
    pub trace: bool,
    /// Actor id used for waypoint and function lookups.
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            op_limit: 10_000,
            default_scan_radius: 2,
            auto_scan_before_ops: true,
            stop_on_failure: false,
            max_call_depth: 10,
            max_loop_iterations: 100_000,
            trace: false,
            actor: "default".to_string(),
            correlation_id: None,
        }
    }
}

/// Persistent CraftScript configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CraftscriptConfig {
    #[serde(default)]
    pub run: RunOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoint_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_dir: Option<PathBuf>,
    /// Where run journals are written. Defaults to `~/.craftscript/logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl CraftscriptConfig {
    /// Load config from `~/.craftscript/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        craftscript_dir()
            .map(|dir| dir.join(CONFIG_FILENAME))
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.craftscript/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = craftscript_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory")
        })?;
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| craftscript_dir().map(|d| d.join("logs")))
    }
}
