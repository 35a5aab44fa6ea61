//! Run configuration from `ideology.toml`.
//!
//! Search order:
//! 1. `--config <FILE>`
//! 2. `IDEOLOGY_CONFIG` environment variable
//! 3. `<store-dir>/ideology.toml`
//! 4. Built-in defaults
//!
//! ## Example
//!
//! ```toml
//! min-bills = 10
//! bin-width = 0.05
//! schema-versions = [2, 3]
//! chambers = ["house", "senate"]
//! banned-models = ["gpt-4o-mini"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IdeologyError, Result};
use crate::spec::Chamber;
use crate::stats::{bin_count, DEFAULT_BIN_WIDTH, MAX_BINS};

pub const CONFIG_FILE: &str = "ideology.toml";
pub const CONFIG_ENV: &str = "IDEOLOGY_CONFIG";

/// Evidence threshold for ranking and charts.
pub const DEFAULT_MIN_BILLS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// File this config came from, if any.
    pub source: Option<PathBuf>,

    /// Minimum bills behind a category score before it is ranked or plotted.
    pub min_bills: usize,

    /// Histogram bin width over [-1, 1].
    pub bin_width: f64,

    /// Schema versions visited by the all-combinations sweep.
    pub schema_versions: Vec<u32>,

    /// Chambers visited by the all-combinations sweep.
    pub chambers: Vec<Chamber>,

    /// Models skipped by the sweep.
    pub banned_models: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            min_bills: DEFAULT_MIN_BILLS,
            bin_width: DEFAULT_BIN_WIDTH,
            schema_versions: vec![2, 3],
            chambers: Chamber::ALL.to_vec(),
            banned_models: Vec::new(),
        }
    }
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    min_bills: Option<usize>,
    bin_width: Option<f64>,
    schema_versions: Option<Vec<u32>>,
    chambers: Option<Vec<String>>,
    banned_models: Option<Vec<String>>,
}

impl Config {
    /// Resolve and load. An explicitly named file must exist; a missing
    /// `<store-dir>/ideology.toml` just means defaults.
    pub fn load(explicit: Option<&Path>, store_dir: &Path) -> Result<Self> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match Self::resolve_path(explicit, env, store_dir) {
            Some(path) => Self::load_file(&path),
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Pick the config file, `None` when defaults apply.
    pub fn resolve_path(explicit: Option<&Path>, env: Option<PathBuf>, store_dir: &Path) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Some(p) = env.filter(|p| !p.as_os_str().is_empty()) {
            return Some(p);
        }
        let local = store_dir.join(CONFIG_FILE);
        local.exists().then_some(local)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| config_error(path, e))?;
        let config = Self::from_toml_str(&content, Some(path.to_path_buf()))?;
        debug!("Config loaded - path={}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str, source: Option<PathBuf>) -> Result<Self> {
        let display = source.clone().unwrap_or_else(|| PathBuf::from("<inline>"));
        let raw: RawConfig = toml::from_str(content).map_err(|e| config_error(&display, e))?;
        Self::from_raw(raw, source).map_err(|msg| config_error(&display, msg))
    }

    fn from_raw(raw: RawConfig, source: Option<PathBuf>) -> std::result::Result<Self, String> {
        let defaults = Self::default();

        let bin_width = raw.bin_width.unwrap_or(defaults.bin_width);
        if bin_count(bin_width).is_none() {
            return Err(format!(
                "bin-width must divide 2 evenly into at most {} bins, got {}",
                MAX_BINS, bin_width
            ));
        }

        let schema_versions = raw.schema_versions.unwrap_or(defaults.schema_versions);
        if schema_versions.is_empty() {
            return Err("schema-versions must not be empty".to_string());
        }

        let chambers = match raw.chambers {
            Some(names) => names
                .iter()
                .map(|c| Chamber::parse(c).map_err(|e| e.to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => defaults.chambers,
        };

        Ok(Self {
            source,
            min_bills: raw.min_bills.unwrap_or(defaults.min_bills),
            bin_width,
            schema_versions,
            chambers,
            banned_models: raw.banned_models.unwrap_or_default(),
        })
    }

    /// Apply command-line overrides.
    pub fn with_min_bills(mut self, min_bills: Option<usize>) -> Self {
        if let Some(n) = min_bills {
            self.min_bills = n;
        }
        self
    }

    pub fn is_banned(&self, model: &str) -> bool {
        self.banned_models.iter().any(|m| m == model)
    }

    /// One line per setting, for the startup log.
    pub fn display_summary(&self) -> String {
        let source = match &self.source {
            Some(p) => p.display().to_string(),
            None => "(defaults)".to_string(),
        };
        format!(
            "config={}, min_bills={}, bin_width={}, schema_versions={:?}, chambers={:?}, banned_models={}",
            source,
            self.min_bills,
            self.bin_width,
            self.schema_versions,
            self.chambers.iter().map(Chamber::as_str).collect::<Vec<_>>(),
            self.banned_models.len()
        )
    }
}

fn config_error(path: &Path, message: impl ToString) -> IdeologyError {
    IdeologyError::Config {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}
