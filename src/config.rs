//! # Configuration
//!
//! maintlog reads an optional YAML file. Lookup order:
//!
//! 1. `--config <path>` on the command line (must exist).
//! 2. `<config dir>/maintlog/config.yaml` (via the `dirs` crate), if present.
//! 3. Compiled defaults.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `store_dir` | `--store-path` | Directory that holds the `.maintlog` store |
//! | `intervals` | see below | Miles between services, per service type |
//!
//! Default intervals: oil-change 3000, valve-adjustment 6000, tune-up 12000,
//! brakes 12000, brake-inspection 12000. Entries in `intervals` replace the
//! default for that type only.
//!
//! ```yaml
//! store_dir: /home/me/garage
//! intervals:
//!   oil-change: 2500
//! ```

use crate::models::ServiceType;
use crate::schedule::IntervalTable;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store_dir: Option<PathBuf>,
    pub intervals: BTreeMap<ServiceType, u64>,
}

impl Config {
    /// `<config dir>/maintlog/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("maintlog").join("config.yaml"))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty file deserializes as null
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text).context("Invalid config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&text).with_context(|| format!("In {}", path.display()))?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    /// Explicit path if given, else the default location if it exists, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some((service_type, _)) = self.intervals.iter().find(|(_, miles)| **miles == 0) {
            return Err(eyre!("Interval for {} must be greater than zero", service_type.as_str()));
        }
        Ok(())
    }

    pub fn interval_table(&self) -> IntervalTable {
        IntervalTable::default().with_overrides(&self.intervals)
    }

    /// Configured store directory, or `fallback`
    pub fn store_dir(&self, fallback: &Path) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| fallback.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store_dir.is_none());
        assert_eq!(config.interval_table(), IntervalTable::default());
        assert_eq!(config.store_dir(Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn test_interval_overrides() {
        let config = Config::from_yaml("intervals:\n  oil-change: 2500\n").unwrap();
        let table = config.interval_table();

        assert_eq!(table.get(ServiceType::OilChange), Some(2500));
        assert_eq!(table.get(ServiceType::TuneUp), Some(12_000));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_yaml("intervals:\n  tune-up: 0\n").unwrap_err();
        assert!(err.to_string().contains("tune-up"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::from_yaml("colour: red\n").is_err());
        assert!(Config::from_yaml("intervals:\n  wiper-blades: 5000\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "store_dir: /tmp/garage\nintervals:\n  valve-adjustment: 3000\n").unwrap();

        let config = Config::resolve(Some(&path)).unwrap();
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/garage")));
        assert_eq!(config.interval_table().get(ServiceType::ValveAdjustment), Some(3000));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(Config::resolve(Some(&temp.path().join("nope.yaml"))).is_err());
    }
}
