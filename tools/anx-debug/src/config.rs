//! Tool configuration file
//!
//! ```toml
//! [driver]
//! hpd_poll_attempts = 500
//!
//! [simulation]
//! firmware_ready_after = 3
//! aux_failures = 2
//! edid_file = "panel.bin"
//! ```
//!
//! Every key is optional; missing keys take the hardware defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anx7625::sim::SimConfig;
use anx7625::DriverConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Simulated chip behaviour and the EDID it presents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    #[serde(flatten)]
    pub chip: SimConfig,

    /// Raw EDID to attach instead of the built-in 1280x720 one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edid_file: Option<PathBuf>,
}

impl SimulationConfig {
    /// Contents of `edid_file`, if one is set
    pub fn load_edid(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(path) = &self.edid_file else {
            return Ok(None);
        };
        fs::read(path).map(Some).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub driver: DriverConfig,
    pub simulation: SimulationConfig,
}

impl ToolConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anx.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[driver]\nhpd_poll_attempts = 50\n\n[simulation]\naux_failures = 2").unwrap();

        let config = ToolConfig::load(&path).unwrap();
        assert_eq!(config.driver.hpd_poll_attempts, 50);
        assert_eq!(config.driver.aux_poll_attempts, 150);
        assert_eq!(config.simulation.chip.aux_failures, 2);
        assert_eq!(config.simulation.chip.firmware_ready_after, 3);
        assert_eq!(config.simulation.edid_file, None);
    }

    #[test]
    fn test_generated_defaults_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anx.toml");
        fs::write(&path, ToolConfig::default().to_toml().unwrap()).unwrap();

        assert_eq!(ToolConfig::load(&path).unwrap(), ToolConfig::default());
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anx.toml");
        fs::write(&path, "[driver]\nhpd_poll_attempts = \"many\"\n").unwrap();

        assert!(matches!(ToolConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let err = ToolConfig::load(Path::new("/nonexistent/anx.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/anx.toml"));
    }

    #[test]
    fn test_edid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.bin");
        fs::write(&path, [0x00, 0xFF]).unwrap();

        let sim = SimulationConfig {
            edid_file: Some(path),
            ..SimulationConfig::default()
        };
        assert_eq!(sim.load_edid().unwrap(), Some(vec![0x00, 0xFF]));
        assert_eq!(SimulationConfig::default().load_edid().unwrap(), None);
    }
}
