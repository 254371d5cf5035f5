use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Contact details written into every status document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            name: String::from("omicron_status"),
            email: String::new(),
        }
    }
}

fn default_file_types() -> Vec<String> {
    vec![
        String::from("root"),
        String::from("h5"),
        String::from("xml.gz"),
    ]
}

/// Settings for one Omicron processing group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    pub channels: Vec<String>,
    pub frametype: String,
    #[serde(default)]
    pub state_flag: Option<String>,
    /// Length of a single Omicron analysis chunk in seconds
    pub segment_duration: f64,
    /// Padding overlapped between neighbouring chunks in seconds
    #[serde(default)]
    pub overlap_duration: f64,
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,
    /// Segwizard file holding the active segments of the state flag
    #[serde(default)]
    pub state_segments: Option<PathBuf>,
    /// LAL cache listing the available frames
    #[serde(default)]
    pub frame_cache: Option<PathBuf>,
    #[serde(default)]
    pub minimum_gap: Option<f64>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            channels: vec![String::from("L1:GDS-CALIB_STRAIN")],
            frametype: String::from("L1_HOFT_C00"),
            state_flag: Some(String::from("L1:DMT-ANALYSIS_READY:1")),
            segment_duration: 64.0,
            overlap_duration: 4.0,
            file_types: default_file_types(),
            state_segments: None,
            frame_cache: None,
            minimum_gap: None,
        }
    }
}

impl GroupConfig {
    /// Replace the configured channels if any were given on the command line
    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        if !channels.is_empty() {
            self.channels = channels;
        }
        self
    }

    /// Gaps shorter than this that touch a segment boundary cannot be processed
    pub fn minimum_gap(&self) -> f64 {
        self.minimum_gap.unwrap_or(self.segment_duration)
    }

    /// Half of the overlap is lost at each edge of a processed segment
    pub fn edge_padding(&self) -> f64 {
        self.overlap_duration / 2.0
    }
}

/// The full configuration file. Seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub author: Author,
    pub groups: BTreeMap<String, GroupConfig>,
}

impl Default for Config {
    /// Generate a template Config with a single example group
    fn default() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(String::from("GW"), GroupConfig::default());
        Self {
            author: Author::default(),
            groups,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Get the settings for a group, failing if the section is absent
    pub fn group(&self, name: &str) -> Result<&GroupConfig, ConfigError> {
        self.groups
            .get(name)
            .ok_or_else(|| ConfigError::MissingGroup(name.to_string()))
    }
}

/// Pick the interferometer prefix: explicit value, then environment, then the first channel
pub fn resolve_ifo(
    explicit: Option<&str>,
    environment: Option<&str>,
    channels: &[String],
) -> Result<String, ConfigError> {
    if let Some(ifo) = explicit.or(environment) {
        return Ok(ifo.to_string());
    }
    channels
        .first()
        .and_then(|c| c.split_once(':'))
        .map(|(ifo, _)| ifo.to_string())
        .ok_or(ConfigError::NoIfo)
}
