use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::config::{Author, GroupConfig};
use super::error::StatusError;

/// Nagios status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusCode {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl StatusCode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// The checks that produce a status document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Condor,
    Gaps,
    Overlap,
    Latency,
}

impl CheckKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Condor => "condor",
            Self::Gaps => "gaps",
            Self::Overlap => "overlap",
            Self::Latency => "latency",
        }
    }

    pub fn file_name(&self, group: &str) -> String {
        format!("nagios-{}-{}.json", self.name(), group)
    }
}

/// Warning, error and staleness limits, all in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub error: f64,
    pub unknown: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 3600.0,
            error: 7200.0,
            unknown: 1200.0,
        }
    }
}

impl Thresholds {
    /// Grade a latency: below warning is OK, from warning up to error is WARNING, and at or
    /// above error is CRITICAL.
    pub fn grade(&self, latency: f64) -> StatusCode {
        if latency >= self.error {
            StatusCode::Critical
        } else if latency >= self.warning {
            StatusCode::Warning
        } else {
            StatusCode::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInterval {
    pub start_sec: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_sec: Option<u64>,
    pub num_status: u8,
    pub txt_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub group: String,
    pub channels: Vec<String>,
    pub frametype: String,
    #[serde(rename = "state-flag")]
    pub state_flag: Option<String>,
}

impl GroupMetadata {
    pub fn new(group: &str, config: &GroupConfig) -> Self {
        Self {
            group: group.to_string(),
            channels: config.channels.clone(),
            frametype: config.frametype.clone(),
            state_flag: config.state_flag.clone(),
        }
    }
}

/// A Nagios JSON status document.
///
/// The status holds for `unknown` seconds after creation; after that the monitor should treat
/// the check as stale and report UNKNOWN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub created_gps: u64,
    pub status_intervals: Vec<StatusInterval>,
    pub author: Author,
    pub omicron: GroupMetadata,
}

impl StatusDocument {
    pub fn new(
        check: CheckKind,
        code: StatusCode,
        message: &str,
        created_gps: f64,
        thresholds: &Thresholds,
        author: &Author,
        metadata: &GroupMetadata,
    ) -> Self {
        let unknown = thresholds.unknown.max(0.0) as u64;
        Self {
            created_gps: created_gps.max(0.0) as u64,
            status_intervals: vec![
                StatusInterval {
                    start_sec: 0,
                    end_sec: Some(unknown),
                    num_status: code.code(),
                    txt_status: message.to_string(),
                },
                StatusInterval {
                    start_sec: unknown,
                    end_sec: None,
                    num_status: StatusCode::Unknown.code(),
                    txt_status: format!(
                        "Omicron {} check for {} has not been updated in {} seconds",
                        check.name(),
                        metadata.group,
                        unknown
                    ),
                },
            ],
            author: author.clone(),
            omicron: metadata.clone(),
        }
    }

    /// The code reported while the document is fresh
    pub fn num_status(&self) -> Option<u8> {
        self.status_intervals.first().map(|i| i.num_status)
    }

    /// Write the document as JSON, overwriting any previous document at the path
    pub fn write(&self, path: &Path) -> Result<(), StatusError> {
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, StatusError> {
        let json_str = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json_str)?)
    }
}

/// Write a status document for a check into the output directory and return its path
pub fn write_status(
    output_dir: &Path,
    check: CheckKind,
    document: &StatusDocument,
) -> Result<PathBuf, StatusError> {
    let path = output_dir.join(check.file_name(&document.omicron.group));
    document.write(&path)?;
    log::info!(
        "{} status written to {}",
        check.name(),
        path.to_string_lossy()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        let thresholds = Thresholds {
            warning: 100.0,
            error: 200.0,
            unknown: 60.0,
        };
        assert_eq!(thresholds.grade(0.0), StatusCode::Ok);
        assert_eq!(thresholds.grade(99.9), StatusCode::Ok);
        assert_eq!(thresholds.grade(100.0), StatusCode::Warning);
        assert_eq!(thresholds.grade(199.9), StatusCode::Warning);
        assert_eq!(thresholds.grade(200.0), StatusCode::Critical);
        assert_eq!(thresholds.grade(5000.0), StatusCode::Critical);
    }

    #[test]
    fn test_document_schema() {
        let metadata = GroupMetadata::new("GW", &GroupConfig::default());
        let document = StatusDocument::new(
            CheckKind::Gaps,
            StatusCode::Warning,
            "gaps found",
            1187008882.0,
            &Thresholds::default(),
            &Author::default(),
            &metadata,
        );
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["created_gps"], 1187008882u64);
        assert_eq!(value["status_intervals"][0]["num_status"], 1);
        assert_eq!(value["status_intervals"][0]["end_sec"], 1200);
        assert_eq!(value["status_intervals"][1]["start_sec"], 1200);
        assert_eq!(value["status_intervals"][1]["num_status"], 3);
        assert!(value["status_intervals"][1].get("end_sec").is_none());
        assert_eq!(value["omicron"]["state-flag"], "L1:DMT-ANALYSIS_READY:1");
        assert_eq!(value["author"]["name"], "omicron_status");
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = GroupMetadata::new("GW", &GroupConfig::default());
        let mut document = StatusDocument::new(
            CheckKind::Condor,
            StatusCode::Critical,
            "broken",
            0.0,
            &Thresholds::default(),
            &Author::default(),
            &metadata,
        );
        let path = write_status(tmp.path(), CheckKind::Condor, &document).unwrap();
        assert_eq!(path, tmp.path().join("nagios-condor-GW.json"));

        document.status_intervals[0].num_status = StatusCode::Ok.code();
        write_status(tmp.path(), CheckKind::Condor, &document).unwrap();
        assert_eq!(StatusDocument::read(&path).unwrap().num_status(), Some(0));
    }
}
