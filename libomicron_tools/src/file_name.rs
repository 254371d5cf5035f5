//! Parsing of LIGO-T050017 file names: `IFO-DESCRIPTION-GPSSTART-DURATION.EXT`
use std::path::{Path, PathBuf};

use super::segments::Segment;

/// A trigger file whose span is encoded in its name
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerFile {
    pub path: PathBuf,
    pub ifo: String,
    pub description: String,
    pub segment: Segment,
    pub extension: String,
}

impl TriggerFile {
    /// Parse the file name of a path. Returns None if it does not follow the convention.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        // Extensions can be compound (xml.gz), so split on the first dot after the duration
        let mut fields = name.splitn(4, '-');
        let ifo = fields.next()?;
        let description = fields.next()?;
        let start_str = fields.next()?;
        let (duration_str, extension) = fields.next()?.split_once('.')?;

        if ifo.is_empty() || description.is_empty() || extension.is_empty() {
            return None;
        }
        let start: f64 = start_str.parse().ok()?;
        let duration: f64 = duration_str.parse().ok()?;
        if duration < 0.0 {
            return None;
        }

        Some(Self {
            path: path.to_path_buf(),
            ifo: ifo.to_string(),
            description: description.to_string(),
            segment: Segment::new(start, start + duration),
            extension: extension.to_string(),
        })
    }
}

/// Split a channel name into its IFO prefix and the trigger file description
///
/// `L1:GDS-CALIB_STRAIN` becomes (`L1`, `GDS_CALIB_STRAIN_OMICRON`). A channel without a prefix
/// uses the fallback IFO.
pub fn channel_description(channel: &str, fallback_ifo: &str) -> (String, String) {
    let (ifo, name) = match channel.split_once(':') {
        Some((ifo, name)) => (ifo, name),
        None => (fallback_ifo, channel),
    };
    (
        ifo.to_string(),
        format!("{}_OMICRON", name.replace(['-', ':'], "_")),
    )
}

/// Make a channel name safe to use in a file name or URL
pub fn channel_file_tag(channel: &str) -> String {
    channel.replace([':', '/'], "-")
}
