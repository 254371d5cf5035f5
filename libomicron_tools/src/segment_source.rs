use std::path::{Path, PathBuf};

use super::config::GroupConfig;
use super::error::SegmentError;
use super::segments::{Segment, SegmentList};

/// Where the expected coverage of a group comes from
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSource {
    /// Active segments of the state flag, read from a segwizard file
    StateSegments(PathBuf),
    /// Frame availability, read from a LAL cache and filtered by frame type
    FrameCache { path: PathBuf, frametype: String },
    /// No information; everything in the query span is expected
    FullSpan,
}

impl SegmentSource {
    /// Pick the source for a group, preferring state segments over frame availability
    pub fn for_group(group: &GroupConfig) -> Self {
        if let Some(path) = &group.state_segments {
            Self::StateSegments(path.clone())
        } else if let Some(path) = &group.frame_cache {
            Self::FrameCache {
                path: path.clone(),
                frametype: group.frametype.clone(),
            }
        } else {
            Self::FullSpan
        }
    }

    /// Read the raw segments from the source and restrict them to the span
    pub fn query(&self, span: &Segment) -> Result<SegmentList, SegmentError> {
        let segments = match self {
            Self::StateSegments(path) => read_segwizard(path)?,
            Self::FrameCache { path, frametype } => read_frame_cache(path, frametype)?,
            Self::FullSpan => SegmentList::from_segments([*span]),
        };
        Ok(segments.intersection(&SegmentList::from_segments([*span])))
    }
}

/// Expected coverage for a group: the source segments restricted to the span, with the
/// overlap padding removed from each edge.
pub fn expected_coverage(
    group: &GroupConfig,
    span: &Segment,
) -> Result<SegmentList, SegmentError> {
    let source = SegmentSource::for_group(group);
    match &source {
        SegmentSource::FullSpan => {
            if let Some(flag) = &group.state_flag {
                log::warn!(
                    "No state segments configured for {flag}; assuming the full span {span} is expected"
                );
            } else {
                log::warn!("No segment source configured; assuming the full span {span} is expected");
            }
        }
        SegmentSource::StateSegments(path) | SegmentSource::FrameCache { path, .. } => {
            log::info!("Reading expected segments from {}", path.to_string_lossy());
        }
    }
    Ok(source.query(span)?.contract(group.edge_padding()))
}

fn open_source(path: &Path) -> Result<String, SegmentError> {
    if !path.exists() {
        return Err(SegmentError::BadFilePath(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn bad_line(path: &Path, index: usize, line: &str) -> SegmentError {
    SegmentError::BadLine {
        path: path.to_path_buf(),
        line: index + 1,
        text: line.to_string(),
    }
}

/// Read a segwizard file. Rows are either `start end` or `index start end duration`.
pub fn read_segwizard(path: &Path) -> Result<SegmentList, SegmentError> {
    let contents = open_source(path)?;
    let mut segments = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entries: Vec<&str> = line.split_whitespace().collect();
        let (start, end) = match entries.len() {
            2 => (entries[0], entries[1]),
            4 => (entries[1], entries[2]),
            _ => return Err(bad_line(path, index, line)),
        };
        let start: f64 = start.parse().map_err(|_| bad_line(path, index, line))?;
        let end: f64 = end.parse().map_err(|_| bad_line(path, index, line))?;
        segments.push(Segment::new(start, end));
    }
    Ok(SegmentList::from_segments(segments))
}

/// Read a LAL cache (`OBS TYPE START DURATION URL`) keeping only the requested frame type
pub fn read_frame_cache(path: &Path, frametype: &str) -> Result<SegmentList, SegmentError> {
    let contents = open_source(path)?;
    let mut segments = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entries: Vec<&str> = line.split_whitespace().collect();
        if entries.len() != 5 {
            return Err(bad_line(path, index, line));
        }
        if entries[1] != frametype {
            continue;
        }
        let start: f64 = entries[2].parse().map_err(|_| bad_line(path, index, line))?;
        let duration: f64 = entries[3].parse().map_err(|_| bad_line(path, index, line))?;
        segments.push(Segment::new(start, start + duration));
    }
    Ok(SegmentList::from_segments(segments))
}
