use std::path::{Path, PathBuf};

use super::error::ArchiveError;
use super::file_name::{channel_description, TriggerFile};
use super::segments::Segment;

/// Archive subdirectories bin files by the leading five digits of their GPS start
const GPS_DIRECTORY_SPAN: f64 = 100_000.0;

/// Identifies which trigger files belong to a channel and file type
#[derive(Debug, Clone)]
struct FileMatcher<'a> {
    ifo: String,
    description: String,
    file_type: &'a str,
    span: &'a Segment,
}

impl FileMatcher<'_> {
    fn matches(&self, file: &TriggerFile) -> bool {
        file.ifo == self.ifo
            && file.description == self.description
            && file.extension == self.file_type
            && file.segment.intersects(self.span)
    }

    /// Collect matching files from a single directory (not recursive)
    fn scan_directory(
        &self,
        directory: &Path,
        found: &mut Vec<TriggerFile>,
    ) -> Result<(), ArchiveError> {
        for item in directory.read_dir()? {
            let item_path = item?.path();
            if !item_path.is_file() {
                continue;
            }
            if let Some(file) = TriggerFile::from_path(&item_path) {
                if self.matches(&file) {
                    found.push(file);
                }
            }
        }
        Ok(())
    }
}

fn sort_by_start(files: &mut [TriggerFile]) {
    files.sort_by(|a, b| a.segment.start.total_cmp(&b.segment.start));
}

/// The trigger archive, laid out as `<root>/<IFO>/<DESCRIPTION>/<GPS5>/<file>`
#[derive(Debug, Clone)]
pub struct TriggerArchive {
    root: PathBuf,
}

impl TriggerArchive {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Get the directory holding all of the files for a channel
    pub fn channel_directory(&self, channel: &str, ifo: &str) -> PathBuf {
        let (ifo, description) = channel_description(channel, ifo);
        self.root.join(ifo).join(description)
    }

    /// Find the archived files for a channel and file type overlapping the span, sorted by start
    pub fn find_files(
        &self,
        channel: &str,
        ifo: &str,
        file_type: &str,
        span: &Segment,
    ) -> Result<Vec<TriggerFile>, ArchiveError> {
        let (file_ifo, description) = channel_description(channel, ifo);
        let matcher = FileMatcher {
            ifo: file_ifo,
            description,
            file_type,
            span,
        };
        let channel_dir = self.channel_directory(channel, ifo);

        let mut found = Vec::new();
        // Start one bin early to catch a file that straddles the bin boundary
        let first_bin = (span.start / GPS_DIRECTORY_SPAN).floor() as i64 - 1;
        let last_bin = (span.end / GPS_DIRECTORY_SPAN).floor() as i64;
        for bin in first_bin..=last_bin {
            let bin_dir = channel_dir.join(bin.to_string());
            if bin_dir.is_dir() {
                matcher.scan_directory(&bin_dir, &mut found)?;
            }
        }
        sort_by_start(&mut found);
        log::debug!(
            "Found {} archived {} files for {} in {}",
            found.len(),
            file_type,
            channel,
            channel_dir.to_string_lossy()
        );
        Ok(found)
    }
}

/// Find files still sitting in the production area, searching every subdirectory
pub fn find_pending_files(
    production_dir: &Path,
    channel: &str,
    ifo: &str,
    file_type: &str,
    span: &Segment,
) -> Result<Vec<TriggerFile>, ArchiveError> {
    let (file_ifo, description) = channel_description(channel, ifo);
    let matcher = FileMatcher {
        ifo: file_ifo,
        description,
        file_type,
        span,
    };

    let mut found = Vec::new();
    if !production_dir.is_dir() {
        log::debug!(
            "Production directory {} does not exist, no pending files",
            production_dir.to_string_lossy()
        );
        return Ok(found);
    }

    let mut directories = vec![production_dir.to_path_buf()];
    while let Some(directory) = directories.pop() {
        matcher.scan_directory(&directory, &mut found)?;
        for item in directory.read_dir()? {
            let item_path = item?.path();
            if item_path.is_dir() {
                directories.push(item_path);
            }
        }
    }
    sort_by_start(&mut found);
    Ok(found)
}
