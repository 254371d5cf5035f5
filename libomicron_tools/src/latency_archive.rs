use hdf5::File;
use ndarray::Array2;
use std::path::{Path, PathBuf};

use super::error::LatencyArchiveError;

/// Only the most recent samples are kept per channel and file type
pub const MAX_HISTORY: usize = 100_000;

/// A single latency measurement; latency is NaN when no data was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    pub gps: f64,
    pub latency_hours: f64,
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Each channel is a group, and each file type is an Nx2 dataset of (gps, latency hours) rows
/// within that group:
///
/// ```text
/// nagios-latency-<tag>.hdf
/// |---- L1:GDS-CALIB_STRAIN
/// |    |---- root(dset)
/// |    |---- h5(dset)
/// |    |---- xml.gz(dset)
/// ```
///
/// The file is read and then overwritten with no locking, so two runs must not share an archive.
#[derive(Debug, Clone)]
pub struct LatencyArchive {
    path: PathBuf,
}

impl LatencyArchive {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Archive path for a tag inside the output directory
    pub fn for_tag(output_dir: &Path, tag: &str) -> Self {
        Self::new(&output_dir.join(format!("nagios-latency-{tag}.hdf")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the history for a channel and file type. A missing file or key is an empty history.
    pub fn read_history(
        &self,
        channel: &str,
        file_type: &str,
    ) -> Result<Vec<LatencySample>, LatencyArchiveError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let file = File::open(&self.path)?;
        if !file.link_exists(channel) {
            return Ok(vec![]);
        }
        let group = file.group(channel)?;
        if !group.link_exists(file_type) {
            return Ok(vec![]);
        }
        let data = group.dataset(file_type)?.read_2d::<f64>()?;
        Ok(data
            .rows()
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|row| LatencySample {
                gps: row[0],
                latency_hours: row[1],
            })
            .collect())
    }

    /// Append a sample, keep the most recent MAX_HISTORY samples, and overwrite the stored
    /// history. Returns the updated history.
    pub fn append(
        &self,
        channel: &str,
        file_type: &str,
        sample: LatencySample,
    ) -> Result<Vec<LatencySample>, LatencyArchiveError> {
        let mut history = self.read_history(channel, file_type)?;
        history.push(sample);
        if history.len() > MAX_HISTORY {
            history.drain(..history.len() - MAX_HISTORY);
        }
        self.write_history(channel, file_type, &history)?;
        Ok(history)
    }

    fn write_history(
        &self,
        channel: &str,
        file_type: &str,
        history: &[LatencySample],
    ) -> Result<(), LatencyArchiveError> {
        let flat: Vec<f64> = history
            .iter()
            .flat_map(|s| [s.gps, s.latency_hours])
            .collect();
        let data = Array2::from_shape_vec((history.len(), 2), flat)?;

        let file = File::append(&self.path)?;
        let group = if file.link_exists(channel) {
            file.group(channel)?
        } else {
            file.create_group(channel)?
        };
        if group.link_exists(file_type) {
            group.unlink(file_type)?;
        }
        group
            .new_dataset_builder()
            .with_data(&data)
            .create(file_type)?;
        log::debug!(
            "Wrote {} latency samples for {} {} to {}",
            history.len(),
            channel,
            file_type,
            self.path.to_string_lossy()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_archive_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = LatencyArchive::for_tag(tmp.path(), "GW");
        assert!(archive.read_history("L1:X", "h5").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = LatencyArchive::for_tag(tmp.path(), "GW");
        let first = LatencySample {
            gps: 1000.0,
            latency_hours: 0.5,
        };
        let second = LatencySample {
            gps: 2000.0,
            latency_hours: f64::NAN,
        };
        archive.append("L1:X", "h5", first).unwrap();
        archive.append("L1:X", "h5", second).unwrap();
        archive.append("L1:X", "root", first).unwrap();

        let history = archive.read_history("L1:X", "h5").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], first);
        assert_eq!(history[1].gps, 2000.0);
        assert!(history[1].latency_hours.is_nan());
        assert_eq!(archive.read_history("L1:X", "root").unwrap(), vec![first]);
        assert!(archive.read_history("L1:Y", "h5").unwrap().is_empty());
        assert!(archive.read_history("L1:X", "xml.gz").unwrap().is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = LatencyArchive::for_tag(tmp.path(), "GW");
        let samples: Vec<LatencySample> = (0..MAX_HISTORY)
            .map(|i| LatencySample {
                gps: i as f64,
                latency_hours: 1.0,
            })
            .collect();
        archive.write_history("L1:X", "h5", &samples).unwrap();

        let history = archive
            .append(
                "L1:X",
                "h5",
                LatencySample {
                    gps: MAX_HISTORY as f64,
                    latency_hours: 2.0,
                },
            )
            .unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].gps, 1.0);

        let stored = archive.read_history("L1:X", "h5").unwrap();
        assert_eq!(stored.len(), MAX_HISTORY);
        assert_eq!(stored[MAX_HISTORY - 1].latency_hours, 2.0);
    }
}
