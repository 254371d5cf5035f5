use std::path::PathBuf;

use super::archive::{find_pending_files, TriggerArchive};
use super::config::{Author, GroupConfig};
use super::coverage::{ChannelCoverage, GapPolicy};
use super::error::{ConfigError, ReportError};
use super::file_name::channel_file_tag;
use super::gps::{gps_now, gps_to_utc_string, unix_now};
use super::html::Dashboard;
use super::latency_archive::{LatencyArchive, LatencySample};
use super::plot::{render_condor_plot, render_latency_plot};
use super::scheduler::{check_scheduler, Scheduler};
use super::segment_source::expected_coverage;
use super::segments::{Segment, SegmentList};
use super::status::{
    write_status, CheckKind, GroupMetadata, StatusCode, StatusDocument, Thresholds,
};

/// Fully resolved parameters of one status run
#[derive(Debug, Clone)]
pub struct StatusParams {
    pub group: String,
    pub ifo: String,
    pub gps_start: f64,
    pub gps_end: f64,
    pub archive_dir: PathBuf,
    pub production_dir: PathBuf,
    pub output_dir: PathBuf,
    pub latency_tag: String,
    pub skip_condor: bool,
    pub skip_file_checks: bool,
    pub skip_plots: bool,
    pub html: bool,
    pub thresholds: Thresholds,
    /// Overrides the group's minimum gap when set
    pub minimum_gap: Option<f64>,
}

impl StatusParams {
    pub fn span(&self) -> Segment {
        Segment::new(self.gps_start, self.gps_end)
    }

    /// Everything that went into the run, as shown on the dashboard
    pub fn describe(&self, group: &GroupConfig) -> Vec<(String, String)> {
        let optional = |value: &Option<PathBuf>| {
            value
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| String::from("None"))
        };
        vec![
            (String::from("group"), self.group.clone()),
            (String::from("ifo"), self.ifo.clone()),
            (String::from("gps-start"), self.gps_start.to_string()),
            (String::from("gps-end"), self.gps_end.to_string()),
            (String::from("channels"), group.channels.join(", ")),
            (String::from("frametype"), group.frametype.clone()),
            (
                String::from("state-flag"),
                group.state_flag.clone().unwrap_or_else(|| String::from("None")),
            ),
            (String::from("state-segments"), optional(&group.state_segments)),
            (String::from("frame-cache"), optional(&group.frame_cache)),
            (
                String::from("segment-duration"),
                group.segment_duration.to_string(),
            ),
            (
                String::from("overlap-duration"),
                group.overlap_duration.to_string(),
            ),
            (
                String::from("minimum-gap"),
                self.minimum_gap.unwrap_or(group.minimum_gap()).to_string(),
            ),
            (String::from("file-types"), group.file_types.join(", ")),
            (
                String::from("archive-directory"),
                self.archive_dir.to_string_lossy().to_string(),
            ),
            (
                String::from("production-directory"),
                self.production_dir.to_string_lossy().to_string(),
            ),
            (String::from("latency-archive-tag"), self.latency_tag.clone()),
            (
                String::from("warning-latency"),
                self.thresholds.warning.to_string(),
            ),
            (String::from("error-latency"), self.thresholds.error.to_string()),
            (String::from("unknown"), self.thresholds.unknown.to_string()),
        ]
    }
}

/// A status document that was written during the run
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenStatus {
    pub check: CheckKind,
    pub code: StatusCode,
    pub path: PathBuf,
}

/// Everything produced by a status run
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub statuses: Vec<WrittenStatus>,
    pub coverages: Vec<ChannelCoverage>,
    pub plots: Vec<(String, PathBuf)>,
    pub html: Option<PathBuf>,
}

impl StatusReport {
    pub fn status(&self, check: CheckKind) -> Option<&WrittenStatus> {
        self.statuses.iter().find(|s| s.check == check)
    }
}

/// Grade the latency check from every channel and file type.
///
/// The worst known latency sets the code; a missing latency (nothing archived) makes the check
/// UNKNOWN unless something is already critical.
pub fn latency_status(
    coverages: &[ChannelCoverage],
    thresholds: &Thresholds,
) -> (StatusCode, String) {
    let worst = coverages
        .iter()
        .filter_map(|c| c.latency.map(|l| (l, c)))
        .max_by(|a, b| a.0.total_cmp(&b.0));
    let unknown: Vec<String> = coverages
        .iter()
        .filter(|c| c.latency.is_none())
        .map(|c| format!("{} ({})", c.channel, c.file_type))
        .collect();

    let worst_code = worst
        .map(|(l, _)| thresholds.grade(l))
        .unwrap_or(StatusCode::Ok);
    let worst_text = match worst {
        Some((latency, coverage)) => format!(
            "Maximum latency is {:.2} hours for {} ({})",
            latency / 3600.0,
            coverage.channel,
            coverage.file_type
        ),
        None => String::from("No latency could be measured"),
    };

    if worst_code == StatusCode::Critical || unknown.is_empty() {
        (worst_code, worst_text)
    } else {
        (
            StatusCode::Unknown,
            format!("No archived data for {}. {}", unknown.join(", "), worst_text),
        )
    }
}

pub fn gaps_status(coverages: &[ChannelCoverage]) -> (StatusCode, String) {
    let gappy: Vec<String> = coverages
        .iter()
        .filter(|c| c.has_gaps())
        .map(|c| {
            format!(
                "{} ({}): {} gaps, {} s",
                c.channel,
                c.file_type,
                c.missing.len(),
                c.missing.duration()
            )
        })
        .collect();
    if gappy.is_empty() {
        (StatusCode::Ok, String::from("No gaps found in trigger archive"))
    } else {
        (
            StatusCode::Warning,
            format!("Gaps found in trigger archive. {}", gappy.join("; ")),
        )
    }
}

pub fn overlap_status(coverages: &[ChannelCoverage]) -> (StatusCode, String) {
    let overlapping: Vec<String> = coverages
        .iter()
        .filter(|c| c.has_overlaps())
        .map(|c| {
            format!(
                "{} ({}): {} s",
                c.channel,
                c.file_type,
                c.overlapping.duration()
            )
        })
        .collect();
    if overlapping.is_empty() {
        (StatusCode::Ok, String::from("No overlapping trigger files found"))
    } else {
        (
            StatusCode::Warning,
            format!("Overlapping trigger files found. {}", overlapping.join("; ")),
        )
    }
}

/// Writes status documents sharing one set of metadata
struct StatusWriter<'a> {
    params: &'a StatusParams,
    author: &'a Author,
    metadata: GroupMetadata,
    created_gps: f64,
}

impl StatusWriter<'_> {
    fn write(
        &self,
        report: &mut StatusReport,
        check: CheckKind,
        code: StatusCode,
        message: &str,
    ) -> Result<(), ReportError> {
        let document = StatusDocument::new(
            check,
            code,
            message,
            self.created_gps,
            &self.params.thresholds,
            self.author,
            &self.metadata,
        );
        let path = write_status(&self.params.output_dir, check, &document)?;
        report.statuses.push(WrittenStatus { check, code, path });
        Ok(())
    }
}

/// Check the coverage of one channel for every file type and record its latency
fn check_channel(
    channel: &str,
    group: &GroupConfig,
    params: &StatusParams,
    archive: &TriggerArchive,
    latency_archive: &LatencyArchive,
    expected: &SegmentList,
    policy: &GapPolicy,
) -> Result<(Vec<ChannelCoverage>, Vec<(String, Vec<LatencySample>)>), ReportError> {
    let span = params.span();
    let mut coverages = Vec::new();
    let mut histories = Vec::new();
    for file_type in group.file_types.iter() {
        let archived: Vec<Segment> = archive
            .find_files(channel, &params.ifo, file_type, &span)?
            .iter()
            .map(|f| f.segment)
            .collect();
        let pending: Vec<Segment> = find_pending_files(
            &params.production_dir,
            channel,
            &params.ifo,
            file_type,
            &span,
        )?
        .iter()
        .map(|f| f.segment)
        .collect();

        let coverage = ChannelCoverage::classify(
            channel,
            file_type,
            expected,
            &archived,
            &pending,
            params.gps_end,
            policy,
        );
        coverage.log_findings();

        let sample = LatencySample {
            gps: params.gps_end,
            latency_hours: coverage.latency_hours().unwrap_or(f64::NAN),
        };
        histories.push((
            file_type.clone(),
            latency_archive.append(channel, file_type, sample)?,
        ));
        coverages.push(coverage);
    }
    Ok((coverages, histories))
}

/// The main loop of omicron_status.
///
/// Checks the scheduler, then the trigger archive, writing a status document for each check
/// plus optional plots and dashboard into the output directory.
pub fn run_status(
    group: &GroupConfig,
    author: &Author,
    params: &StatusParams,
    scheduler: &dyn Scheduler,
) -> Result<StatusReport, ReportError> {
    if group.channels.is_empty() {
        return Err(ConfigError::NoChannels(params.group.clone()).into());
    }
    std::fs::create_dir_all(&params.output_dir)?;

    let writer = StatusWriter {
        params,
        author,
        metadata: GroupMetadata::new(&params.group, group),
        created_gps: gps_now(),
    };
    let mut report = StatusReport::default();

    if params.skip_condor {
        log::info!("Skipping scheduler check");
    } else {
        log::info!("Checking scheduler status for {}...", params.group);
        let check = check_scheduler(scheduler, &params.group)?;
        writer.write(&mut report, CheckKind::Condor, check.code, &check.message)?;
        if !params.skip_plots {
            let path = params
                .output_dir
                .join(format!("nagios-condor-{}.png", params.group));
            render_condor_plot(&check.jobs, unix_now(), &path)?;
            report
                .plots
                .push((format!("Job durations for {}", params.group), path));
        }
    }

    if params.skip_file_checks {
        log::info!("Skipping file checks");
        write_dashboard(&mut report, group, params)?;
        return Ok(report);
    }

    let span = params.span();
    log::info!("Checking trigger files over {span}...");
    let expected = expected_coverage(group, &span)?;
    log::info!(
        "Expected coverage: {} segments, {} s",
        expected.len(),
        expected.duration()
    );
    let policy = GapPolicy::new(params.minimum_gap.unwrap_or(group.minimum_gap()));
    let archive = TriggerArchive::new(&params.archive_dir);
    let latency_archive = LatencyArchive::for_tag(&params.output_dir, &params.latency_tag);

    for channel in group.channels.iter() {
        let (coverages, histories) = check_channel(
            channel,
            group,
            params,
            &archive,
            &latency_archive,
            &expected,
            &policy,
        )?;
        if !params.skip_plots {
            let path = params
                .output_dir
                .join(format!("nagios-latency-{}.png", channel_file_tag(channel)));
            let refs: Vec<&ChannelCoverage> = coverages.iter().collect();
            render_latency_plot(&histories, &refs, &span, &path)?;
            let caption = format!(
                "Latency and coverage for {channel} ({})",
                group.file_types.join(", ")
            );
            report.plots.push((caption, path));
        }
        report.coverages.extend(coverages);
    }

    let (code, message) = gaps_status(&report.coverages);
    writer.write(&mut report, CheckKind::Gaps, code, &message)?;
    let (code, message) = overlap_status(&report.coverages);
    writer.write(&mut report, CheckKind::Overlap, code, &message)?;
    let (code, message) = latency_status(&report.coverages, &params.thresholds);
    writer.write(&mut report, CheckKind::Latency, code, &message)?;

    write_dashboard(&mut report, group, params)?;
    Ok(report)
}

fn write_dashboard(
    report: &mut StatusReport,
    group: &GroupConfig,
    params: &StatusParams,
) -> Result<(), ReportError> {
    if !params.html {
        return Ok(());
    }
    let dashboard = Dashboard {
        title: format!("Omicron status: {}", params.group),
        generated: gps_to_utc_string(gps_now()),
        status_documents: report.statuses.iter().map(|s| s.path.clone()).collect(),
        plots: report.plots.clone(),
        parameters: params.describe(group),
    };
    report.html = Some(dashboard.write(&params.output_dir)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage_with_latency(channel: &str, latency: Option<f64>) -> ChannelCoverage {
        let expected = SegmentList::from_segments([Segment::new(0.0, 100.0)]);
        let mut coverage = ChannelCoverage::classify(
            channel,
            "h5",
            &expected,
            &[Segment::new(0.0, 100.0)],
            &[],
            100.0,
            &GapPolicy::new(10.0),
        );
        coverage.latency = latency;
        coverage
    }

    #[test]
    fn test_latency_status_thresholds() {
        let thresholds = Thresholds {
            warning: 3600.0,
            error: 7200.0,
            unknown: 600.0,
        };
        let ok = [coverage_with_latency("L1:A", Some(10.0))];
        assert_eq!(latency_status(&ok, &thresholds).0.code(), 0);
        let warn = [
            coverage_with_latency("L1:A", Some(10.0)),
            coverage_with_latency("L1:B", Some(3600.0)),
        ];
        let (code, message) = latency_status(&warn, &thresholds);
        assert_eq!(code.code(), 1);
        assert!(message.contains("L1:B"));
        let error = [coverage_with_latency("L1:A", Some(7200.0))];
        assert_eq!(latency_status(&error, &thresholds).0.code(), 2);
    }

    #[test]
    fn test_unknown_latency() {
        let thresholds = Thresholds::default();
        let coverages = [
            coverage_with_latency("L1:A", Some(10.0)),
            coverage_with_latency("L1:B", None),
        ];
        let (code, message) = latency_status(&coverages, &thresholds);
        assert_eq!(code, StatusCode::Unknown);
        assert!(message.contains("L1:B"));

        let critical = [
            coverage_with_latency("L1:A", Some(1.0e6)),
            coverage_with_latency("L1:B", None),
        ];
        assert_eq!(latency_status(&critical, &thresholds).0, StatusCode::Critical);
    }

    #[test]
    fn test_gaps_and_overlap_status() {
        let clean = [coverage_with_latency("L1:A", Some(0.0))];
        assert_eq!(gaps_status(&clean).0, StatusCode::Ok);
        assert_eq!(overlap_status(&clean).0, StatusCode::Ok);

        let expected = SegmentList::from_segments([Segment::new(0.0, 1000.0)]);
        let broken = [ChannelCoverage::classify(
            "L1:A",
            "root",
            &expected,
            &[Segment::new(0.0, 300.0), Segment::new(200.0, 500.0)],
            &[],
            1000.0,
            &GapPolicy::new(10.0),
        )];
        assert_eq!(gaps_status(&broken).0, StatusCode::Warning);
        assert_eq!(overlap_status(&broken).0, StatusCode::Warning);
    }
}
