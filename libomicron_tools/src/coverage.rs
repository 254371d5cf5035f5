use super::segments::{find_overlaps, Segment, SegmentList};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Decides whether an uncovered stretch of expected time is a real gap.
///
/// A stretch shorter than `minimum_gap` that touches an edge of its expected segment is too
/// short for Omicron to ever process, so it is reported as unresolvable instead of missing.
/// The comparison is strict: a stretch of exactly `minimum_gap` seconds is missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapPolicy {
    pub minimum_gap: f64,
}

impl GapPolicy {
    pub fn new(minimum_gap: f64) -> Self {
        Self { minimum_gap }
    }

    pub fn is_unresolvable(&self, gap: &Segment, parent: &Segment) -> bool {
        let at_boundary = gap.start == parent.start || gap.end == parent.end;
        at_boundary && gap.duration() < self.minimum_gap
    }
}

/// Latency in seconds between the end of the archived data and the query end.
///
/// None when nothing has been archived at all.
pub fn compute_latency(archived: &SegmentList, query_end: f64) -> Option<f64> {
    archived
        .extent()
        .map(|extent| (query_end - extent.end).max(0.0))
}

/// Availability of one channel and file type over the expected segments
///
/// `available`, `pending`, `unresolvable` and `missing` are disjoint and together cover
/// `expected` exactly. `overlapping` is independent and lists time covered by more than one
/// archived file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCoverage {
    pub channel: String,
    pub file_type: String,
    pub expected: SegmentList,
    pub available: SegmentList,
    pub pending: SegmentList,
    pub unresolvable: SegmentList,
    pub missing: SegmentList,
    pub overlapping: SegmentList,
    /// Seconds
    pub latency: Option<f64>,
}

impl ChannelCoverage {
    pub fn classify(
        channel: &str,
        file_type: &str,
        expected: &SegmentList,
        archived: &[Segment],
        pending: &[Segment],
        query_end: f64,
        policy: &GapPolicy,
    ) -> Self {
        let archived_list = SegmentList::from_segments(archived.iter().copied());
        let pending_list = SegmentList::from_segments(pending.iter().copied());

        let available = archived_list.intersection(expected);
        let pending = pending_list.intersection(expected).difference(&available);
        let remainder = expected.difference(&available).difference(&pending);

        let mut unresolvable = Vec::new();
        let mut missing = Vec::new();
        for gap in remainder.iter() {
            // remainder is a subset of expected, so every gap has a parent
            match expected.parent_of(gap) {
                Some(parent) if policy.is_unresolvable(gap, parent) => unresolvable.push(*gap),
                _ => missing.push(*gap),
            }
        }

        Self {
            channel: channel.to_string(),
            file_type: file_type.to_string(),
            expected: expected.clone(),
            available,
            pending,
            unresolvable: SegmentList::from_segments(unresolvable),
            missing: SegmentList::from_segments(missing),
            overlapping: find_overlaps(archived),
            latency: compute_latency(&archived_list, query_end),
        }
    }

    pub fn latency_hours(&self) -> Option<f64> {
        self.latency.map(|l| l / SECONDS_PER_HOUR)
    }

    pub fn has_gaps(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn has_overlaps(&self) -> bool {
        !self.overlapping.is_empty()
    }

    /// Log anything that needs attention. Findings are never fatal.
    pub fn log_findings(&self) {
        for gap in self.missing.iter() {
            log::warn!(
                "Missing {} data for {}: {} ({} s)",
                self.file_type,
                self.channel,
                gap,
                gap.duration()
            );
        }
        for overlap in self.overlapping.iter() {
            log::warn!(
                "Overlapping {} files for {}: {} ({} s)",
                self.file_type,
                self.channel,
                overlap,
                overlap.duration()
            );
        }
        match self.latency {
            Some(latency) => log::info!(
                "{} {} latency: {:.2} hours",
                self.channel,
                self.file_type,
                latency / SECONDS_PER_HOUR
            ),
            None => log::warn!("No archived {} files for {}", self.file_type, self.channel),
        }
    }
}
