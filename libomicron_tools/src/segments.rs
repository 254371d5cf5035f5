use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A half-open interval [start, end) of GPS seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn intersects(&self, other: &Segment) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Segment) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Move both edges inward by x seconds. The result may be empty.
    pub fn contract(&self, x: f64) -> Self {
        Self::new(self.start + x, self.end - x)
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// An ordered collection of disjoint, non-empty segments.
///
/// Every constructor coalesces its input, so touching or overlapping members are merged and
/// empty members are dropped. All of the set operations return coalesced lists as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments<I: IntoIterator<Item = Segment>>(segments: I) -> Self {
        let mut segments: Vec<Segment> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut coalesced: Vec<Segment> = Vec::with_capacity(segments.len());
        for seg in segments {
            match coalesced.last_mut() {
                Some(last) if seg.start <= last.end => last.end = last.end.max(seg.end),
                _ => coalesced.push(seg),
            }
        }
        Self {
            segments: coalesced,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total livetime covered by the list
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration()).sum()
    }

    /// The smallest single segment enclosing the whole list
    pub fn extent(&self) -> Option<Segment> {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => Some(Segment::new(first.start, last.end)),
            _ => None,
        }
    }

    pub fn union(&self, other: &SegmentList) -> Self {
        Self::from_segments(self.iter().chain(other.iter()).copied())
    }

    pub fn intersection(&self, other: &SegmentList) -> Self {
        let a = &self.segments;
        let b = &other.segments;
        let mut result = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let start = a[i].start.max(b[j].start);
            let end = a[i].end.min(b[j].end);
            if start < end {
                result.push(Segment::new(start, end));
            }
            if a[i].end < b[j].end {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::from_segments(result)
    }

    /// Everything in self that is not in other
    pub fn difference(&self, other: &SegmentList) -> Self {
        let b = &other.segments;
        let mut result = Vec::new();
        let mut first = 0;
        for seg in self.segments.iter() {
            let mut cursor = seg.start;
            while first < b.len() && b[first].end <= cursor {
                first += 1;
            }
            let mut k = first;
            while k < b.len() && b[k].start < seg.end {
                if b[k].start > cursor {
                    result.push(Segment::new(cursor, b[k].start));
                }
                cursor = cursor.max(b[k].end);
                if cursor >= seg.end {
                    break;
                }
                k += 1;
            }
            if cursor < seg.end {
                result.push(Segment::new(cursor, seg.end));
            }
        }
        Self::from_segments(result)
    }

    /// Contract every member inward by x seconds, dropping members that vanish
    pub fn contract(&self, x: f64) -> Self {
        Self::from_segments(self.iter().map(|s| s.contract(x)))
    }

    /// Check if a single member fully contains the segment
    pub fn contains(&self, seg: &Segment) -> bool {
        self.parent_of(seg).is_some()
    }

    /// Find the member that fully contains the segment, if any
    pub fn parent_of(&self, seg: &Segment) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(seg))
    }
}

impl FromIterator<Segment> for SegmentList {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self::from_segments(iter)
    }
}

impl<'a> IntoIterator for &'a SegmentList {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Find the time covered by two or more of the given (uncoalesced) segments
pub fn find_overlaps(segments: &[Segment]) -> SegmentList {
    let mut sorted: Vec<Segment> = segments.iter().filter(|s| !s.is_empty()).copied().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut overlaps = Vec::new();
    let mut covered_until = f64::NEG_INFINITY;
    for seg in sorted {
        if seg.start < covered_until {
            overlaps.push(Segment::new(seg.start, seg.end.min(covered_until)));
        }
        covered_until = covered_until.max(seg.end);
    }
    SegmentList::from_segments(overlaps)
}
