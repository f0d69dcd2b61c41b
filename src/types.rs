use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Label name to confidence in [0, 1]. Several labels may share one interval.
pub type LabelScores = BTreeMap<String, f64>;

/// A labeled time span in seconds, `[start, stop)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub start: f64,
    pub stop: f64,
    pub labels: LabelScores,
}

impl Interval {
    pub fn new(start: f64, stop: f64, labels: LabelScores) -> Self {
        Self {
            start,
            stop,
            labels,
        }
    }

    /// Interval carrying exactly one label.
    pub fn single(start: f64, stop: f64, label: impl Into<String>, confidence: f64) -> Self {
        let mut labels = LabelScores::new();
        labels.insert(label.into(), confidence);
        Self::new(start, stop, labels)
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Strict overlap test: spans that only touch at an endpoint do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        spans_overlap(self.start, self.stop, other.start, other.stop)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Label used when a multi-label interval is collapsed to one class:
    /// highest confidence first, then the lexicographically smallest name.
    pub fn dominant_label(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        // BTreeMap iterates in lexicographic order, so only a strictly
        // higher confidence may replace the current pick.
        for (label, &confidence) in &self.labels {
            match best {
                Some((_, best_conf)) if confidence.total_cmp(&best_conf) != Ordering::Greater => {}
                _ => best = Some((label.as_str(), confidence)),
            }
        }
        best
    }

    pub(crate) fn same_span(&self, other: &Interval) -> bool {
        self.start == other.start && self.stop == other.stop
    }

    pub(crate) fn cmp_span(&self, other: &Interval) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then_with(|| self.stop.total_cmp(&other.stop))
    }
}

/// `[a_start, a_stop)` and `[b_start, b_stop)` share some time. Touching
/// endpoints do not count.
pub fn spans_overlap(a_start: f64, a_stop: f64, b_start: f64, b_stop: f64) -> bool {
    b_stop > a_start && b_start < a_stop
}

/// Equal to the millisecond, the tolerance used to decide whether two
/// annotations describe the same recording.
pub fn same_duration(a: f64, b: f64) -> bool {
    (a * 1000.0).round() == (b * 1000.0).round()
}

/// Recording lead an interval belongs to. `All` is the "every channel"
/// bucket used by the flat format and sorts before any indexed channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Channel {
    #[default]
    All,
    Index(u32),
}

impl Channel {
    pub const ALL_NAME: &'static str = "all";
    pub const ALL_RAW: i64 = -1;

    /// Maps the on-disk integer form (`-1` for all channels) to a channel.
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw == Self::ALL_RAW {
            return Some(Self::All);
        }
        u32::try_from(raw).ok().map(Self::Index)
    }

    pub fn raw(self) -> i64 {
        match self {
            Self::All => Self::ALL_RAW,
            Self::Index(index) => i64::from(index),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL_NAME),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_intervals_do_not_overlap() {
        let a = Interval::single(0.0, 10.0, "seiz", 1.0);
        let b = Interval::single(10.0, 20.0, "seiz", 1.0);
        let c = Interval::single(9.0, 20.0, "seiz", 1.0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn dominant_label_prefers_confidence_then_name() {
        let mut labels = LabelScores::new();
        labels.insert("seiz".to_string(), 0.4);
        labels.insert("bckg".to_string(), 0.6);
        let interval = Interval::new(0.0, 1.0, labels);
        assert_eq!(interval.dominant_label(), Some(("bckg", 0.6)));

        let mut tied = LabelScores::new();
        tied.insert("spsw".to_string(), 0.5);
        tied.insert("gped".to_string(), 0.5);
        let interval = Interval::new(0.0, 1.0, tied);
        assert_eq!(interval.dominant_label(), Some(("gped", 0.5)));

        let empty = Interval::new(0.0, 1.0, LabelScores::new());
        assert_eq!(empty.dominant_label(), None);
    }

    #[test]
    fn channel_raw_round_trip_and_order() {
        assert_eq!(Channel::from_raw(-1), Some(Channel::All));
        assert_eq!(Channel::from_raw(3), Some(Channel::Index(3)));
        assert_eq!(Channel::from_raw(-2), None);
        assert_eq!(Channel::Index(7).raw(), 7);
        assert!(Channel::All < Channel::Index(0));
        assert_eq!(Channel::All.to_string(), "all");
    }
}
