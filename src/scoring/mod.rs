use std::path::{Path, PathBuf};

use crate::annotation::Annotation;
use crate::error::EvalError;
use crate::scoring::map::ScoringMap;
use crate::types::{spans_overlap, Channel, Interval};

pub mod builder;
pub mod kwseval;
pub mod map;
pub mod metrics;
pub mod nist;
pub mod overlap;
pub mod report;
pub mod traits;

/// An interval reduced to its dominant label, mapped to its scoring class.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent {
    pub start: f64,
    pub stop: f64,
    pub label: String,
    pub confidence: f64,
}

impl ScoredEvent {
    pub fn new(start: f64, stop: f64, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            start,
            stop,
            label: label.into(),
            confidence,
        }
    }

    pub fn overlaps(&self, other: &ScoredEvent) -> bool {
        spans_overlap(self.start, self.stop, other.start, other.stop)
    }

    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Collapses intervals to scored events. Intervals without any label are
/// skipped; a label the map does not know fails the file.
pub fn collapse_events(
    intervals: &[Interval],
    map: &ScoringMap,
    source: &Path,
) -> Result<Vec<ScoredEvent>, EvalError> {
    let mut events = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let Some((raw, confidence)) = interval.dominant_label() else {
            tracing::warn!(
                component = "scoring",
                path = %source.display(),
                start = interval.start,
                stop = interval.stop,
                "skipping interval without labels"
            );
            continue;
        };
        let label = map.canonical(raw).ok_or_else(|| {
            EvalError::invalid_input(format!(
                "label '{raw}' in '{}' is not covered by the scoring map",
                source.display()
            ))
        })?;
        events.push(ScoredEvent::new(interval.start, interval.stop, label, confidence));
    }
    Ok(events)
}

/// Loads one file through the facade and collapses the requested bucket.
pub(crate) fn load_scored_events(
    path: &Path,
    map: &ScoringMap,
    level: u32,
    sublevel: u32,
    channel: Channel,
) -> Result<Vec<ScoredEvent>, EvalError> {
    let annotation = Annotation::open(path)?;
    let events = collapse_events(annotation.get(level, sublevel, channel)?, map, path)?;
    if events.is_empty() {
        return Err(EvalError::invalid_input(format!(
            "annotation '{}' has no scorable events",
            path.display()
        )));
    }
    Ok(events)
}

pub(crate) fn check_file_lists(
    component: &'static str,
    reference: &[PathBuf],
    hypothesis: &[PathBuf],
) -> Result<(), EvalError> {
    if reference.is_empty() || hypothesis.is_empty() || reference.len() != hypothesis.len() {
        tracing::error!(
            component,
            reference = reference.len(),
            hypothesis = hypothesis.len(),
            "file list error"
        );
        return Err(EvalError::FileListMismatch {
            reference: reference.len(),
            hypothesis: hypothesis.len(),
        });
    }
    Ok(())
}

/// Stop time of the last event, or 0 when there is none.
pub(crate) fn final_stop(events: &[ScoredEvent]) -> f64 {
    events.last().map_or(0.0, |event| event.stop)
}
