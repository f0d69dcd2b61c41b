use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::error::EvalError;
use crate::scoring::map::ScoringMap;
use crate::scoring::metrics::{ConfusionRecord, LabelCounts, Performance};
use crate::scoring::{check_file_lists, final_stop, load_scored_events, ScoredEvent};
use crate::types::{same_duration, Channel};

const COMPONENT: &str = "overlap";

/// Outcome of one reference/hypothesis pair, kept for the detail report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileScore {
    pub index: usize,
    pub reference: PathBuf,
    pub hypothesis: PathBuf,
    pub reference_labels: Vec<String>,
    pub hypothesis_labels: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub false_alarms: u64,
}

impl FileScore {
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.false_alarms
    }
}

/// Any-overlap scoring: a reference event is a hit when some hypothesis
/// event of the same class overlaps it, and a hypothesis event is a false
/// alarm when no reference event of its class overlaps it.
#[derive(Debug, Clone)]
pub struct OverlapScorer {
    map: ScoringMap,
    level: u32,
    sublevel: u32,
    channel: Channel,
    record: ConfusionRecord,
    details: Vec<FileScore>,
}

impl OverlapScorer {
    pub fn new(map: ScoringMap) -> Self {
        let record = ConfusionRecord::new(&map);
        Self {
            map,
            level: 0,
            sublevel: 0,
            channel: Channel::All,
            record,
            details: Vec::new(),
        }
    }

    pub fn from_config(map: ScoringMap, config: &ScoringConfig) -> Result<Self, EvalError> {
        Ok(Self::new(map).with_tier(config.level, config.sublevel, config.channel()?))
    }

    pub fn with_tier(mut self, level: u32, sublevel: u32, channel: Channel) -> Self {
        self.level = level;
        self.sublevel = sublevel;
        self.channel = channel;
        self
    }

    pub fn record(&self) -> &ConfusionRecord {
        &self.record
    }

    pub fn details(&self) -> &[FileScore] {
        &self.details
    }

    /// Scores every pair and returns the finalized statistics. Any failure
    /// aborts the whole run.
    pub fn run(
        &mut self,
        reference: &[PathBuf],
        hypothesis: &[PathBuf],
    ) -> Result<Performance, EvalError> {
        check_file_lists(COMPONENT, reference, hypothesis)?;
        self.reset();
        for (index, (ref_path, hyp_path)) in reference.iter().zip(hypothesis).enumerate() {
            self.score_files(index, ref_path, hyp_path)?;
        }
        Ok(self.finish())
    }

    /// Derived statistics over everything scored since the last reset.
    pub fn finish(&self) -> Performance {
        tracing::info!(
            component = COMPONENT,
            files = self.details.len(),
            total_duration = self.record.total_duration(),
            "overlap scoring complete"
        );
        self.record.finalize()
    }

    /// Loads one pair through the facade and scores it.
    pub fn score_files(
        &mut self,
        index: usize,
        reference_path: &Path,
        hypothesis_path: &Path,
    ) -> Result<&FileScore, EvalError> {
        let reference =
            load_scored_events(reference_path, &self.map, self.level, self.sublevel, self.channel)?;
        let hypothesis =
            load_scored_events(hypothesis_path, &self.map, self.level, self.sublevel, self.channel)?;
        self.score_pair(index, reference_path, hypothesis_path, &reference, &hypothesis)
    }

    /// Clears the accounting record and the detail rows.
    pub fn reset(&mut self) {
        self.record = ConfusionRecord::new(&self.map);
        self.details.clear();
    }

    /// Scores one pair of already-collapsed event lists into the record.
    pub fn score_pair(
        &mut self,
        index: usize,
        reference_path: &Path,
        hypothesis_path: &Path,
        reference: &[ScoredEvent],
        hypothesis: &[ScoredEvent],
    ) -> Result<&FileScore, EvalError> {
        let reference_stop = final_stop(reference);
        let hypothesis_stop = final_stop(hypothesis);
        if !same_duration(reference_stop, hypothesis_stop) {
            tracing::error!(
                component = COMPONENT,
                reference = %reference_path.display(),
                hypothesis = %hypothesis_path.display(),
                reference_stop,
                hypothesis_stop,
                "reference and hypothesis durations differ"
            );
            return Err(EvalError::DurationMismatch {
                reference: reference_path.to_path_buf(),
                hypothesis: hypothesis_path.to_path_buf(),
                reference_stop,
                hypothesis_stop,
            });
        }

        let pair = compare(reference, hypothesis, self.record.labels())?;
        self.record.merge(&pair)?;
        self.record.add_duration(reference_stop);

        let mut totals = LabelCounts::default();
        for label in pair.labels() {
            if let Some(counts) = pair.counts(label) {
                totals += *counts;
            }
        }
        self.details.push(FileScore {
            index,
            reference: reference_path.to_path_buf(),
            hypothesis: hypothesis_path.to_path_buf(),
            reference_labels: reference.iter().map(|event| event.label.clone()).collect(),
            hypothesis_labels: hypothesis.iter().map(|event| event.label.clone()).collect(),
            hits: totals.hits,
            misses: totals.misses,
            false_alarms: totals.false_alarms,
        });
        let detail = self.details.len() - 1;
        Ok(&self.details[detail])
    }

    pub fn write_details(&self, out: &mut dyn Write) -> Result<(), EvalError> {
        write_details(out, &self.details)
    }
}

/// Per-file listing: file names, label sequences and pair counts.
pub fn write_details(out: &mut dyn Write, scores: &[FileScore]) -> Result<(), EvalError> {
    for score in scores {
        write_detail(out, score).map_err(|e| EvalError::io("writing overlap details", "<sink>", e))?;
    }
    Ok(())
}

/// Any-overlap comparison of one pair into a fresh record over `labels`.
pub fn compare(
    reference: &[ScoredEvent],
    hypothesis: &[ScoredEvent],
    labels: &[String],
) -> Result<ConfusionRecord, EvalError> {
    let mut pair = ConfusionRecord::with_labels(labels.iter().cloned());
    for event in reference {
        let hit = hypothesis
            .iter()
            .any(|other| other.label == event.label && other.overlaps(event));
        let counts = LabelCounts {
            targets: 1,
            hits: u64::from(hit),
            misses: u64::from(!hit),
            false_alarms: 0,
        };
        pair.add_counts(&event.label, counts)?;
    }
    for event in hypothesis {
        let matched = reference
            .iter()
            .any(|other| other.label == event.label && other.overlaps(event));
        if !matched {
            let counts = LabelCounts {
                false_alarms: 1,
                ..LabelCounts::default()
            };
            pair.add_counts(&event.label, counts)?;
        }
    }
    Ok(pair)
}

fn write_detail(out: &mut dyn Write, score: &FileScore) -> std::io::Result<()> {
    writeln!(out, "{:>5}: {}", score.index, score.reference.display())?;
    writeln!(out, "{:>5}  {}", "", score.hypothesis.display())?;
    writeln!(out, "  Ref: {}", score.reference_labels.join(" "))?;
    writeln!(out, "  Hyp: {}", score.hypothesis_labels.join(" "))?;
    writeln!(
        out,
        "{:>6} (Hit: {}  Miss: {}  False Alarms: {}  Total: {})",
        "",
        score.hits,
        score.misses,
        score.false_alarms,
        score.total()
    )?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn events(spans: &[(f64, f64, &str)]) -> Vec<ScoredEvent> {
        spans
            .iter()
            .map(|&(start, stop, label)| ScoredEvent::new(start, stop, label, 1.0))
            .collect()
    }

    fn scorer() -> OverlapScorer {
        OverlapScorer::new(ScoringMap::seizure_default())
    }

    const REFERENCE: [(f64, f64, &str); 4] = [
        (0.0, 20.0, "bckg"),
        (20.0, 50.0, "seiz"),
        (50.0, 100.0, "bckg"),
        (100.0, 120.0, "seiz"),
    ];

    #[test]
    fn identical_annotations_score_perfectly() {
        let mut scorer = scorer();
        let reference = events(&REFERENCE);
        scorer
            .score_pair(0, Path::new("a.tse"), Path::new("a_hyp.tse"), &reference, &reference)
            .expect("matching durations");
        let performance = scorer.record().finalize();
        let seiz = performance.label("seiz").expect("seiz row");
        assert_eq!(seiz.counts.hits, 2);
        assert_eq!(seiz.counts.misses, 0);
        assert_eq!(seiz.counts.false_alarms, 0);
        assert_relative_eq!(seiz.rates.sensitivity, 1.0);
        assert_relative_eq!(seiz.rates.precision, 1.0);
        assert_relative_eq!(seiz.rates.f1_score, 1.0);
        assert_relative_eq!(performance.summary.total_duration, 120.0);
    }

    #[test]
    fn extra_hypothesis_event_is_a_false_alarm() {
        let mut scorer = scorer();
        let mut reference_spans = REFERENCE.to_vec();
        reference_spans.push((120.0, 130.0, "bckg"));
        let reference = events(&reference_spans);
        let mut hypothesis_spans = REFERENCE.to_vec();
        hypothesis_spans.push((121.0, 130.0, "seiz"));
        let hypothesis = events(&hypothesis_spans);

        let detail = scorer
            .score_pair(0, Path::new("r.tse"), Path::new("h.tse"), &reference, &hypothesis)
            .expect("matching durations")
            .clone();
        assert_eq!(detail.false_alarms, 1);
        let seiz = scorer.record().counts("seiz").expect("seiz row");
        assert_eq!(seiz.false_alarms, 1);
        assert_eq!(seiz.hits, 2);
        let bckg = scorer.record().counts("bckg").expect("bckg row");
        assert_eq!(bckg.misses, 1);
    }

    #[test]
    fn touching_events_are_not_hits() {
        let reference = events(&[(0.0, 10.0, "seiz"), (10.0, 20.0, "bckg")]);
        let hypothesis = events(&[(0.0, 10.0, "bckg"), (10.0, 20.0, "seiz")]);
        let labels = vec!["seiz".to_string(), "bckg".to_string()];
        let pair = compare(&reference, &hypothesis, &labels).expect("known labels");
        let seiz = pair.counts("seiz").expect("seiz row");
        assert_eq!((seiz.hits, seiz.misses, seiz.false_alarms), (0, 1, 1));

        let shifted = events(&[(0.0, 9.0, "bckg"), (9.0, 20.0, "seiz")]);
        let pair = compare(&reference, &shifted, &labels).expect("known labels");
        let seiz = pair.counts("seiz").expect("seiz row");
        assert_eq!((seiz.hits, seiz.misses, seiz.false_alarms), (1, 0, 0));
    }

    #[test]
    fn duration_mismatch_is_fatal() {
        let mut scorer = scorer();
        let reference = events(&[(0.0, 10.0, "bckg")]);
        let hypothesis = events(&[(0.0, 10.002, "bckg")]);
        let err = scorer
            .score_pair(0, Path::new("r.tse"), Path::new("h.tse"), &reference, &hypothesis)
            .expect_err("durations differ at the third decimal");
        assert!(matches!(err, EvalError::DurationMismatch { .. }));

        let close = events(&[(0.0, 10.0004, "bckg")]);
        assert!(scorer
            .score_pair(0, Path::new("r.tse"), Path::new("h.tse"), &reference, &close)
            .is_ok());
    }

    #[test]
    fn run_rejects_mismatched_lists() {
        let mut scorer = scorer();
        let err = scorer
            .run(&[PathBuf::from("a.tse")], &[])
            .expect_err("one list is empty");
        assert!(matches!(err, EvalError::FileListMismatch { reference: 1, hypothesis: 0 }));
    }

    #[test]
    fn details_follow_the_per_file_layout() {
        let mut scorer = scorer();
        let reference = events(&[(0.0, 5.0, "bckg"), (5.0, 8.0, "seiz")]);
        let hypothesis = events(&[(0.0, 8.0, "bckg")]);
        scorer
            .score_pair(3, Path::new("ref/a.tse"), Path::new("hyp/a.tse"), &reference, &hypothesis)
            .expect("matching durations");
        let mut out = Vec::new();
        scorer.write_details(&mut out).expect("in-memory sink");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "    3: ref/a.tse");
        assert_eq!(lines[1], "       hyp/a.tse");
        assert_eq!(lines[2], "  Ref: bckg seiz");
        assert_eq!(lines[3], "  Hyp: bckg");
        assert_eq!(lines[4], "       (Hit: 1  Miss: 1  False Alarms: 0  Total: 2)");
    }
}
