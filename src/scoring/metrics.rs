use std::ops::AddAssign;

use serde::Serialize;

use crate::error::EvalError;
use crate::scoring::map::ScoringMap;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Raw event counts for one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub targets: u64,
    pub hits: u64,
    pub misses: u64,
    pub false_alarms: u64,
}

impl AddAssign for LabelCounts {
    fn add_assign(&mut self, other: Self) {
        self.targets += other.targets;
        self.hits += other.hits;
        self.misses += other.misses;
        self.false_alarms += other.false_alarms;
    }
}

/// One-vs-rest 2x2 table derived from the counts of every label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub tp: u64,
    pub tn: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl AddAssign for Confusion {
    fn add_assign(&mut self, other: Self) {
        self.tp += other.tp;
        self.tn += other.tn;
        self.fp += other.fp;
        self.fn_ += other.fn_;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

/// Derived statistics. A zero denominator yields 0 for the rate and for its
/// complement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rates {
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub negative_predictive_value: f64,
    pub miss_rate: f64,
    pub false_positive_rate: f64,
    pub false_discovery_rate: f64,
    pub false_omission_rate: f64,
    pub accuracy: f64,
    pub misclassification_rate: f64,
    pub prevalence: f64,
    pub f1_score: f64,
    pub mcc: f64,
    /// False alarms per 24 hours of reference recording.
    pub false_alarm_rate: f64,
}

impl Rates {
    /// `scope` names the label (or "summary") in zero-denominator warnings.
    pub fn compute(confusion: &Confusion, total_duration: f64, scope: &str) -> Self {
        let tp = confusion.tp as f64;
        let tn = confusion.tn as f64;
        let fp = confusion.fp as f64;
        let fn_ = confusion.fn_ as f64;
        let total = tp + tn + fp + fn_;

        let tpr = guarded_ratio(tp, tp + fn_, scope, "sensitivity");
        let tnr = guarded_ratio(tn, tn + fp, scope, "specificity");
        let ppv = guarded_ratio(tp, tp + fp, scope, "precision");
        let npv = guarded_ratio(tn, tn + fn_, scope, "negative_predictive_value");
        let accuracy = guarded_ratio(tp + tn, total, scope, "accuracy");
        let prevalence = guarded_ratio(tp + fn_, total, scope, "prevalence");

        let sensitivity = tpr.unwrap_or(0.0);
        let precision = ppv.unwrap_or(0.0);
        let f1_score =
            guarded_ratio(2.0 * precision * sensitivity, precision + sensitivity, scope, "f1_score")
                .unwrap_or(0.0);
        let mcc_denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        let mcc = guarded_ratio(tp * tn - fp * fn_, mcc_denominator, scope, "mcc").unwrap_or(0.0);
        let false_alarm_rate = guarded_ratio(fp, total_duration, scope, "false_alarm_rate")
            .map_or(0.0, |per_second| per_second * SECONDS_PER_DAY);

        Self {
            sensitivity,
            specificity: tnr.unwrap_or(0.0),
            precision,
            negative_predictive_value: npv.unwrap_or(0.0),
            miss_rate: complement(tpr),
            false_positive_rate: complement(tnr),
            false_discovery_rate: complement(ppv),
            false_omission_rate: complement(npv),
            accuracy: accuracy.unwrap_or(0.0),
            misclassification_rate: complement(accuracy),
            prevalence: prevalence.unwrap_or(0.0),
            f1_score,
            mcc,
            false_alarm_rate,
        }
    }
}

fn guarded_ratio(numerator: f64, denominator: f64, scope: &str, metric: &'static str) -> Option<f64> {
    if denominator == 0.0 {
        tracing::warn!(
            component = "metrics",
            label = scope,
            metric,
            "zero denominator, reporting 0"
        );
        return None;
    }
    Some(numerator / denominator)
}

fn complement(rate: Option<f64>) -> f64 {
    rate.map_or(0.0, |value| 1.0 - value)
}

/// Finalized statistics for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelStats {
    pub label: String,
    pub counts: LabelCounts,
    pub confusion: Confusion,
    pub rates: Rates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_value: Option<f64>,
}

/// Counts summed over all labels, with rates recomputed on the sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub counts: LabelCounts,
    pub confusion: Confusion,
    pub rates: Rates,
    pub total_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_weighted_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub labels: Vec<LabelStats>,
    pub summary: SummaryStats,
}

impl Performance {
    pub fn label(&self, label: &str) -> Option<&LabelStats> {
        self.labels.iter().find(|stats| stats.label == label)
    }

    /// ROC operating point `(fpr, tpr)` of one label.
    pub fn roc_point(&self, label: &str) -> Option<(f64, f64)> {
        self.label(label)
            .map(|stats| (stats.rates.false_positive_rate, stats.rates.sensitivity))
    }

    /// DET operating point `(fpr, fnr)` of one label.
    pub fn det_point(&self, label: &str) -> Option<(f64, f64)> {
        self.label(label)
            .map(|stats| (stats.rates.false_positive_rate, stats.rates.miss_rate))
    }
}

/// Per-run accumulator, zero-initialized in scoring-map order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfusionRecord {
    labels: Vec<String>,
    counts: Vec<LabelCounts>,
    weighted_values: Vec<Option<f64>>,
    total_duration: f64,
}

impl ConfusionRecord {
    pub fn new(map: &ScoringMap) -> Self {
        Self::with_labels(map.labels())
    }

    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let size = labels.len();
        Self {
            labels,
            counts: vec![LabelCounts::default(); size],
            weighted_values: vec![None; size],
            total_duration: 0.0,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self, label: &str) -> Option<&LabelCounts> {
        self.position(label).map(|index| &self.counts[index])
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn add_duration(&mut self, seconds: f64) {
        self.total_duration += seconds;
    }

    pub fn add_counts(&mut self, label: &str, counts: LabelCounts) -> Result<(), EvalError> {
        let index = self.require(label)?;
        self.counts[index] += counts;
        Ok(())
    }

    pub fn set_weighted_value(&mut self, label: &str, value: f64) -> Result<(), EvalError> {
        let index = self.require(label)?;
        self.weighted_values[index] = Some(value);
        Ok(())
    }

    /// Adds another partial record for the same labels. Counts and duration
    /// are summed, so merge order does not matter.
    pub fn merge(&mut self, other: &ConfusionRecord) -> Result<(), EvalError> {
        if self.labels.len() != other.labels.len()
            || other.labels.iter().any(|label| self.position(label).is_none())
        {
            return Err(EvalError::invalid_input(format!(
                "cannot merge records over different labels ({:?} vs {:?})",
                self.labels, other.labels
            )));
        }
        for (label, counts) in other.labels.iter().zip(&other.counts) {
            self.add_counts(label, *counts)?;
        }
        for (label, value) in other.labels.iter().zip(&other.weighted_values) {
            if let Some(value) = value {
                let index = self.require(label)?;
                self.weighted_values[index].get_or_insert(*value);
            }
        }
        self.total_duration += other.total_duration;
        Ok(())
    }

    /// Single derived-statistics pass over the accumulated counts.
    pub fn finalize(&self) -> Performance {
        let total_targets: u64 = self.counts.iter().map(|counts| counts.targets).sum();
        if total_targets == 0 {
            tracing::warn!(
                component = "metrics",
                labels = self.labels.len(),
                "no reference events were counted"
            );
        }
        let total_hits: u64 = self.counts.iter().map(|counts| counts.hits).sum();

        let mut labels = Vec::with_capacity(self.labels.len());
        let mut summary_counts = LabelCounts::default();
        let mut summary_confusion = Confusion::default();
        for ((label, counts), weighted_value) in self
            .labels
            .iter()
            .zip(&self.counts)
            .zip(&self.weighted_values)
        {
            let confusion = Confusion {
                tp: counts.hits,
                tn: total_hits - counts.hits,
                fp: counts.false_alarms,
                fn_: counts.misses,
                insertions: counts.false_alarms,
                deletions: counts.misses,
            };
            summary_counts += *counts;
            summary_confusion += confusion;
            labels.push(LabelStats {
                label: label.clone(),
                counts: *counts,
                confusion,
                rates: Rates::compute(&confusion, self.total_duration, label),
                weighted_value: *weighted_value,
            });
        }

        let weighted: Vec<f64> = self.weighted_values.iter().flatten().copied().collect();
        let average_weighted_value = if weighted.is_empty() {
            None
        } else {
            Some(weighted.iter().sum::<f64>() / weighted.len() as f64)
        };

        Performance {
            labels,
            summary: SummaryStats {
                counts: summary_counts,
                confusion: summary_confusion,
                rates: Rates::compute(&summary_confusion, self.total_duration, "summary"),
                total_duration: self.total_duration,
                average_weighted_value,
            },
        }
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|known| known == label)
    }

    fn require(&self, label: &str) -> Result<usize, EvalError> {
        self.position(label).ok_or_else(|| {
            EvalError::invalid_input(format!("label '{label}' is not part of the scoring map"))
        })
    }
}
