use std::io::Write;

use serde::Serialize;

use crate::error::EvalError;
use crate::scoring::metrics::{LabelStats, Performance, Rates, SummaryStats};
use crate::scoring::overlap::FileScore;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Overlap,
    Nist,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overlap => "overlap",
            Self::Nist => "nist",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Overlap => "NEDC OVERLAP SCORING",
            Self::Nist => "NEDC NIST (KWSEVAL) SCORING",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub results: Vec<AlgorithmReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub reference_list: String,
    pub hypothesis_list: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmReport {
    pub algorithm: Algorithm,
    pub total_duration: f64,
    pub performance: Performance,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FileScore>,
}

impl AlgorithmReport {
    pub fn new(algorithm: Algorithm, performance: Performance) -> Self {
        Self {
            algorithm,
            total_duration: performance.summary.total_duration,
            performance,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<FileScore>) -> Self {
        self.details = details;
        self
    }
}

/// Renders every algorithm section in the fixed-width text layout.
pub fn write_text_report(out: &mut dyn Write, report: &Report) -> Result<(), EvalError> {
    render_report(out, report).map_err(|e| EvalError::io("writing text report", "<sink>", e))
}

/// One algorithm's per-label and summary block.
pub fn write_performance(
    out: &mut dyn Write,
    algorithm: Algorithm,
    performance: &Performance,
) -> Result<(), EvalError> {
    render_performance(out, algorithm, performance)
        .map_err(|e| EvalError::io("writing text report", "<sink>", e))
}

fn render_report(out: &mut dyn Write, report: &Report) -> std::io::Result<()> {
    writeln!(out, "Generated: {}", report.meta.generated_at)?;
    writeln!(out, "Reference list: {}", report.meta.reference_list)?;
    writeln!(out, "Hypothesis list: {}", report.meta.hypothesis_list)?;
    writeln!(out, "Files: {}", report.meta.file_count)?;
    writeln!(out)?;
    for section in &report.results {
        writeln!(out, "{}", "=".repeat(78))?;
        writeln!(out, "{}:", section.algorithm.title())?;
        writeln!(out)?;
        render_performance(out, section.algorithm, &section.performance)?;
    }
    Ok(())
}

fn render_performance(
    out: &mut dyn Write,
    algorithm: Algorithm,
    performance: &Performance,
) -> std::io::Result<()> {
    writeln!(out, "PER LABEL RESULTS:")?;
    writeln!(out)?;
    for stats in &performance.labels {
        render_label(out, algorithm, stats)?;
    }
    render_summary(out, algorithm, &performance.summary)
}

fn render_label(out: &mut dyn Write, algorithm: Algorithm, stats: &LabelStats) -> std::io::Result<()> {
    writeln!(out, " LABEL: {}", stats.label.to_uppercase())?;
    writeln!(out)?;
    marked_count(out, "Targets", stats.counts.targets)?;
    marked_count(out, "Hits", stats.counts.hits)?;
    marked_count(out, "Misses", stats.counts.misses)?;
    marked_count(out, "False Alarms", stats.counts.false_alarms)?;
    count(out, "Insertions", stats.confusion.insertions)?;
    count(out, "Deletions", stats.confusion.deletions)?;
    writeln!(out)?;
    count(out, "True Positives (TP)", stats.confusion.tp)?;
    count(out, "True Negatives (TN)", stats.confusion.tn)?;
    count(out, "False Positives (FP)", stats.confusion.fp)?;
    count(out, "False Negatives (FN)", stats.confusion.fn_)?;
    writeln!(out)?;
    label_rates(out, &stats.rates)?;
    if algorithm == Algorithm::Nist {
        writeln!(
            out,
            "   {:>30}: {:>12.4}   <**",
            "TWV",
            stats.weighted_value.unwrap_or(0.0)
        )?;
    }
    writeln!(out)
}

fn label_rates(out: &mut dyn Write, rates: &Rates) -> std::io::Result<()> {
    percent(out, "Sensitivity (TPR, Recall)", rates.sensitivity)?;
    percent(out, "Specificity (TNR)", rates.specificity)?;
    percent(out, "Precision (PPV)", rates.precision)?;
    percent(out, "Negative Pred. Value (NPV)", rates.negative_predictive_value)?;
    percent(out, "Miss Rate (FNR)", rates.miss_rate)?;
    percent(out, "False Positive Rate (FPR)", rates.false_positive_rate)?;
    percent(out, "False Discovery Rate (FDR)", rates.false_discovery_rate)?;
    percent(out, "False Omission Rate (FOR)", rates.false_omission_rate)?;
    percent(out, "Accuracy", rates.accuracy)?;
    percent(out, "Misclassification Rate", rates.misclassification_rate)?;
    percent(out, "Prevalence", rates.prevalence)?;
    value(out, "F1 Score (F Ratio)", rates.f1_score, "")?;
    value(out, "Matthews (MCC)", rates.mcc, "")?;
    value(out, "False Alarm Rate", rates.false_alarm_rate, " per 24 hours")
}

fn render_summary(
    out: &mut dyn Write,
    algorithm: Algorithm,
    summary: &SummaryStats,
) -> std::io::Result<()> {
    writeln!(out, "SUMMARY:")?;
    writeln!(out)?;
    count(out, "Total", summary.counts.targets)?;
    count(out, "Hits", summary.counts.hits)?;
    count(out, "Misses", summary.counts.misses)?;
    count(out, "False Alarms", summary.counts.false_alarms)?;
    count(out, "Insertions", summary.confusion.insertions)?;
    count(out, "Deletions", summary.confusion.deletions)?;
    writeln!(out)?;
    count(out, "True Positives (TP)", summary.confusion.tp)?;
    count(out, "False Positives (FP)", summary.confusion.fp)?;
    writeln!(out)?;
    percent(out, "Sensitivity (TPR, Recall)", summary.rates.sensitivity)?;
    percent(out, "Miss Rate (FNR)", summary.rates.miss_rate)?;
    percent(out, "Accuracy", summary.rates.accuracy)?;
    percent(out, "Misclassification Rate", summary.rates.misclassification_rate)?;
    percent(out, "Prevalence", summary.rates.prevalence)?;
    value(out, "F1 Score", summary.rates.f1_score, "")?;
    value(out, "Matthews (MCC)", summary.rates.mcc, "")?;
    writeln!(out)?;
    value(out, "Total Duration", summary.total_duration, " secs")?;
    value(out, "Total False Alarms", summary.confusion.fp as f64, " events")?;
    value(out, "Total False Alarm Rate", summary.rates.false_alarm_rate, " per 24 hours")?;
    writeln!(out)?;
    if algorithm == Algorithm::Nist {
        writeln!(
            out,
            "   {:>30}: {:>12.4}   <**",
            "Average TWV",
            summary.average_weighted_value.unwrap_or(0.0)
        )?;
        writeln!(out)?;
    }
    Ok(())
}

fn marked_count(out: &mut dyn Write, name: &str, value: u64) -> std::io::Result<()> {
    writeln!(out, "   {name:>30}: {value:>12}   <**")
}

fn count(out: &mut dyn Write, name: &str, value: u64) -> std::io::Result<()> {
    writeln!(out, "   {name:>30}: {value:>12}")
}

fn percent(out: &mut dyn Write, name: &str, rate: f64) -> std::io::Result<()> {
    writeln!(out, "   {name:>30}: {:>12.4}%", rate * 100.0)
}

fn value(out: &mut dyn Write, name: &str, value: f64, unit: &str) -> std::io::Result<()> {
    writeln!(out, "   {name:>30}: {value:>12.4}{unit}")
}
