//! KWSEval-backed scoring.
//!
//! Annotations are rendered into the four inputs KWSEval expects (keyword
//! list, RTTM reference, detection list and ECF manifest), the tool is run
//! through a [`ToolRunner`], and its block summary is read back into a
//! [`ConfusionRecord`].

use std::path::{Path, PathBuf};

use crate::config::NistConfig;
use crate::error::EvalError;
use crate::scoring::kwseval::{kwseval_invocation, NistPaths};
use crate::scoring::map::ScoringMap;
use crate::scoring::metrics::{ConfusionRecord, LabelCounts, Performance};
use crate::scoring::traits::ToolRunner;
use crate::scoring::{check_file_lists, final_stop, load_scored_events, ScoredEvent};
use crate::types::Channel;

const COMPONENT: &str = "nist";
const TERM_PREFIX: &str = "term-";

/// Column positions of a block summary row after splitting on `|`.
const COL_KEYWORD: usize = 1;
const COL_TARGETS: usize = 2;
const COL_HITS: usize = 3;
const COL_FALSE_ALARMS: usize = 4;
const COL_MISSES: usize = 5;
const COL_WEIGHTED_VALUE: usize = 6;

/// One file of the corpus as the tool sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    /// Tag without extension; the tool's file identifier.
    pub base: String,
    pub events: Vec<ScoredEvent>,
}

impl CorpusEntry {
    pub fn new(tag: &str, events: Vec<ScoredEvent>) -> Self {
        let base = Path::new(tag)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| tag.to_string());
        Self { base, events }
    }

    pub fn duration(&self) -> f64 {
        final_stop(&self.events)
    }
}

/// Inputs written for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NistInputs {
    pub tags: Vec<String>,
    pub durations: Vec<f64>,
    pub total_duration: f64,
}

/// One per-keyword row of the block summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummaryRow {
    pub keyword: String,
    pub counts: LabelCounts,
    pub weighted_value: f64,
}

pub(crate) struct NistScorerParts {
    pub config: NistConfig,
    pub map: ScoringMap,
    pub level: u32,
    pub sublevel: u32,
    pub channel: Channel,
    pub runner: Box<dyn ToolRunner>,
}

pub struct NistScorer {
    config: NistConfig,
    map: ScoringMap,
    level: u32,
    sublevel: u32,
    channel: Channel,
    runner: Box<dyn ToolRunner>,
    record: ConfusionRecord,
}

impl NistScorer {
    pub(crate) fn from_parts(parts: NistScorerParts) -> Self {
        let record = ConfusionRecord::new(&parts.map);
        Self {
            config: parts.config,
            map: parts.map,
            level: parts.level,
            sublevel: parts.sublevel,
            channel: parts.channel,
            runner: parts.runner,
            record,
        }
    }

    pub fn config(&self) -> &NistConfig {
        &self.config
    }

    pub fn record(&self) -> &ConfusionRecord {
        &self.record
    }

    pub fn runner_name(&self) -> String {
        self.runner.name()
    }

    /// Writes the inputs, runs the tool and reads its summary. Tool files land
    /// in `<run_directory>/<output_directory>`.
    pub fn run(
        &mut self,
        reference: &[PathBuf],
        hypothesis: &[PathBuf],
        run_directory: &Path,
    ) -> Result<Performance, EvalError> {
        check_file_lists(COMPONENT, reference, hypothesis)?;
        self.record = ConfusionRecord::new(&self.map);

        let paths = NistPaths::new(&self.config, run_directory);
        std::fs::create_dir_all(&paths.directory)
            .map_err(|e| EvalError::io("creating scorer directory", &paths.directory, e))?;

        let inputs = self.create_input(reference, hypothesis, &paths)?;
        self.score(&paths)?;
        self.read_results(&paths.bsum)?;
        self.record.add_duration(inputs.total_duration);

        tracing::info!(
            component = COMPONENT,
            files = inputs.tags.len(),
            total_duration = inputs.total_duration,
            "nist scoring complete"
        );
        Ok(self.record.finalize())
    }

    /// Loads both lists and writes kwlist, RTTM, kwslist and ECF.
    pub fn create_input(
        &self,
        reference: &[PathBuf],
        hypothesis: &[PathBuf],
        paths: &NistPaths,
    ) -> Result<NistInputs, EvalError> {
        check_file_lists(COMPONENT, reference, hypothesis)?;
        let tags = unique_tags(reference);

        let mut reference_entries = Vec::with_capacity(reference.len());
        let mut hypothesis_entries = Vec::with_capacity(hypothesis.len());
        for ((ref_path, hyp_path), tag) in reference.iter().zip(hypothesis).zip(&tags) {
            let events =
                load_scored_events(ref_path, &self.map, self.level, self.sublevel, self.channel)?;
            reference_entries.push(CorpusEntry::new(tag, events));
            let events =
                load_scored_events(hyp_path, &self.map, self.level, self.sublevel, self.channel)?;
            hypothesis_entries.push(CorpusEntry::new(tag, events));
        }

        let durations: Vec<f64> = reference_entries.iter().map(CorpusEntry::duration).collect();
        let total_duration: f64 = durations.iter().sum();

        write_text(&paths.kwlist, &render_kwlist(&self.map, &self.config.fname_ecf))?;
        write_text(&paths.rttm, &render_rttm(&reference_entries))?;
        write_text(
            &paths.kwslist,
            &render_kwslist(&self.map, &self.config.fname_kwlist, &hypothesis_entries),
        )?;
        let manifest: Vec<(&str, f64)> = reference_entries
            .iter()
            .map(|entry| (entry.base.as_str(), entry.duration()))
            .collect();
        write_text(&paths.ecf, &render_ecf(&manifest, total_duration))?;

        tracing::debug!(
            component = COMPONENT,
            directory = %paths.directory.display(),
            files = tags.len(),
            "wrote scorer inputs"
        );
        Ok(NistInputs {
            tags,
            durations,
            total_duration,
        })
    }

    /// Records the command line, then runs the tool.
    pub fn score(&self, paths: &NistPaths) -> Result<(), EvalError> {
        let invocation = kwseval_invocation(&self.config, paths);
        write_text(&paths.command, &format!("{}\n", invocation.command_line()))?;
        self.runner.run(&invocation).map_err(|err| {
            tracing::error!(
                component = COMPONENT,
                runner = %self.runner.name(),
                error = %err,
                "external scorer run failed"
            );
            err
        })
    }

    /// Folds the block summary into the record. Every map label starts with a
    /// weighted value of zero, so a label without a row still counts toward
    /// the average. Keywords outside the scoring map are logged and skipped.
    pub fn read_results(&mut self, bsum: &Path) -> Result<(), EvalError> {
        let text = std::fs::read_to_string(bsum)
            .map_err(|e| EvalError::io("reading block summary", bsum, e))?;
        let rows = parse_block_summary(&text, bsum)?;
        for label in self.record.labels().to_vec() {
            self.record.set_weighted_value(&label, 0.0)?;
        }
        for row in rows {
            let Some(label) = self
                .record
                .labels()
                .iter()
                .find(|label| label.eq_ignore_ascii_case(&row.keyword))
                .cloned()
            else {
                tracing::warn!(
                    component = COMPONENT,
                    keyword = %row.keyword,
                    path = %bsum.display(),
                    "skipping keyword outside the scoring map"
                );
                continue;
            };
            self.record.add_counts(&label, row.counts)?;
            self.record.set_weighted_value(&label, row.weighted_value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for NistScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NistScorer")
            .field("config", &self.config)
            .field("level", &self.level)
            .field("sublevel", &self.sublevel)
            .field("channel", &self.channel)
            .field("runner", &self.runner.name())
            .finish()
    }
}

/// Flat tags: every `/` becomes `_`, so `a/b/c.tse` is `a_b_c.tse`.
pub fn unique_tags(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|path| path.to_string_lossy().replace('/', "_"))
        .collect()
}

pub fn render_kwlist(map: &ScoringMap, ecf_name: &str) -> String {
    let mut out = format!(
        "<kwlist ecf_filename=\"{ecf_name}\" version=\"01\" language=\"english\" \
         compareNormalize=\"\" encoding=\"UTF-8\">\n"
    );
    for label in map.labels() {
        out.push_str(&format!(
            "  <kw kwid=\"{TERM_PREFIX}{label}\"><kwtext>{label}</kwtext></kw>\n"
        ));
    }
    out.push_str("</kwlist>");
    out
}

pub fn render_rttm(entries: &[CorpusEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        for event in &entry.events {
            out.push_str(&format!(
                "LEXEME {} 1 {:>12.4} {:>12.4} {} lex <NA> <NA>\n",
                entry.base,
                event.start,
                event.duration(),
                event.label
            ));
        }
    }
    out
}

/// Detections grouped per keyword in map order; the confidence is the score.
pub fn render_kwslist(map: &ScoringMap, kwlist_name: &str, entries: &[CorpusEntry]) -> String {
    let mut out = format!(
        "<kwslist kwlist_filename=\"{kwlist_name}\" language=\"english\" system_id=\"\">\n\n"
    );
    for label in map.labels() {
        out.push_str(&format!(
            "  <detected_kwlist kwid=\"{TERM_PREFIX}{label}\" search_time=\"999.0\" oov_count=\"0\">\n"
        ));
        for entry in entries {
            for event in entry.events.iter().filter(|event| event.label == label) {
                out.push_str(&format!(
                    "    <kw file=\"{}\" channel=\"1\" tbeg=\"{:.4}\" dur=\"{:.4}\" score=\"{:.4}\" decision=\"YES\"/>\n",
                    entry.base,
                    event.start,
                    event.duration(),
                    event.confidence
                ));
            }
        }
        out.push_str("  </detected_kwlist>\n\n");
    }
    out.push_str("</kwslist>");
    out
}

/// Manifest of `(base, duration)` pairs; each excerpt spans the whole file.
pub fn render_ecf(files: &[(&str, f64)], total_duration: f64) -> String {
    let mut out = format!(
        "<ecf source_signal_duration=\"{total_duration:.4}\" language=\"english\" version=\"\">\n"
    );
    for (base, duration) in files {
        out.push_str(&format!(
            "  <excerpt audio_filename=\"{base}\" channel=\"1\" tbeg=\"{:.4}\" dur=\"{duration:.4}\" source_type=\"bnews\"/>\n",
            0.0
        ));
    }
    out.push_str("</ecf>");
    out
}

/// Reads the per-keyword rows between the `Keyword` header and the
/// `Summary Totals` footer. A row with an empty target count is a keyword
/// that never occurred and reads as all zeros.
pub fn parse_block_summary(text: &str, source: &Path) -> Result<Vec<BlockSummaryRow>, EvalError> {
    let lines: Vec<&str> = text.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.contains("Keyword"))
        .ok_or_else(|| EvalError::parse(source, 0, "no 'Keyword' header in block summary"))?;
    let footer = lines[header..]
        .iter()
        .position(|line| collapse_whitespace(line).contains("Summary Totals"))
        .map(|offset| header + offset)
        .ok_or_else(|| EvalError::parse(source, 0, "no 'Summary Totals' footer in block summary"))?;

    let mut rows = Vec::new();
    for (index, line) in lines.iter().enumerate().take(footer).skip(header + 1) {
        let line_no = index + 1;
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() <= COL_WEIGHTED_VALUE || parts[COL_KEYWORD].is_empty() || is_rule(line) {
            continue;
        }
        let keyword = parts[COL_KEYWORD]
            .strip_prefix(TERM_PREFIX)
            .unwrap_or(parts[COL_KEYWORD])
            .to_string();
        if parts[COL_TARGETS].is_empty() {
            rows.push(BlockSummaryRow {
                keyword,
                counts: LabelCounts::default(),
                weighted_value: 0.0,
            });
            continue;
        }
        let counts = LabelCounts {
            targets: parse_count(&parts, COL_TARGETS, source, line_no)?,
            hits: parse_count(&parts, COL_HITS, source, line_no)?,
            misses: parse_count(&parts, COL_MISSES, source, line_no)?,
            false_alarms: parse_count(&parts, COL_FALSE_ALARMS, source, line_no)?,
        };
        let weighted_value = parts[COL_WEIGHTED_VALUE].parse::<f64>().map_err(|_| {
            EvalError::parse(
                source,
                line_no,
                format!("bad weighted value '{}'", parts[COL_WEIGHTED_VALUE]),
            )
        })?;
        rows.push(BlockSummaryRow {
            keyword,
            counts,
            weighted_value,
        });
    }
    Ok(rows)
}

fn parse_count(parts: &[&str], column: usize, source: &Path, line: usize) -> Result<u64, EvalError> {
    let field = parts[column];
    // Some KWSEval builds print integral counts as floats.
    field
        .parse::<u64>()
        .ok()
        .or_else(|| {
            field
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value >= 0.0 && value.fract() == 0.0)
                .map(|value| value as u64)
        })
        .ok_or_else(|| EvalError::parse(source, line, format!("bad count '{field}' in column {column}")))
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_rule(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '-' | '|' | '+' | '=' | ' ' | '\t'))
}

fn write_text(path: &Path, text: &str) -> Result<(), EvalError> {
    std::fs::write(path, text).map_err(|e| EvalError::io("writing scorer input", path, e))
}
