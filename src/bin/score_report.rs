use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use seizure_scoring::scoring::overlap::write_details;
use seizure_scoring::{
    Algorithm, AlgorithmReport, FileScore, Meta, NistScorerBuilder, OverlapScorer, Report,
    ScoringConfig, ScoringMap, REPORT_SCHEMA_VERSION,
};
use tracing_subscriber::EnvFilter;

#[path = "score_report/json_report_formatter.rs"]
mod json_report_formatter;
#[path = "score_report/text_report_formatter.rs"]
mod text_report_formatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AlgorithmChoice {
    Overlap,
    Nist,
    All,
}

impl AlgorithmChoice {
    fn includes(self, algorithm: Algorithm) -> bool {
        match self {
            Self::All => true,
            Self::Overlap => algorithm == Algorithm::Overlap,
            Self::Nist => algorithm == Algorithm::Nist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(about = "Score hypothesis annotations against a reference")]
struct Args {
    /// File with one reference annotation path per line.
    #[arg(long, env = "SEIZURE_SCORING_REF_LIST")]
    ref_list: PathBuf,
    /// File with one hypothesis annotation path per line, paired by position.
    #[arg(long, env = "SEIZURE_SCORING_HYP_LIST")]
    hyp_list: PathBuf,
    /// Scoring map JSON; the two-class seizure map when omitted.
    #[arg(long, env = "SEIZURE_SCORING_MAP")]
    map: Option<PathBuf>,
    #[arg(long, env = "SEIZURE_SCORING_CONFIG")]
    config: Option<PathBuf>,
    /// Run directory for the KWSEval inputs and outputs.
    #[arg(long, env = "SEIZURE_SCORING_ODIR", default_value = "output")]
    odir: PathBuf,
    #[arg(
        long,
        env = "SEIZURE_SCORING_ALGORITHM",
        value_enum,
        default_value_t = AlgorithmChoice::Overlap
    )]
    algorithm: AlgorithmChoice,
    #[arg(
        long,
        env = "SEIZURE_SCORING_FORMAT",
        value_enum,
        default_value_t = OutputFormat::Text
    )]
    output_format: OutputFormat,
    /// Report path; standard output when omitted.
    #[arg(long, env = "SEIZURE_SCORING_OUT")]
    out: Option<PathBuf>,
    /// Per-file overlap detail listing.
    #[arg(long, env = "SEIZURE_SCORING_DETAILS")]
    details: Option<PathBuf>,
    /// Used when RUST_LOG is unset.
    #[arg(long, env = "SEIZURE_SCORING_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("score_report: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match args.config.as_ref() {
        Some(path) => ScoringConfig::load(path).map_err(|err| err.to_string())?,
        None => ScoringConfig::default(),
    };
    let map = match args.map.as_ref() {
        Some(path) => ScoringMap::load(path).map_err(|err| err.to_string())?,
        None => ScoringMap::seizure_default(),
    };
    let reference = read_file_list(&args.ref_list)?;
    let hypothesis = read_file_list(&args.hyp_list)?;
    if reference.is_empty() || reference.len() != hypothesis.len() {
        return Err(format!(
            "file lists do not pair up: {} reference vs {} hypothesis files",
            reference.len(),
            hypothesis.len()
        ));
    }

    let mut results = Vec::new();
    if args.algorithm.includes(Algorithm::Overlap) {
        results.push(run_overlap(&map, &config, &reference, &hypothesis)?);
    }
    if args.algorithm.includes(Algorithm::Nist) {
        results.push(run_nist(&map, &config, &reference, &hypothesis, &args.odir)?);
    }

    let report = Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: Meta {
            generated_at: Utc::now().to_rfc3339(),
            reference_list: args.ref_list.to_string_lossy().into_owned(),
            hypothesis_list: args.hyp_list.to_string_lossy().into_owned(),
            file_count: reference.len(),
        },
        results,
    };

    if let Some(path) = args.details.as_ref() {
        write_detail_file(path, &report)?;
    }
    match args.output_format {
        OutputFormat::Json => json_report_formatter::write_report(args.out.as_deref(), &report)?,
        OutputFormat::Text => text_report_formatter::write_report(args.out.as_deref(), &report)?,
    }
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_overlap(
    map: &ScoringMap,
    config: &ScoringConfig,
    reference: &[PathBuf],
    hypothesis: &[PathBuf],
) -> Result<AlgorithmReport, String> {
    let mut scorer =
        OverlapScorer::from_config(map.clone(), config).map_err(|err| err.to_string())?;

    let progress = ProgressBar::new(reference.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("overlap");
    for (index, (ref_path, hyp_path)) in reference.iter().zip(hypothesis).enumerate() {
        progress.set_message(ref_path.display().to_string());
        if let Err(err) = scorer.score_files(index, ref_path, hyp_path) {
            progress.abandon_with_message("overlap scoring failed");
            return Err(err.to_string());
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let performance = scorer.finish();
    Ok(AlgorithmReport::new(Algorithm::Overlap, performance).with_details(scorer.details().to_vec()))
}

fn run_nist(
    map: &ScoringMap,
    config: &ScoringConfig,
    reference: &[PathBuf],
    hypothesis: &[PathBuf],
    odir: &Path,
) -> Result<AlgorithmReport, String> {
    let mut scorer = NistScorerBuilder::from_config(map.clone(), config)
        .and_then(NistScorerBuilder::build)
        .map_err(|err| err.to_string())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("running {} on {} files", config.nist.command, reference.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let outcome = scorer.run(reference, hypothesis, odir);
    spinner.finish_and_clear();

    let performance = outcome.map_err(|err| err.to_string())?;
    Ok(AlgorithmReport::new(Algorithm::Nist, performance))
}

/// One path per line; blank lines and `#` comments are skipped.
fn read_file_list(path: &Path) -> Result<Vec<PathBuf>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read file list '{}': {err}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

fn write_detail_file(path: &Path, report: &Report) -> Result<(), String> {
    let scores: Vec<FileScore> = report
        .results
        .iter()
        .filter(|section| section.algorithm == Algorithm::Overlap)
        .flat_map(|section| section.details.iter().cloned())
        .collect();
    if scores.is_empty() {
        tracing::warn!(path = %path.display(), "no overlap details to write");
        return Ok(());
    }
    let mut buffer = Vec::new();
    write_details(&mut buffer, &scores).map_err(|err| err.to_string())?;
    fs::write(path, buffer)
        .map_err(|err| format!("Failed to write details file '{}': {err}", path.display()))
}
