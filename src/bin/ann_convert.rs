use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use seizure_scoring::{Annotation, AnnotationFormat};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatChoice {
    Tse,
    Lbl,
}

impl From<FormatChoice> for AnnotationFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Tse => AnnotationFormat::Tse,
            FormatChoice::Lbl => AnnotationFormat::Lbl,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Fill, filter and convert TSE/LBL annotation files")]
struct Args {
    input: PathBuf,
    /// Output file; the serialized annotation goes to standard output when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long, value_enum)]
    to: Option<FormatChoice>,
    /// Background-fill every channel up to this many seconds.
    #[arg(long)]
    duration: Option<f64>,
    #[arg(long, default_value = "bckg")]
    fill_label: String,
    /// Removes this label everywhere in the selected tier.
    #[arg(long)]
    delete: Option<String>,
    #[arg(long, default_value_t = 0)]
    level: u32,
    #[arg(long, default_value_t = 0)]
    sublevel: u32,
    /// Print the human-readable listing instead of the file format.
    #[arg(long, default_value_t = false)]
    display: bool,
    #[arg(long, env = "SEIZURE_SCORING_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("ann_convert: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut annotation = Annotation::new();
    let format = annotation
        .load(&args.input)
        .map_err(|err| err.to_string())?;
    tracing::info!(input = %args.input.display(), format = %format, "loaded");

    if let Some(label) = args.delete.as_deref() {
        annotation
            .delete(label, args.level, args.sublevel)
            .map_err(|err| err.to_string())?;
    }
    if let Some(duration) = args.duration {
        annotation
            .add(duration, &args.fill_label, args.level, args.sublevel)
            .map_err(|err| err.to_string())?;
    }
    if let Some(target) = args.to {
        annotation
            .set_type(target.into())
            .map_err(|err| err.to_string())?;
    }

    if args.display {
        let mut buffer = Vec::new();
        annotation
            .display(&mut buffer, args.level, args.sublevel)
            .map_err(|err| err.to_string())?;
        return write_stdout(&buffer);
    }
    match args.output.as_ref() {
        Some(path) => annotation
            .write(path, args.level, args.sublevel)
            .map_err(|err| err.to_string()),
        None => {
            let mut buffer = Vec::new();
            annotation
                .write_to(&mut buffer, args.level, args.sublevel)
                .map_err(|err| err.to_string())?;
            write_stdout(&buffer)
        }
    }
}

fn write_stdout(bytes: &[u8]) -> Result<(), String> {
    std::io::stdout()
        .lock()
        .write_all(bytes)
        .map_err(|err| format!("Failed to write to standard output: {err}"))
}
