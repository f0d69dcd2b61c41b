pub mod annotation;
pub mod config;
pub mod error;
pub mod scoring;
pub mod types;

pub use annotation::{compare_durations, load_annotations, Annotation, AnnotationFormat};
pub use config::{NistConfig, ScoringConfig};
pub use error::EvalError;
pub use scoring::builder::NistScorerBuilder;
pub use scoring::kwseval::ProcessRunner;
pub use scoring::map::ScoringMap;
pub use scoring::metrics::{ConfusionRecord, LabelCounts, Performance};
pub use scoring::nist::NistScorer;
pub use scoring::overlap::{FileScore, OverlapScorer};
pub use scoring::report::{Algorithm, AlgorithmReport, Meta, Report, REPORT_SCHEMA_VERSION};
pub use scoring::traits::{ToolInvocation, ToolRunner};
pub use types::{Channel, Interval};
