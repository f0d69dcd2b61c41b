use std::io::Write;
use std::path::Path;

use crate::annotation::graph::AnnotationGraph;
use crate::annotation::AnnotationFormat;
use crate::error::EvalError;
use crate::types::{Channel, Interval};

/// Shared contract of the on-disk annotation formats. Each codec owns one
/// [`AnnotationGraph`] and delegates storage operations to it.
pub trait AnnotationCodec: Send + Sync {
    fn format(&self) -> AnnotationFormat;

    fn graph(&self) -> &AnnotationGraph;

    fn graph_mut(&mut self) -> &mut AnnotationGraph;

    /// Replaces the loaded content with the parsed text. `source` is only
    /// used in error messages.
    fn parse(&mut self, content: &str, source: &Path) -> Result<(), EvalError>;

    /// Serializes one level/sublevel.
    fn write_to(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError>;

    /// Human-readable listing of one level/sublevel.
    fn display(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError>;

    /// Renders fully in memory first, so a failure leaves no partial file.
    fn write(&self, path: &Path, level: u32, sublevel: u32) -> Result<(), EvalError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, level, sublevel)?;
        std::fs::write(path, buffer).map_err(|e| EvalError::io("writing annotation", path, e))
    }

    fn get(&self, level: u32, sublevel: u32, channel: Channel) -> Result<&[Interval], EvalError> {
        self.graph().get(level, sublevel, channel)
    }

    fn add(&mut self, duration: f64, label: &str, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.graph_mut().add(duration, label, level, sublevel)
    }

    fn delete(&mut self, label: &str, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.graph_mut().delete(label, level, sublevel)
    }
}

pub(crate) fn write_error(err: std::io::Error) -> EvalError {
    EvalError::io("formatting annotation", "<sink>", err)
}
