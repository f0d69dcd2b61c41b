use std::io::Write;
use std::path::{Path, PathBuf};

use crate::annotation::graph::AnnotationGraph;
use crate::annotation::lbl::LblAnnotation;
use crate::annotation::traits::AnnotationCodec;
use crate::annotation::tse::TseAnnotation;
use crate::annotation::AnnotationFormat;
use crate::error::EvalError;
use crate::types::{same_duration, Channel, Interval};

#[derive(Debug, Clone)]
enum Codec {
    Tse(TseAnnotation),
    Lbl(LblAnnotation),
}

impl Codec {
    fn from_graph(format: AnnotationFormat, graph: AnnotationGraph) -> Self {
        match format {
            AnnotationFormat::Tse => Self::Tse(TseAnnotation::from_graph(graph)),
            AnnotationFormat::Lbl => Self::Lbl(LblAnnotation::from_graph(graph)),
        }
    }

    fn into_graph(self) -> AnnotationGraph {
        match self {
            Self::Tse(codec) => codec.into_graph(),
            Self::Lbl(codec) => codec.into_graph(),
        }
    }

    fn as_codec(&self) -> &dyn AnnotationCodec {
        match self {
            Self::Tse(codec) => codec,
            Self::Lbl(codec) => codec,
        }
    }

    fn as_codec_mut(&mut self) -> &mut dyn AnnotationCodec {
        match self {
            Self::Tse(codec) => codec,
            Self::Lbl(codec) => codec,
        }
    }
}

/// Format-agnostic annotation handle. Holds at most one loaded file; every
/// accessor fails with [`EvalError::NotLoaded`] until something is loaded.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    codec: Option<Codec>,
}

impl Annotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a file in one step.
    pub fn open(path: &Path) -> Result<Self, EvalError> {
        let mut annotation = Self::new();
        annotation.load(path)?;
        Ok(annotation)
    }

    /// In-memory annotation of the given format.
    pub fn from_graph(format: AnnotationFormat, graph: AnnotationGraph) -> Self {
        Self {
            codec: Some(Codec::from_graph(format, graph)),
        }
    }

    /// Detects the format from the version header and parses the file. The
    /// previous content is discarded even if this load fails.
    pub fn load(&mut self, path: &Path) -> Result<AnnotationFormat, EvalError> {
        self.codec = None;
        let content = std::fs::read_to_string(path)
            .map_err(|e| EvalError::io("reading annotation", path, e))?;
        let format = AnnotationFormat::detect_str(&content, path)?;
        let mut codec = Codec::from_graph(format, AnnotationGraph::new());
        codec.as_codec_mut().parse(&content, path)?;
        tracing::debug!(
            component = "annotation",
            format = %format,
            path = %path.display(),
            "loaded annotation"
        );
        self.codec = Some(codec);
        Ok(format)
    }

    pub fn is_loaded(&self) -> bool {
        self.codec.is_some()
    }

    pub fn format(&self) -> Option<AnnotationFormat> {
        self.codec.as_ref().map(|codec| codec.as_codec().format())
    }

    pub fn graph(&self) -> Result<&AnnotationGraph, EvalError> {
        Ok(self.loaded()?.graph())
    }

    pub fn get(&self, level: u32, sublevel: u32, channel: Channel) -> Result<&[Interval], EvalError> {
        self.loaded()?.get(level, sublevel, channel)
    }

    pub fn write(&self, path: &Path, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.loaded()?.write(path, level, sublevel)
    }

    pub fn write_to(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.loaded()?.write_to(out, level, sublevel)
    }

    pub fn display(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.loaded()?.display(out, level, sublevel)
    }

    pub fn add(&mut self, duration: f64, label: &str, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.loaded_mut()?.add(duration, label, level, sublevel)
    }

    pub fn delete(&mut self, label: &str, level: u32, sublevel: u32) -> Result<(), EvalError> {
        self.loaded_mut()?.delete(label, level, sublevel)
    }

    /// Re-homes the loaded graph under another codec. Buckets are moved
    /// untouched; only the serialization changes.
    pub fn set_type(&mut self, format: AnnotationFormat) -> Result<(), EvalError> {
        let codec = self.codec.take().ok_or(EvalError::NotLoaded)?;
        if codec.as_codec().format() == format {
            self.codec = Some(codec);
            return Ok(());
        }
        self.codec = Some(Codec::from_graph(format, codec.into_graph()));
        Ok(())
    }

    fn loaded(&self) -> Result<&dyn AnnotationCodec, EvalError> {
        self.codec
            .as_ref()
            .map(Codec::as_codec)
            .ok_or(EvalError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut dyn AnnotationCodec, EvalError> {
        self.codec
            .as_mut()
            .map(Codec::as_codec_mut)
            .ok_or(EvalError::NotLoaded)
    }
}

/// Loads every file and returns the intervals of one bucket per file.
pub fn load_annotations(
    files: &[PathBuf],
    level: u32,
    sublevel: u32,
    channel: Channel,
) -> Result<Vec<Vec<Interval>>, EvalError> {
    files
        .iter()
        .map(|path| {
            let annotation = Annotation::open(path)?;
            Ok(annotation.get(level, sublevel, channel)?.to_vec())
        })
        .collect()
}

/// True when every reference/hypothesis pair ends at the same time, to the
/// millisecond. Each mismatching pair is logged.
pub fn compare_durations(
    reference: &[PathBuf],
    hypothesis: &[PathBuf],
    level: u32,
    sublevel: u32,
    channel: Channel,
) -> Result<bool, EvalError> {
    if reference.len() != hypothesis.len() {
        return Err(EvalError::FileListMismatch {
            reference: reference.len(),
            hypothesis: hypothesis.len(),
        });
    }
    let mut all_match = true;
    for (ref_path, hyp_path) in reference.iter().zip(hypothesis) {
        let ref_stop = final_stop(Annotation::open(ref_path)?.get(level, sublevel, channel)?);
        let hyp_stop = final_stop(Annotation::open(hyp_path)?.get(level, sublevel, channel)?);
        if !same_duration(ref_stop, hyp_stop) {
            tracing::warn!(
                component = "annotation",
                reference = %ref_path.display(),
                hypothesis = %hyp_path.display(),
                reference_stop = ref_stop,
                hypothesis_stop = hyp_stop,
                "annotation durations differ"
            );
            all_match = false;
        }
    }
    Ok(all_match)
}

/// Stop time of the last interval, or 0 for an empty list.
fn final_stop(intervals: &[Interval]) -> f64 {
    intervals.last().map_or(0.0, |interval| interval.stop)
}
