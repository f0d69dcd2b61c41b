use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::EvalError;

mod facade;
pub mod graph;
pub mod lbl;
#[cfg(test)]
mod tests;
pub mod traits;
pub mod tse;

pub use facade::{compare_durations, load_annotations, Annotation};

/// Number of leading lines searched for the `version = ...` signature.
const SIGNATURE_SEARCH_LINES: usize = 8;

/// Known on-disk annotation formats, identified by their version signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationFormat {
    Tse,
    Lbl,
}

impl AnnotationFormat {
    pub const ALL: [Self; 2] = [Self::Tse, Self::Lbl];

    pub fn signature(self) -> &'static str {
        match self {
            Self::Tse => "tse_v1.0.0",
            Self::Lbl => "lbl_v1.0.0",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Tse => "tse",
            Self::Lbl => "lbl",
        }
    }

    pub fn from_signature(signature: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.signature() == signature)
    }

    /// Reads the `version = <signature>` header: the first non-blank line.
    pub fn detect(path: &Path) -> Result<Self, EvalError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EvalError::io("reading annotation header", path, e))?;
        Self::detect_str(&content, path)
    }

    pub(crate) fn detect_str(content: &str, path: &Path) -> Result<Self, EvalError> {
        let header = content
            .lines()
            .take(SIGNATURE_SEARCH_LINES)
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();
        let signature = match header.split_once('=') {
            Some((key, value)) if key.trim() == "version" => value.trim(),
            _ => header,
        };
        Self::from_signature(signature).ok_or_else(|| EvalError::UnknownFormat {
            path: path.to_path_buf(),
            signature: signature.to_string(),
        })
    }
}

impl fmt::Display for AnnotationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AnnotationFormat {
    type Err = EvalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == wanted || format.signature() == wanted)
            .ok_or_else(|| EvalError::invalid_input(format!("unknown annotation type '{value}'")))
    }
}
