use std::path::PathBuf;

use thiserror::Error;

use crate::types::Channel;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("I/O error while {context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed annotation '{}' (line {line}): {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("level/sublevel not found: {level}/{sublevel}")]
    TierNotFound { level: u32, sublevel: u32 },
    #[error("level/sublevel/channel not found: {level}/{sublevel}/{channel}")]
    ChannelNotFound {
        level: u32,
        sublevel: u32,
        channel: Channel,
    },
    #[error("unknown annotation format '{signature}' in '{}'", path.display())]
    UnknownFormat { path: PathBuf, signature: String },
    #[error("no annotation loaded")]
    NotLoaded,
    #[error(
        "duration mismatch between '{}' ({reference_stop:.4}) and '{}' ({hypothesis_stop:.4})",
        reference.display(),
        hypothesis.display()
    )]
    DurationMismatch {
        reference: PathBuf,
        hypothesis: PathBuf,
        reference_stop: f64,
        hypothesis_stop: f64,
    },
    #[error("file list error: {reference} reference vs {hypothesis} hypothesis files")]
    FileListMismatch { reference: usize, hypothesis: usize },
    #[error("{context}: {message}")]
    ExternalTool {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl EvalError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn external_tool(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::ExternalTool {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True for lookups of a level/sublevel/channel that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TierNotFound { .. } | Self::ChannelNotFound { .. })
    }
}
