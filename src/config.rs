use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::types::Channel;

/// Which annotation bucket the scorers read, plus the external scorer setup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub sublevel: u32,
    #[serde(default = "default_channel")]
    pub channel: i64,
    #[serde(default)]
    pub nist: NistConfig,
}

fn default_channel() -> i64 {
    Channel::ALL_RAW
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            level: 0,
            sublevel: 0,
            channel: default_channel(),
            nist: NistConfig::default(),
        }
    }
}

impl ScoringConfig {
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EvalError::io("reading scoring config", path, e))?;
        serde_json::from_str(&data).map_err(|e| EvalError::json("parsing scoring config", e))
    }

    pub fn channel(&self) -> Result<Channel, EvalError> {
        Channel::from_raw(self.channel).ok_or_else(|| {
            EvalError::invalid_input(format!("channel must be -1 or a channel index, got {}", self.channel))
        })
    }
}

/// Parameters and file names for one KWSEval run. File names are relative to
/// `<run directory>/<output_directory>`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NistConfig {
    pub koefcorrect: f64,
    pub koefincorrect: f64,
    pub delta: f64,
    pub probterm: f64,
    pub fname_kwslist: String,
    pub fname_kwlist: String,
    pub fname_rttm: String,
    pub fname_ecf: String,
    pub fname_bsum: String,
    pub fname_log: String,
    pub fname_command: String,
    pub output_directory: String,
    pub basename: String,
    pub command: String,
    /// Seconds before the external tool is killed; `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl NistConfig {
    pub const DEFAULT_KOEF_CORRECT: f64 = 0.1;
    pub const DEFAULT_KOEF_INCORRECT: f64 = 1.0;
    pub const DEFAULT_DELTA: f64 = 0.5;
    pub const DEFAULT_PROBTERM: f64 = 0.0001;
    pub const DEFAULT_COMMAND: &'static str = "KWSEval";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;
}

impl Default for NistConfig {
    fn default() -> Self {
        Self {
            koefcorrect: Self::DEFAULT_KOEF_CORRECT,
            koefincorrect: Self::DEFAULT_KOEF_INCORRECT,
            delta: Self::DEFAULT_DELTA,
            probterm: Self::DEFAULT_PROBTERM,
            fname_kwslist: "kwslist.xml".to_string(),
            fname_kwlist: "kwlist.xml".to_string(),
            fname_rttm: "ref.rttm".to_string(),
            fname_ecf: "ecf.xml".to_string(),
            fname_bsum: "nist.bsum.txt".to_string(),
            fname_log: "nist.log".to_string(),
            fname_command: "nist.sh".to_string(),
            output_directory: "nist".to_string(),
            basename: "nist".to_string(),
            command: Self::DEFAULT_COMMAND.to_string(),
            timeout_secs: Some(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}
