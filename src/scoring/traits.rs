use std::path::PathBuf;
use std::time::Duration;

use crate::error::EvalError;

/// One fully resolved external scorer call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Receives both stdout and stderr of the child.
    pub log_path: PathBuf,
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    /// Single-line shell rendering, as written to the command file.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs the external scorer. Implementations block until the tool exits and
/// fail on a non-zero status, a spawn error or an expired timeout.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), EvalError>;

    fn name(&self) -> String;
}
