use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::NistConfig;
use crate::error::EvalError;
use crate::scoring::traits::{ToolInvocation, ToolRunner};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Input and output locations of one KWSEval run, all under one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct NistPaths {
    pub directory: PathBuf,
    pub kwlist: PathBuf,
    pub kwslist: PathBuf,
    pub rttm: PathBuf,
    pub ecf: PathBuf,
    pub bsum: PathBuf,
    pub log: PathBuf,
    pub command: PathBuf,
    /// Prefix handed to `-f`; KWSEval derives its report names from it.
    pub output_prefix: PathBuf,
}

impl NistPaths {
    pub fn new(config: &NistConfig, run_directory: &Path) -> Self {
        let directory = run_directory.join(&config.output_directory);
        Self {
            kwlist: directory.join(&config.fname_kwlist),
            kwslist: directory.join(&config.fname_kwslist),
            rttm: directory.join(&config.fname_rttm),
            ecf: directory.join(&config.fname_ecf),
            bsum: directory.join(&config.fname_bsum),
            log: directory.join(&config.fname_log),
            command: directory.join(&config.fname_command),
            output_prefix: directory.join(&config.basename),
            directory,
        }
    }
}

/// Argument list of the KWSEval call.
pub fn kwseval_invocation(config: &NistConfig, paths: &NistPaths) -> ToolInvocation {
    let path_arg = |path: &Path| path.display().to_string();
    let args = vec![
        "-e".to_string(),
        path_arg(&paths.ecf),
        "-r".to_string(),
        path_arg(&paths.rttm),
        "-t".to_string(),
        path_arg(&paths.kwlist),
        "-s".to_string(),
        path_arg(&paths.kwslist),
        "-S".to_string(),
        config.delta.to_string(),
        "-p".to_string(),
        config.probterm.to_string(),
        "-k".to_string(),
        config.koefcorrect.to_string(),
        "-K".to_string(),
        config.koefincorrect.to_string(),
        "-o".to_string(),
        "-b".to_string(),
        "-d".to_string(),
        "-c".to_string(),
        "-f".to_string(),
        path_arg(&paths.output_prefix),
    ];
    ToolInvocation {
        program: config.command.clone(),
        args,
        log_path: paths.log.clone(),
        timeout: config.timeout_secs.map(Duration::from_secs),
    }
}

/// Runs the tool as a child process with stdout and stderr in the log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), EvalError> {
        let log = File::create(&invocation.log_path)
            .map_err(|e| EvalError::io("creating tool log", &invocation.log_path, e))?;
        let log_err = log
            .try_clone()
            .map_err(|e| EvalError::io("creating tool log", &invocation.log_path, e))?;

        tracing::debug!(
            component = "kwseval",
            command = %invocation.command_line(),
            log = %invocation.log_path.display(),
            "spawning external scorer"
        );
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| {
                EvalError::external_tool(
                    "spawning external scorer",
                    format!("{}: {e}", invocation.program),
                )
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(EvalError::external_tool("waiting for external scorer", e)),
            }
            if let Some(limit) = invocation.timeout {
                if started.elapsed() >= limit {
                    // Kill and reap; the timeout is the reported error.
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::error!(
                        component = "kwseval",
                        program = %invocation.program,
                        timeout_secs = limit.as_secs(),
                        "external scorer timed out"
                    );
                    return Err(EvalError::external_tool(
                        "running external scorer",
                        format!("{} did not finish within {}s", invocation.program, limit.as_secs()),
                    ));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            tracing::error!(
                component = "kwseval",
                program = %invocation.program,
                status = %status,
                log = %invocation.log_path.display(),
                "external scorer failed"
            );
            return Err(EvalError::external_tool(
                "running external scorer",
                format!(
                    "{} exited with {status}; see '{}'",
                    invocation.program,
                    invocation.log_path.display()
                ),
            ));
        }
        tracing::info!(
            component = "kwseval",
            elapsed_ms = started.elapsed().as_millis() as u64,
            "external scorer finished"
        );
        Ok(())
    }

    fn name(&self) -> String {
        "process".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_the_output_directory() {
        let config = NistConfig::default();
        let paths = NistPaths::new(&config, Path::new("/tmp/run"));
        assert_eq!(paths.directory, PathBuf::from("/tmp/run/nist"));
        assert_eq!(paths.bsum, PathBuf::from("/tmp/run/nist/nist.bsum.txt"));
        assert_eq!(paths.output_prefix, PathBuf::from("/tmp/run/nist/nist"));
        assert_eq!(paths.command, PathBuf::from("/tmp/run/nist/nist.sh"));
    }

    #[test]
    fn invocation_carries_weights_and_report_flags() {
        let config = NistConfig::default();
        let paths = NistPaths::new(&config, Path::new("out"));
        let invocation = kwseval_invocation(&config, &paths);
        assert_eq!(invocation.program, "KWSEval");
        assert_eq!(invocation.timeout, Some(Duration::from_secs(3600)));
        let line = invocation.command_line();
        assert!(line.starts_with("KWSEval -e out/nist/ecf.xml -r out/nist/ref.rttm"));
        assert!(line.contains("-S 0.5 -p 0.0001 -k 0.1 -K 1 -o -b -d -c -f out/nist/nist"));
    }

    #[test]
    fn missing_program_is_an_external_tool_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let invocation = ToolInvocation {
            program: "definitely-not-a-kwseval-binary".to_string(),
            args: Vec::new(),
            log_path: dir.path().join("nist.log"),
            timeout: Some(Duration::from_secs(1)),
        };
        let err = ProcessRunner.run(&invocation).expect_err("binary is missing");
        assert!(matches!(err, EvalError::ExternalTool { .. }));
    }
}
