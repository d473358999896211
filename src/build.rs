//! latexmk process driver

use crate::error::{CollectError, Result};
use std::io::BufReader;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

pub const DEFAULT_LATEXMK: &str = "latexmk";

/// How latexmk is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Latexmk {
    program: String,
}

impl Default for Latexmk {
    fn default() -> Self {
        Self::new(DEFAULT_LATEXMK)
    }
}

impl Latexmk {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a quiet PDF build that prints the dependency listing and makes
    /// sure `<base>.bbl` is current.
    pub fn trace_args(base_name: &str) -> [&str; 4] {
        ["-silent", "-pdf", "-deps", base_name]
    }

    /// Start the build in `dir` with stdout piped back to us.
    pub fn start(&self, base_name: &str, dir: &Path) -> Result<BuildProcess> {
        tracing::info!(program = %self.program, base_name, "starting latexmk");
        let mut child = Command::new(&self.program)
            .args(Self::trace_args(base_name))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CollectError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| CollectError::Spawn {
            program: self.program.clone(),
            source: std::io::Error::other("child stdout was not captured"),
        })?;

        Ok(BuildProcess {
            child,
            stdout: BufReader::new(stdout),
            reaped: false,
        })
    }

    /// Remove generated files with `latexmk -C`, returning its exit code.
    pub fn clean(&self, base_name: &str, dir: &Path) -> Result<i32> {
        tracing::info!(program = %self.program, base_name, "cleaning build artifacts");
        let status = Command::new(&self.program)
            .args(["-C", base_name])
            .current_dir(dir)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| CollectError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        Ok(exit_code(status))
    }
}

/// A running latexmk whose stdout is consumed line by line.
///
/// Dropping it before [`BuildProcess::wait`] kills the child so an aborted run does
/// not leave latexmk blocked on a pipe nobody reads.
pub struct BuildProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    reaped: bool,
}

impl BuildProcess {
    pub fn stdout(&mut self) -> &mut BufReader<ChildStdout> {
        &mut self.stdout
    }

    /// Block until latexmk exits and return its exit code.
    ///
    /// The caller must have drained stdout first.
    pub fn wait(mut self) -> Result<i32> {
        let status = self
            .child
            .wait()
            .map_err(|e| CollectError::io("<latexmk process>", e))?;
        self.reaped = true;
        tracing::debug!(?status, "latexmk exited");
        Ok(exit_code(status))
    }
}

impl Drop for BuildProcess {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// A process killed by a signal has no code; report it as a generic failure.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
