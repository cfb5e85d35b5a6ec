//! External engine executed as a child process

use super::{EngineInvocation, QueryEngine};
use crate::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;
use tracing::{debug, warn};

/// Runs the engine binary and blocks until it exits
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl QueryEngine for ProcessEngine {
    fn execute(&self, invocation: &EngineInvocation<'_>) -> EngineResult<i32> {
        let start = Instant::now();

        // The tree-rollup copy leaves result rows on stdout that nothing
        // reads, so stdout is discarded. stderr is passed through.
        let status = Command::new(&self.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let code = exit_code(status).ok_or_else(|| EngineError::NoExitStatus {
            program: self.program.clone(),
        })?;

        debug!(
            program = %self.program.display(),
            code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query engine finished"
        );
        if code != 0 {
            warn!(program = %self.program.display(), code, "Query engine failed");
        }

        Ok(code)
    }

    fn program(&self) -> &Path {
        &self.program
    }
}

/// Exit code, with death by signal reported shell-style as 128 + signal
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}
