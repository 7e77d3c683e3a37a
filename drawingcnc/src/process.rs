// Scoped handles for the external tools
// A spawned tool is always reaped: either explicitly through `finish`, or by
// being killed and waited on when the handle is dropped.

use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use drawingcnc_common::{Stage, ToolSpec};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Build the command for a tool, with any extra arguments appended
pub fn command_for(tool: &ToolSpec, extra_args: &[&str]) -> Command {
    let mut command = Command::new(&tool.program);
    command.args(&tool.args).args(extra_args);
    command
}

/// Map a spawn failure to the pipeline taxonomy
///
/// NotFound and PermissionDenied mean the tool is not usable at all; any
/// other failure is reported as plain I/O.
pub fn spawn_error(stage: Stage, tool: &ToolSpec, source: io::Error) -> PipelineError {
    match source.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => PipelineError::ToolMissing {
            stage,
            program: tool.program.clone(),
            source,
        },
        _ => PipelineError::Io { stage, source },
    }
}

/// A running tool, killed and reaped on drop unless finished
pub struct StageProcess {
    stage: Stage,
    program: String,
    child: Option<Child>,
}

impl StageProcess {
    /// Spawn `command` for `stage`; stderr is inherited so tool diagnostics reach the user
    pub fn spawn(
        stage: Stage,
        tool: &ToolSpec,
        mut command: Command,
        stdin: Stdio,
        stdout: Stdio,
    ) -> Result<Self> {
        debug!(%stage, tool = %tool, "spawning");
        let child = command
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_error(stage, tool, e))?;

        Ok(Self {
            stage,
            program: tool.program.clone(),
            child: Some(child),
        })
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.as_mut().and_then(|c| c.stdin.take())
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    /// Wait for the tool to exit and check its status
    pub fn finish(mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // Drop our ends first so the tool never waits on us
        drop(child.stdin.take());
        drop(child.stdout.take());

        let status = child.wait().map_err(|source| PipelineError::Io {
            stage: self.stage,
            source,
        })?;
        debug!(stage = %self.stage, %status, "exited");

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::ToolFailed {
                stage: self.stage,
                program: self.program.clone(),
                status,
            })
        }
    }
}

impl Drop for StageProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                // InvalidInput means it already exited
                if e.kind() != io::ErrorKind::InvalidInput {
                    warn!(stage = %self.stage, error = %e, "failed to kill tool");
                }
            }
            if let Err(e) = child.wait() {
                warn!(stage = %self.stage, error = %e, "failed to reap tool");
            }
        }
    }
}
