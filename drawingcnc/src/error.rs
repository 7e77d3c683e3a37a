// Pipeline error types

use std::io;
use std::process::ExitStatus;

use drawingcnc_common::Stage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Program could not be found or executed
    #[error("{stage} tool `{program}` could not be started{}", missing_hint(.stage))]
    ToolMissing {
        stage: Stage,
        program: String,
        #[source]
        source: io::Error,
    },

    /// Program ran but exited unsuccessfully
    #[error("{stage} tool `{program}` failed ({status})")]
    ToolFailed {
        stage: Stage,
        program: String,
        status: ExitStatus,
    },

    #[error("{stage} tool produced no output")]
    EmptyOutput { stage: Stage },

    #[error("I/O error during {stage} stage")]
    Io {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    /// Stage the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ToolMissing { stage, .. }
            | PipelineError::ToolFailed { stage, .. }
            | PipelineError::EmptyOutput { stage }
            | PipelineError::Io { stage, .. } => *stage,
        }
    }
}

fn missing_hint(stage: &Stage) -> &'static str {
    match stage {
        Stage::Capture => "; please build the take_calibrated_picture capture tool first",
        Stage::Convert => "; is ImageMagick installed?",
        Stage::Trace => "; is potrace installed?",
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
