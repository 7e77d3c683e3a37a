// Capture and tracing pipeline
// Chains take_calibrated_picture, ImageMagick and potrace through byte streams

use std::io::{self, Read, Write};
use std::process::Stdio;
use std::thread;

use drawingcnc_common::{OutputFormat, Stage, ToolChain};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::process::{command_for, spawn_error, StageProcess};

/// Runs the external tools that turn a camera shot into vector line art
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    tools: ToolChain,
    format: OutputFormat,
}

impl Pipeline {
    pub fn new(tools: ToolChain, format: OutputFormat) -> Self {
        Self { tools, format }
    }

    /// Take a picture and return the calibrated black and white raster
    ///
    /// The capture tool must exit successfully and write a non-empty image to
    /// stdout. Nothing else is started if it fails.
    pub fn acquire_calibrated_image(&self) -> Result<Vec<u8>> {
        let tool = &self.tools.capture;
        debug!(stage = %Stage::Capture, tool = %tool, "capturing");

        let output = command_for(tool, &[])
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| spawn_error(Stage::Capture, tool, e))?;

        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                stage: Stage::Capture,
                program: tool.program.clone(),
                status: output.status,
            });
        }

        if output.stdout.is_empty() {
            return Err(PipelineError::EmptyOutput {
                stage: Stage::Capture,
            });
        }

        match image::guess_format(&output.stdout) {
            Ok(format) => debug!(?format, bytes = output.stdout.len(), "captured raster"),
            Err(_) => warn!(
                bytes = output.stdout.len(),
                "capture output is not a recognised raster format, passing it on anyway"
            ),
        }

        Ok(output.stdout)
    }

    /// Convert raster bytes to a portable anymap and trace them to vectors
    ///
    /// The converter's stdout is handed straight to the tracer, so the
    /// intermediate image never passes through this process. Raster bytes are
    /// fed from a scoped thread while the tracer output is drained here.
    pub fn trace_to_vector(&self, raster: &[u8]) -> Result<Vec<u8>> {
        let converter_tool = &self.tools.converter;
        let tracer_tool = &self.tools.tracer;

        let mut converter = StageProcess::spawn(
            Stage::Convert,
            converter_tool,
            command_for(converter_tool, &[]),
            Stdio::piped(),
            Stdio::piped(),
        )?;
        let converter_in = converter.take_stdin().ok_or_else(|| missing_pipe(Stage::Convert))?;
        let converter_out = converter.take_stdout().ok_or_else(|| missing_pipe(Stage::Convert))?;

        // On error the converter handle drops here and gets reaped
        let mut tracer = StageProcess::spawn(
            Stage::Trace,
            tracer_tool,
            command_for(tracer_tool, &["--backend", self.format.backend_name()]),
            Stdio::from(converter_out),
            Stdio::piped(),
        )?;
        let mut tracer_out = tracer.take_stdout().ok_or_else(|| missing_pipe(Stage::Trace))?;

        debug!(bytes = raster.len(), format = %self.format, "converting");

        let (fed, read) = thread::scope(|scope| {
            let feeder = scope.spawn(move || feed(converter_in, raster));

            let mut vector = Vec::new();
            let read = tracer_out.read_to_end(&mut vector).map(|_| vector);

            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("raster writer thread panicked")));
            (fed, read)
        });

        // Exit statuses explain a failure better than the pipe errors they cause
        converter.finish()?;
        tracer.finish()?;

        fed.map_err(|source| PipelineError::Io {
            stage: Stage::Convert,
            source,
        })?;
        let vector = read.map_err(|source| PipelineError::Io {
            stage: Stage::Trace,
            source,
        })?;

        debug!(bytes = vector.len(), "traced");
        Ok(vector)
    }

    /// Capture a drawing and return it as vector bytes
    pub fn run(&self) -> Result<Vec<u8>> {
        info!("capturing calibrated picture");
        let raster = self.acquire_calibrated_image()?;

        info!(bytes = raster.len(), "tracing picture");
        self.trace_to_vector(&raster)
    }
}

/// Write all raster bytes then close the converter's stdin
///
/// A converter that exits before reading everything breaks the pipe; its exit
/// status decides whether that is a failure.
fn feed(mut stdin: impl Write, raster: &[u8]) -> io::Result<()> {
    let result = stdin.write_all(raster).and_then(|_| stdin.flush());
    drop(stdin);

    match result {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("converter closed its input early");
            Ok(())
        }
        other => other,
    }
}

fn missing_pipe(stage: Stage) -> PipelineError {
    PipelineError::Io {
        stage,
        source: io::Error::new(io::ErrorKind::BrokenPipe, "tool pipe was not captured"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use drawingcnc_common::ToolSpec;

    fn sh(script: &str) -> ToolSpec {
        ToolSpec::new("sh").with_args(["-c", script])
    }

    fn pipeline(capture: ToolSpec, converter: ToolSpec, tracer: ToolSpec) -> Pipeline {
        Pipeline::new(
            ToolChain {
                capture,
                converter,
                tracer,
            },
            OutputFormat::Eps,
        )
    }

    fn passthrough() -> Pipeline {
        pipeline(sh("printf raster"), sh("cat"), sh("cat"))
    }

    #[test]
    fn test_trace_is_composition_of_both_tools() {
        let p = pipeline(sh("true"), sh("tr a-z A-Z"), sh("sed 's/^/traced:/'"));
        let out = p.trace_to_vector(b"drawing\n").unwrap();
        assert_eq!(out, b"traced:DRAWING\n");
    }

    #[test]
    fn test_tracer_receives_backend() {
        let mut p = pipeline(sh("true"), sh("cat"), sh("cat >/dev/null; printf '%s %s' \"$0\" \"$1\""));
        p.format = OutputFormat::Svg;
        let out = p.trace_to_vector(b"x").unwrap();
        assert_eq!(out, b"--backend svg");
    }

    #[test]
    fn test_large_input_does_not_deadlock() {
        // Well past any OS pipe buffer
        let raster: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let out = passthrough().trace_to_vector(&raster).unwrap();
        assert_eq!(out.len(), raster.len());
        assert!(out == raster);
    }

    #[test]
    fn test_converter_sees_end_of_input() {
        let p = pipeline(sh("true"), sh("wc -c"), sh("tr -d ' '"));
        let out = p.trace_to_vector(b"12345").unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "5");
    }

    #[test]
    fn test_converter_failure() {
        let p = pipeline(sh("true"), sh("cat >/dev/null; exit 1"), sh("cat"));
        let err = p.trace_to_vector(b"data").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolFailed { stage: Stage::Convert, .. }
        ));
    }

    #[test]
    fn test_converter_exits_without_reading() {
        let raster = vec![0u8; 4 * 1024 * 1024];
        let p = pipeline(sh("true"), sh("exit 2"), sh("cat"));
        let err = p.trace_to_vector(&raster).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolFailed { stage: Stage::Convert, .. }
        ));
    }

    #[test]
    fn test_tracer_failure() {
        let p = pipeline(sh("true"), sh("cat"), sh("cat >/dev/null; exit 4"));
        let err = p.trace_to_vector(b"data").unwrap_err();
        assert_eq!(err.stage(), Stage::Trace);
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
    }

    #[test]
    fn test_missing_tracer_reaps_converter() {
        let p = pipeline(sh("true"), sh("cat"), ToolSpec::new("/nonexistent/potrace"));
        let err = p.trace_to_vector(b"data").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolMissing { stage: Stage::Trace, .. }
        ));
    }

    #[test]
    fn test_missing_capture_tool() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("converted");
        let converter = sh(&format!("touch '{}'; cat", marker.display()));
        let tracer = sh(&format!("touch '{}'; cat", marker.display()));
        let p = pipeline(
            ToolSpec::new("/nonexistent/take_calibrated_picture"),
            converter,
            tracer,
        );

        let err = p.run().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolMissing { stage: Stage::Capture, .. }
        ));
        assert!(err.to_string().contains("build"));
        assert!(!marker.exists());
    }

    #[test]
    fn test_capture_failure_stops_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("converted");
        let converter = sh(&format!("touch '{}'; cat", marker.display()));
        let p = pipeline(sh("printf partial; exit 1"), converter, sh("cat"));

        let err = p.run().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ToolFailed { stage: Stage::Capture, .. }
        ));
        assert!(!marker.exists());
    }

    #[test]
    fn test_empty_capture_output() {
        let p = pipeline(sh("true"), sh("cat"), sh("cat"));
        let err = p.acquire_calibrated_image().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyOutput { stage: Stage::Capture }
        ));
    }

    #[test]
    fn test_run_passes_bytes_unmodified() {
        assert_eq!(passthrough().run().unwrap(), b"raster");
    }
}
