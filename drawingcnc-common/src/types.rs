use serde::Deserialize;
use std::fmt;

/// Pipeline stages, each backed by one external program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Camera capture and calibration (take_calibrated_picture)
    Capture,
    /// Raster to portable anymap conversion (ImageMagick)
    Convert,
    /// Anymap to vector line-art tracing (potrace)
    Trace,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Capture => write!(f, "capture"),
            Stage::Convert => write!(f, "convert"),
            Stage::Trace => write!(f, "trace"),
        }
    }
}

/// An external program and the arguments it is always invoked with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    /// Path to the executable, or a bare name looked up in PATH
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The three programs chained by the pipeline
///
/// Defaults mirror the usual DrawingCNC checkout: the capture tool is built
/// next to the working directory, ImageMagick and potrace come from PATH.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolChain {
    pub capture: ToolSpec,
    pub converter: ToolSpec,
    pub tracer: ToolSpec,
}

impl Default for ToolChain {
    fn default() -> Self {
        Self {
            capture: ToolSpec::new(DEFAULT_CAPTURE_PROGRAM),
            converter: ToolSpec::new("convert").with_args(["-", "pnm:-"]),
            tracer: ToolSpec::new("potrace"),
        }
    }
}

/// Relative path of the capture tool inside a DrawingCNC checkout
pub const DEFAULT_CAPTURE_PROGRAM: &str = "take_calibrated_picture/take_calibrated_picture";

/// Output format for traced vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Encapsulated PostScript, what the milling toolchain expects
    #[default]
    Eps,
    Svg,
    Pdf,
    Dxf,
}

impl OutputFormat {
    /// Backend name understood by potrace's `--backend` option
    pub fn backend_name(&self) -> &'static str {
        match self {
            OutputFormat::Eps => "eps",
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Dxf => "dxf",
        }
    }

    /// Guess the format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "eps" | "ps" => Some(OutputFormat::Eps),
            "svg" => Some(OutputFormat::Svg),
            "pdf" => Some(OutputFormat::Pdf),
            "dxf" => Some(OutputFormat::Dxf),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backend_name())
    }
}
