use anyhow::{Context, Result};
use clap::Parser;
use drawingcnc::{load_config, Pipeline};
use drawingcnc_common::{OutputFormat, ToolSpec};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Photograph a drawing and trace it into a vector file for the CNC mill
#[derive(Parser, Debug)]
#[command(name = "drawingcnc")]
#[command(version, about = "Capture a drawing from the camera and trace it to vector line art", long_about = None)]
struct Args {
    /// Output file (EPS unless another format is requested)
    output: PathBuf,

    /// Output format; inferred from the output extension when omitted
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Config file describing the external tools
    #[arg(short, long, env = "DRAWINGCNC_CONFIG")]
    config: Option<PathBuf>,

    /// Capture tool to run instead of the configured one
    #[arg(long)]
    capture_tool: Option<String>,

    /// Increase log verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Eps,
    Svg,
    Pdf,
    Dxf,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Eps => OutputFormat::Eps,
            FormatArg::Svg => OutputFormat::Svg,
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Dxf => OutputFormat::Dxf,
        }
    }
}

fn output_format(requested: Option<FormatArg>, output: &Path) -> OutputFormat {
    requested.map(Into::into).unwrap_or_else(|| {
        output
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormat::from_extension)
            .unwrap_or_default()
    })
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .init();
}

fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    // The override is a different program, so configured args do not apply
    if let Some(capture_tool) = args.capture_tool {
        config.tools.capture = ToolSpec::new(capture_tool);
    }

    let format = output_format(args.format, &args.output);
    debug!(tools = ?config.tools, %format, "configured");

    let pipeline = Pipeline::new(config.tools, format);
    let vector = pipeline.run()?;

    // Only touch the output once the whole pipeline succeeded
    std::fs::write(&args.output, &vector)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), bytes = vector.len(), "wrote drawing");

    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
