//! Types shared by the DrawingCNC library and command-line front end.

mod types;

pub use types::{OutputFormat, Stage, ToolChain, ToolSpec, DEFAULT_CAPTURE_PROGRAM};
