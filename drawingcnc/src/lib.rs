//! DrawingCNC: photograph a drawing and trace it into a vector file for CNC milling.
//!
//! The heavy lifting is done by three external programs: the
//! `take_calibrated_picture` capture tool, ImageMagick's `convert` and
//! `potrace`. This crate sequences them and relays their byte streams.

pub mod config;
pub mod error;
pub mod pipeline;
mod process;

pub use config::{load_config, Config};
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
