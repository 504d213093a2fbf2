//! Amulet collector binary support: flags, the pipeline runtime and the text view.
mod platform;

pub use platform::{run_app, FrameSink, Pipeline, PipelineConfig, ShutdownReport};
