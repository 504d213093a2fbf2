mod app;
mod config;
mod effects;
mod source;
mod ui;

pub use app::{run_app, FrameSink, Pipeline, PipelineConfig, ShutdownReport};
