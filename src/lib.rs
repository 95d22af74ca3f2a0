pub mod audit;
pub mod config;
pub mod emit;
pub mod headers;
pub mod pipeline;
pub mod rules;
pub mod translate;

pub use pipeline::{Pipeline, PipelineError};
