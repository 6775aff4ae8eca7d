pub mod analyzers;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod render;
pub mod stats;

pub use error::{AnalysisError, Result};
