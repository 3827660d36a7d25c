#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aibps/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use aibps_core as core;
pub use aibps_data as data;
pub use aibps_output as output;

pub use catalog::{Catalog, CombineMode, ComponentRecipe, PillarRecipe, SENTIMENT_TERMS};
pub use config::{ConfigError, IndexConfig};
pub use error::PipelineError;
pub use pipeline::{IndexPipeline, IndexRun};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
