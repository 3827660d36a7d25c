#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aibps/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod csv_dir;
pub mod error;
pub mod frame;
pub mod parse;
pub mod source;

pub use csv_dir::CsvDirSource;
pub use error::{DataError, Result};
pub use frame::FrameSource;
pub use source::{InMemorySource, SeriesSource};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
