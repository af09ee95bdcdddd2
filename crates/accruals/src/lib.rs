#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/accruals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use accruals_data as data;
pub use accruals_output as output;
pub use accruals_signal as signal;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{LoadStats, Pipeline, PipelineOutput, PipelineStats, Stage, to_record};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
