#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/accruals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;

pub use export::{
    ExportError, PANEL_COLUMNS, SignalColumn, SignalRecord, read_signal_csv, read_signal_file,
    to_dataframe, write_signal_csv, write_signal_file, write_signal_files, write_single_signal,
};
pub use report::{ReportBuilder, ReportError, RunReport, StageReport};
pub use summary::{ColumnSummary, SignalSummary, summarize};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
