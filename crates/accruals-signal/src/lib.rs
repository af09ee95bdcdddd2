#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/accruals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod expand;
pub mod panel;
pub mod regression;
pub mod winsorize;

pub use config::SignalConfig;
pub use error::{Result, SignalError};
pub use expand::{AnnualSignal, ExpandStats, MonthlySignal, finalize};
pub use panel::{Lags, PanelRow, PanelStats, RatioKind, Ratios, build_panel};
pub use regression::{
    GroupKey, RegressionStats, ResidualRow, drop_early_exchange, regress_groups,
};
pub use winsorize::{PercentileBuckets, WinsorMode, WinsorStats, winsorize_by_year};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
