#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/accruals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod join;
pub mod loader;
pub mod month;
pub mod record;

pub use error::{DataError, Result};
pub use join::{JoinStats, join_master};
pub use loader::{
    ACCOUNTING_COLUMNS, CsvOptions, MASTER_COLUMNS, dedup_accounting, read_accounting,
    read_accounting_file, read_master, read_master_file,
};
pub use month::MonthId;
pub use record::{AccountingRecord, EXCHCD_NASDAQ, Gvkey, JoinedRecord, MasterRecord, Permno};

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
