//! Row types for the accounting and master inputs.

use crate::month::MonthId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Compustat firm identifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
#[serde(transparent)]
pub struct Gvkey(i64);

/// CRSP security identifier. One permno may map to several gvkeys over time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
#[serde(transparent)]
pub struct Permno(i64);

/// CRSP exchange code for NASDAQ listings.
pub const EXCHCD_NASDAQ: i32 = 3;

/// One annual accounting observation for a firm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingRecord {
    /// Firm identifier
    pub gvkey: Gvkey,
    /// Linked security identifier, if any
    pub permno: Option<Permno>,
    /// Fiscal year label
    pub fyear: i32,
    /// Fiscal period end date
    pub datadate: Option<NaiveDate>,
    /// First month the record is available to investors
    pub time_avail_m: MonthId,
    /// Total assets
    pub at: Option<f64>,
    /// Current assets
    pub act: Option<f64>,
    /// Cash and short-term investments
    pub che: Option<f64>,
    /// Current liabilities
    pub lct: Option<f64>,
    /// Debt in current liabilities
    pub dlc: Option<f64>,
    /// Sales
    pub sale: Option<f64>,
    /// Operating activities net cash flow
    pub oancf: Option<f64>,
    /// Funds from operations
    pub fopt: Option<f64>,
    /// Net income
    pub ni: Option<f64>,
    /// Income before extraordinary items
    pub ib: Option<f64>,
    /// Gross property, plant and equipment
    pub ppegt: Option<f64>,
    /// Industry code as delivered (may be non-numeric)
    pub sic: Option<String>,
}

impl AccountingRecord {
    /// Minimal record with every measure missing.
    ///
    /// Mostly useful for building fixtures field by field.
    pub const fn empty(gvkey: Gvkey, fyear: i32, time_avail_m: MonthId) -> Self {
        Self {
            gvkey,
            permno: None,
            fyear,
            datadate: None,
            time_avail_m,
            at: None,
            act: None,
            che: None,
            lct: None,
            dlc: None,
            sale: None,
            oancf: None,
            fopt: None,
            ni: None,
            ib: None,
            ppegt: None,
            sic: None,
        }
    }
}

/// One month of the master security table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRecord {
    /// Security identifier
    pub permno: Permno,
    /// Month
    pub time_avail_m: MonthId,
    /// Exchange code, missing when CRSP has none for the month
    pub exchcd: Option<i32>,
}

/// An accounting record that matched a master row with a known exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    /// The accounting observation
    pub accounting: AccountingRecord,
    /// Security identifier (non-null after the join)
    pub permno: Permno,
    /// Exchange code from the master table
    pub exchcd: i32,
}

