//! Firm-year panel: lags, cash-flow proxy, scaled ratios and SIC2 buckets.

use accruals_data::JoinedRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Prior-year values of the fields the ratios difference against.
///
/// A lag is populated only from the same firm's record for `fyear - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Lags {
    /// Lagged total assets
    pub at: Option<f64>,
    /// Lagged current assets
    pub act: Option<f64>,
    /// Lagged cash
    pub che: Option<f64>,
    /// Lagged current liabilities
    pub lct: Option<f64>,
    /// Lagged current debt
    pub dlc: Option<f64>,
    /// Lagged sales
    pub sale: Option<f64>,
}

impl Lags {
    fn from_previous(prev: &JoinedRecord) -> Self {
        let a = &prev.accounting;
        Self {
            at: a.at,
            act: a.act,
            che: a.che,
            lct: a.lct,
            dlc: a.dlc,
            sale: a.sale,
        }
    }

    /// Whether every lag is missing.
    pub const fn is_empty(&self) -> bool {
        self.at.is_none()
            && self.act.is_none()
            && self.che.is_none()
            && self.lct.is_none()
            && self.dlc.is_none()
            && self.sale.is_none()
    }
}

/// One of the four regression variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatioKind {
    /// Total accruals over lagged assets (the response)
    Accruals,
    /// Inverse of lagged assets
    InvTa,
    /// Revenue change over lagged assets
    DelRev,
    /// Gross PPE over lagged assets
    Ppe,
}

impl RatioKind {
    /// All ratios in column order.
    pub const ALL: [Self; 4] = [Self::Accruals, Self::InvTa, Self::DelRev, Self::Ppe];

    /// Column name used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Accruals => "tempAccruals",
            Self::InvTa => "tempInvTA",
            Self::DelRev => "tempDelRev",
            Self::Ppe => "tempPPE",
        }
    }
}

impl fmt::Display for RatioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The four scaled ratios. They exist together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    /// (ib - cfo) / lag_at
    pub accruals: f64,
    /// 1 / lag_at
    pub inv_ta: f64,
    /// (sale - lag_sale) / lag_at
    pub del_rev: f64,
    /// ppegt / lag_at
    pub ppe: f64,
}

impl Ratios {
    /// Value of one ratio.
    pub const fn get(&self, kind: RatioKind) -> f64 {
        match kind {
            RatioKind::Accruals => self.accruals,
            RatioKind::InvTa => self.inv_ta,
            RatioKind::DelRev => self.del_rev,
            RatioKind::Ppe => self.ppe,
        }
    }

    /// Overwrite one ratio.
    pub const fn set(&mut self, kind: RatioKind, value: f64) {
        match kind {
            RatioKind::Accruals => self.accruals = value,
            RatioKind::InvTa => self.inv_ta = value,
            RatioKind::DelRev => self.del_rev = value,
            RatioKind::Ppe => self.ppe = value,
        }
    }
}

/// A firm-year that survived ratio construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    /// Joined source record
    pub record: JoinedRecord,
    /// Prior-year values
    pub lags: Lags,
    /// Scaled ratios
    pub ratios: Ratios,
    /// Two-digit SIC bucket, `None` when the SIC code is not numeric
    pub sic2: Option<i32>,
}

impl PanelRow {
    /// Fiscal year of the underlying record.
    pub const fn fyear(&self) -> i32 {
        self.record.accounting.fyear
    }
}

/// Row counts from [`build_panel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStats {
    /// Joined rows offered
    pub input_rows: usize,
    /// Rows whose ratios could not all be computed
    pub incomplete_rows: usize,
    /// Surviving rows with a non-numeric SIC code
    pub malformed_sic: usize,
    /// Rows kept
    pub panel_rows: usize,
}

/// Sort by (gvkey, fyear) and attach prior-year lags.
///
/// The scan carries the previous record and resets it whenever the firm
/// changes, so the first year of every firm has no lags and values never
/// leak between firms. Gaps in fiscal years also break the lag.
pub fn attach_lags(mut records: Vec<JoinedRecord>) -> Vec<(JoinedRecord, Lags)> {
    records.sort_by_key(|r| (r.accounting.gvkey, r.accounting.fyear));

    let mut out: Vec<(JoinedRecord, Lags)> = Vec::with_capacity(records.len());
    for record in records {
        let lags = match out.last() {
            Some((prev, _))
                if prev.accounting.gvkey == record.accounting.gvkey
                    && prev.accounting.fyear == record.accounting.fyear - 1 =>
            {
                Lags::from_previous(prev)
            }
            _ => Lags::default(),
        };
        out.push((record, lags));
    }
    out
}

/// Operating cash flow, or the balance-sheet proxy when `oancf` is missing.
///
/// The proxy is only evaluated for rows without `oancf`.
pub fn cash_flow(record: &JoinedRecord, lags: &Lags) -> Option<f64> {
    let a = &record.accounting;
    if let Some(oancf) = a.oancf {
        return Some(oancf);
    }
    Some(
        a.fopt? - (a.act? - lags.act?) + (a.che? - lags.che?) + (a.lct? - lags.lct?)
            - (a.dlc? - lags.dlc?),
    )
}

/// The four ratios, or `None` unless lagged assets are positive and every
/// input is present.
pub fn compute_ratios(record: &JoinedRecord, lags: &Lags) -> Option<Ratios> {
    let lag_at = lags.at.filter(|v| *v > 0.0)?;
    let a = &record.accounting;

    let ratios = Ratios {
        accruals: (a.ib? - cash_flow(record, lags)?) / lag_at,
        inv_ta: 1.0 / lag_at,
        del_rev: (a.sale? - lags.sale?) / lag_at,
        ppe: a.ppegt? / lag_at,
    };

    RatioKind::ALL
        .iter()
        .all(|k| ratios.get(*k).is_finite())
        .then_some(ratios)
}

/// Two-digit SIC bucket: `floor(sic / 100)`.
pub fn sic2(sic: Option<&str>) -> Option<i32> {
    let code: f64 = sic?.trim().parse().ok()?;
    code.is_finite().then(|| (code / 100.0).floor() as i32)
}

/// Build the panel of complete firm-years.
pub fn build_panel(records: Vec<JoinedRecord>) -> (Vec<PanelRow>, PanelStats) {
    let mut stats = PanelStats {
        input_rows: records.len(),
        ..Default::default()
    };

    let mut rows = Vec::with_capacity(records.len());
    for (record, lags) in attach_lags(records) {
        let Some(ratios) = compute_ratios(&record, &lags) else {
            stats.incomplete_rows += 1;
            continue;
        };
        let sic2 = sic2(record.accounting.sic.as_deref());
        if sic2.is_none() {
            stats.malformed_sic += 1;
        }
        rows.push(PanelRow {
            record,
            lags,
            ratios,
            sic2,
        });
    }
    stats.panel_rows = rows.len();

    info!(
        input = stats.input_rows,
        kept = stats.panel_rows,
        incomplete = stats.incomplete_rows,
        malformed_sic = stats.malformed_sic,
        "built firm-year panel"
    );
    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accruals_data::{AccountingRecord, Gvkey, MonthId, Permno};
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn record(gvkey: i64, fyear: i32) -> JoinedRecord {
        let month = MonthId::new(fyear + 1, 6).unwrap();
        let mut a = AccountingRecord::empty(Gvkey::from(gvkey), fyear, month);
        a.at = Some(100.0 + f64::from(fyear - 2000));
        a.act = Some(40.0);
        a.che = Some(10.0);
        a.lct = Some(20.0);
        a.dlc = Some(5.0);
        a.sale = Some(200.0);
        a.fopt = Some(15.0);
        a.ib = Some(8.0);
        a.ppegt = Some(50.0);
        a.sic = Some("3571".to_string());
        JoinedRecord {
            accounting: a,
            permno: Permno::from(gvkey * 10),
            exchcd: 1,
        }
    }

    #[test]
    fn test_lags_reset_between_firms() {
        let rows = attach_lags(vec![
            record(2, 2001),
            record(1, 2001),
            record(2, 2000),
            record(1, 2000),
        ]);
        let keys: Vec<_> = rows
            .iter()
            .map(|(r, _)| (i64::from(r.accounting.gvkey), r.accounting.fyear))
            .collect();
        assert_eq!(keys, vec![(1, 2000), (1, 2001), (2, 2000), (2, 2001)]);

        assert!(rows[0].1.is_empty());
        assert_eq!(rows[1].1.at, Some(100.0));
        assert!(rows[2].1.is_empty());
        assert_eq!(rows[3].1.at, Some(100.0));
    }

    #[test]
    fn test_lags_break_on_gap_year() {
        let rows = attach_lags(vec![record(1, 2000), record(1, 2002)]);
        assert!(rows[1].1.is_empty());
    }

    #[test]
    fn test_reported_cash_flow_skips_proxy() {
        let mut r = record(1, 2001);
        r.accounting.oancf = Some(3.0);
        r.accounting.fopt = None;
        // proxy inputs are missing but must not matter
        assert_eq!(cash_flow(&r, &Lags::default()), Some(3.0));
    }

    #[test]
    fn test_cash_flow_proxy() {
        let mut r = record(1, 2001);
        r.accounting.act = Some(45.0);
        r.accounting.che = Some(12.0);
        r.accounting.lct = Some(22.0);
        r.accounting.dlc = Some(6.0);
        r.accounting.fopt = Some(20.0);
        let lags = Lags::from_previous(&record(1, 2000));
        // 20 - (45 - 40) + (12 - 10) + (22 - 20) - (6 - 5)
        assert_eq!(cash_flow(&r, &lags), Some(18.0));
    }

    #[test]
    fn test_ratios_require_positive_lagged_assets() {
        let r = record(1, 2001);
        let mut lags = Lags::from_previous(&record(1, 2000));
        assert!(compute_ratios(&r, &lags).is_some());

        lags.at = Some(0.0);
        assert!(compute_ratios(&r, &lags).is_none());
        lags.at = Some(-5.0);
        assert!(compute_ratios(&r, &lags).is_none());
        lags.at = None;
        assert!(compute_ratios(&r, &lags).is_none());
    }

    #[test]
    fn test_ratios_are_all_or_nothing() {
        let mut r = record(1, 2001);
        r.accounting.ppegt = None;
        let lags = Lags::from_previous(&record(1, 2000));
        assert!(compute_ratios(&r, &lags).is_none());
    }

    #[test]
    fn test_ratio_values() {
        let mut r = record(1, 2001);
        r.accounting.sale = Some(230.0);
        r.accounting.oancf = Some(4.0);
        let lags = Lags::from_previous(&record(1, 2000));
        let ratios = compute_ratios(&r, &lags).unwrap();
        assert_relative_eq!(ratios.accruals, 0.04);
        assert_relative_eq!(ratios.inv_ta, 0.01);
        assert_relative_eq!(ratios.del_rev, 0.3);
        assert_relative_eq!(ratios.ppe, 0.5);
    }

    #[rstest]
    #[case(Some("3571"), Some(35))]
    #[case(Some("0100"), Some(1))]
    #[case(Some("6199.0"), Some(61))]
    #[case(Some("99"), Some(0))]
    #[case(Some("XX"), None)]
    #[case(None, None)]
    fn test_sic2(#[case] sic: Option<&str>, #[case] expected: Option<i32>) {
        assert_eq!(sic2(sic), expected);
    }

    #[test]
    fn test_build_panel_drops_first_years() {
        let (rows, stats) = build_panel(vec![record(1, 2000), record(1, 2001), record(2, 2005)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fyear(), 2001);
        assert_eq!(stats.incomplete_rows, 2);
        assert_eq!(stats.panel_rows, 1);
    }
}
