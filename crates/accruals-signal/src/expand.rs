//! Annual-to-monthly projection of the signal.
//!
//! Steps, in order: one row per (permno, fyear), the percentage variant from
//! the prior year's lagged assets, expansion of each annual row over the
//! following months, then two last-wins collapses keyed by gvkey and by
//! permno so exactly one row remains per security-month.

use crate::regression::ResidualRow;
use accruals_data::{Gvkey, MonthId, Permno};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One firm-year of the finished annual signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSignal {
    /// Firm identifier
    pub gvkey: Gvkey,
    /// Security identifier
    pub permno: Permno,
    /// Fiscal year
    pub fyear: i32,
    /// Fiscal period end
    pub datadate: Option<NaiveDate>,
    /// First month of availability
    pub time_avail_m: MonthId,
    /// Prior-year total assets
    pub lag_at: Option<f64>,
    /// Net income
    pub ni: Option<f64>,
    /// Regression residual
    pub abnormal_accruals: f64,
    /// Residual scaled by twice-lagged assets over |ni|
    pub abnormal_accruals_percent: Option<f64>,
}

impl From<ResidualRow> for AnnualSignal {
    fn from(r: ResidualRow) -> Self {
        let a = &r.row.record.accounting;
        Self {
            gvkey: a.gvkey,
            permno: r.row.record.permno,
            fyear: a.fyear,
            datadate: a.datadate,
            time_avail_m: a.time_avail_m,
            lag_at: r.row.lags.at,
            ni: a.ni,
            abnormal_accruals: r.abnormal_accruals,
            abnormal_accruals_percent: None,
        }
    }
}

/// One security-month of the output panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySignal {
    /// Security identifier
    pub permno: Permno,
    /// Month
    pub time_avail_m: MonthId,
    /// Firm identifier of the source record
    pub gvkey: Gvkey,
    /// Fiscal year of the source record
    pub fyear: i32,
    /// Fiscal period end of the source record
    pub datadate: Option<NaiveDate>,
    /// Abnormal accruals
    pub abnormal_accruals: f64,
    /// Abnormal accruals percent
    pub abnormal_accruals_percent: Option<f64>,
}

impl MonthlySignal {
    /// Output key `year * 100 + month`.
    pub const fn yyyymm(&self) -> i32 {
        self.time_avail_m.yyyymm()
    }
}

/// Row counts from [`finalize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandStats {
    /// Annual rows offered
    pub annual_rows: usize,
    /// Rows removed by the (permno, fyear) dedup
    pub duplicates_dropped: usize,
    /// Rows with a percentage value
    pub percent_rows: usize,
    /// Rows after monthly expansion
    pub expanded_rows: usize,
    /// Rows removed by the gvkey-month collapse
    pub collapsed_gvkey: usize,
    /// Rows removed by the permno-month collapse
    pub collapsed_permno: usize,
    /// Final security-month rows
    pub output_rows: usize,
}

/// Keep the first row per (permno, fyear) in stable (permno, fyear) order.
///
/// Idempotent. The result is sorted by (permno, fyear).
pub fn dedup_permno_fyear(mut rows: Vec<AnnualSignal>) -> Vec<AnnualSignal> {
    rows.sort_by_key(|r| (r.permno, r.fyear));
    rows.dedup_by_key(|r| (r.permno, r.fyear));
    rows
}

/// Fill `abnormal_accruals_percent` on rows sorted by (permno, fyear).
///
/// Uses `lag_at` of the same permno's `fyear - 1` row, i.e. assets two
/// years back, and requires a non-zero `ni`.
pub fn attach_percent(rows: &mut [AnnualSignal]) {
    let mut prev: Option<(Permno, i32, Option<f64>)> = None;
    for row in rows.iter_mut() {
        let prior_lag_at = match prev {
            Some((permno, fyear, lag_at)) if permno == row.permno && fyear == row.fyear - 1 => {
                lag_at
            }
            _ => None,
        };
        row.abnormal_accruals_percent = match (prior_lag_at, row.ni) {
            (Some(lag_at), Some(ni)) if ni != 0.0 => {
                Some(row.abnormal_accruals * lag_at / ni.abs()).filter(|v| v.is_finite())
            }
            _ => None,
        };
        prev = Some((row.permno, row.fyear, row.lag_at));
    }
}

/// Carry each annual row over `months` consecutive months.
pub fn expand_monthly(rows: &[AnnualSignal], months: u32) -> Vec<MonthlySignal> {
    let months = i32::try_from(months).unwrap_or(i32::MAX);
    rows.iter()
        .flat_map(|r| {
            (0..months).map(move |k| MonthlySignal {
                permno: r.permno,
                time_avail_m: r.time_avail_m.plus_months(k),
                gvkey: r.gvkey,
                fyear: r.fyear,
                datadate: r.datadate,
                abnormal_accruals: r.abnormal_accruals,
                abnormal_accruals_percent: r.abnormal_accruals_percent,
            })
        })
        .collect()
}

/// Keep the row with the latest `datadate` per `key`.
///
/// Rows are stably sorted by (key, datadate) and the last of each key run
/// is kept, so equal dates resolve to the later row in input order.
pub fn collapse_latest<K, F>(mut rows: Vec<MonthlySignal>, key: F) -> Vec<MonthlySignal>
where
    K: Ord + Copy,
    F: Fn(&MonthlySignal) -> K,
{
    rows.sort_by(|a, b| (key(a), a.datadate).cmp(&(key(b), b.datadate)));

    let mut kept: Vec<MonthlySignal> = Vec::with_capacity(rows.len());
    for row in rows {
        match kept.last_mut() {
            Some(last) if key(last) == key(&row) => *last = row,
            _ => kept.push(row),
        }
    }
    kept
}

/// Run the whole expansion stage.
///
/// Output is sorted by (permno, time_avail_m).
pub fn finalize(rows: Vec<ResidualRow>, months: u32) -> (Vec<MonthlySignal>, ExpandStats) {
    let mut stats = ExpandStats {
        annual_rows: rows.len(),
        ..Default::default()
    };

    let mut annual = dedup_permno_fyear(rows.into_iter().map(AnnualSignal::from).collect());
    stats.duplicates_dropped = stats.annual_rows - annual.len();

    attach_percent(&mut annual);
    stats.percent_rows = annual
        .iter()
        .filter(|r| r.abnormal_accruals_percent.is_some())
        .count();

    let monthly = expand_monthly(&annual, months);
    stats.expanded_rows = monthly.len();

    let by_gvkey = collapse_latest(monthly, |r| (r.gvkey, r.time_avail_m));
    stats.collapsed_gvkey = stats.expanded_rows - by_gvkey.len();

    let gvkey_rows = by_gvkey.len();
    let by_permno = collapse_latest(by_gvkey, |r| (r.permno, r.time_avail_m));
    stats.collapsed_permno = gvkey_rows - by_permno.len();
    stats.output_rows = by_permno.len();

    info!(
        annual = stats.annual_rows,
        duplicates = stats.duplicates_dropped,
        expanded = stats.expanded_rows,
        output = stats.output_rows,
        "expanded annual signal to monthly panel"
    );
    (by_permno, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn annual(permno: i64, gvkey: i64, fyear: i32, aa: f64) -> AnnualSignal {
        AnnualSignal {
            gvkey: Gvkey::from(gvkey),
            permno: Permno::from(permno),
            fyear,
            datadate: NaiveDate::from_ymd_opt(fyear, 12, 31),
            time_avail_m: MonthId::new(fyear + 1, 6).unwrap(),
            lag_at: Some(100.0),
            ni: Some(10.0),
            abnormal_accruals: aa,
            abnormal_accruals_percent: None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_and_is_idempotent() {
        let rows = vec![
            annual(2, 20, 2001, 0.5),
            annual(1, 10, 2001, 0.1),
            annual(1, 11, 2001, 0.2),
            annual(1, 10, 2000, 0.3),
        ];
        let once = dedup_permno_fyear(rows);
        assert_eq!(once.len(), 3);
        assert_eq!(once[1].abnormal_accruals, 0.1);

        let twice = dedup_permno_fyear(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_percent_uses_prior_year_lag() {
        let mut first = annual(1, 10, 2000, 0.1);
        first.lag_at = Some(80.0);
        let mut second = annual(1, 10, 2001, 0.2);
        second.ni = Some(-4.0);
        let other = annual(2, 20, 2001, 0.3);
        let mut rows = vec![first, second, other];

        attach_percent(&mut rows);
        assert_eq!(rows[0].abnormal_accruals_percent, None);
        assert_relative_eq!(rows[1].abnormal_accruals_percent.unwrap(), 0.2 * 80.0 / 4.0);
        // first year of a different permno never borrows
        assert_eq!(rows[2].abnormal_accruals_percent, None);
    }

    #[test]
    fn test_percent_requires_nonzero_income_and_consecutive_year() {
        let mut rows = vec![annual(1, 10, 2000, 0.1), annual(1, 10, 2001, 0.2)];
        rows[1].ni = Some(0.0);
        attach_percent(&mut rows);
        assert_eq!(rows[1].abnormal_accruals_percent, None);

        let mut gap = vec![annual(1, 10, 2000, 0.1), annual(1, 10, 2002, 0.2)];
        attach_percent(&mut gap);
        assert_eq!(gap[1].abnormal_accruals_percent, None);
    }

    #[test]
    fn test_single_year_expands_to_twelve_months() {
        let rows = expand_monthly(&[annual(1, 10, 2000, 0.25)], 12);
        let yyyymm: Vec<_> = rows.iter().map(MonthlySignal::yyyymm).collect();
        assert_eq!(
            yyyymm,
            vec![
                200106, 200107, 200108, 200109, 200110, 200111, 200112, 200201, 200202, 200203,
                200204, 200205
            ]
        );
        assert!(rows.iter().all(|r| r.abnormal_accruals == 0.25));
    }

    #[test]
    fn test_overlap_resolves_to_later_datadate() {
        let early = annual(1, 10, 2000, 0.1);
        let mut late = annual(1, 10, 2001, 0.2);
        // available three months after the earlier record
        late.time_avail_m = early.time_avail_m.plus_months(3);

        let monthly = expand_monthly(&[late, early], 12);
        let collapsed = collapse_latest(monthly, |r| (r.gvkey, r.time_avail_m));
        assert_eq!(collapsed.len(), 15);
        assert!(collapsed[..3].iter().all(|r| r.abnormal_accruals == 0.1));
        assert!(collapsed[3..].iter().all(|r| r.abnormal_accruals == 0.2));
    }

    #[test]
    fn test_permno_collapse_across_gvkeys() {
        let a = annual(1, 10, 2000, 0.1);
        let mut b = annual(1, 11, 2000, 0.2);
        b.datadate = NaiveDate::from_ymd_opt(2001, 3, 31);
        let monthly = expand_monthly(&[a, b], 12);

        let by_gvkey = collapse_latest(monthly, |r| (r.gvkey, r.time_avail_m));
        assert_eq!(by_gvkey.len(), 24);
        let by_permno = collapse_latest(by_gvkey, |r| (r.permno, r.time_avail_m));
        assert_eq!(by_permno.len(), 12);
        assert!(by_permno.iter().all(|r| r.gvkey == Gvkey::from(11)));
    }
}
