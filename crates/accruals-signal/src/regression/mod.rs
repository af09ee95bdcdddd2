//! Industry-year cross-sectional regressions.
//!
//! For every (fyear, sic2) group the accrual ratio is regressed on an
//! intercept, `1/lag_at`, the revenue change and PPE. The residual of each
//! member is its abnormal accrual. Groups that are too small or whose design
//! is singular are skipped; neither stops the run.

pub mod ols;

pub use ols::{OlsFit, RANK_TOLERANCE, fit_ols};

use crate::{error::SignalError, panel::PanelRow};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Number of estimated parameters (intercept plus three regressors).
pub const PARAMETERS: usize = 4;

/// Key of a regression group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Fiscal year
    pub fyear: i32,
    /// Two-digit SIC bucket
    pub sic2: i32,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fyear={} sic2={}", self.fyear, self.sic2)
    }
}

/// A panel row with its regression residual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRow {
    /// Panel row the residual belongs to
    pub row: PanelRow,
    /// Residual of the group regression
    pub abnormal_accruals: f64,
}

/// Group counts from [`regress_groups`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionStats {
    /// Panel rows without an industry bucket
    pub ungrouped_rows: usize,
    /// Groups formed
    pub groups: usize,
    /// Groups fitted
    pub fitted: usize,
    /// Groups below the size threshold
    pub too_small: usize,
    /// Groups with a singular design
    pub singular: usize,
    /// Keys of the singular groups
    pub singular_keys: Vec<GroupKey>,
    /// Rows carrying a residual
    pub residual_rows: usize,
    /// Rows removed by the historical NASDAQ exclusion
    pub nasdaq_dropped: usize,
}

/// Design matrix `[1, invTA, delRev, PPE]` and the accruals response.
pub fn design_matrix(rows: &[PanelRow]) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((rows.len(), PARAMETERS), |(i, j)| {
        let r = &rows[i].ratios;
        match j {
            0 => 1.0,
            1 => r.inv_ta,
            2 => r.del_rev,
            _ => r.ppe,
        }
    });
    let y = rows.iter().map(|r| r.ratios.accruals).collect();
    (x, y)
}

/// Fit one group and return its residuals.
///
/// # Errors
/// `InsufficientData` below `min_group_size`, otherwise whatever
/// [`fit_ols`] reports.
pub fn group_residuals(
    rows: &[PanelRow],
    min_group_size: usize,
) -> Result<Array1<f64>, SignalError> {
    if rows.len() < min_group_size {
        return Err(SignalError::InsufficientData {
            required: min_group_size,
            actual: rows.len(),
        });
    }
    let (x, y) = design_matrix(rows);
    Ok(fit_ols(&x, &y)?.residuals)
}

/// Run the regression for every (fyear, sic2) group.
///
/// Rows without a SIC2 bucket never join a group. Output is ordered by
/// group key and then by input order within the group.
pub fn regress_groups(
    rows: Vec<PanelRow>,
    min_group_size: usize,
) -> (Vec<ResidualRow>, RegressionStats) {
    let mut stats = RegressionStats::default();
    let mut groups: BTreeMap<GroupKey, Vec<PanelRow>> = BTreeMap::new();
    for row in rows {
        match row.sic2 {
            Some(sic2) => groups
                .entry(GroupKey {
                    fyear: row.fyear(),
                    sic2,
                })
                .or_default()
                .push(row),
            None => stats.ungrouped_rows += 1,
        }
    }
    stats.groups = groups.len();

    let mut out = Vec::new();
    for (key, members) in groups {
        match group_residuals(&members, min_group_size) {
            Ok(residuals) => {
                stats.fitted += 1;
                out.extend(
                    members
                        .into_iter()
                        .zip(residuals.iter().copied())
                        .map(|(row, abnormal_accruals)| ResidualRow {
                            row,
                            abnormal_accruals,
                        }),
                );
            }
            Err(SignalError::InsufficientData { actual, .. }) => {
                debug!(%key, observations = actual, "skipping small regression group");
                stats.too_small += 1;
            }
            Err(err) => {
                warn!(%key, error = %err, "skipping regression group");
                stats.singular += 1;
                stats.singular_keys.push(key);
            }
        }
    }
    stats.residual_rows = out.len();

    info!(
        groups = stats.groups,
        fitted = stats.fitted,
        too_small = stats.too_small,
        singular = stats.singular,
        residuals = stats.residual_rows,
        "fitted industry-year regressions"
    );
    (out, stats)
}

/// Drop rows listed on `exchcd` before `first_year`.
///
/// Returns the kept rows and the number removed.
pub fn drop_early_exchange(
    rows: Vec<ResidualRow>,
    exchcd: i32,
    first_year: i32,
) -> (Vec<ResidualRow>, usize) {
    let before = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|r| !(r.row.record.exchcd == exchcd && r.row.fyear() < first_year))
        .collect();
    let dropped = before - kept.len();
    debug!(exchcd, first_year, dropped, "applied historical exchange exclusion");
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{Lags, Ratios};
    use accruals_data::{AccountingRecord, Gvkey, JoinedRecord, MonthId, Permno};
    use approx::assert_abs_diff_eq;

    fn row(id: i64, fyear: i32, sic2: Option<i32>, ratios: Ratios) -> PanelRow {
        let month = MonthId::new(fyear + 1, 6).unwrap();
        PanelRow {
            record: JoinedRecord {
                accounting: AccountingRecord::empty(Gvkey::from(id), fyear, month),
                permno: Permno::from(id),
                exchcd: 1,
            },
            lags: Lags::default(),
            ratios,
            sic2,
        }
    }

    fn ratios(i: usize) -> Ratios {
        let f = i as f64;
        Ratios {
            inv_ta: 0.01 * (f + 1.0),
            del_rev: (f * 0.7).sin(),
            ppe: 0.1 * f * f,
            accruals: 0.02 + 0.5 * (f * 1.3).cos(),
        }
    }

    #[test]
    fn test_small_groups_produce_no_residuals() {
        let rows: Vec<_> = (0..5)
            .map(|i| row(i as i64, 2000, Some(35), ratios(i)))
            .collect();
        let (out, stats) = regress_groups(rows, 6);
        assert!(out.is_empty());
        assert_eq!(stats.too_small, 1);
        assert_eq!(stats.fitted, 0);
    }

    #[test]
    fn test_groups_split_by_year_and_industry() {
        let mut rows: Vec<_> = (0..8)
            .map(|i| row(i as i64, 2000, Some(35), ratios(i)))
            .collect();
        rows.extend((0..8).map(|i| row(100 + i as i64, 2001, Some(35), ratios(i + 3))));
        rows.extend((0..3).map(|i| row(200 + i as i64, 2000, Some(28), ratios(i))));
        rows.push(row(300, 2000, None, ratios(1)));

        let (out, stats) = regress_groups(rows, 6);
        assert_eq!(stats.groups, 3);
        assert_eq!(stats.fitted, 2);
        assert_eq!(stats.too_small, 1);
        assert_eq!(stats.ungrouped_rows, 1);
        assert_eq!(out.len(), 16);

        // OLS with an intercept: residuals sum to zero within each group
        let sum_2000: f64 = out
            .iter()
            .filter(|r| r.row.fyear() == 2000)
            .map(|r| r.abnormal_accruals)
            .sum();
        assert_abs_diff_eq!(sum_2000, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_singular_group_is_skipped() {
        let rows: Vec<_> = (0..7)
            .map(|i| {
                let mut r = ratios(i);
                r.ppe = 0.4;
                row(i as i64, 2000, Some(35), r)
            })
            .collect();
        let (out, stats) = regress_groups(rows, 6);
        assert!(out.is_empty());
        assert_eq!(stats.singular, 1);
        assert_eq!(stats.singular_keys, vec![GroupKey { fyear: 2000, sic2: 35 }]);
    }

    #[test]
    fn test_drop_early_exchange() {
        let mk = |fyear: i32, exchcd: i32| {
            let mut r = row(1, fyear, Some(35), ratios(1));
            r.record.exchcd = exchcd;
            ResidualRow {
                row: r,
                abnormal_accruals: 0.0,
            }
        };
        let rows = vec![mk(1980, 3), mk(1981, 1), mk(1982, 3), mk(1990, 3)];
        let (kept, dropped) = drop_early_exchange(rows, 3, 1982);
        assert_eq!(dropped, 1);
        assert!(kept.iter().all(|r| r.row.fyear() != 1980));
    }
}
