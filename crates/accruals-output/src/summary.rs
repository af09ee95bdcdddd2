//! Summary statistics of the signal panel.
//!
//! Statistics are computed with a single lazy polars `select` over the panel
//! `DataFrame`. Null cells are excluded from every statistic; the standard
//! deviation is the sample one (`ddof = 1`).

use crate::export::{Result, SignalColumn, SignalRecord, to_dataframe};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distribution of one signal column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,

    /// Non-null observations.
    pub count: usize,

    /// Mean.
    pub mean: Option<f64>,

    /// Sample standard deviation.
    pub std: Option<f64>,

    /// Minimum.
    pub min: Option<f64>,

    /// Maximum.
    pub max: Option<f64>,
}

/// Summary of a signal panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalSummary {
    /// Security-month rows.
    pub rows: usize,

    /// Distinct securities.
    pub securities: usize,

    /// Earliest `yyyymm`.
    pub first_month: Option<i32>,

    /// Latest `yyyymm`.
    pub last_month: Option<i32>,

    /// One entry per signal column.
    pub columns: Vec<ColumnSummary>,
}

fn stat_name(column: &str, stat: &str) -> String {
    format!("{column}__{stat}")
}

fn read_stat(stats: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(stats.column(name)?.f64()?.get(0).filter(|v| v.is_finite()))
}

impl SignalSummary {
    /// Summarize a panel `DataFrame` with the export column names.
    ///
    /// # Errors
    ///
    /// Returns an error if a signal column is missing or the query fails.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut exprs = vec![
            col("permno")
                .n_unique()
                .cast(DataType::Float64)
                .alias("securities"),
            col("yyyymm")
                .min()
                .cast(DataType::Float64)
                .alias("first_month"),
            col("yyyymm")
                .max()
                .cast(DataType::Float64)
                .alias("last_month"),
        ];
        for column in SignalColumn::ALL {
            let name = column.name();
            exprs.extend([
                col(name)
                    .count()
                    .cast(DataType::Float64)
                    .alias(stat_name(name, "count")),
                col(name).mean().alias(stat_name(name, "mean")),
                col(name).std(1).alias(stat_name(name, "std")),
                col(name)
                    .min()
                    .cast(DataType::Float64)
                    .alias(stat_name(name, "min")),
                col(name)
                    .max()
                    .cast(DataType::Float64)
                    .alias(stat_name(name, "max")),
            ]);
        }

        let stats = df.clone().lazy().select(exprs).collect()?;

        let count = |v: Option<f64>| v.map_or(0, |c| c as usize);
        let month = |v: Option<f64>| v.map(|m| m as i32);

        let columns = SignalColumn::ALL
            .iter()
            .map(|column| {
                let name = column.name();
                Ok(ColumnSummary {
                    name: name.to_string(),
                    count: count(read_stat(&stats, &stat_name(name, "count"))?),
                    mean: read_stat(&stats, &stat_name(name, "mean"))?,
                    std: read_stat(&stats, &stat_name(name, "std"))?,
                    min: read_stat(&stats, &stat_name(name, "min"))?,
                    max: read_stat(&stats, &stat_name(name, "max"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rows: df.height(),
            securities: count(read_stat(&stats, "securities")?),
            first_month: month(read_stat(&stats, "first_month")?),
            last_month: month(read_stat(&stats, "last_month")?),
            columns,
        })
    }

    /// Look up a column summary by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nAbnormal Accruals Summary\n");
        output.push_str(&format!(
            "Rows: {}  Securities: {}  Months: {} to {}\n",
            self.rows,
            self.securities,
            fmt_month(self.first_month),
            fmt_month(self.last_month)
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "Signal", "Count", "Mean", "Std", "Min", "Max"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for c in &self.columns {
            output.push_str(&format!(
                "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
                c.name,
                c.count,
                fmt_stat(c.mean),
                fmt_stat(c.std),
                fmt_stat(c.min),
                fmt_stat(c.max)
            ));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Abnormal Accruals Summary\n\n");
        output.push_str(&format!("- **Rows:** {}\n", self.rows));
        output.push_str(&format!("- **Securities:** {}\n", self.securities));
        output.push_str(&format!(
            "- **Months:** {} to {}\n\n",
            fmt_month(self.first_month),
            fmt_month(self.last_month)
        ));

        output.push_str("| Signal | Count | Mean | Std | Min | Max |\n");
        output.push_str("|--------|-------|------|-----|-----|-----|\n");
        for c in &self.columns {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                c.name,
                c.count,
                fmt_stat(c.mean),
                fmt_stat(c.std),
                fmt_stat(c.min),
                fmt_stat(c.max)
            ));
        }

        output
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn fmt_month(value: Option<i32>) -> String {
    value.map_or_else(|| "-".to_string(), |m| m.to_string())
}

impl fmt::Display for SignalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Abnormal Accruals Summary: {} rows, {} securities",
            self.rows, self.securities
        )?;
        for c in &self.columns {
            writeln!(
                f,
                "  {}: n={} mean={} std={}",
                c.name,
                c.count,
                fmt_stat(c.mean),
                fmt_stat(c.std)
            )?;
        }
        Ok(())
    }
}

/// Summarize exported records.
///
/// # Errors
///
/// Returns an error if the `DataFrame` cannot be built or queried.
pub fn summarize(rows: &[SignalRecord]) -> Result<SignalSummary> {
    SignalSummary::from_dataframe(&to_dataframe(rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(permno: i64, yyyymm: i32, aa: f64, pct: Option<f64>) -> SignalRecord {
        SignalRecord {
            permno,
            yyyymm,
            gvkey: permno,
            fyear: 2000,
            datadate: NaiveDate::from_ymd_opt(2000, 12, 31),
            abnormal_accruals: aa,
            abnormal_accruals_percent: pct,
        }
    }

    #[test]
    fn test_summary_statistics() {
        let rows = vec![
            record(1, 200101, 1.0, Some(10.0)),
            record(1, 200102, 2.0, None),
            record(2, 200101, 3.0, Some(30.0)),
            record(2, 200112, 4.0, None),
        ];
        let summary = summarize(&rows).unwrap();
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.securities, 2);
        assert_eq!(summary.first_month, Some(200101));
        assert_eq!(summary.last_month, Some(200112));

        let aa = summary.column("AbnormalAccruals").unwrap();
        assert_eq!(aa.count, 4);
        assert_relative_eq!(aa.mean.unwrap(), 2.5);
        // sample std of 1..=4
        assert_relative_eq!(aa.std.unwrap(), (5.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(aa.min, Some(1.0));
        assert_eq!(aa.max, Some(4.0));

        let pct = summary.column("AbnormalAccrualsPercent").unwrap();
        assert_eq!(pct.count, 2);
        assert_relative_eq!(pct.mean.unwrap(), 20.0);
    }

    #[test]
    fn test_empty_panel_summary() {
        let summary = summarize(&[]).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.securities, 0);
        assert_eq!(summary.first_month, None);
        assert!(summary.columns.iter().all(|c| c.count == 0 && c.mean.is_none()));
    }

    #[test]
    fn test_renderings() {
        let summary = summarize(&[record(1, 200101, 0.5, None)]).unwrap();
        let ascii = summary.to_ascii_table();
        assert!(ascii.contains("AbnormalAccruals"));
        assert!(ascii.contains("0.5000"));

        let markdown = summary.to_markdown();
        assert!(markdown.contains("# Abnormal Accruals Summary"));
        assert!(markdown.contains("| AbnormalAccrualsPercent | 0 | - | - | - | - |"));

        assert!(summary.to_string().contains("1 rows, 1 securities"));
    }
}
