//! Export of the monthly signal panel.
//!
//! The full panel is written as one delimited file with the columns in
//! [`PANEL_COLUMNS`]. Each signal can also be written on its own as
//! `permno,yyyymm,<signal>` with the null rows dropped, which is the layout
//! downstream portfolio code reads.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// DataFrame construction or query error.
    #[error("DataFrame error: {0}")]
    Polars(#[from] PolarsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Header of the panel file.
pub const PANEL_COLUMNS: [&str; 7] = [
    "permno",
    "yyyymm",
    "gvkey",
    "fyear",
    "datadate",
    "AbnormalAccruals",
    "AbnormalAccrualsPercent",
];

/// One security-month of the exported panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalRecord {
    /// Security identifier.
    pub permno: i64,

    /// Month as `year * 100 + month`.
    pub yyyymm: i32,

    /// Firm identifier of the source record.
    pub gvkey: i64,

    /// Fiscal year of the source record.
    pub fyear: i32,

    /// Fiscal period end of the source record.
    pub datadate: Option<NaiveDate>,

    /// Regression residual.
    #[serde(rename = "AbnormalAccruals")]
    pub abnormal_accruals: f64,

    /// Residual scaled by twice-lagged assets over absolute net income.
    #[serde(rename = "AbnormalAccrualsPercent")]
    pub abnormal_accruals_percent: Option<f64>,
}

/// A signal column that can be written on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalColumn {
    /// `AbnormalAccruals`
    AbnormalAccruals,
    /// `AbnormalAccrualsPercent`
    AbnormalAccrualsPercent,
}

impl SignalColumn {
    /// Both signal columns in file order.
    pub const ALL: [Self; 2] = [Self::AbnormalAccruals, Self::AbnormalAccrualsPercent];

    /// Column header and file stem.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AbnormalAccruals => "AbnormalAccruals",
            Self::AbnormalAccrualsPercent => "AbnormalAccrualsPercent",
        }
    }

    /// Value of this column in `record`, `None` when null.
    pub fn value(&self, record: &SignalRecord) -> Option<f64> {
        match self {
            Self::AbnormalAccruals => Some(record.abnormal_accruals),
            Self::AbnormalAccrualsPercent => record.abnormal_accruals_percent,
        }
        .filter(|v| v.is_finite())
    }
}

impl fmt::Display for SignalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write the panel with its header. Returns the number of rows written.
///
/// Null cells are written empty.
pub fn write_signal_csv<W: Write>(writer: W, rows: &[SignalRecord]) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(PANEL_COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

/// Write the panel to `path`, creating parent directories.
pub fn write_signal_file(path: &Path, rows: &[SignalRecord]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let written = write_signal_csv(File::create(path)?, rows)?;
    info!(path = %path.display(), rows = written, "wrote signal panel");
    Ok(written)
}

/// Write `permno,yyyymm,<signal>` for one column, skipping null values.
///
/// Returns the number of rows written.
pub fn write_single_signal<W: Write>(
    writer: W,
    rows: &[SignalRecord],
    column: SignalColumn,
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["permno", "yyyymm", column.name()])?;
    let mut written = 0;
    for row in rows {
        let Some(value) = column.value(row) else {
            continue;
        };
        wtr.write_record([
            row.permno.to_string(),
            row.yyyymm.to_string(),
            value.to_string(),
        ])?;
        written += 1;
    }
    wtr.flush()?;
    Ok(written)
}

/// Write one `<dir>/<signal>.csv` file per signal column.
///
/// Returns the paths written, in [`SignalColumn::ALL`] order.
pub fn write_signal_files(dir: &Path, rows: &[SignalRecord]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(SignalColumn::ALL.len());
    for column in SignalColumn::ALL {
        let path = dir.join(format!("{}.csv", column.name()));
        let written = write_single_signal(File::create(&path)?, rows, column)?;
        info!(path = %path.display(), signal = %column, rows = written, "wrote signal file");
        paths.push(path);
    }
    Ok(paths)
}

/// Read a panel written by [`write_signal_csv`].
pub fn read_signal_csv<R: Read>(reader: R) -> Result<Vec<SignalRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    for column in PANEL_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ExportError::InvalidFormat(format!(
                "missing column '{column}'"
            )));
        }
    }
    rdr.deserialize()
        .collect::<std::result::Result<Vec<SignalRecord>, _>>()
        .map_err(ExportError::from)
}

/// Read a panel file from `path`.
pub fn read_signal_file(path: &Path) -> Result<Vec<SignalRecord>> {
    read_signal_csv(File::open(path)?)
}

/// The panel as a polars `DataFrame`, `datadate` typed as `Date`.
pub fn to_dataframe(rows: &[SignalRecord]) -> Result<DataFrame> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| ExportError::InvalidFormat("epoch date".to_string()))?;

    let permnos: Vec<i64> = rows.iter().map(|r| r.permno).collect();
    let months: Vec<i32> = rows.iter().map(|r| r.yyyymm).collect();
    let gvkeys: Vec<i64> = rows.iter().map(|r| r.gvkey).collect();
    let fyears: Vec<i32> = rows.iter().map(|r| r.fyear).collect();
    let days: Vec<Option<i32>> = rows
        .iter()
        .map(|r| {
            r.datadate
                .and_then(|d| i32::try_from((d - epoch).num_days()).ok())
        })
        .collect();
    let accruals: Vec<f64> = rows.iter().map(|r| r.abnormal_accruals).collect();
    let percent: Vec<Option<f64>> = rows.iter().map(|r| r.abnormal_accruals_percent).collect();

    let df = DataFrame::new(vec![
        Series::new("permno".into(), permnos).into(),
        Series::new("yyyymm".into(), months).into(),
        Series::new("gvkey".into(), gvkeys).into(),
        Series::new("fyear".into(), fyears).into(),
        Series::new("datadate".into(), days)
            .cast(&DataType::Date)?
            .into(),
        Series::new("AbnormalAccruals".into(), accruals).into(),
        Series::new("AbnormalAccrualsPercent".into(), percent).into(),
    ])?;
    Ok(df)
}
