//! Delimited-text readers for the accounting and master inputs.
//!
//! Both readers validate the header against the required column list before
//! parsing rows. Cells holding a null token (empty, `.`, `NA`, `NaN`,
//! `null`) become `None`; any other cell in a numeric column must parse or
//! the load fails with the offending line and column.

use crate::{
    error::{DataError, Result},
    month::MonthId,
    record::{AccountingRecord, Gvkey, MasterRecord, Permno},
};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Columns the accounting input must carry.
pub const ACCOUNTING_COLUMNS: &[&str] = &[
    "gvkey",
    "permno",
    "fyear",
    "datadate",
    "time_avail_m",
    "at",
    "act",
    "che",
    "lct",
    "dlc",
    "sale",
    "oancf",
    "fopt",
    "ni",
    "ib",
    "ppegt",
    "sic",
];

/// Columns the master input must carry.
pub const MASTER_COLUMNS: &[&str] = &["permno", "time_avail_m", "exchcd"];

const NULL_TOKENS: &[&str] = &["", ".", "na", "nan", "null", "none"];

/// Options for reading delimited inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    /// Field delimiter byte
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

fn is_null(cell: &str) -> bool {
    let cell = cell.trim();
    NULL_TOKENS.iter().any(|t| cell.eq_ignore_ascii_case(t))
}

/// Header lookup resolved once per input.
#[derive(Debug)]
struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, required: &[&'static str], source_name: &str) -> Result<Self> {
        let mut positions = HashMap::with_capacity(required.len());
        for &column in required {
            let pos = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
                .ok_or_else(|| DataError::MissingColumn {
                    source_name: source_name.to_string(),
                    column: column.to_string(),
                })?;
            positions.insert(column, pos);
        }
        Ok(Self { positions })
    }
}

/// Typed access to the cells of one row.
struct Row<'a> {
    source_name: &'a str,
    line: u64,
    record: &'a StringRecord,
    index: &'a ColumnIndex,
}

impl Row<'_> {
    fn cell(&self, column: &str) -> &str {
        self.index
            .positions
            .get(column)
            .and_then(|&pos| self.record.get(pos))
            .unwrap_or("")
            .trim()
    }

    fn parse_error(&self, column: &str) -> DataError {
        DataError::Parse {
            source_name: self.source_name.to_string(),
            line: self.line,
            column: column.to_string(),
            value: self.cell(column).to_string(),
        }
    }

    fn f64(&self, column: &str) -> Result<Option<f64>> {
        let cell = self.cell(column);
        if is_null(cell) {
            return Ok(None);
        }
        cell.parse::<f64>()
            .map(Some)
            .map_err(|_| self.parse_error(column))
    }

    /// Integer cell; accepts `1001` and `1001.0` since extracts often
    /// round-trip identifiers through floating point.
    fn i64(&self, column: &str) -> Result<Option<i64>> {
        let cell = self.cell(column);
        if is_null(cell) {
            return Ok(None);
        }
        if let Ok(v) = cell.parse::<i64>() {
            return Ok(Some(v));
        }
        match cell.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(v as i64)),
            _ => Err(self.parse_error(column)),
        }
    }

    fn key_i64(&self, column: &str) -> Result<i64> {
        self.i64(column)?.ok_or_else(|| DataError::NullKey {
            source_name: self.source_name.to_string(),
            line: self.line,
            column: column.to_string(),
        })
    }

    fn month(&self, column: &str) -> Result<MonthId> {
        let cell = self.cell(column);
        if is_null(cell) {
            return Err(DataError::NullKey {
                source_name: self.source_name.to_string(),
                line: self.line,
                column: column.to_string(),
            });
        }
        cell.parse().map_err(|_| self.parse_error(column))
    }

    fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        let cell = self.cell(column);
        if is_null(cell) {
            return Ok(None);
        }
        parse_date(cell)
            .map(Some)
            .ok_or_else(|| self.parse_error(column))
    }

    fn text(&self, column: &str) -> Option<String> {
        let cell = self.cell(column);
        (!is_null(cell)).then(|| cell.to_string())
    }
}

/// Parse a fiscal period end date. Time-of-day suffixes are ignored.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%d%b%Y", "%m/%d/%Y"];
    let day = cell.split(' ').next().unwrap_or(cell);
    let day = day
        .split_once('T')
        .filter(|(d, _)| d.len() == 10)
        .map_or(day, |(d, _)| d);
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

fn read_rows<R, T, F>(
    reader: R,
    source_name: &str,
    required: &[&'static str],
    options: &CsvOptions,
    mut parse: F,
) -> Result<Vec<T>>
where
    R: Read,
    F: FnMut(&Row<'_>) -> Result<Option<T>>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| DataError::csv(source_name, e))?
        .clone();
    let index = ColumnIndex::resolve(&headers, required, source_name)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let more = rdr
            .read_record(&mut record)
            .map_err(|e| DataError::csv(source_name, e))?;
        if !more {
            break;
        }
        let line = record.position().map_or(0, |p| p.line());
        let row = Row {
            source_name,
            line,
            record: &record,
            index: &index,
        };
        if let Some(parsed) = parse(&row)? {
            rows.push(parsed);
        }
    }

    debug!(source = source_name, rows = rows.len(), "parsed delimited input");
    Ok(rows)
}

/// Read accounting records from any reader.
///
/// `source_name` is used in diagnostics only.
pub fn read_accounting<R: Read>(
    reader: R,
    source_name: &str,
    options: &CsvOptions,
) -> Result<Vec<AccountingRecord>> {
    read_rows(reader, source_name, ACCOUNTING_COLUMNS, options, |row| {
        Ok(Some(AccountingRecord {
            gvkey: Gvkey::from(row.key_i64("gvkey")?),
            permno: row.i64("permno")?.map(Permno::from),
            fyear: i32::try_from(row.key_i64("fyear")?).map_err(|_| row.parse_error("fyear"))?,
            datadate: row.date("datadate")?,
            time_avail_m: row.month("time_avail_m")?,
            at: row.f64("at")?,
            act: row.f64("act")?,
            che: row.f64("che")?,
            lct: row.f64("lct")?,
            dlc: row.f64("dlc")?,
            sale: row.f64("sale")?,
            oancf: row.f64("oancf")?,
            fopt: row.f64("fopt")?,
            ni: row.f64("ni")?,
            ib: row.f64("ib")?,
            ppegt: row.f64("ppegt")?,
            sic: row.text("sic"),
        }))
    })
}

/// Read master records from any reader.
///
/// Rows without a permno cannot be joined and are skipped.
pub fn read_master<R: Read>(
    reader: R,
    source_name: &str,
    options: &CsvOptions,
) -> Result<Vec<MasterRecord>> {
    read_rows(reader, source_name, MASTER_COLUMNS, options, |row| {
        let Some(permno) = row.i64("permno")? else {
            return Ok(None);
        };
        let exchcd = row
            .i64("exchcd")?
            .map(|v| i32::try_from(v).map_err(|_| row.parse_error("exchcd")))
            .transpose()?;
        Ok(Some(MasterRecord {
            permno: Permno::from(permno),
            time_avail_m: row.month("time_avail_m")?,
            exchcd,
        }))
    })
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|error| DataError::Io {
        path: path.display().to_string(),
        error,
    })
}

/// Read the accounting input from a file.
pub fn read_accounting_file(path: &Path, options: &CsvOptions) -> Result<Vec<AccountingRecord>> {
    let records = read_accounting(open(path)?, &path.display().to_string(), options)?;
    info!(path = %path.display(), rows = records.len(), "loaded accounting records");
    Ok(records)
}

/// Read the master input from a file.
pub fn read_master_file(path: &Path, options: &CsvOptions) -> Result<Vec<MasterRecord>> {
    let records = read_master(open(path)?, &path.display().to_string(), options)?;
    info!(path = %path.display(), rows = records.len(), "loaded master records");
    Ok(records)
}

/// Keep one accounting record per (gvkey, fyear).
///
/// The record with the latest `datadate` wins; ties keep the one that came
/// last in input order. Returns the surviving records sorted by
/// (gvkey, fyear) and the number dropped.
pub fn dedup_accounting(mut records: Vec<AccountingRecord>) -> (Vec<AccountingRecord>, usize) {
    let before = records.len();
    records.sort_by(|a, b| {
        (a.gvkey, a.fyear, a.datadate).cmp(&(b.gvkey, b.fyear, b.datadate))
    });

    let mut kept: Vec<AccountingRecord> = Vec::with_capacity(records.len());
    for record in records {
        match kept.last_mut() {
            Some(last) if last.gvkey == record.gvkey && last.fyear == record.fyear => {
                *last = record;
            }
            _ => kept.push(record),
        }
    }

    let dropped = before - kept.len();
    if dropped > 0 {
        info!(dropped, "dropped duplicate (gvkey, fyear) accounting records");
    }
    (kept, dropped)
}
