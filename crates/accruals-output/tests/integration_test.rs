//! Integration tests for panel export, per-signal files and run reports.

use accruals_output::{
    ReportBuilder, SignalColumn, SignalRecord, read_signal_file, summarize, write_signal_file,
    write_signal_files,
};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("accruals_output_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn panel() -> Vec<SignalRecord> {
    (1..=12)
        .map(|month| SignalRecord {
            permno: 500001,
            yyyymm: 200100 + month,
            gvkey: 1001,
            fyear: 2000,
            datadate: NaiveDate::from_ymd_opt(2000, 12, 31),
            abnormal_accruals: -0.08,
            abnormal_accruals_percent: (month <= 6).then_some(-0.4),
        })
        .collect()
}

#[test]
fn test_panel_file_round_trip_and_summary() {
    let dir = scratch_dir("panel");
    let path = dir.join("nested").join("AbnormalAccruals_panel.csv");
    let rows = panel();

    assert_eq!(write_signal_file(&path, &rows).unwrap(), 12);
    let read = read_signal_file(&path).unwrap();
    assert_eq!(read, rows);

    let summary = summarize(&read).unwrap();
    assert_eq!(summary.rows, 12);
    assert_eq!(summary.securities, 1);
    assert_eq!(summary.first_month, Some(200101));
    assert_eq!(summary.last_month, Some(200112));
    assert_eq!(summary.column("AbnormalAccrualsPercent").unwrap().count, 6);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_signal_files_drop_null_rows() {
    let dir = scratch_dir("signals");
    let paths = write_signal_files(&dir, &panel()).unwrap();
    assert_eq!(paths.len(), SignalColumn::ALL.len());
    assert!(paths[0].ends_with("AbnormalAccruals.csv"));
    assert!(paths[1].ends_with("AbnormalAccrualsPercent.csv"));

    let accruals = fs::read_to_string(&paths[0]).unwrap();
    assert_eq!(accruals.lines().count(), 13);
    assert_eq!(accruals.lines().next(), Some("permno,yyyymm,AbnormalAccruals"));
    assert_eq!(accruals.lines().nth(1), Some("500001,200101,-0.08"));

    let percent = fs::read_to_string(&paths[1]).unwrap();
    assert_eq!(percent.lines().count(), 7);
    assert!(!percent.contains("200107"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_run_report_written_to_disk() {
    let dir = scratch_dir("report");
    let path = dir.join("run.json");
    let report = ReportBuilder::new()
        .version(accruals_output::VERSION)
        .path("output", &dir.join("out.csv"))
        .stage("export", &serde_json::json!({"rows": 12}))
        .unwrap()
        .summary(summarize(&panel()).unwrap())
        .build();
    report.write_to(&path).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["stages"][0]["name"], "export");
    assert_eq!(value["stages"][0]["stats"]["rows"], 12);
    assert_eq!(value["summary"]["rows"], 12);
    assert_eq!(value["summary"]["columns"][0]["name"], "AbnormalAccruals");

    fs::remove_dir_all(&dir).unwrap();
}
