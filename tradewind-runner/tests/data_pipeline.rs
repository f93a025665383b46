//! Integration tests for CSV ingest: strict ordering, row-numbered errors,
//! both timestamp formats, and gap counting.

use std::fs;
use std::path::PathBuf;

use tradewind_core::domain::Timeframe;
use tradewind_runner::{load_candles, LoadError};

const HEADER: &str = "timestamp,open,high,low,close,volume\n";

fn write_csv(dir: &tempfile::TempDir, name: &str, rows: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("{HEADER}{rows}")).unwrap();
    path
}

#[test]
fn loads_a_clean_hourly_series() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "clean.csv",
        "2024-03-01T00:00:00Z,100,101,99,100.5,10\n\
         2024-03-01T01:00:00Z,100.5,102,100,101.5,12\n\
         2024-03-01T02:00:00Z,101.5,103,101,102.0,9\n",
    );
    let loaded = load_candles(&path, Timeframe::H1).unwrap();
    assert_eq!(loaded.candles.len(), 3);
    assert_eq!(loaded.gaps, 0);
    assert_eq!(loaded.candles[1].close, 101.5);
}

#[test]
fn epoch_millis_and_rfc3339_describe_the_same_instants() {
    let dir = tempfile::tempdir().unwrap();
    let rfc = write_csv(
        &dir,
        "rfc.csv",
        "2024-03-01T00:00:00Z,100,101,99,100.5,10\n\
         2024-03-01T01:00:00Z,100.5,102,100,101.5,12\n",
    );
    let epoch = write_csv(
        &dir,
        "epoch.csv",
        "1709251200000,100,101,99,100.5,10\n\
         1709254800000,100.5,102,100,101.5,12\n",
    );
    let a = load_candles(&rfc, Timeframe::H1).unwrap();
    let b = load_candles(&epoch, Timeframe::H1).unwrap();
    assert_eq!(a.candles.len(), b.candles.len());
    for (left, right) in a.candles.iter().zip(&b.candles) {
        assert_eq!(left.timestamp, right.timestamp);
    }
}

#[test]
fn out_of_order_rows_name_the_data_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "backwards.csv",
        "2024-03-01T02:00:00Z,100,101,99,100.5,10\n\
         2024-03-01T01:00:00Z,100.5,102,100,101.5,12\n",
    );
    match load_candles(&path, Timeframe::H1).unwrap_err() {
        LoadError::OutOfOrder { row } => assert_eq!(row, 3),
        other => panic!("expected OutOfOrder, got {other}"),
    }
}

#[test]
fn duplicate_timestamps_name_the_data_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "dupe.csv",
        "2024-03-01T00:00:00Z,100,101,99,100.5,10\n\
         2024-03-01T01:00:00Z,100.5,102,100,101.5,12\n\
         2024-03-01T01:00:00Z,101.5,103,101,102.0,9\n",
    );
    match load_candles(&path, Timeframe::H1).unwrap_err() {
        LoadError::Duplicate { row } => assert_eq!(row, 4),
        other => panic!("expected Duplicate, got {other}"),
    }
}

#[test]
fn unrecognized_timestamps_report_row_and_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bad_ts.csv", "03/01/2024,100,101,99,100.5,10\n");
    match load_candles(&path, Timeframe::H1).unwrap_err() {
        LoadError::Timestamp { row, value } => {
            assert_eq!(row, 2);
            assert_eq!(value, "03/01/2024");
        }
        other => panic!("expected Timestamp, got {other}"),
    }
}

#[test]
fn inconsistent_ohlc_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    // high below low
    let path = write_csv(&dir, "bad_ohlc.csv", "2024-03-01T00:00:00Z,100,98,99,100,10\n");
    match load_candles(&path, Timeframe::H1).unwrap_err() {
        LoadError::Malformed { row, .. } => assert_eq!(row, 2),
        other => panic!("expected Malformed, got {other}"),
    }
}

#[test]
fn negative_volume_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bad_vol.csv", "2024-03-01T00:00:00Z,100,101,99,100.5,-3\n");
    match load_candles(&path, Timeframe::H1).unwrap_err() {
        LoadError::Malformed { row, reason } => {
            assert_eq!(row, 2);
            assert!(reason.contains("volume"));
        }
        other => panic!("expected Malformed, got {other}"),
    }
}

#[test]
fn non_numeric_prices_are_a_csv_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bad_num.csv", "2024-03-01T00:00:00Z,abc,101,99,100.5,10\n");
    assert!(matches!(
        load_candles(&path, Timeframe::H1).unwrap_err(),
        LoadError::Csv(_)
    ));
}

#[test]
fn header_only_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "empty.csv", "");
    assert!(matches!(
        load_candles(&path, Timeframe::H1).unwrap_err(),
        LoadError::Empty { .. }
    ));
}

#[test]
fn missing_file_reports_io() {
    assert!(matches!(
        load_candles("/no/such/file.csv", Timeframe::H1).unwrap_err(),
        LoadError::Io { .. }
    ));
}

#[test]
fn gaps_are_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "gappy.csv",
        "2024-03-01T00:00:00Z,100,101,99,100.5,10\n\
         2024-03-01T01:00:00Z,100.5,102,100,101.5,12\n\
         2024-03-01T05:00:00Z,101.5,103,101,102.0,9\n",
    );
    let loaded = load_candles(&path, Timeframe::H1).unwrap();
    assert_eq!(loaded.candles.len(), 3);
    assert_eq!(loaded.gaps, 1);
}
