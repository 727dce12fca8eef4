//! Tabular writers for price, core and ML tables.
//!
//! Dates are ISO `YYYY-MM-DD`; nulls are empty CSV cells or JSON `null`.

use crate::config::OutputFormat;
use crate::models::{CoreTable, IndexEntry, MlDataset, MlRow, PriceTable};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const ML_TRAILING_COLUMNS: [&str; 9] = [
    "adj_close",
    "volume",
    "pct",
    "is_earnings_date",
    "earnings_date",
    "days_since_earnings",
    "quarter",
    "next_earnings_date",
    "days_until_earnings",
];

fn ml_header(ds: &MlDataset) -> Vec<&str> {
    std::iter::once("dated")
        .chain(ds.feature_columns().iter().map(String::as_str))
        .chain(ML_TRAILING_COLUMNS)
        .collect()
}

fn opt_cell<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

// ── ML dataset ────────────────────────────────────────────────────────────────

pub fn dataset_path(dir: &Path, ticker: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", ticker, format.extension()))
}

/// Write `ds` to `{dir}/{TICKER}.{ext}`, creating `dir` if needed.
pub fn save_dataset(dir: &Path, ds: &MlDataset, format: OutputFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create dir {:?}", dir))?;
    let path = dataset_path(dir, &ds.ticker, format);
    let file = File::create(&path).with_context(|| format!("Could not create {:?}", path))?;
    let rows = write_dataset(BufWriter::new(file), ds, format)?;
    debug!("{}: wrote {} rows to {:?}", ds.ticker, rows, path);
    Ok(path)
}

pub fn write_dataset<W: Write>(w: W, ds: &MlDataset, format: OutputFormat) -> Result<usize> {
    match format {
        OutputFormat::Csv => write_dataset_csv(w, ds),
        OutputFormat::Json => write_dataset_json(w, ds),
    }
}

pub fn write_dataset_csv<W: Write>(w: W, ds: &MlDataset) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(ml_header(ds))?;

    for (date, row) in ds.iter() {
        let mut record: Vec<String> =
            Vec::with_capacity(1 + ds.feature_columns().len() + ML_TRAILING_COLUMNS.len());
        record.push(date.to_string());
        record.extend(row.features.iter().map(|v| v.to_string()));
        record.extend(ml_trailing_cells(row));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(ds.len())
}

/// Cells in `ML_TRAILING_COLUMNS` order.
fn ml_trailing_cells(row: &MlRow) -> [String; 9] {
    [
        row.adj_close.to_string(),
        row.volume.to_string(),
        row.pct.to_string(),
        row.is_earnings_date.to_string(),
        row.earnings_date.to_string(),
        row.days_since_earnings.to_string(),
        opt_cell(row.quarter),
        row.resolved_next_earnings_date().to_string(),
        row.days_until_earnings.to_string(),
    ]
}

pub fn write_dataset_json<W: Write>(mut w: W, ds: &MlDataset) -> Result<usize> {
    let rows: Vec<Value> = ds.iter().map(|(date, row)| ml_json_row(ds, date, row)).collect();
    serde_json::to_writer_pretty(&mut w, &rows)?;
    w.flush()?;
    Ok(rows.len())
}

fn ml_json_row(ds: &MlDataset, date: &NaiveDate, row: &MlRow) -> Value {
    let mut obj = Map::new();
    obj.insert("dated".into(), json!(date));
    for (col, v) in ds.feature_columns().iter().zip(&row.features) {
        obj.insert(col.clone(), json!(v));
    }
    obj.insert("adj_close".into(), json!(row.adj_close));
    obj.insert("volume".into(), json!(row.volume));
    obj.insert("pct".into(), json!(row.pct));
    obj.insert("is_earnings_date".into(), json!(row.is_earnings_date));
    obj.insert("earnings_date".into(), json!(row.earnings_date));
    obj.insert("days_since_earnings".into(), json!(row.days_since_earnings));
    obj.insert("quarter".into(), json!(row.quarter));
    obj.insert(
        "next_earnings_date".into(),
        json!(row.resolved_next_earnings_date()),
    );
    obj.insert("days_until_earnings".into(), json!(row.days_until_earnings));
    Value::Object(obj)
}

/// One differenced feature column as `dated,<column>` CSV.
pub fn write_feature_csv<W: Write>(w: W, ds: &MlDataset, column: &str) -> Result<usize> {
    if !ds.feature_columns().iter().any(|c| c == column) {
        anyhow::bail!(
            "{}: no feature column {:?} (available: {})",
            ds.ticker,
            column,
            ds.feature_columns().join(", ")
        );
    }

    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(["dated", column])?;
    for (date, _) in ds.iter() {
        writer.write_record([date.to_string(), opt_cell(ds.feature(date, column))])?;
    }
    writer.flush()?;
    Ok(ds.len())
}

// ── Input tables ──────────────────────────────────────────────────────────────

pub fn write_price_csv<W: Write>(w: W, table: &PriceTable) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record([
        "dated", "open", "high", "low", "close", "adj_close", "volume", "pct",
    ])?;
    for (date, r) in table.iter() {
        writer.write_record([
            date.to_string(),
            r.open.to_string(),
            r.high.to_string(),
            r.low.to_string(),
            r.close.to_string(),
            r.adj_close.to_string(),
            r.volume.to_string(),
            r.pct.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(table.len())
}

pub fn write_core_csv<W: Write>(w: W, table: &CoreTable) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(
        std::iter::once("dated").chain(table.columns().iter().map(String::as_str)),
    )?;
    for (date, r) in table.iter() {
        writer.write_record(
            std::iter::once(date.to_string()).chain(r.values.iter().map(|v| opt_cell(*v))),
        )?;
    }
    writer.flush()?;
    Ok(table.len())
}

pub fn write_index_csv<W: Write>(w: W, entries: &[IndexEntry]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{assemble, build_core_table, build_price_table};
    use crate::models::{RawCoreRow, RawPriceRow};

    fn dataset() -> MlDataset {
        let price = build_price_table(
            [("2021-01-04", 100.0), ("2021-01-05", 110.0)]
                .iter()
                .map(|(d, c)| RawPriceRow {
                    dated: d.to_string(),
                    open: *c,
                    high: *c,
                    low: *c,
                    close: *c,
                    adj_close: *c,
                    volume: 10,
                })
                .collect(),
        )
        .unwrap();
        let core = build_core_table(vec![RawCoreRow {
            dated: "2021-01-04".into(),
            metrics: [("Revenues".to_string(), Some(5.0))].into_iter().collect(),
        }])
        .unwrap();
        assemble("TEST", &price, &core).unwrap()
    }

    #[test]
    fn test_ml_csv_layout() {
        let mut buf = Vec::new();
        let n = write_dataset_csv(&mut buf, &dataset()).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "dated,Revenues,adj_close,volume,pct,is_earnings_date,earnings_date,\
             days_since_earnings,quarter,next_earnings_date,days_until_earnings"
        );
        // single earnings date: tail rows repeat earnings_date as next_earnings_date
        assert_eq!(lines[1], "2021-01-04,0,100,10,0,true,2021-01-04,0,4,2021-01-04,1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_ml_json_rows() {
        let mut buf = Vec::new();
        write_dataset_json(&mut buf, &dataset()).unwrap();
        let rows: Vec<Value> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["dated"], "2021-01-05");
        assert_eq!(rows[1]["is_earnings_date"], false);
        assert_eq!(rows[1]["days_since_earnings"], 1);
        assert_eq!(rows[1]["quarter"], 4);
    }

    #[test]
    fn test_feature_csv_single_column() {
        let mut buf = Vec::new();
        let n = write_feature_csv(&mut buf, &dataset(), "Revenues").unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "dated,Revenues\n2021-01-04,0\n2021-01-05,0\n"
        );

        let err = write_feature_csv(Vec::new(), &dataset(), "close").unwrap_err();
        assert!(err.to_string().contains("no feature column \"close\""));
    }

    #[test]
    fn test_core_csv_nulls_are_empty() {
        let core = build_core_table(vec![RawCoreRow {
            dated: "2021-01-04".into(),
            metrics: [
                ("Assets".to_string(), None),
                ("Revenues".to_string(), Some(5.5)),
            ]
            .into_iter()
            .collect(),
        }])
        .unwrap();
        let mut buf = Vec::new();
        write_core_csv(&mut buf, &core).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "dated,Assets,Revenues\n2021-01-04,,5.5\n"
        );
    }

    #[test]
    fn test_dataset_path() {
        assert_eq!(
            dataset_path(Path::new("out"), "NVDA", OutputFormat::Json),
            PathBuf::from("out/NVDA.json")
        );
    }
}
