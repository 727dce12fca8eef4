use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ── Wire payloads ─────────────────────────────────────────────────────────────

/// Every data-source response is wrapped as `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Both raw series for one ticker, exactly as the data source returns them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StockPayload {
    #[serde(default)]
    pub price: Vec<RawPriceRow>,
    #[serde(default)]
    pub core: Vec<RawCoreRow>,
}

/// One OHLCV observation; `dated` is still a string at this stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawPriceRow {
    pub dated: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    #[serde(deserialize_with = "de_volume")]
    pub volume: i64,
}

/// One fundamentals observation. Every key other than `dated` is a metric.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RawCoreRow {
    pub dated: String,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Option<f64>>,
}

/// Stock index listing entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexEntry {
    pub ticker: String,
    pub title: String,
    #[serde(default)]
    pub industry: Option<String>,
}

/// Volumes arrive as integers from some feeds and as `1234.0` from others.
fn de_volume<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: serde_json::Value = Deserialize::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(num) => num
            .as_i64()
            .or_else(|| num.as_f64().and_then(integral_volume))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid volume: {num}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected numeric volume, found {other}"
        ))),
    }
}

/// `1234.0` → 1234; fractional, non-finite or out-of-range values are rejected.
fn integral_volume(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

// ── Price table ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: i64,
    /// Change of `adj_close` against the previous date; 0 for the first row.
    pub pct: f64,
}

/// Price rows keyed by their (unique) date, ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    pub(crate) rows: BTreeMap<NaiveDate, PriceRow>,
}

impl PriceTable {
    pub fn get(&self, date: &NaiveDate) -> Option<&PriceRow> {
        self.rows.get(date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &PriceRow)> {
        self.rows.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Core (fundamentals) table ─────────────────────────────────────────────────

/// Metric values for one date, positionally aligned with `CoreTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreRow {
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreTable {
    /// Union of metric names over all raw rows, sorted.
    pub(crate) columns: Vec<String>,
    pub(crate) rows: BTreeMap<NaiveDate, CoreRow>,
}

impl CoreTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&CoreRow> {
        self.rows.get(date)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &CoreRow)> {
        self.rows.iter()
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── ML dataset ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MlRow {
    /// Differenced core features, aligned with `MlDataset::feature_columns`.
    pub features: Vec<f64>,
    pub adj_close: f64,
    pub volume: i64,
    pub pct: f64,
    pub is_earnings_date: bool,
    pub earnings_date: NaiveDate,
    pub days_since_earnings: i64,
    pub quarter: Option<u8>,
    /// `None` once `earnings_date` is the last known earnings event.
    pub next_earnings_date: Option<NaiveDate>,
    pub days_until_earnings: i64,
}

impl MlRow {
    /// Next earnings date, falling back to `earnings_date` at the tail.
    /// Rows where the two are equal carry an estimated `days_until_earnings`.
    pub fn resolved_next_earnings_date(&self) -> NaiveDate {
        self.next_earnings_date.unwrap_or(self.earnings_date)
    }

    pub fn is_tail_estimate(&self) -> bool {
        self.next_earnings_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MlDataset {
    pub ticker: String,
    pub(crate) feature_columns: Vec<String>,
    pub(crate) rows: BTreeMap<NaiveDate, MlRow>,
}

impl MlDataset {
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&MlRow> {
        self.rows.get(date)
    }

    /// Differenced value of a core feature column on `date`.
    pub fn feature(&self, date: &NaiveDate, column: &str) -> Option<f64> {
        let idx = self.feature_columns.iter().position(|c| c == column)?;
        self.rows.get(date)?.features.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &MlRow)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> DatasetSummary {
        let last = self.rows.keys().next_back().copied();
        DatasetSummary {
            rows: self.rows.len(),
            first: self.rows.keys().next().copied(),
            last,
            earnings_dates: self.rows.values().filter(|r| r.is_earnings_date).count(),
            features: self.feature_columns.len(),
            next_earnings_date: last
                .and_then(|d| self.get(&d))
                .map(MlRow::resolved_next_earnings_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub earnings_dates: usize,
    pub features: usize,
    /// Next (or, past the last known event, latest) earnings date as of the final row.
    pub next_earnings_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_row_flattens_metrics() {
        let json = r#"{"dated":"2021-03-31","Revenues":1000.0,"EntityPublicFloat":null}"#;
        let row: RawCoreRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.dated, "2021-03-31");
        assert_eq!(row.metrics.get("Revenues"), Some(&Some(1000.0)));
        assert_eq!(row.metrics.get("EntityPublicFloat"), Some(&None));
        assert!(!row.metrics.contains_key("dated"));
    }

    #[test]
    fn test_volume_accepts_float_encoding() {
        let json = r#"{"dated":"2021-01-04","open":1,"high":2,"low":0.5,"close":1.5,"adj_close":1.4,"volume":1200.0}"#;
        let row: RawPriceRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.volume, 1200);

        let json = json.replace("1200.0", "\"lots\"");
        assert!(serde_json::from_str::<RawPriceRow>(&json).is_err());
    }

    #[test]
    fn test_fractional_volume_rejected() {
        let json = r#"{"dated":"2021-01-04","open":1,"high":2,"low":0.5,"close":1.5,"adj_close":1.4,"volume":1200.7}"#;
        let err = serde_json::from_str::<RawPriceRow>(json).unwrap_err();
        assert!(err.to_string().contains("invalid volume"));

        let json = json.replace("1200.7", "1e300");
        assert!(serde_json::from_str::<RawPriceRow>(&json).is_err());
    }

    #[test]
    fn test_envelope_unwraps_payload() {
        let json = r#"{"data":{"price":[],"core":[{"dated":"2021-01-01","Assets":5}]}}"#;
        let env: Envelope<StockPayload> = serde_json::from_str(json).unwrap();
        assert!(env.data.price.is_empty());
        assert_eq!(env.data.core.len(), 1);
    }
}
