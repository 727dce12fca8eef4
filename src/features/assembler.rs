use crate::error::DatasetError;
use crate::models::{CoreTable, MlDataset, MlRow, PriceTable};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::earnings::{EarningsContext, EarningsIndex, days_until_earnings};

/// OHLC columns that ride along on the join; price data already covers them.
const DROPPED_COLUMNS: [&str; 4] = ["close", "high", "low", "open"];

/// Price columns re-attached undifferenced after the core features are built.
const PRICE_COLUMNS: [&str; 3] = ["adj_close", "volume", "pct"];

/// Join fundamentals onto the price calendar and derive the ML feature set.
///
/// Core levels are forward-filled over price dates (leading gaps → 0), then
/// differenced so each feature is a period-over-period change.
pub fn assemble(
    ticker: &str,
    price: &PriceTable,
    core: &CoreTable,
) -> Result<MlDataset, DatasetError> {
    if price.is_empty() || core.is_empty() || !core.dates().any(|d| price.get(d).is_some()) {
        return Err(DatasetError::JoinMismatch);
    }

    let earnings = EarningsIndex::from_core(core);
    if earnings.is_empty() {
        return Err(DatasetError::EmptyEarningsIndex);
    }

    let (feature_columns, source_idx) = feature_columns(core);
    let features = differenced_features(price, core, &source_idx);

    let contexts: Vec<(NaiveDate, EarningsContext, Vec<f64>)> = price
        .dates()
        .zip(features)
        .filter_map(|(date, feats)| earnings.context(*date).map(|ctx| (*date, ctx, feats)))
        .collect();

    let dropped = price.len() - contexts.len();
    if dropped > 0 {
        debug!("{ticker}: dropping {dropped} rows before the first earnings date");
    }

    let max_gap_days = contexts
        .iter()
        .map(|(_, ctx, _)| ctx.days_since_earnings)
        .max()
        .unwrap_or(0);

    let mut rows = BTreeMap::new();
    for (date, ctx, feats) in contexts {
        let Some(p) = price.get(&date) else { continue };
        rows.insert(
            date,
            MlRow {
                features: feats,
                adj_close: p.adj_close,
                volume: p.volume,
                pct: p.pct,
                is_earnings_date: ctx.is_earnings_date,
                earnings_date: ctx.earnings_date,
                days_since_earnings: ctx.days_since_earnings,
                quarter: ctx.quarter,
                next_earnings_date: ctx.next_earnings_date,
                days_until_earnings: days_until_earnings(&ctx, date, max_gap_days),
            },
        );
    }

    let estimated = rows.values().filter(|r| r.is_tail_estimate()).count();
    debug!(
        "{ticker}: {} ml rows, {} features, {} earnings dates ({:?} → {:?}), \
         {estimated} rows with estimated days_until_earnings (max gap {max_gap_days}d)",
        rows.len(),
        feature_columns.len(),
        earnings.len(),
        earnings.dates().first(),
        earnings.dates().last()
    );

    Ok(MlDataset {
        ticker: ticker.to_string(),
        feature_columns,
        rows,
    })
}

/// Core columns that become features, with their positions in `CoreRow::values`.
fn feature_columns(core: &CoreTable) -> (Vec<String>, Vec<usize>) {
    let mut names = Vec::new();
    let mut idx = Vec::new();
    for (i, col) in core.columns().iter().enumerate() {
        if DROPPED_COLUMNS.contains(&col.as_str()) {
            debug!("dropping joined column {col}");
            continue;
        }
        if PRICE_COLUMNS.contains(&col.as_str()) {
            warn!("core column {col} is shadowed by price data; ignoring it");
            continue;
        }
        names.push(col.clone());
        idx.push(i);
    }
    (names, idx)
}

/// Left-join, forward-fill, zero-fill, then first difference along price dates.
fn differenced_features(
    price: &PriceTable,
    core: &CoreTable,
    source_idx: &[usize],
) -> Vec<Vec<f64>> {
    let mut last: Vec<Option<f64>> = vec![None; source_idx.len()];
    let mut prev_level: Option<Vec<f64>> = None;
    let mut out = Vec::with_capacity(price.len());

    for date in price.dates() {
        if let Some(row) = core.get(date) {
            for (slot, &i) in last.iter_mut().zip(source_idx) {
                if let Some(v) = row.values[i] {
                    *slot = Some(v);
                }
            }
        }
        let level: Vec<f64> = last.iter().map(|v| v.unwrap_or(0.0)).collect();
        let diff = match &prev_level {
            Some(prev) => level.iter().zip(prev).map(|(l, p)| l - p).collect(),
            None => vec![0.0; level.len()],
        };
        out.push(diff);
        prev_level = Some(level);
    }
    out
}
