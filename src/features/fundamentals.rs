use crate::error::{DatasetError, Series};
use crate::models::{CoreRow, CoreTable, RawCoreRow};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::debug;

use super::index_by_date;

/// Reported on nearly every filing, so their presence says nothing about earnings.
pub const SHARES_OUTSTANDING: &str = "EntityCommonStockSharesOutstanding";
pub const PUBLIC_FLOAT: &str = "EntityPublicFloat";

pub fn is_entity_metric(column: &str) -> bool {
    column == SHARES_OUTSTANDING || column == PUBLIC_FLOAT
}

/// Index raw fundamentals by date. Columns are the sorted union of every row's metrics;
/// metrics a row does not mention are null.
pub fn build_core_table(raw: Vec<RawCoreRow>) -> Result<CoreTable, DatasetError> {
    let columns: Vec<String> = raw
        .iter()
        .flat_map(|r| r.metrics.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = index_by_date(
        Series::Core,
        raw.into_iter().map(|mut r| {
            let values = columns
                .iter()
                .map(|c| r.metrics.remove(c).flatten().filter(|v| !v.is_nan()))
                .collect();
            (r.dated, CoreRow { values })
        }),
    )?;

    debug!("core table: {} rows x {} columns", rows.len(), columns.len());
    Ok(CoreTable { columns, rows })
}

impl CoreTable {
    /// A date is an earnings date when any metric besides the entity-level
    /// share counts is non-null on it.
    pub fn is_earnings_date(&self, date: &NaiveDate) -> bool {
        self.rows
            .get(date)
            .is_some_and(|row| self.has_earnings_values(row))
    }

    fn has_earnings_values(&self, row: &CoreRow) -> bool {
        self.columns
            .iter()
            .zip(&row.values)
            .any(|(col, v)| v.is_some() && !is_entity_metric(col))
    }

    /// Ascending dates that qualify as earnings dates.
    pub fn earnings_dates(&self) -> Vec<NaiveDate> {
        self.rows
            .keys()
            .filter(|date| self.is_earnings_date(date))
            .copied()
            .collect()
    }
}
