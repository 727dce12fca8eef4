//! Feature construction: raw series → date-indexed tables → ML dataset.
//!
//! ```text
//! StockPayload ─┬─ price::build_price_table ──────────────┐
//!               └─ fundamentals::build_core_table ─┬──────┤
//!                                  EarningsIndex ──┴──────┴─ assembler::assemble → MlDataset
//! ```
//!
//! Each stage is a pure function over owned data; nothing is cached between calls.

pub mod assembler;
pub mod cleaner;
pub mod fundamentals;
pub mod earnings;
pub mod price;

pub use self::assembler::assemble;
pub use self::fundamentals::build_core_table;
pub use self::price::build_price_table;

use crate::error::{DatasetError, Series};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use self::cleaner::parse_date;

/// Parse every `dated` cell and key the rows by it. Fails on the first bad or repeated date.
fn index_by_date<T>(
    series: Series,
    rows: impl IntoIterator<Item = (String, T)>,
) -> Result<BTreeMap<NaiveDate, T>, DatasetError> {
    let mut indexed = BTreeMap::new();
    for (dated, row) in rows {
        let date = parse_date(&dated).ok_or_else(|| DatasetError::Parse {
            series,
            value: dated.clone(),
        })?;
        match indexed.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(_) => return Err(DatasetError::DuplicateDate { series, date }),
        }
    }
    Ok(indexed)
}
