//! Earnings-relative calendar features.
//!
//! Every ML row is placed relative to the most recent earnings event on or
//! before its date, and to the event after that. When no later event is known
//! the distance to the next one is estimated from the widest gap seen so far.

use crate::models::CoreTable;
use chrono::{Datelike, NaiveDate};

/// Distinct earnings dates, ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarningsIndex {
    dates: Vec<NaiveDate>,
}

/// Earnings features for a single date, before `days_until_earnings` is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarningsContext {
    pub is_earnings_date: bool,
    pub earnings_date: NaiveDate,
    pub days_since_earnings: i64,
    pub quarter: Option<u8>,
    pub next_earnings_date: Option<NaiveDate>,
}

impl EarningsIndex {
    pub fn from_core(core: &CoreTable) -> Self {
        Self::from_dates(core.earnings_dates())
    }

    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.dates.binary_search(date).is_ok()
    }

    /// Most recent earnings date on or before `date`.
    pub fn latest_on_or_before(&self, date: &NaiveDate) -> Option<NaiveDate> {
        let pos = self.dates.partition_point(|d| d <= date).checked_sub(1)?;
        self.dates.get(pos).copied()
    }

    /// First earnings date strictly after `date`.
    pub fn next_after(&self, date: &NaiveDate) -> Option<NaiveDate> {
        let pos = self.dates.partition_point(|d| d <= date);
        self.dates.get(pos).copied()
    }

    /// Earnings context for `date`; `None` before the first earnings date.
    pub fn context(&self, date: NaiveDate) -> Option<EarningsContext> {
        let earnings_date = self.latest_on_or_before(&date)?;
        Some(EarningsContext {
            is_earnings_date: self.contains(&date),
            earnings_date,
            days_since_earnings: (date - earnings_date).num_days(),
            quarter: quarter_for_month(earnings_date.month()),
            next_earnings_date: self.next_after(&date),
        })
    }
}

/// Reporting quarter implied by the month an earnings filing lands in.
/// Filings trail the period they cover, so January/February report Q4.
/// Months 3, 6, 9 and 12 have no mapping.
pub fn quarter_for_month(month: u32) -> Option<u8> {
    match month {
        1 | 2 => Some(4),
        4 | 5 => Some(1),
        7 | 8 => Some(2),
        10 | 11 => Some(3),
        _ => None,
    }
}

/// Days from `date` to the next earnings event, never negative.
///
/// With no later event on record, the next one is assumed to land
/// `max_gap_days` after the current one.
pub fn days_until_earnings(ctx: &EarningsContext, date: NaiveDate, max_gap_days: i64) -> i64 {
    let days = match ctx.next_earnings_date {
        Some(next) => (next - date).num_days(),
        None => (ctx.earnings_date - date).num_days() + max_gap_days,
    };
    days.max(0)
}
