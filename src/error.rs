//! Error taxonomy for building a per-ticker dataset.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Which raw series a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Price,
    Core,
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Series::Price => f.write_str("price"),
            Series::Core => f.write_str("core"),
        }
    }
}

/// Everything that can go wrong between fetching a ticker and returning its dataset.
/// Nothing here is recovered locally: the first error aborts the ticker.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("unparseable date {value:?} in {series} series")]
    Parse { series: Series, value: String },

    #[error("duplicate date {date} in {series} series")]
    DuplicateDate { series: Series, date: NaiveDate },

    #[error("price and core series share no dates")]
    JoinMismatch,

    #[error("core series contains no earnings dates")]
    EmptyEarningsIndex,

    #[error("data source error: {0}")]
    Fetch(#[from] FetchError),
}

/// Upstream data-source failures. Propagated as-is, never retried.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}
