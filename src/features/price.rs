use crate::error::{DatasetError, Series};
use crate::models::{PriceRow, PriceTable, RawPriceRow};
use tracing::debug;

use super::cleaner::pct_change;
use super::index_by_date;

/// Index raw price rows by date and derive `pct` from `adj_close`.
pub fn build_price_table(raw: Vec<RawPriceRow>) -> Result<PriceTable, DatasetError> {
    let mut rows = index_by_date(
        Series::Price,
        raw.into_iter().map(|r| {
            let row = PriceRow {
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                adj_close: r.adj_close,
                volume: r.volume,
                pct: 0.0,
            };
            (r.dated, row)
        }),
    )?;

    let mut prev: Option<f64> = None;
    for row in rows.values_mut() {
        row.pct = prev.map_or(0.0, |p| pct_change(p, row.adj_close));
        prev = Some(row.adj_close);
    }

    debug!(
        "price table: {} rows ({:?} → {:?})",
        rows.len(),
        rows.keys().next(),
        rows.keys().next_back()
    );
    Ok(PriceTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(dated: &str, adj_close: f64) -> RawPriceRow {
        RawPriceRow {
            dated: dated.to_string(),
            open: adj_close,
            high: adj_close,
            low: adj_close,
            close: adj_close,
            adj_close,
            volume: 1_000,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_pct_two_day_scenario() {
        let table =
            build_price_table(vec![raw("2021-01-04", 100.0), raw("2021-01-05", 110.0)]).unwrap();
        assert_eq!(table.get(&ymd(2021, 1, 4)).unwrap().pct, 0.0);
        assert!((table.get(&ymd(2021, 1, 5)).unwrap().pct - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_pct_follows_date_order_not_payload_order() {
        let table = build_price_table(vec![
            raw("2021-01-06", 99.0),
            raw("2021-01-04", 100.0),
            raw("2021-01-05", 110.0),
        ])
        .unwrap();

        let pcts: Vec<f64> = table.iter().map(|(_, r)| r.pct).collect();
        assert_eq!(pcts[0], 0.0);
        assert!((pcts[1] - 0.10).abs() < 1e-12);
        assert!((pcts[2] - (99.0 - 110.0) / 110.0).abs() < 1e-12);
    }

    #[test]
    fn test_pct_matches_formula_for_every_row() {
        let closes = [10.0, 12.5, 11.0, 11.0, 30.0, 7.25];
        let raw_rows = closes
            .iter()
            .enumerate()
            .map(|(i, c)| raw(&format!("2021-02-{:02}", i + 1), *c))
            .collect();
        let table = build_price_table(raw_rows).unwrap();
        let rows: Vec<&PriceRow> = table.iter().map(|(_, r)| r).collect();

        assert_eq!(rows[0].pct, 0.0);
        for t in 1..rows.len() {
            let expected = (rows[t].adj_close - rows[t - 1].adj_close) / rows[t - 1].adj_close;
            assert!((rows[t].pct - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pct_zero_base_is_zero() {
        let table =
            build_price_table(vec![raw("2021-01-04", 0.0), raw("2021-01-05", 5.0)]).unwrap();
        assert_eq!(table.get(&ymd(2021, 1, 5)).unwrap().pct, 0.0);
    }

    #[test]
    fn test_malformed_date_is_parse_error() {
        let err = build_price_table(vec![raw("2021-01-04", 1.0), raw("someday", 2.0)]).unwrap_err();
        match err {
            DatasetError::Parse { series, value } => {
                assert_eq!(series, Series::Price);
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_date_rejected() {
        let err = build_price_table(vec![raw("2021-01-04", 1.0), raw("2021-01-04", 2.0)]).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::DuplicateDate { series: Series::Price, .. }
        ));
    }

    #[test]
    fn test_empty_payload_gives_empty_table() {
        assert!(build_price_table(vec![]).unwrap().is_empty());
    }
}
