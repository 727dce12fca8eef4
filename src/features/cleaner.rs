use chrono::{DateTime, NaiveDate, NaiveDateTime};

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a `dated` cell. Time components and offsets are dropped.
/// "2021-01-04" | "2021-01-04T00:00:00" | "2021-01-04T00:00:00+00:00" | "Jan 04, 2021"
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    None
}

pub fn normalise_ticker(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Fractional change from `prev` to `curr`; 0 when undefined (zero or non-finite base).
pub fn pct_change(prev: f64, curr: f64) -> f64 {
    let pct = (curr - prev) / prev;
    if pct.is_finite() { pct } else { 0.0 }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021-01-04"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date(" 2021/01/04 "), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("01/04/2021"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("Jan 04, 2021"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("4 Jan 2021"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("2021-01-04T00:00:00"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("2021-01-04 16:00:00"), Some(ymd(2021, 1, 4)));
        assert_eq!(parse_date("2021-01-04T21:30:00+00:00"), Some(ymd(2021, 1, 4)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("N/A"), None);
        assert_eq!(parse_date("2021-13-01"), None);
        assert_eq!(parse_date("2021-02-30"), None);
    }

    #[test]
    fn test_pct_change() {
        assert!((pct_change(100.0, 110.0) - 0.10).abs() < 1e-12);
        assert_eq!(pct_change(0.0, 5.0), 0.0);
        assert_eq!(pct_change(0.0, 0.0), 0.0);
        assert!((pct_change(50.0, 25.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normalise_ticker() {
        assert_eq!(normalise_ticker(" nvda "), "NVDA");
        assert_eq!(normalise_ticker("AAPL"), "AAPL");
    }
}
