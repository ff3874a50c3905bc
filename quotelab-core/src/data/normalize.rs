//! Normalization of provider bars into the canonical schema.
//!
//! One stateless transform shared by the full-history and delta refresh
//! paths: strip time-of-day/timezone, round prices to 2 decimals, drop
//! corporate-action fields the canonical `Bar` does not carry.

use crate::data::provider::RawBar;
use crate::domain::Bar;

/// Convert raw provider bars to canonical bars.
///
/// Ordering and uniqueness are NOT established here; `BarStore::merge` owns
/// that invariant.
pub fn normalize_bars(raw: &[RawBar]) -> Vec<Bar> {
    raw.iter()
        .map(|r| Bar {
            date: r.timestamp.naive_utc().date(),
            open: round2(r.open),
            high: round2(r.high),
            low: round2(r.low),
            close: round2(r.close),
            volume: r.volume,
        })
        .collect()
}

/// True for a technically-successful history that is unusable: every bar has
/// a zero opening price, the provider's signature for an invalid ticker.
pub fn is_degenerate(raw: &[RawBar]) -> bool {
    !raw.is_empty() && raw.iter().all(|r| r.open == 0.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn raw(ts_hour: u32, open: f64) -> RawBar {
        RawBar {
            timestamp: Utc
                .with_ymd_and_hms(2024, 3, 8, ts_hour, 30, 0)
                .unwrap(),
            open,
            high: open + 1.004,
            low: open - 1.006,
            close: open + 0.5051,
            volume: 1_000,
            adj_close: Some(open + 0.4),
            dividend: Some(0.24),
            split_ratio: None,
        }
    }

    #[test]
    fn strips_time_of_day() {
        let bars = normalize_bars(&[raw(14, 100.0)]);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
    }

    #[test]
    fn rounds_prices_to_two_decimals() {
        let bars = normalize_bars(&[raw(14, 100.0)]);
        assert_eq!(bars[0].high, 101.0); // 101.004 rounds down
        assert_eq!(bars[0].low, 98.99); // 98.994 rounds down
        assert_eq!(bars[0].close, 100.51); // 100.5051 rounds up
    }

    #[test]
    fn drops_corporate_action_fields() {
        // The canonical Bar has no adj_close/dividend/split fields at all;
        // this just pins the volume passthrough.
        let bars = normalize_bars(&[raw(14, 100.0)]);
        assert_eq!(bars[0].volume, 1_000);
    }

    #[test]
    fn degenerate_when_all_opens_zero() {
        let raws = vec![raw(14, 0.0), raw(15, 0.0)];
        assert!(is_degenerate(&raws));
    }

    #[test]
    fn not_degenerate_with_one_real_open() {
        let raws = vec![raw(14, 0.0), raw(15, 100.0)];
        assert!(!is_degenerate(&raws));
    }

    #[test]
    fn empty_input_is_not_degenerate() {
        // Empty is its own outcome; the updater distinguishes the two.
        assert!(!is_degenerate(&[]));
    }
}
