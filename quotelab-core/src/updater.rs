//! Refresh state machine: brings one symbol's persisted series up to date.
//!
//! Per symbol, `refresh` resolves to one of three states:
//! - no local data: fetch full history, reject empty/degenerate results
//! - up to date: return the persisted series, no fetch
//! - stale: fetch only the missing `[last_date + 1, today]` delta and merge
//!
//! An empty delta (weekend, market holiday) is normal flow, not an error.

use chrono::{Duration, Local, NaiveDate};

use crate::data::normalize::{is_degenerate, normalize_bars};
use crate::data::provider::{DataProvider, FetchError};
use crate::domain::BarSeries;
use crate::error::DataError;
use crate::store::BarStore;

/// Updater for one store/provider pair, pinned to a calendar date.
pub struct SymbolUpdater<'a> {
    store: &'a BarStore,
    provider: &'a dyn DataProvider,
    today: NaiveDate,
}

impl<'a> SymbolUpdater<'a> {
    /// Updater using the local calendar date as "today".
    pub fn new(store: &'a BarStore, provider: &'a dyn DataProvider) -> Self {
        Self::with_today(store, provider, Local::now().date_naive())
    }

    /// Updater pinned to an explicit "today" (tests, replays).
    pub fn with_today(
        store: &'a BarStore,
        provider: &'a dyn DataProvider,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            provider,
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Bring the symbol's series up to date and return it.
    ///
    /// Calling `refresh` again with no new external data is a no-op on the
    /// second call: the series is detected as up to date and no fetch runs.
    pub fn refresh(&self, symbol: &str) -> Result<BarSeries, DataError> {
        let symbol = symbol.to_uppercase();
        match self.store.load(&symbol) {
            Ok(series) => self.refresh_existing(&symbol, series),
            Err(DataError::NotFound { .. }) => self.fetch_full_history(&symbol),
            Err(other) => Err(other),
        }
    }

    /// Stale/UpToDate handling for a symbol with persisted data.
    fn refresh_existing(
        &self,
        symbol: &str,
        series: BarSeries,
    ) -> Result<BarSeries, DataError> {
        // load() guarantees at least one bar
        let last = series.last_date().ok_or_else(|| DataError::StoreCorrupt {
            symbol: symbol.to_string(),
            reason: "empty series".into(),
        })?;

        if last >= self.today {
            return Ok(series);
        }

        let start = last + Duration::days(1);
        let raw = self
            .provider
            .fetch(symbol, Some(start), Some(self.today))
            .map_err(|source| self.as_fetch_failed(symbol, source))?;

        // Nothing new (weekend/holiday): the persisted series stands.
        if raw.is_empty() {
            return Ok(series);
        }

        let incoming = normalize_bars(&raw);
        let merged = BarStore::merge(&series, &incoming);
        self.store.save(symbol, &merged)?;
        Ok(merged)
    }

    /// First-time fetch: full available history, nothing persisted on failure.
    fn fetch_full_history(&self, symbol: &str) -> Result<BarSeries, DataError> {
        let raw = self
            .provider
            .fetch(symbol, None, None)
            .map_err(|source| self.as_fetch_failed(symbol, source))?;

        if raw.is_empty() || is_degenerate(&raw) {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let incoming = normalize_bars(&raw);
        let series = BarStore::merge(&BarSeries::empty(symbol), &incoming);
        self.store.save(symbol, &series)?;
        Ok(series)
    }

    fn as_fetch_failed(&self, symbol: &str, source: FetchError) -> DataError {
        // A provider that does not know the symbol is the same user-visible
        // outcome as an empty history.
        match source {
            FetchError::SymbolNotFound { .. } => DataError::NoData {
                symbol: symbol.to_string(),
            },
            other => DataError::FetchFailed {
                symbol: symbol.to_string(),
                source: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RawBar;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Provider that replays a scripted queue of responses and records calls.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<Vec<RawBar>, FetchError>>>,
        calls: Mutex<Vec<(String, Option<NaiveDate>, Option<NaiveDate>)>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Vec<RawBar>, FetchError>>) -> Self {
            let mut responses = responses;
            responses.reverse(); // pop() serves them in submission order
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Option<NaiveDate>, Option<NaiveDate>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DataProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(
            &self,
            symbol: &str,
            start: Option<NaiveDate>,
            end: Option<NaiveDate>,
        ) -> Result<Vec<RawBar>, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), start, end));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .expect("scripted provider ran out of responses")
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn raw_bar(date: &str, open: f64, close: f64) -> RawBar {
        let d: NaiveDate = date.parse().unwrap();
        RawBar {
            timestamp: Utc
                .from_utc_datetime(&d.and_hms_opt(13, 30, 0).unwrap()),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1_000,
            adj_close: Some(close),
            dividend: None,
            split_ratio: None,
        }
    }

    fn day(date: &str) -> NaiveDate {
        date.parse().unwrap()
    }

    #[test]
    fn new_symbol_fetches_full_history_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![
            raw_bar("2024-01-02", 100.0, 101.0),
            raw_bar("2024-01-03", 101.0, 102.0),
        ])]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-05"));
        let series = updater.refresh("spy").unwrap();

        assert_eq!(series.symbol, "SPY"); // uppercased
        assert_eq!(series.len(), 2);
        assert_eq!(provider.calls(), vec![("SPY".to_string(), None, None)]);
        // Persisted
        assert_eq!(store.load("SPY").unwrap(), series);
    }

    #[test]
    fn new_symbol_empty_fetch_is_no_data_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![])]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-05"));
        let err = updater.refresh("ZZZZ").unwrap_err();

        assert!(matches!(err, DataError::NoData { .. }));
        assert!(matches!(
            store.load("ZZZZ"),
            Err(DataError::NotFound { .. })
        ));
    }

    #[test]
    fn new_symbol_all_zero_opens_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![
            raw_bar("2024-01-02", 0.0, 0.0),
            raw_bar("2024-01-03", 0.0, 0.0),
        ])]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-05"));
        assert!(matches!(
            updater.refresh("ZZZZ"),
            Err(DataError::NoData { .. })
        ));
        assert!(store.symbols().unwrap().is_empty());
    }

    #[test]
    fn up_to_date_series_returns_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![]); // any fetch would panic

        let series = BarSeries::new(
            "SPY",
            normalize_bars(&[raw_bar("2024-01-04", 100.0, 101.0)]),
        );
        store.save("SPY", &series).unwrap();

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-04"));
        let refreshed = updater.refresh("SPY").unwrap();

        assert_eq!(refreshed, series);
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn stale_series_fetches_exactly_the_missing_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![
            raw_bar("2024-01-08", 102.0, 103.0),
            raw_bar("2024-01-09", 103.0, 104.0),
        ])]);

        let series = BarSeries::new(
            "SPY",
            normalize_bars(&[
                raw_bar("2024-01-04", 100.0, 101.0),
                raw_bar("2024-01-05", 101.0, 102.0),
            ]),
        );
        store.save("SPY", &series).unwrap();

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-09"));
        let refreshed = updater.refresh("SPY").unwrap();

        assert_eq!(
            provider.calls(),
            vec![(
                "SPY".to_string(),
                Some(day("2024-01-06")),
                Some(day("2024-01-09"))
            )]
        );
        assert_eq!(refreshed.len(), 4);
        // The merged last date is the newest fetched date, not "today + n".
        assert_eq!(refreshed.last_date(), Some(day("2024-01-09")));
        assert_eq!(store.load("SPY").unwrap(), refreshed);
    }

    #[test]
    fn empty_delta_returns_persisted_series_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![])]);

        let series = BarSeries::new(
            "SPY",
            normalize_bars(&[raw_bar("2024-01-05", 100.0, 101.0)]),
        );
        store.save("SPY", &series).unwrap();

        // Saturday: nothing traded since Friday's close
        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-06"));
        let refreshed = updater.refresh("SPY").unwrap();

        assert_eq!(refreshed, series);
        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn refresh_is_idempotent_without_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Ok(vec![
            raw_bar("2024-01-04", 100.0, 101.0),
            raw_bar("2024-01-05", 101.0, 102.0),
        ])]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-05"));
        let first = updater.refresh("SPY").unwrap();
        let second = updater.refresh("SPY").unwrap();

        assert_eq!(first, second); // same bars, same order
        assert_eq!(provider.calls().len(), 1); // second call never fetched
    }

    #[test]
    fn overlapping_delta_keeps_incoming_bars() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        // Provider re-serves the last persisted day with revised numbers.
        let provider = ScriptedProvider::new(vec![Ok(vec![
            raw_bar("2024-01-05", 500.0, 500.0),
            raw_bar("2024-01-08", 501.0, 502.0),
        ])]);

        let series = BarSeries::new(
            "SPY",
            normalize_bars(&[
                raw_bar("2024-01-04", 100.0, 101.0),
                raw_bar("2024-01-05", 101.0, 102.0),
            ]),
        );
        store.save("SPY", &series).unwrap();

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-08"));
        let refreshed = updater.refresh("SPY").unwrap();

        assert_eq!(refreshed.len(), 3);
        assert!(refreshed.dates_strictly_increasing());
        assert_eq!(refreshed.bars[1].close, 500.0); // incoming won
    }

    #[test]
    fn fetch_error_leaves_persisted_series_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Err(FetchError::NetworkUnreachable(
            "connection refused".into(),
        ))]);

        let series = BarSeries::new(
            "SPY",
            normalize_bars(&[raw_bar("2024-01-04", 100.0, 101.0)]),
        );
        store.save("SPY", &series).unwrap();

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-09"));
        let err = updater.refresh("SPY").unwrap_err();

        assert!(matches!(err, DataError::FetchFailed { .. }));
        assert_eq!(store.load("SPY").unwrap(), series);
    }

    #[test]
    fn provider_symbol_not_found_maps_to_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![Err(FetchError::SymbolNotFound {
            symbol: "ZZZZ".into(),
        })]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-09"));
        assert!(matches!(
            updater.refresh("ZZZZ"),
            Err(DataError::NoData { .. })
        ));
    }

    #[test]
    fn corrupt_store_propagates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BAD_daily.csv"), "garbage").unwrap();
        let store = BarStore::new(dir.path());
        let provider = ScriptedProvider::new(vec![]);

        let updater = SymbolUpdater::with_today(&store, &provider, day("2024-01-09"));
        assert!(matches!(
            updater.refresh("BAD"),
            Err(DataError::StoreCorrupt { .. })
        ));
        assert!(provider.calls().is_empty());
    }
}
