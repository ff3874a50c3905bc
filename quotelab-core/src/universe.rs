//! Universe loading: discovery of persisted symbols and assembly of the
//! aligned close table.
//!
//! The close table is explicit state owned by the loader. Callers needing
//! freshness call `rebuild()` (wholesale, from refreshed series) or
//! `add_symbol()` (the one sanctioned in-place insertion). One bad symbol
//! never aborts the build for the rest; it is skipped with a warning and
//! reported.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};

use crate::data::provider::{DataProvider, RefreshProgress};
use crate::domain::BarSeries;
use crate::error::DataError;
use crate::store::BarStore;
use crate::table::{AlignedTable, CloseTable};
use crate::updater::SymbolUpdater;

/// Outcome of a wholesale rebuild.
#[derive(Debug)]
pub struct BuildReport {
    /// Symbols whose refreshed series made it into the table.
    pub loaded: Vec<String>,
    /// Symbols excluded from the table, with the reason.
    pub skipped: Vec<(String, DataError)>,
}

impl BuildReport {
    pub fn all_loaded(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Owner of the store, the provider, and the current close table snapshot.
pub struct UniverseLoader {
    store: BarStore,
    provider: Box<dyn DataProvider>,
    today: NaiveDate,
    table: Option<CloseTable>,
}

impl UniverseLoader {
    /// Loader using the local calendar date as "today".
    pub fn new(store: BarStore, provider: Box<dyn DataProvider>) -> Self {
        Self::with_today(store, provider, Local::now().date_naive())
    }

    /// Loader pinned to an explicit "today" (tests, replays).
    pub fn with_today(
        store: BarStore,
        provider: Box<dyn DataProvider>,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            provider,
            today,
            table: None,
        }
    }

    pub fn store(&self) -> &BarStore {
        &self.store
    }

    /// Symbols with a persisted series in the backing store.
    pub fn discover_symbols(&self) -> Result<BTreeSet<String>, DataError> {
        self.store.symbols()
    }

    /// The current close table snapshot, if one has been built.
    pub fn close_table(&self) -> Option<&CloseTable> {
        self.table.as_ref()
    }

    /// Refresh every discovered symbol and rebuild the close table from the
    /// results. Per-symbol failures are isolated: the symbol is skipped with
    /// a warning and listed in the report.
    pub fn rebuild(&mut self, progress: &dyn RefreshProgress) -> Result<BuildReport, DataError> {
        let symbols = self.discover_symbols()?;
        let total = symbols.len();

        let updater = SymbolUpdater::with_today(&self.store, self.provider.as_ref(), self.today);
        let mut loaded_series: Vec<BarSeries> = Vec::new();
        let mut skipped: Vec<(String, DataError)> = Vec::new();

        for (i, symbol) in symbols.iter().enumerate() {
            progress.on_start(symbol, i, total);
            match updater.refresh(symbol) {
                Ok(series) => {
                    progress.on_complete(symbol, i, total, &Ok(()));
                    loaded_series.push(series);
                }
                Err(e) => {
                    eprintln!("WARNING: skipping {symbol}: {e}");
                    let result: Result<(), DataError> = Err(e);
                    progress.on_complete(symbol, i, total, &result);
                    if let Err(e) = result {
                        skipped.push((symbol.clone(), e));
                    }
                }
            }
        }

        progress.on_batch_complete(loaded_series.len(), skipped.len(), total);

        self.table = Some(AlignedTable::from_close_series(&loaded_series));
        Ok(BuildReport {
            loaded: loaded_series.into_iter().map(|s| s.symbol).collect(),
            skipped,
        })
    }

    /// Add a symbol: refresh if a series exists, full-history fetch if not,
    /// then insert the close column into the live table without a rebuild.
    pub fn add_symbol(&mut self, symbol: &str) -> Result<BarSeries, DataError> {
        let updater = SymbolUpdater::with_today(&self.store, self.provider.as_ref(), self.today);
        let series = updater.refresh(symbol)?;

        if let Some(table) = &mut self.table {
            table.insert_close_column(&series);
        }
        Ok(series)
    }
}
