//! Date-aligned tables over symbol columns.
//!
//! Rows are calendar dates (the union across symbols, ascending); columns are
//! symbols; `f64::NAN` marks a missing value. Close columns are forward-filled
//! after each symbol's first observed date; dates before a symbol's first
//! listing stay NaN, since no earlier value exists to carry forward.
//!
//! Derived tables (returns, volatility) share this shape, with NaN again
//! marking "undefined".

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::domain::BarSeries;

/// Close prices per symbol on the union calendar.
pub type CloseTable = AlignedTable;
/// Day-over-day fractional changes; first defined row per column is NaN.
pub type ReturnsTable = AlignedTable;
/// Rolling standard deviation of returns, in percent.
pub type VolatilityTable = AlignedTable;

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl AlignedTable {
    /// Build directly from prepared columns. Every column must have one value
    /// per date.
    pub fn new(dates: Vec<NaiveDate>, columns: BTreeMap<String, Vec<f64>>) -> Self {
        debug_assert!(columns.values().all(|c| c.len() == dates.len()));
        Self { dates, columns }
    }

    pub fn empty() -> Self {
        Self {
            dates: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    /// Align the close columns of several series on the union of their dates,
    /// forward-filling each column after its first observation.
    pub fn from_close_series(series: &[BarSeries]) -> Self {
        let mut all_dates = BTreeSet::new();
        for s in series {
            for bar in &s.bars {
                all_dates.insert(bar.date);
            }
        }
        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        let mut columns = BTreeMap::new();
        for s in series {
            columns.insert(s.symbol.clone(), fill_column(&dates, s));
        }

        Self { dates, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.columns.keys().map(|s| s.as_str()).collect()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.columns.get(symbol).map(|c| c.as_slice())
    }

    pub fn value(&self, symbol: &str, row: usize) -> Option<f64> {
        self.columns.get(symbol).and_then(|c| c.get(row)).copied()
    }

    pub fn num_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Insert one more close column, aligned to the EXISTING date axis.
    ///
    /// Dates the table has never seen are not added; they appear after the
    /// next full rebuild. This is the only sanctioned in-place mutation.
    pub fn insert_close_column(&mut self, series: &BarSeries) {
        let column = fill_column(&self.dates, series);
        self.columns.insert(series.symbol.clone(), column);
    }

    /// Subset of columns, in table order. Unknown symbols are skipped.
    pub fn select(&self, symbols: &[&str]) -> AlignedTable {
        let wanted: BTreeSet<&str> = symbols.iter().copied().collect();
        let columns = self
            .columns
            .iter()
            .filter(|(name, _)| wanted.contains(name.as_str()))
            .map(|(name, col)| (name.clone(), col.clone()))
            .collect();
        Self {
            dates: self.dates.clone(),
            columns,
        }
    }

    /// The most recent `n` rows (all rows when `n` exceeds the length).
    pub fn tail(&self, n: usize) -> AlignedTable {
        let skip = self.dates.len().saturating_sub(n);
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), col[skip..].to_vec()))
            .collect();
        Self {
            dates: self.dates[skip..].to_vec(),
            columns,
        }
    }
}

/// One symbol's close column on a fixed date axis: NaN before the first
/// observation, observed close on recorded dates, carried-forward close
/// in the gaps after.
fn fill_column(dates: &[NaiveDate], series: &BarSeries) -> Vec<f64> {
    let by_date: HashMap<NaiveDate, f64> =
        series.bars.iter().map(|b| (b.date, b.close)).collect();

    let mut last_seen = f64::NAN;
    dates
        .iter()
        .map(|date| {
            if let Some(&close) = by_date.get(date) {
                last_seen = close;
            }
            last_seen
        })
        .collect()
}
