//! Per-symbol bar persistence.
//!
//! One CSV file per symbol, `{data_dir}/{SYMBOL}_daily.csv`, columns
//! `date,open,high,low,close,volume`. The file is the full durable state for
//! the symbol; there is no sidecar metadata.
//!
//! Writes are atomic (write to a `.tmp` sibling, rename into place) and
//! serialized per symbol, so a reader never observes a half-written series
//! and two concurrent stale-refreshes cannot interleave.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::domain::{Bar, BarSeries};
use crate::error::DataError;

const HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];
const FILE_SUFFIX: &str = "_daily.csv";

/// Arena of independent per-symbol bar files under one directory.
pub struct BarStore {
    data_dir: PathBuf,
    save_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BarStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            save_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn series_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}{FILE_SUFFIX}"))
    }

    /// Load the persisted series for a symbol.
    ///
    /// `NotFound` if no file exists; `StoreCorrupt` if the file exists but
    /// cannot be parsed, has no data rows, or contains a duplicate date.
    pub fn load(&self, symbol: &str) -> Result<BarSeries, DataError> {
        let path = self.series_path(symbol);
        if !path.exists() {
            return Err(DataError::NotFound {
                symbol: symbol.to_string(),
            });
        }

        let corrupt = |reason: String| DataError::StoreCorrupt {
            symbol: symbol.to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| corrupt(format!("open {}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| corrupt(format!("read header: {e}")))?
            .clone();
        if headers.iter().ne(HEADER) {
            return Err(corrupt(format!("unexpected header: {headers:?}")));
        }

        let mut bars = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| corrupt(format!("row {}: {e}", row + 2)))?;
            bars.push(parse_record(&record).map_err(|e| corrupt(format!("row {}: {e}", row + 2)))?);
        }

        if bars.is_empty() {
            return Err(corrupt("no data rows".into()));
        }

        bars.sort_by_key(|b| b.date);
        if let Some(w) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(corrupt(format!("duplicate date {}", w[0].date)));
        }

        Ok(BarSeries::new(symbol, bars))
    }

    /// Persist the full series, overwriting prior content.
    pub fn save(&self, symbol: &str, series: &BarSeries) -> Result<(), DataError> {
        let lock = self.save_lock(symbol);
        let _guard = lock.lock().unwrap();

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| DataError::Store(format!("create {}: {e}", self.data_dir.display())))?;

        let path = self.series_path(symbol);
        let tmp_path = path.with_extension("csv.tmp");

        let file = fs::File::create(&tmp_path)
            .map_err(|e| DataError::Store(format!("create {}: {e}", tmp_path.display())))?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));

        writer
            .write_record(HEADER)
            .map_err(|e| DataError::Store(format!("write header: {e}")))?;
        for bar in &series.bars {
            writer
                .write_record([
                    bar.date.to_string(),
                    format!("{:.2}", bar.open),
                    format!("{:.2}", bar.high),
                    format!("{:.2}", bar.low),
                    format!("{:.2}", bar.close),
                    bar.volume.to_string(),
                ])
                .map_err(|e| DataError::Store(format!("write row for {}: {e}", bar.date)))?;
        }

        let mut inner = writer
            .into_inner()
            .map_err(|e| DataError::Store(format!("flush writer: {e}")))?;
        inner
            .flush()
            .map_err(|e| DataError::Store(format!("flush {}: {e}", tmp_path.display())))?;
        drop(inner);

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Store(format!("atomic rename failed: {e}"))
        })
    }

    /// Merge `incoming` into `existing`: duplicate dates keep the incoming
    /// bar, result sorted ascending with unique dates. Pure; the caller
    /// decides whether to persist.
    pub fn merge(existing: &BarSeries, incoming: &[Bar]) -> BarSeries {
        let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
        for bar in &existing.bars {
            by_date.insert(bar.date, bar.clone());
        }
        for bar in incoming {
            by_date.insert(bar.date, bar.clone());
        }
        BarSeries::new(existing.symbol.clone(), by_date.into_values().collect())
    }

    /// Symbols with a persisted series, derived from the file names.
    pub fn symbols(&self) -> Result<BTreeSet<String>, DataError> {
        if !self.data_dir.exists() {
            return Ok(BTreeSet::new());
        }

        let entries = fs::read_dir(&self.data_dir)
            .map_err(|e| DataError::Store(format!("read {}: {e}", self.data_dir.display())))?;

        let mut symbols = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Store(format!("dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(symbol) = name.strip_suffix(FILE_SUFFIX) {
                if !symbol.is_empty() {
                    symbols.insert(symbol.to_string());
                }
            }
        }
        Ok(symbols)
    }

    fn save_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.save_locks.lock().unwrap();
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<Bar, String> {
    if record.len() != HEADER.len() {
        return Err(format!("expected {} fields, got {}", HEADER.len(), record.len()));
    }
    let field = |i: usize| record.get(i).unwrap_or("").trim();

    Ok(Bar {
        date: field(0)
            .parse::<NaiveDate>()
            .map_err(|e| format!("bad date '{}': {e}", field(0)))?,
        open: parse_price(field(1), "open")?,
        high: parse_price(field(2), "high")?,
        low: parse_price(field(3), "low")?,
        close: parse_price(field(4), "close")?,
        volume: field(5)
            .parse::<u64>()
            .map_err(|e| format!("bad volume '{}': {e}", field(5)))?,
    })
}

fn parse_price(text: &str, column: &str) -> Result<f64, String> {
    text.parse::<f64>()
        .map_err(|e| format!("bad {column} '{text}': {e}"))
}
