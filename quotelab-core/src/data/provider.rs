//! Data provider trait and provider-level error types.
//!
//! The `DataProvider` trait abstracts over market data sources so the updater
//! can be exercised against scripted providers in tests. Implementations
//! return bars in the provider's native shape; normalization into the
//! canonical schema happens above this trait.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DataError;

/// Daily bar as delivered by a provider, before normalization.
///
/// Carries provider-native extras (adjusted close, corporate actions) that
/// the canonical schema drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    /// Provider timestamp in UTC; normalization strips the time component.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: Option<f64>,
    pub dividend: Option<f64>,
    pub split_ratio: Option<f64>,
}

/// Errors raised by a provider while fetching.
///
/// An empty-but-successful response is NOT an error: providers return
/// `Ok(vec![])` and the caller decides what that means for its state.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not known to provider: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider requests are blocked (cooling down after repeated failures)")]
    CircuitOpen,

    #[error("provider error: {0}")]
    Other(String),
}

/// Trait for market data providers.
///
/// `start`/`end` omitted means "full available history". The store and cache
/// layers sit above this trait; providers know nothing about persistence.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol. Both bounds inclusive when present.
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RawBar>, FetchError>;

    /// Whether the provider is currently willing to serve requests.
    fn is_available(&self) -> bool;
}

/// Progress callbacks for multi-symbol refresh operations.
pub trait RefreshProgress: Send {
    /// Called when a symbol's refresh starts.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol's refresh completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called once the whole batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl RefreshProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Refreshing {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nRefresh complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
