//! Structured error taxonomy for store and refresh operations.
//!
//! The "market closed" cases are deliberately absent: an up-to-date series or
//! an empty delta fetch is normal flow, not an error.

use thiserror::Error;

use crate::data::provider::FetchError;

/// Errors surfaced by the store, the updater, and the universe loader.
#[derive(Debug, Error)]
pub enum DataError {
    /// No persisted series exists for the symbol.
    #[error("no local data for '{symbol}'; add the symbol first")]
    NotFound { symbol: String },

    /// The fetch succeeded technically but returned nothing usable
    /// (empty history, or every bar has a zero opening price).
    #[error("'{symbol}' not found or has no data")]
    NoData { symbol: String },

    /// The provider failed at the transport or protocol level. The persisted
    /// series, if any, remains untouched.
    #[error("fetch failed for '{symbol}': {source}")]
    FetchFailed {
        symbol: String,
        #[source]
        source: FetchError,
    },

    /// The persisted file exists but cannot be read as a bar series.
    /// Fatal for this symbol until the file is repaired or removed.
    #[error("store file for '{symbol}' is corrupt: {reason}")]
    StoreCorrupt { symbol: String, reason: String },

    /// I/O failure while writing or scanning the store.
    #[error("store error: {0}")]
    Store(String),
}

impl DataError {
    /// The symbol this error is about, when there is one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            DataError::NotFound { symbol }
            | DataError::NoData { symbol }
            | DataError::FetchFailed { symbol, .. }
            | DataError::StoreCorrupt { symbol, .. } => Some(symbol),
            DataError::Store(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_symbol() {
        let err = DataError::NoData {
            symbol: "ZZZZ".into(),
        };
        assert!(err.to_string().contains("ZZZZ"));
        assert_eq!(err.symbol(), Some("ZZZZ"));
    }

    #[test]
    fn fetch_failed_carries_the_source() {
        let err = DataError::FetchFailed {
            symbol: "SPY".into(),
            source: FetchError::NetworkUnreachable("connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("SPY"));
        assert!(msg.contains("network unreachable"));
    }
}
