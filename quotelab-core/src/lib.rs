//! QuoteLab Core: incremental daily-bar cache and analytics.
//!
//! This crate maintains a local, append-only store of daily price bars per
//! symbol, reconciles it against a market data provider, and derives
//! analytics over the merged dataset:
//! - Per-symbol CSV persistence with atomic writes (`store`)
//! - The refresh state machine: full history, up to date, or delta (`updater`)
//! - Symbol discovery and the aligned close table (`universe`, `table`)
//! - Daily returns, pairwise-complete correlation, rolling volatility
//!   (`analytics`)
//! - Provider trait and the Yahoo Finance implementation (`data`)

pub mod analytics;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod store;
pub mod table;
pub mod universe;
pub mod updater;

pub use error::DataError;
