//! External data capability: provider trait, Yahoo implementation,
//! normalization into the canonical bar schema.

pub mod circuit_breaker;
pub mod normalize;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::ProviderGate;
pub use normalize::{is_degenerate, normalize_bars};
pub use provider::{DataProvider, FetchError, RawBar, RefreshProgress, StdoutProgress};
pub use yahoo::YahooProvider;
