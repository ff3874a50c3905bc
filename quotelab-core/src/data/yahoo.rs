//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from the v8 chart API, either for an explicit
//! date range or for the full listed history (`range=max`). Handles retries
//! with exponential backoff and the provider gate. Corporate-action events
//! (dividends, splits) ride along on the raw bars and are dropped by
//! normalization.
//!
//! Yahoo has no official API and changes formats without notice; parse
//! failures surface as `ResponseFormatChanged` rather than panics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::circuit_breaker::ProviderGate;
use super::provider::{DataProvider, FetchError, RawBar};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<Events>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct Events {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    numerator: f64,
    denominator: f64,
    date: i64,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    gate: Arc<ProviderGate>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(gate: Arc<ProviderGate>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            gate,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Chart API URL. An explicit range uses period1/period2; no range means
    /// full available history.
    fn chart_url(symbol: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
        let base = format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}");
        let range = match (start, end) {
            (Some(s), Some(e)) => {
                let p1 = s.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
                let p2 = e.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
                format!("period1={p1}&period2={p2}")
            }
            (Some(s), None) => {
                let p1 = s.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
                let p2 = Utc::now().timestamp();
                format!("period1={p1}&period2={p2}")
            }
            _ => "range=max".to_string(),
        };
        format!("{base}?{range}&interval=1d&events=div%2Csplit&includeAdjustedClose=true")
    }

    /// Parse the chart response into raw bars.
    ///
    /// A response with no rows parses to an empty Vec; "no data" is the
    /// caller's judgement, not the provider's.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, FetchError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    FetchError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    FetchError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                FetchError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps at all: a valid-but-empty range (weekend/holiday delta).
        let timestamps = match data.timestamp {
            Some(ts) => ts,
            None => return Ok(Vec::new()),
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        // Index corporate actions by calendar day of their event timestamp.
        let mut dividends: HashMap<NaiveDate, f64> = HashMap::new();
        let mut splits: HashMap<NaiveDate, f64> = HashMap::new();
        if let Some(events) = data.events {
            for ev in events.dividends.values() {
                if let Some(day) = day_of(ev.date) {
                    dividends.insert(day, ev.amount);
                }
            }
            for ev in events.splits.values() {
                if let (Some(day), true) = (day_of(ev.date), ev.denominator != 0.0) {
                    splits.insert(day, ev.numerator / ev.denominator);
                }
            }
        }

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp: DateTime<Utc> = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;
            let day = timestamp.naive_utc().date();

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Rows where every field is null are non-trading days; skip them.
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
            {
                continue;
            }

            bars.push(RawBar {
                timestamp,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close: adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
                dividend: dividends.get(&day).copied(),
                split_ratio: splits.get(&day).copied(),
            });
        }

        Ok(bars)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RawBar>, FetchError> {
        if !self.gate.allow() {
            return Err(FetchError::CircuitOpen);
        }

        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
                if !self.gate.allow() {
                    return Err(FetchError::CircuitOpen);
                }
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban: stop hammering immediately
                        self.gate.trip_now();
                        return Err(FetchError::CircuitOpen);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.gate.note_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.gate.note_failure();
                        last_error = Some(FetchError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        FetchError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    let bars = Self::parse_response(symbol, chart)?;
                    self.gate.note_success();
                    return Ok(bars);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

fn day_of(epoch_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.naive_utc().date())
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<RawBar>, FetchError> {
        self.fetch_with_retry(symbol, start, end)
    }

    fn is_available(&self) -> bool {
        self.gate.allow()
    }
}
