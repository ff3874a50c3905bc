//! Analytics over aligned close tables: daily returns, pairwise-complete
//! correlation, rolling volatility.
//!
//! Every function is pure and recomputes from its input; nothing here is
//! persisted. NaN marks "undefined" throughout and propagates; an undefined
//! return never becomes zero.

use std::collections::BTreeMap;

use crate::table::{CloseTable, ReturnsTable, VolatilityTable};

/// Pairwise Pearson correlations between return columns.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Correlation by column index.
    pub fn value(&self, a: usize, b: usize) -> f64 {
        self.values[a][b]
    }

    /// Correlation by symbol name.
    pub fn value_for(&self, a: &str, b: &str) -> Option<f64> {
        let ia = self.symbols.iter().position(|s| s == a)?;
        let ib = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[ia][ib])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Day-over-day fractional change per column: `close[t] / close[t-1] - 1`.
///
/// The first row of every column is NaN (no prior value), as is any row whose
/// own or prior close is missing.
pub fn daily_changes(closes: &CloseTable) -> ReturnsTable {
    let mut columns = BTreeMap::new();
    for symbol in closes.symbols() {
        let col = closes.column(symbol).expect("symbol from same table");
        let mut changes = vec![f64::NAN; col.len()];
        for t in 1..col.len() {
            let prev = col[t - 1];
            let cur = col[t];
            if prev.is_finite() && cur.is_finite() && prev != 0.0 {
                changes[t] = cur / prev - 1.0;
            }
        }
        columns.insert(symbol.to_string(), changes);
    }
    ReturnsTable::new(closes.dates().to_vec(), columns)
}

/// Pairwise-complete Pearson correlation between all return columns.
///
/// Each pair is computed only over rows where both columns are defined; a
/// pair with fewer than 2 overlapping observations (or zero variance) gets
/// NaN rather than a panic. The diagonal is 1.0 whenever the column has at
/// least 2 defined returns.
pub fn correlation_matrix(returns: &ReturnsTable) -> CorrelationMatrix {
    let symbols: Vec<String> = returns.symbols().iter().map(|s| s.to_string()).collect();
    let n = symbols.len();
    let mut values = vec![vec![f64::NAN; n]; n];

    for (i, a) in symbols.iter().enumerate() {
        let col_a = returns.column(a).expect("symbol from same table");
        let defined = col_a.iter().filter(|v| v.is_finite()).count();
        if defined >= 2 {
            values[i][i] = 1.0;
        }
        for (j, b) in symbols.iter().enumerate().skip(i + 1) {
            let col_b = returns.column(b).expect("symbol from same table");
            let r = pairwise_pearson(col_a, col_b);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix { symbols, values }
}

/// Rolling sample standard deviation of returns over a trailing window,
/// expressed in percent.
///
/// A row is defined only once the window holds `window` defined observations;
/// any NaN inside the trailing window makes the row NaN. The full-length
/// series is returned; use `tail` on the result for display truncation.
pub fn volatility(returns: &ReturnsTable, window: usize) -> VolatilityTable {
    assert!(window >= 2, "volatility window must be >= 2");

    let mut columns = BTreeMap::new();
    for symbol in returns.symbols() {
        let col = returns.column(symbol).expect("symbol from same table");
        let mut vol = vec![f64::NAN; col.len()];
        for t in 0..col.len() {
            if t + 1 < window {
                continue;
            }
            let slice = &col[t + 1 - window..=t];
            if slice.iter().all(|v| v.is_finite()) {
                vol[t] = sample_std(slice) * 100.0;
            }
        }
        columns.insert(symbol.to_string(), vol);
    }
    VolatilityTable::new(returns.dates().to_vec(), columns)
}

/// Pearson correlation over rows where both values are defined.
fn pairwise_pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-15 {
        return f64::NAN; // at least one side has zero variance
    }
    cov / denom
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}
