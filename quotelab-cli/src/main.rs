//! QuoteLab CLI: symbol management and analytics over the local bar store.
//!
//! Commands:
//! - `add` — fetch full history for new symbols and persist them
//! - `refresh` — bring persisted symbols up to date (delta fetch only)
//! - `status` — report per-symbol file, date range, and bar count
//! - `returns` — daily changes table for a symbol subset
//! - `corr` — correlation matrix of daily changes
//! - `vol` — rolling volatility, in percent

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quotelab_core::analytics::{correlation_matrix, daily_changes, volatility, CorrelationMatrix};
use quotelab_core::config::AppConfig;
use quotelab_core::data::{ProviderGate, StdoutProgress, YahooProvider};
use quotelab_core::store::BarStore;
use quotelab_core::table::AlignedTable;
use quotelab_core::universe::UniverseLoader;

#[derive(Parser)]
#[command(name = "quotelab", about = "QuoteLab CLI: incremental daily-bar cache and analytics")]
struct Cli {
    /// Path to a TOML config file. Defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the per-symbol bar files (overrides config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch full history for new symbols and persist them.
    Add {
        /// Symbols to add (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Bring persisted symbols up to date; with no symbols, refresh all.
    Refresh {
        /// Symbols to refresh. Defaults to every persisted symbol.
        symbols: Vec<String>,
    },
    /// Report per-symbol date range and bar count.
    Status,
    /// Print the daily changes table.
    Returns {
        /// Symbols to include. Defaults to all persisted symbols.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Trailing trading days to show.
        #[arg(long, default_value_t = 100)]
        days: usize,
    },
    /// Print the correlation matrix of daily changes.
    Corr {
        /// Symbols to include. Defaults to all persisted symbols.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Trailing trading days the correlation is computed over.
        #[arg(long, default_value_t = 100)]
        days: usize,
    },
    /// Print rolling volatility in percent.
    Vol {
        /// Symbols to include. Defaults to all persisted symbols.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Rolling window in trading days. Defaults to the config value.
        #[arg(long)]
        window: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path).map_err(anyhow::Error::msg)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Add { symbols } => run_add(&config, &symbols),
        Commands::Refresh { symbols } => run_refresh(&config, &symbols),
        Commands::Status => run_status(&config),
        Commands::Returns { symbols, days } => run_returns(&config, &symbols, days),
        Commands::Corr { symbols, days } => run_corr(&config, &symbols, days),
        Commands::Vol { symbols, window } => {
            let window = window.unwrap_or(config.volatility_window);
            run_vol(&config, &symbols, window)
        }
    }
}

fn make_loader(config: &AppConfig) -> UniverseLoader {
    let gate = Arc::new(ProviderGate::default_provider());
    let provider = YahooProvider::new(gate);
    UniverseLoader::new(BarStore::new(&config.data_dir), Box::new(provider))
}

fn run_add(config: &AppConfig, symbols: &[String]) -> Result<()> {
    let mut loader = make_loader(config);
    let mut failed = 0;

    for symbol in symbols {
        match loader.add_symbol(symbol) {
            Ok(series) => println!(
                "Added {}: {} bars, {} to {}",
                series.symbol,
                series.len(),
                series.first_date().expect("non-empty series"),
                series.last_date().expect("non-empty series"),
            ),
            Err(e) => {
                eprintln!("Error: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_refresh(config: &AppConfig, symbols: &[String]) -> Result<()> {
    let mut loader = make_loader(config);

    if symbols.is_empty() {
        let report = loader.rebuild(&StdoutProgress)?;
        if !report.all_loaded() {
            for (symbol, err) in &report.skipped {
                eprintln!("Error for {symbol}: {err}");
            }
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut failed = 0;
    for symbol in symbols {
        match loader.add_symbol(symbol) {
            Ok(series) => println!(
                "{} up to date through {}",
                series.symbol,
                series.last_date().expect("non-empty series")
            ),
            Err(e) => {
                eprintln!("Error: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let store = BarStore::new(&config.data_dir);
    let symbols = store.symbols().context("scan data directory")?;

    if symbols.is_empty() {
        println!("No symbols in {}", config.data_dir.display());
        return Ok(());
    }

    println!("Store: {}", config.data_dir.display());
    println!("Symbols: {}", symbols.len());
    println!();
    println!("{:<8} {:<25} {:>10}", "Symbol", "Date Range", "Bars");
    println!("{}", "-".repeat(46));

    for symbol in &symbols {
        match store.load(symbol) {
            Ok(series) => {
                let range = format!(
                    "{} to {}",
                    series.first_date().expect("non-empty series"),
                    series.last_date().expect("non-empty series"),
                );
                println!("{:<8} {:<25} {:>10}", symbol, range, series.len());
            }
            Err(e) => println!("{:<8} {:<25} {:>10}", symbol, format!("({e})"), "-"),
        }
    }
    Ok(())
}

/// Refresh everything and return the close table, restricted to `symbols`
/// when given.
fn fresh_close_table(config: &AppConfig, symbols: &[String]) -> Result<AlignedTable> {
    let mut loader = make_loader(config);
    let report = loader.rebuild(&StdoutProgress)?;
    for (symbol, err) in &report.skipped {
        eprintln!("WARNING: excluded {symbol}: {err}");
    }

    let table = loader
        .close_table()
        .context("no close table after rebuild")?;
    if symbols.is_empty() {
        return Ok(table.clone());
    }
    let wanted: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    Ok(table.select(&wanted))
}

fn run_returns(config: &AppConfig, symbols: &[String], days: usize) -> Result<()> {
    let closes = fresh_close_table(config, symbols)?;
    let returns = daily_changes(&closes).tail(days);
    print_table("Daily changes", &returns, 4);
    Ok(())
}

fn run_corr(config: &AppConfig, symbols: &[String], days: usize) -> Result<()> {
    let closes = fresh_close_table(config, symbols)?;
    let returns = daily_changes(&closes).tail(days);
    print_matrix(&correlation_matrix(&returns));
    Ok(())
}

fn run_vol(config: &AppConfig, symbols: &[String], window: usize) -> Result<()> {
    let closes = fresh_close_table(config, symbols)?;
    let vol = volatility(&daily_changes(&closes), window);
    // Display convention: the most recent `window` rows
    print_table(&format!("{window}-day volatility [%]"), &vol.tail(window), 2);
    Ok(())
}

fn print_table(title: &str, table: &AlignedTable, precision: usize) {
    if table.is_empty() {
        println!("{title}: no data");
        return;
    }

    println!();
    println!("=== {title} ===");
    print!("{:<12}", "date");
    for symbol in table.symbols() {
        print!(" {symbol:>10}");
    }
    println!();

    for (row, date) in table.dates().iter().enumerate() {
        print!("{:<12}", date.to_string());
        for symbol in table.symbols() {
            let cell = table.value(symbol, row).expect("row within table");
            print!(" {:>10}", fmt_cell(cell, precision));
        }
        println!();
    }
}

fn print_matrix(corr: &CorrelationMatrix) {
    if corr.is_empty() {
        println!("Correlation: no data");
        return;
    }

    println!();
    println!("=== Correlation matrix ===");
    print!("{:<8}", "");
    for symbol in corr.symbols() {
        print!(" {symbol:>8}");
    }
    println!();

    for (i, symbol) in corr.symbols().iter().enumerate() {
        print!("{symbol:<8}");
        for j in 0..corr.len() {
            print!(" {:>8}", fmt_cell(corr.value(i, j), 3));
        }
        println!();
    }
}

fn fmt_cell(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{value:.precision$}")
    }
}
