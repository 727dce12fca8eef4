mod config;
mod error;
mod features;
mod models;
mod output;
mod pipeline;
mod source;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{AppConfig, OutputFormat};
use crate::pipeline::{Index, Pipeline, Stock};

#[derive(Parser)]
#[command(
    name = "earnings-ml",
    about = "Earnings-aware ML datasets from price + fundamentals series",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Build the ML dataset for one or more tickers and write it to disk
    Ml {
        /// Ticker symbols, e.g. NVDA AAPL
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Output directory (default: output.dir from config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format (default: output.format from config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Print the normalised price table (with pct change) as CSV
    Price { ticker: String },

    /// Print the normalised fundamentals table as CSV
    Core { ticker: String },

    /// Print one differenced feature column of the ML dataset as CSV
    Feature { ticker: String, column: String },

    /// Print the stock index listing as CSV
    Index,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "earnings_ml=info,warn",
        1 => "earnings_ml=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Ml {
            tickers,
            out,
            format,
        } => {
            if let Some(dir) = out {
                config.output.dir = dir;
            }
            if let Some(format) = format {
                config.output.format = format;
            }

            let _t = utils::Timer::start("ML dataset build");
            let stats = Pipeline::new(config)?.run(&tickers).await?;
            info!(
                "Done: {} tickers, {} rows, {} errors",
                stats.tickers_processed,
                utils::fmt_count(stats.rows_written),
                stats.errors
            );
            if stats.errors == stats.tickers_processed {
                anyhow::bail!("every ticker failed");
            }
        }

        Command::Price { ticker } => {
            let pipeline = Pipeline::new(config)?;
            let table = Stock::new(&ticker, pipeline.source())
                .price()
                .await
                .with_context(|| format!("price({})", ticker))?;
            let n = output::write_price_csv(io::stdout().lock(), &table)?;
            info!("{}: {} price rows", ticker, utils::fmt_count(n));
        }

        Command::Core { ticker } => {
            let pipeline = Pipeline::new(config)?;
            let table = Stock::new(&ticker, pipeline.source())
                .core()
                .await
                .with_context(|| format!("core({})", ticker))?;
            let n = output::write_core_csv(io::stdout().lock(), &table)?;
            info!(
                "{}: {} core rows x {} metrics",
                ticker,
                utils::fmt_count(n),
                table.columns().len()
            );
        }

        Command::Feature { ticker, column } => {
            let pipeline = Pipeline::new(config)?;
            let ds = Stock::new(&ticker, pipeline.source())
                .ml()
                .await
                .with_context(|| format!("ml({})", ticker))?;
            let n = output::write_feature_csv(io::stdout().lock(), &ds, &column)?;
            info!("{}: {} rows of {}", ds.ticker, utils::fmt_count(n), column);
        }

        Command::Index => {
            let pipeline = Pipeline::new(config)?;
            let entries = Index::new(pipeline.source())
                .stock()
                .await
                .context("index listing")?;
            let n = output::write_index_csv(io::stdout().lock(), &entries)?;
            info!("{} listed stocks", utils::fmt_count(n));
        }
    }

    Ok(())
}
