//! Pipeline orchestrator: ties data source → feature builders → output together.
//!
//! `Stock` is the per-ticker handle (`price()`, `core()`, `ml()`); every call
//! fetches fresh data and builds fresh tables. `Pipeline::run()` fans a list of
//! tickers out over a bounded number of concurrent tasks. Tickers share nothing,
//! so one failing ticker is logged and counted without stopping the others.

use crate::config::AppConfig;
use crate::error::DatasetError;
use crate::features::cleaner::normalise_ticker;
use crate::features::{assemble, build_core_table, build_price_table};
use crate::models::{CoreTable, IndexEntry, MlDataset, PriceTable, StockPayload};
use crate::output::save_dataset;
use crate::source::{HttpSource, StockDataSource};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

// ── Stock handle ──────────────────────────────────────────────────────────────

pub struct Stock<'a> {
    ticker: String,
    source: &'a dyn StockDataSource,
}

impl<'a> Stock<'a> {
    pub fn new(ticker: &str, source: &'a dyn StockDataSource) -> Self {
        Self {
            ticker: normalise_ticker(ticker),
            source,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub async fn fetch(&self) -> Result<StockPayload, DatasetError> {
        self.source.fetch(&self.ticker).await
    }

    pub async fn price(&self) -> Result<PriceTable, DatasetError> {
        build_price_table(self.fetch().await?.price)
    }

    pub async fn core(&self) -> Result<CoreTable, DatasetError> {
        build_core_table(self.fetch().await?.core)
    }

    /// Price and core combined into one earnings-aware dataset.
    pub async fn ml(&self) -> Result<MlDataset, DatasetError> {
        let payload = self.fetch().await?;
        let price = build_price_table(payload.price)?;
        let core = build_core_table(payload.core)?;
        assemble(&self.ticker, &price, &core)
    }
}

// ── Index listing ─────────────────────────────────────────────────────────────

pub struct Index<'a> {
    source: &'a dyn StockDataSource,
}

impl<'a> Index<'a> {
    pub fn new(source: &'a dyn StockDataSource) -> Self {
        Self { source }
    }

    pub async fn stock(&self) -> Result<Vec<IndexEntry>, DatasetError> {
        self.source.fetch_index().await
    }
}

// ── Multi-ticker run ──────────────────────────────────────────────────────────

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn StockDataSource>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let source = HttpSource::new(&config.source).context("Failed to build data source")?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    pub fn with_source(config: AppConfig, source: Arc<dyn StockDataSource>) -> Self {
        Self { config, source }
    }

    pub fn source(&self) -> &dyn StockDataSource {
        self.source.as_ref()
    }

    /// Build and write a dataset for every ticker. Duplicate tickers run once.
    pub async fn run(&self, tickers: &[String]) -> Result<PipelineStats> {
        let symbols: BTreeSet<String> = tickers.iter().map(|t| normalise_ticker(t)).collect();
        info!(
            "=== Building ML datasets for {} tickers (concurrency {}) ===",
            symbols.len(),
            self.config.pipeline.concurrency
        );

        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency.max(1)));
        let mut handles = Vec::new();

        for symbol in &symbols {
            let task_symbol = symbol.clone();
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let output = self.config.output.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;

                let stock = Stock::new(&task_symbol, source.as_ref());
                let ds = stock
                    .ml()
                    .await
                    .with_context(|| format!("ml({})", stock.ticker()))?;

                if ds.is_empty() {
                    warn!("{}: no price dates on or after the first earnings date", stock.ticker());
                }

                let path = save_dataset(&output.dir, &ds, output.format)
                    .with_context(|| format!("save_dataset({})", stock.ticker()))?;

                let summary = ds.summary();
                info!(
                    "{}: {} rows, {} earnings dates ({:?} → {:?}), next earnings {:?} → {:?}",
                    stock.ticker(),
                    summary.rows,
                    summary.earnings_dates,
                    summary.first,
                    summary.last,
                    summary.next_earnings_date,
                    path
                );

                Ok::<usize, anyhow::Error>(summary.rows)
            });

            handles.push((symbol.clone(), handle));
        }

        let mut rows_written = 0usize;
        let mut errors = 0usize;
        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(n)) => rows_written += n,
                Ok(Err(e)) => {
                    warn!("{}: {:#}", symbol, e);
                    errors += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", symbol, e);
                    errors += 1;
                }
            }
        }

        let stats = PipelineStats {
            tickers_processed: symbols.len(),
            rows_written,
            errors,
        };
        info!(
            "=== Done: {} tickers | {} rows | {} errors ===",
            stats.tickers_processed, stats.rows_written, stats.errors
        );
        Ok(stats)
    }
}

#[derive(Debug, PartialEq)]
pub struct PipelineStats {
    pub tickers_processed: usize,
    pub rows_written: usize,
    pub errors: usize,
}
