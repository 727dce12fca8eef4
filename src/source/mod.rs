pub mod http_client;

use crate::config::SourceConfig;
use crate::error::{DatasetError, FetchError};
use crate::features::cleaner::normalise_ticker;
use crate::models::{Envelope, IndexEntry, StockPayload};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable data source abstraction.
#[async_trait]
pub trait StockDataSource: Send + Sync {
    /// Raw price and core series for one ticker.
    async fn fetch(&self, ticker: &str) -> Result<StockPayload, DatasetError>;

    /// Every listed stock.
    async fn fetch_index(&self) -> Result<Vec<IndexEntry>, DatasetError>;
}

// ── HTTP source ───────────────────────────────────────────────────────────────

pub struct HttpSource {
    client: HttpClient,
    base_url: Url,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: parse_base_url(&config.base_url)
                .with_context(|| format!("Invalid source base URL {:?}", config.base_url))?,
        })
    }

    /// e.g. nvda → {base}/stock/NVDA
    fn ticker_url(&self, ticker: &str) -> Result<Url, FetchError> {
        Ok(self
            .base_url
            .join(&format!("stock/{}", normalise_ticker(ticker)))?)
    }

    fn index_url(&self) -> Result<Url, FetchError> {
        Ok(self.base_url.join("stock/us_index")?)
    }
}

/// Relative joins replace the last path segment unless the base ends in `/`.
fn parse_base_url(raw: &str) -> Result<Url, FetchError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

#[async_trait]
impl StockDataSource for HttpSource {
    async fn fetch(&self, ticker: &str) -> Result<StockPayload, DatasetError> {
        let url = self.ticker_url(ticker)?;
        let env: Envelope<StockPayload> = self.client.get_json(url.as_str()).await?;

        if env.data.price.is_empty() {
            warn!("{}: data source returned no price rows", ticker);
        }
        debug!(
            "{}: {} price rows, {} core rows",
            ticker,
            env.data.price.len(),
            env.data.core.len()
        );
        Ok(env.data)
    }

    async fn fetch_index(&self) -> Result<Vec<IndexEntry>, DatasetError> {
        let url = self.index_url()?;
        let env: Envelope<Vec<IndexEntry>> = self.client.get_json(url.as_str()).await?;
        debug!("index: {} entries", env.data.len());
        Ok(env.data)
    }
}
