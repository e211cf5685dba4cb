//! Quote fetcher: OHLCV bars from an external terminal bridge.
//!
//! The bridge is a thin HTTP facade over the trading terminal; the
//! pipeline only depends on the `QuoteProvider` seam, so the terminal
//! side stays replaceable (and mockable in tests). Tickers are
//! independent units of work: one unreachable symbol never aborts the
//! batch, and an unreachable bridge degrades to `SourceUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::models::{Config, QuoteBar, Timeframe};
use crate::storage::Store;

/// Source of historical price bars.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_bars(
        &self,
        ticker: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<QuoteBar>, PipelineError>;
}

/// Bar payload returned by the bridge.
#[derive(Debug, Deserialize)]
struct BridgeBar {
    /// Unix timestamp, seconds.
    time: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: i64,
}

/// HTTP client for the terminal bridge.
pub struct TerminalBridge {
    client: Client,
    base_url: String,
}

impl TerminalBridge {
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("cvm-fundamentals/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.quote_bridge_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for TerminalBridge {
    async fn fetch_bars(
        &self,
        ticker: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<QuoteBar>, PipelineError> {
        let url = format!(
            "{}/bars?symbol={ticker}&timeframe={timeframe}",
            self.base_url
        );
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::SourceUnavailable(format!(
                "bridge returned {} for {ticker}",
                response.status()
            )));
        }

        let raw: Vec<BridgeBar> = response
            .json()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;

        let mut bars = Vec::with_capacity(raw.len());
        for bar in raw {
            let Some(timestamp) = DateTime::from_timestamp(bar.time, 0) else {
                warn!("{ticker}: dropping bar with invalid timestamp {}", bar.time);
                continue;
            };
            bars.push(QuoteBar {
                ticker: ticker.to_string(),
                timestamp,
                timeframe,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            });
        }
        debug!("{ticker}: fetched {} bars", bars.len());
        Ok(bars)
    }
}

/// Per-ticker results of a quote batch.
#[derive(Debug, Default)]
pub struct QuoteSummary {
    pub stored: Vec<(String, usize)>,
    pub failed: Vec<(String, String)>,
}

impl QuoteSummary {
    pub fn is_total_failure(&self) -> bool {
        self.stored.is_empty() && !self.failed.is_empty()
    }

    pub fn print(&self) {
        println!("\nQuote summary:");
        for (ticker, count) in &self.stored {
            println!("  ✓ {ticker}: {count} bars stored");
        }
        for (ticker, err) in &self.failed {
            println!("  ✗ {ticker}: {err}");
        }
    }
}

/// Fetch and persist bars for each ticker, isolating per-ticker failures.
pub async fn fetch_and_store(
    provider: &dyn QuoteProvider,
    store: &Store,
    tickers: &[String],
    timeframe: Timeframe,
) -> Result<QuoteSummary, PipelineError> {
    let mut summary = QuoteSummary::default();

    for ticker in tickers {
        match provider.fetch_bars(ticker, timeframe).await {
            Ok(bars) if bars.is_empty() => {
                warn!("{ticker}: source returned no bars");
                summary
                    .failed
                    .push((ticker.clone(), "no bars returned".to_string()));
            }
            Ok(bars) => {
                let path = store.write_quotes(ticker, &bars)?;
                info!("{ticker}: stored {} bars at {}", bars.len(), path.display());
                summary.stored.push((ticker.clone(), bars.len()));
            }
            Err(e) => {
                warn!("{ticker}: {e}");
                summary.failed.push((ticker.clone(), e.to_string()));
            }
        }
    }

    Ok(summary)
}
