//! Filing collector: downloads yearly DFP archives and the open-company
//! registry from the CVM portal.
//!
//! Years are independent units of work: downloads run on a bounded pool,
//! transient failures retry with backoff, a year absent at the source is
//! skipped with a warning, and one bad year never aborts the range.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::models::Config;
use crate::parser::decode_latin1;
use crate::storage::Store;

/// Registry sectors excluded from processing (financial statements of
/// banks and insurers are not comparable to the operating formulas).
const EXCLUDED_SECTORS: [&str; 3] = [
    "Bancos",
    "Intermediação Financeira",
    "Seguradoras e Corretoras",
];

/// Outcome of one year's fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded,
    AlreadyCached,
}

/// Per-year results of a collection batch.
#[derive(Debug, Default)]
pub struct CollectSummary {
    pub downloaded: Vec<u16>,
    pub cached: Vec<u16>,
    pub missing: Vec<u16>,
    pub failed: Vec<(u16, String)>,
}

impl CollectSummary {
    /// The batch is only a failure when nothing succeeded and at least
    /// one year failed hard; missing source years are partial success.
    pub fn is_total_failure(&self) -> bool {
        self.downloaded.is_empty() && self.cached.is_empty() && !self.failed.is_empty()
    }

    pub fn print(&self) {
        println!("\nCollection summary:");
        for year in &self.downloaded {
            println!("  ✓ {year}: downloaded");
        }
        for year in &self.cached {
            println!("  ✓ {year}: already cached, skipped");
        }
        for year in &self.missing {
            println!("  ✗ {year}: no archive published at source");
        }
        for (year, err) in &self.failed {
            println!("  ✗ {year}: {err}");
        }
    }
}

/// Downloads raw archives into the store.
pub struct Collector {
    client: Client,
    store: Store,
    dfp_base_url: String,
    registry_url: String,
    max_concurrent: usize,
    retry_attempts: u32,
}

impl Collector {
    pub fn new(config: &Config, store: Store) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("cvm-fundamentals/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            store,
            dfp_base_url: config.dfp_base_url.trim_end_matches('/').to_string(),
            registry_url: config.registry_url.clone(),
            max_concurrent: config.max_concurrent_downloads.max(1),
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    /// Fetch every year in the inclusive range. Idempotent: cached years
    /// are skipped unless `force` re-downloads them.
    pub async fn collect(
        &self,
        start_year: u16,
        end_year: u16,
        force: bool,
    ) -> Result<CollectSummary, PipelineError> {
        info!("collecting DFP archives for {start_year}..={end_year}");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let results: Vec<(u16, Result<FetchOutcome, PipelineError>)> =
            stream::iter(start_year..=end_year)
                .map(|year| {
                    let semaphore = Arc::clone(&semaphore);
                    async move {
                        let _permit = semaphore.acquire().await.expect("semaphore never closed");
                        (year, self.fetch_year(year, force).await)
                    }
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

        let mut summary = CollectSummary::default();
        for (year, result) in results {
            match result {
                Ok(FetchOutcome::Downloaded) => summary.downloaded.push(year),
                Ok(FetchOutcome::AlreadyCached) => summary.cached.push(year),
                Err(PipelineError::NotFound { .. }) => {
                    warn!("year {year}: no archive published, skipping");
                    summary.missing.push(year);
                }
                // Unwritable store is systemic, not a per-year condition.
                Err(PipelineError::Storage(e)) => return Err(PipelineError::Storage(e)),
                Err(e) => summary.failed.push((year, e.to_string())),
            }
        }

        summary.downloaded.sort_unstable();
        summary.cached.sort_unstable();
        summary.missing.sort_unstable();
        summary.failed.sort_by_key(|(year, _)| *year);

        info!(
            "collection finished: {} downloaded, {} cached, {} missing, {} failed",
            summary.downloaded.len(),
            summary.cached.len(),
            summary.missing.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    async fn fetch_year(&self, year: u16, force: bool) -> Result<FetchOutcome, PipelineError> {
        if self.store.has_archive(year) && !force {
            debug!("year {year}: archive already cached");
            return Ok(FetchOutcome::AlreadyCached);
        }

        let url = format!("{}/dfp_cia_aberta_{year}.zip", self.dfp_base_url);
        let mut attempt = 0u32;
        loop {
            match self.try_download(&url, year).await {
                Ok(bytes) => {
                    self.store.write_atomic(&self.store.archive_path(year), &bytes)?;
                    info!("year {year}: downloaded {} bytes", bytes.len());
                    return Ok(FetchOutcome::Downloaded);
                }
                // A missing year is a fact about the source, not transient.
                Err(e @ PipelineError::NotFound { .. }) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry_attempts {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(500u64 << attempt.min(4));
                    warn!("year {year}: attempt {attempt} failed ({e}), retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn try_download(&self, url: &str, year: u16) -> Result<Vec<u8>, PipelineError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound { year });
        }
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Download the open-company registry and persist the filtered list
    /// of active, exchange-listed, non-financial company names.
    pub async fn collect_registry(&self) -> Result<usize, PipelineError> {
        info!("downloading company registry");
        let response = self
            .client
            .get(&self.registry_url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        let names = filter_registry(&bytes)?;
        self.store.write_companies(&names)?;
        info!("registry: {} active listed companies", names.len());
        Ok(names.len())
    }
}

fn filter_registry(raw: &[u8]) -> Result<Vec<String>, PipelineError> {
    let text = decode_latin1(raw);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let col = |name: &str| -> Result<usize, PipelineError> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            PipelineError::MalformedArchive(format!("registry: missing column {name}"))
        })
    };
    let name_idx = col("DENOM_SOCIAL")?;
    let status_idx = col("SIT")?;
    let market_idx = col("TP_MERC")?;
    let sector_idx = col("SETOR_ATIV")?;

    let mut names = BTreeSet::new();
    for row in reader.records() {
        let row = row?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim();

        if field(status_idx) != "ATIVO" || field(market_idx) != "BOLSA" {
            continue;
        }
        if EXCLUDED_SECTORS.contains(&field(sector_idx)) {
            continue;
        }
        let name = field(name_idx);
        if !name.is_empty() {
            names.insert(name.to_string());
        }
    }
    Ok(names.into_iter().collect())
}
