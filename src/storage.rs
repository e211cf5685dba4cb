//! Filesystem store shared by every pipeline component.
//!
//! Raw archives live under `raw/` keyed by year, processed tables under
//! `processed/`, quote bars under `quotes/`. Every write goes through a
//! temp-file-then-rename publish so an interrupted run never leaves a
//! half-written file behind; readers tolerate missing files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::QuoteBar;

const COMPANIES_FILE: &str = "companies.csv";

/// Handle to the local data store. Cheap to clone; passed explicitly to
/// each component so tests can run against a temporary directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let store = Store { root: root.into() };
        fs::create_dir_all(store.raw_dir())?;
        fs::create_dir_all(store.processed_dir())?;
        fs::create_dir_all(store.quotes_dir())?;
        debug!("store opened at {}", store.root.display());
        Ok(store)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn quotes_dir(&self) -> PathBuf {
        self.root.join("quotes")
    }

    /// Path of the raw archive for a year.
    pub fn archive_path(&self, year: u16) -> PathBuf {
        self.raw_dir().join(format!("dfp_cia_aberta_{year}.zip"))
    }

    pub fn has_archive(&self, year: u16) -> bool {
        self.archive_path(year).exists()
    }

    /// Years with a cached archive, ascending.
    pub fn cached_years(&self) -> Result<Vec<u16>, PipelineError> {
        let mut years = Vec::new();
        for entry in fs::read_dir(self.raw_dir())? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(year) = name
                .strip_prefix("dfp_cia_aberta_")
                .and_then(|rest| rest.strip_suffix(".zip"))
                .and_then(|y| y.parse::<u16>().ok())
            {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }

    /// Atomically publish `bytes` at `path`: write to a temp file in the
    /// same directory, then rename over the destination.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        let dir = path
            .parent()
            .ok_or_else(|| std::io::Error::other("path has no parent directory"))?;
        fs::create_dir_all(dir)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| std::io::Error::other("path has no file name"))?;
        let tmp = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Serialize `rows` as a `;`-separated CSV table under `processed/`.
    pub fn write_table<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf, PipelineError> {
        let path = self.processed_dir().join(name);
        self.write_atomic(&path, &to_csv_bytes(rows)?)?;
        debug!("wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }

    /// Read a processed table. A missing table is an empty result, not an
    /// error: the dashboard must tolerate a store that was never processed.
    pub fn read_table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, PipelineError> {
        let path = self.processed_dir().join(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        from_csv_bytes(&fs::read(&path)?)
    }

    /// Persist the filtered company registry.
    pub fn write_companies(&self, names: &[String]) -> Result<(), PipelineError> {
        let mut body = String::from("DENOM_SOCIAL\n");
        for name in names {
            body.push_str(name);
            body.push('\n');
        }
        let path = self.raw_dir().join(COMPANIES_FILE);
        self.write_atomic(&path, body.as_bytes())
    }

    /// Company registry, if one was collected.
    pub fn read_companies(&self) -> Result<Option<Vec<String>>, PipelineError> {
        let path = self.raw_dir().join(COMPANIES_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path)?;
        let names = body
            .lines()
            .skip(1) // header
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Some(names))
    }

    pub fn quote_path(&self, ticker: &str) -> PathBuf {
        self.quotes_dir()
            .join(format!("{}.csv", ticker.to_ascii_lowercase()))
    }

    pub fn write_quotes(&self, ticker: &str, bars: &[QuoteBar]) -> Result<PathBuf, PipelineError> {
        let path = self.quote_path(ticker);
        self.write_atomic(&path, &to_csv_bytes(bars)?)?;
        Ok(path)
    }

    pub fn read_quotes(&self, ticker: &str) -> Result<Vec<QuoteBar>, PipelineError> {
        let path = self.quote_path(ticker);
        if !path.exists() {
            return Ok(Vec::new());
        }
        from_csv_bytes(&fs::read(&path)?)
    }
}

fn to_csv_bytes<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(vec![]);
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Storage(std::io::Error::other(e)))
}

fn from_csv_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b';').from_reader(bytes);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
