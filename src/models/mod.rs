use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Financial statement types published in a DFP archive.
///
/// The consolidated variants are the ones the pipeline consumes; the
/// archive member for a type is `dfp_cia_aberta_<stem>_<year>.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatementType {
    /// BPA: balance sheet, asset side.
    BalanceSheetAssets,
    /// BPP: balance sheet, liability and equity side.
    BalanceSheetLiabilities,
    /// DRE: income statement.
    IncomeStatement,
    /// DFC (indirect method): cash flow statement.
    CashFlow,
}

impl StatementType {
    pub const ALL: [StatementType; 4] = [
        StatementType::BalanceSheetAssets,
        StatementType::BalanceSheetLiabilities,
        StatementType::IncomeStatement,
        StatementType::CashFlow,
    ];

    /// Archive member stem for this statement type.
    pub fn file_stem(self) -> &'static str {
        match self {
            StatementType::BalanceSheetAssets => "BPA_con",
            StatementType::BalanceSheetLiabilities => "BPP_con",
            StatementType::IncomeStatement => "DRE_con",
            StatementType::CashFlow => "DFC_MI_con",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatementType::BalanceSheetAssets => "balance_sheet_assets",
            StatementType::BalanceSheetLiabilities => "balance_sheet_liabilities",
            StatementType::IncomeStatement => "income_statement",
            StatementType::CashFlow => "cash_flow",
        }
    }
}

/// A single normalized line item after duplicate resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub value: Decimal,
    pub description: String,
    /// Filing version (`VERSAO`) that produced this value. Restatements
    /// carry a higher version; last-write-wins keeps the highest.
    pub version: u32,
}

/// Normalized statement line items for one company, fiscal period and
/// statement type. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    pub company: String,
    /// Fiscal period end date (`DT_REFER`).
    pub period: NaiveDate,
    pub statement: StatementType,
    /// Account code (`CD_CONTA`) to line item.
    pub accounts: BTreeMap<String, LineItem>,
}

/// One row of a processed statement table on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementRow {
    pub company: String,
    pub period: NaiveDate,
    pub account: String,
    pub description: String,
    pub value: Decimal,
}

/// Computed indicators for one company and fiscal period.
///
/// Every field is either a defined decimal or `None`, the explicit
/// undefined state for a zero or missing denominator. `None` serializes
/// as an empty CSV field and a JSON null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorRecord {
    pub company: String,
    pub period: NaiveDate,
    pub immediate_liquidity: Option<Decimal>,
    pub dry_liquidity: Option<Decimal>,
    pub current_liquidity: Option<Decimal>,
    pub general_liquidity: Option<Decimal>,
    pub debt_to_equity: Option<Decimal>,
    pub debt_to_assets: Option<Decimal>,
    pub debt_to_ebit: Option<Decimal>,
    pub gross_margin: Option<Decimal>,
    pub net_margin: Option<Decimal>,
    pub ebit_margin: Option<Decimal>,
    pub roe: Option<Decimal>,
    pub roa: Option<Decimal>,
    pub roic: Option<Decimal>,
}

/// Quote bar timeframes understood by the terminal bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    Mn1,
}

impl Timeframe {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
            Timeframe::Mn1 => "MN1",
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            "MN1" => Ok(Timeframe::Mn1),
            other => Err(format!("invalid timeframe: {other}")),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV price bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteBar {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

/// Configuration for the application.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Base URL of the DFP archive listing (no trailing slash).
    pub dfp_base_url: String,
    /// URL of the open-company registry CSV.
    pub registry_url: String,
    /// Base URL of the quote terminal bridge (no trailing slash).
    pub quote_bridge_url: String,
    pub max_concurrent_downloads: usize,
    pub http_timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Config {
    pub const DEFAULT_DFP_BASE_URL: &'static str =
        "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/DFP/DADOS";
    pub const DEFAULT_REGISTRY_URL: &'static str =
        "https://dados.cvm.gov.br/dados/CIA_ABERTA/CAD/DADOS/cad_cia_aberta.csv";

    /// Load configuration from environment variables, with defaults for
    /// everything so a bare `collect`/`process` run works out of the box.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Config {
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            dfp_base_url: std::env::var("CVM_DFP_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_DFP_BASE_URL.to_string()),
            registry_url: std::env::var("CVM_REGISTRY_URL")
                .unwrap_or_else(|_| Self::DEFAULT_REGISTRY_URL.to_string()),
            quote_bridge_url: std::env::var("QUOTE_BRIDGE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:18812".to_string()),
            max_concurrent_downloads: std::env::var("MAX_CONCURRENT_DOWNLOADS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            retry_attempts: std::env::var("RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        }
    }
}
