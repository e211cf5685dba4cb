//! Filing parser: raw DFP archive to typed statement records.
//!
//! DFP archives are zips of `;`-separated, Latin-1, comma-decimal CSV
//! files, one per statement type per year. Only consolidated statements
//! and the latest exercise rows are kept; untyped rows never leave this
//! module.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::indicators::accounts;
use crate::models::{LineItem, StatementRecord, StatementType};

const COL_COMPANY: &str = "DENOM_CIA";
const COL_PERIOD: &str = "DT_REFER";
const COL_VERSION: &str = "VERSAO";
const COL_EXERCISE_ORDER: &str = "ORDEM_EXERC";
const COL_ACCOUNT: &str = "CD_CONTA";
const COL_DESCRIPTION: &str = "DS_CONTA";
const COL_VALUE: &str = "VL_CONTA";

/// Rows are published for the reported year and the comparative prior
/// year; only the reported one ("ÚLTIMO") is a filing of this period.
const LATEST_EXERCISE: &str = "ÚLTIMO";

/// Account codes the pipeline normalizes, per statement type. Everything
/// else in the standardized chart of accounts is ignored.
fn known_codes(statement: StatementType) -> &'static [&'static str] {
    use accounts::*;
    match statement {
        StatementType::BalanceSheetAssets => &[
            TOTAL_ASSETS,
            CURRENT_ASSETS,
            CASH,
            INVENTORY,
            PREPAID_EXPENSES,
            LONG_TERM_ASSETS,
        ],
        StatementType::BalanceSheetLiabilities => &[
            TOTAL_LIABILITIES_AND_EQUITY,
            CURRENT_LIABILITIES,
            SHORT_TERM_DEBT,
            LONG_TERM_LIABILITIES,
            LONG_TERM_DEBT,
            EQUITY,
        ],
        StatementType::IncomeStatement => &[
            REVENUE,
            COGS,
            GROSS_PROFIT,
            EBIT,
            INCOME_TAX,
            NET_INCOME,
        ],
        StatementType::CashFlow => &[
            CASH_FLOW_OPERATING,
            CASH_FLOW_INVESTING,
            CASH_FLOW_FINANCING,
            CASH_NET_CHANGE,
        ],
    }
}

/// Parse the cached archive for `year` into statement records. When a
/// company registry is given, companies outside it are dropped.
pub fn parse_archive(
    path: &Path,
    year: u16,
    companies: Option<&BTreeSet<String>>,
) -> Result<Vec<StatementRecord>, PipelineError> {
    let file = File::open(path)?;
    parse_reader(file, year, companies)
}

/// Archive parsing over any seekable reader; tests feed in-memory zips.
pub fn parse_reader<R: Read + Seek>(
    reader: R,
    year: u16,
    companies: Option<&BTreeSet<String>>,
) -> Result<Vec<StatementRecord>, PipelineError> {
    let mut archive = zip::ZipArchive::new(reader)?;

    type Key = (String, NaiveDate, StatementType);
    let mut grouped: BTreeMap<Key, BTreeMap<String, LineItem>> = BTreeMap::new();
    let mut members_found = 0usize;

    for statement in StatementType::ALL {
        let member = format!("dfp_cia_aberta_{}_{}.csv", statement.file_stem(), year);
        let mut raw = Vec::new();
        match archive.by_name(&member) {
            Ok(mut entry) => {
                entry.read_to_end(&mut raw)?;
            }
            Err(zip::result::ZipError::FileNotFound) => {
                warn!("archive member {member} not present, skipping statement");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        members_found += 1;

        let text = decode_latin1(&raw);
        parse_statement_csv(&member, &text, statement, companies, &mut grouped)?;
    }

    if members_found == 0 {
        return Err(PipelineError::MalformedArchive(format!(
            "no statement members found for year {year}"
        )));
    }

    Ok(grouped
        .into_iter()
        .map(|((company, period, statement), accounts)| StatementRecord {
            company,
            period,
            statement,
            accounts,
        })
        .collect())
}

fn parse_statement_csv(
    member: &str,
    text: &str,
    statement: StatementType,
    companies: Option<&BTreeSet<String>>,
    grouped: &mut BTreeMap<(String, NaiveDate, StatementType), BTreeMap<String, LineItem>>,
) -> Result<(), PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let col = |name: &str| -> Result<usize, PipelineError> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            PipelineError::MalformedArchive(format!("{member}: missing column {name}"))
        })
    };

    let company_idx = col(COL_COMPANY)?;
    let period_idx = col(COL_PERIOD)?;
    let version_idx = col(COL_VERSION)?;
    let order_idx = col(COL_EXERCISE_ORDER)?;
    let account_idx = col(COL_ACCOUNT)?;
    let description_idx = col(COL_DESCRIPTION)?;
    let value_idx = col(COL_VALUE)?;

    let codes = known_codes(statement);
    let mut kept = 0usize;
    let mut unknown = 0usize;
    let mut skipped = 0usize;

    for row in reader.records() {
        let row = row?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim();

        if field(order_idx) != LATEST_EXERCISE {
            continue;
        }

        let account = field(account_idx);
        if !codes.contains(&account) {
            unknown += 1;
            continue;
        }

        let company = field(company_idx);
        if company.is_empty() {
            skipped += 1;
            continue;
        }
        if let Some(allowed) = companies {
            if !allowed.contains(company) {
                continue;
            }
        }

        let Ok(period) = NaiveDate::parse_from_str(field(period_idx), "%Y-%m-%d") else {
            skipped += 1;
            continue;
        };
        let Ok(version) = field(version_idx).parse::<u32>() else {
            skipped += 1;
            continue;
        };
        let Some(value) = parse_decimal_comma(field(value_idx)) else {
            skipped += 1;
            continue;
        };

        let item = LineItem {
            value,
            description: field(description_idx).to_string(),
            version,
        };

        let accounts = grouped
            .entry((company.to_string(), period, statement))
            .or_default();

        // Restated filings resubmit the same company/period with a higher
        // VERSAO; last-write-wins keeps the newest one.
        match accounts.get(account) {
            Some(existing) if existing.version > version => {}
            _ => {
                accounts.insert(account.to_string(), item);
            }
        }
        kept += 1;
    }

    if unknown > 0 {
        warn!("{member}: ignored {unknown} rows with unmapped account codes");
    }
    if skipped > 0 {
        warn!("{member}: skipped {skipped} rows with unparseable fields");
    }
    debug!("{member}: kept {kept} rows");
    Ok(())
}

/// CVM publishes comma-decimal values ("1234,56").
fn parse_decimal_comma(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', ".").parse::<Decimal>().ok()
}

/// DFP CSVs are ISO-8859-1; every byte maps to the same code point.
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
