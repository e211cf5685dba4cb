//! Processor: turns cached archives into statement and indicator tables.
//!
//! Each cached year is an independent unit of work; a malformed archive
//! is reported and skipped, never aborting the batch. Output tables are
//! rebuilt from scratch and published atomically, so reruns on unchanged
//! inputs produce identical tables.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::indicators::{self, LineItems};
use crate::models::{IndicatorRecord, StatementRecord, StatementRow, StatementType};
use crate::parser;
use crate::storage::Store;

pub const BALANCE_SHEET_TABLE: &str = "balance_sheet.csv";
pub const INCOME_STATEMENT_TABLE: &str = "income_statement.csv";
pub const CASH_FLOW_TABLE: &str = "cash_flow.csv";
pub const INDICATORS_TABLE: &str = "indicators.csv";

/// Per-year results of a processing batch.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub years_processed: Vec<u16>,
    pub failed_years: Vec<(u16, String)>,
    pub companies: usize,
    pub indicator_rows: usize,
}

impl ProcessSummary {
    pub fn is_total_failure(&self) -> bool {
        self.years_processed.is_empty() && !self.failed_years.is_empty()
    }

    pub fn print(&self) {
        println!("\nProcessing summary:");
        for year in &self.years_processed {
            println!("  ✓ {year}: processed");
        }
        for (year, err) in &self.failed_years {
            println!("  ✗ {year}: {err}");
        }
        println!(
            "  {} companies, {} indicator rows written",
            self.companies, self.indicator_rows
        );
    }
}

/// Orchestrates parse → merge → compute → publish over the store.
pub struct Processor {
    store: Store,
}

impl Processor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn run(&self) -> Result<ProcessSummary, PipelineError> {
        let registry: Option<BTreeSet<String>> = self
            .store
            .read_companies()?
            .map(|names| names.into_iter().collect());
        if registry.is_none() {
            warn!("no company registry cached; processing all companies");
        }

        let years = self.store.cached_years()?;
        let mut summary = ProcessSummary::default();
        if years.is_empty() {
            warn!("no cached archives to process; run collect first");
            return Ok(summary);
        }

        let mut records: Vec<StatementRecord> = Vec::new();
        for year in years {
            match parser::parse_archive(&self.store.archive_path(year), year, registry.as_ref()) {
                Ok(mut parsed) => {
                    info!("year {year}: parsed {} statement records", parsed.len());
                    records.append(&mut parsed);
                    summary.years_processed.push(year);
                }
                Err(PipelineError::Storage(e)) => return Err(PipelineError::Storage(e)),
                Err(e) => {
                    warn!("year {year}: {e}");
                    summary.failed_years.push((year, e.to_string()));
                }
            }
        }

        let balance_rows = statement_rows(
            &records,
            &[
                StatementType::BalanceSheetAssets,
                StatementType::BalanceSheetLiabilities,
            ],
        );
        let income_rows = statement_rows(&records, &[StatementType::IncomeStatement]);
        let cash_rows = statement_rows(&records, &[StatementType::CashFlow]);
        let indicator_rows = compute_indicators(&records);

        summary.companies = indicator_rows
            .iter()
            .map(|r| r.company.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        summary.indicator_rows = indicator_rows.len();

        self.store.write_table(BALANCE_SHEET_TABLE, &balance_rows)?;
        self.store.write_table(INCOME_STATEMENT_TABLE, &income_rows)?;
        self.store.write_table(CASH_FLOW_TABLE, &cash_rows)?;
        self.store.write_table(INDICATORS_TABLE, &indicator_rows)?;

        info!(
            "processing finished: {} indicator rows for {} companies",
            summary.indicator_rows, summary.companies
        );
        Ok(summary)
    }
}

/// Flatten records of the given statement types into sorted table rows.
fn statement_rows(records: &[StatementRecord], types: &[StatementType]) -> Vec<StatementRow> {
    let mut rows = Vec::new();
    for record in records.iter().filter(|r| types.contains(&r.statement)) {
        for (code, item) in &record.accounts {
            rows.push(StatementRow {
                company: record.company.clone(),
                period: record.period,
                account: code.clone(),
                description: item.description.clone(),
                value: item.value,
            });
        }
    }
    rows.sort_by(|a, b| {
        (&a.company, a.period, &a.account).cmp(&(&b.company, b.period, &b.account))
    });
    rows
}

/// Merge balance-sheet and income items per (company, period) and run the
/// indicator formulas. Cash-flow items carry no ratio inputs.
fn compute_indicators(records: &[StatementRecord]) -> Vec<IndicatorRecord> {
    let mut merged: BTreeMap<(String, NaiveDate), LineItems> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| r.statement != StatementType::CashFlow)
    {
        merged
            .entry((record.company.clone(), record.period))
            .or_default()
            .merge(record);
    }

    merged
        .into_iter()
        .map(|((company, period), items)| indicators::compute(&company, period, &items))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn record(
        company: &str,
        statement: StatementType,
        accounts: &[(&str, i64)],
    ) -> StatementRecord {
        StatementRecord {
            company: company.to_string(),
            period: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            statement,
            accounts: accounts
                .iter()
                .map(|(code, value)| {
                    (
                        code.to_string(),
                        LineItem {
                            value: Decimal::from(*value),
                            description: String::new(),
                            version: 1,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn statement_rows_are_deterministically_sorted() {
        let records = vec![
            record("ZULU SA", StatementType::BalanceSheetAssets, &[("1.01", 10)]),
            record(
                "ALFA SA",
                StatementType::BalanceSheetAssets,
                &[("1.01.01", 5), ("1.01", 7)],
            ),
        ];
        let rows = statement_rows(&records, &[StatementType::BalanceSheetAssets]);
        let keys: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.company.as_str(), r.account.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ALFA SA", "1.01"),
                ("ALFA SA", "1.01.01"),
                ("ZULU SA", "1.01"),
            ]
        );
    }

    #[test]
    fn indicators_merge_balance_and_income_per_period() {
        let records = vec![
            record(
                "ACME SA",
                StatementType::BalanceSheetAssets,
                &[("1.01.01", 100), ("1.01", 400)],
            ),
            record(
                "ACME SA",
                StatementType::BalanceSheetLiabilities,
                &[("2.01", 50)],
            ),
            record(
                "ACME SA",
                StatementType::IncomeStatement,
                &[("3.01", 500), ("3.11", 80)],
            ),
        ];
        let rows = compute_indicators(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].immediate_liquidity, Some(Decimal::from(2)));
        assert_eq!(
            rows[0].net_margin,
            Some(Decimal::from(80) / Decimal::from(500))
        );
        // No balance-sheet equity line: ROE is undefined, not zero.
        assert_eq!(rows[0].roe, None);
    }
}
