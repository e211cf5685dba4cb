//! Read-only dashboard API over the processed store.
//!
//! Serves whatever the store currently holds; it never writes, never
//! blocks the batch commands, and tolerates a store that was never
//! collected or processed (empty responses, undefined indicators as
//! JSON nulls).

use std::collections::BTreeSet;
use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::{IndicatorRecord, QuoteBar};
use crate::processor::INDICATORS_TABLE;
use crate::storage::Store;

pub fn router(store: Store) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/companies", get(companies))
        .route("/api/indicators", get(indicators))
        .route("/api/quotes/:ticker", get(quotes))
        .with_state(store)
}

/// Bind and serve until interrupted.
pub async fn serve(store: Store, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("dashboard listening on http://{addr}");
    axum::serve(listener, router(store)).await
}

async fn index() -> &'static str {
    "cvm-fundamentals dashboard\n\
     GET /api/companies\n\
     GET /api/indicators?company=NAME&period=YYYY-MM-DD\n\
     GET /api/quotes/:ticker\n"
}

async fn companies(State(store): State<Store>) -> Json<Vec<String>> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    match store.read_companies() {
        Ok(Some(registry)) => names.extend(registry),
        Ok(None) => {}
        Err(e) => warn!("failed to read company registry: {e}"),
    }
    match store.read_table::<IndicatorRecord>(INDICATORS_TABLE) {
        Ok(rows) => names.extend(rows.into_iter().map(|r| r.company)),
        Err(e) => warn!("failed to read indicator table: {e}"),
    }
    Json(names.into_iter().collect())
}

#[derive(Debug, Deserialize)]
struct IndicatorQuery {
    company: Option<String>,
    period: Option<NaiveDate>,
}

async fn indicators(
    State(store): State<Store>,
    Query(query): Query<IndicatorQuery>,
) -> Json<Vec<IndicatorRecord>> {
    let rows: Vec<IndicatorRecord> = match store.read_table(INDICATORS_TABLE) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("failed to read indicator table: {e}");
            Vec::new()
        }
    };
    let rows = rows
        .into_iter()
        .filter(|row| match &query.company {
            Some(name) => row.company.eq_ignore_ascii_case(name),
            None => true,
        })
        .filter(|row| match query.period {
            Some(period) => row.period == period,
            None => true,
        })
        .collect();
    Json(rows)
}

async fn quotes(State(store): State<Store>, Path(ticker): Path<String>) -> Json<Vec<QuoteBar>> {
    match store.read_quotes(&ticker) {
        Ok(bars) => Json(bars),
        Err(e) => {
            warn!("failed to read quotes for {ticker}: {e}");
            Json(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn indicator_row(company: &str, period: NaiveDate) -> IndicatorRecord {
        IndicatorRecord {
            company: company.to_string(),
            period,
            immediate_liquidity: Some(Decimal::from(2)),
            dry_liquidity: None,
            current_liquidity: None,
            general_liquidity: None,
            debt_to_equity: None,
            debt_to_assets: None,
            debt_to_ebit: None,
            gross_margin: None,
            net_margin: None,
            ebit_margin: None,
            roe: None,
            roa: None,
            roic: None,
        }
    }

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 12, 31).unwrap()
    }

    #[tokio::test]
    async fn empty_store_serves_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let Json(names) = companies(State(store.clone())).await;
        assert!(names.is_empty());

        let Json(rows) = indicators(
            State(store.clone()),
            Query(IndicatorQuery {
                company: None,
                period: None,
            }),
        )
        .await;
        assert!(rows.is_empty());

        let Json(bars) = quotes(State(store), Path("PETR4".to_string())).await;
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn indicators_filter_by_company_and_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let rows = vec![
            indicator_row("ACME SA", date(2019)),
            indicator_row("ACME SA", date(2020)),
            indicator_row("WIDGETS SA", date(2020)),
        ];
        store.write_table(INDICATORS_TABLE, &rows).unwrap();

        let Json(filtered) = indicators(
            State(store.clone()),
            Query(IndicatorQuery {
                company: Some("acme sa".to_string()),
                period: Some(date(2020)),
            }),
        )
        .await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].company, "ACME SA");
        assert_eq!(filtered[0].period, date(2020));
    }

    #[tokio::test]
    async fn undefined_indicator_serializes_as_null() {
        let row = indicator_row("ACME SA", date(2020));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["roe"], serde_json::Value::Null);
        assert_eq!(json["immediate_liquidity"], serde_json::json!("2"));
    }

    #[tokio::test]
    async fn companies_lists_registry_and_processed_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .write_companies(&["ZULU SA".to_string()])
            .unwrap();
        store
            .write_table(INDICATORS_TABLE, &[indicator_row("ACME SA", date(2020))])
            .unwrap();

        let Json(names) = companies(State(store)).await;
        assert_eq!(names, vec!["ACME SA".to_string(), "ZULU SA".to_string()]);
    }
}
