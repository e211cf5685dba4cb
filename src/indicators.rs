//! Indicator engine: fixed ratio formulas over normalized line items.
//!
//! All arithmetic is `rust_decimal::Decimal`; a zero or missing
//! denominator (or a missing operand) makes the indicator explicitly
//! undefined (`None`), never a panic or a substituted value.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{IndicatorRecord, StatementRecord};

/// CVM standardized chart-of-accounts codes used by the formulas.
pub mod accounts {
    pub const TOTAL_ASSETS: &str = "1";
    pub const CURRENT_ASSETS: &str = "1.01";
    pub const CASH: &str = "1.01.01";
    pub const INVENTORY: &str = "1.01.04";
    pub const PREPAID_EXPENSES: &str = "1.01.07";
    pub const LONG_TERM_ASSETS: &str = "1.02";

    pub const TOTAL_LIABILITIES_AND_EQUITY: &str = "2";
    pub const CURRENT_LIABILITIES: &str = "2.01";
    pub const SHORT_TERM_DEBT: &str = "2.01.04";
    pub const LONG_TERM_LIABILITIES: &str = "2.02";
    pub const LONG_TERM_DEBT: &str = "2.02.01";
    pub const EQUITY: &str = "2.03";

    pub const REVENUE: &str = "3.01";
    pub const COGS: &str = "3.02";
    pub const GROSS_PROFIT: &str = "3.03";
    pub const EBIT: &str = "3.05";
    pub const INCOME_TAX: &str = "3.08";
    pub const NET_INCOME: &str = "3.11";

    pub const CASH_FLOW_OPERATING: &str = "6.01";
    pub const CASH_FLOW_INVESTING: &str = "6.02";
    pub const CASH_FLOW_FINANCING: &str = "6.03";
    pub const CASH_NET_CHANGE: &str = "6.05";
}

/// Line items for one company/period, merged across statement types.
#[derive(Debug, Clone, Default)]
pub struct LineItems {
    values: BTreeMap<String, Decimal>,
}

impl LineItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a parsed statement record in. Records are already
    /// duplicate-resolved, and balance-sheet/income codes never collide,
    /// so a plain insert is enough.
    pub fn merge(&mut self, record: &StatementRecord) {
        for (code, item) in &record.accounts {
            self.values.insert(code.clone(), item.value);
        }
    }

    pub fn insert(&mut self, code: &str, value: Decimal) {
        self.values.insert(code.to_string(), value);
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.values.get(code).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// `num / den`, undefined when either operand is missing or the
/// denominator is zero.
fn ratio(num: Option<Decimal>, den: Option<Decimal>) -> Option<Decimal> {
    match (num, den) {
        (Some(n), Some(d)) if !d.is_zero() => n.checked_div(d),
        _ => None,
    }
}

fn sum2(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    Some(a? + b?)
}

/// Compute the full indicator set for one company/period.
pub fn compute(company: &str, period: NaiveDate, items: &LineItems) -> IndicatorRecord {
    use accounts::*;

    let current_assets = items.get(CURRENT_ASSETS);
    let current_liabilities = items.get(CURRENT_LIABILITIES);
    let revenue = items.get(REVENUE);
    let net_income = items.get(NET_INCOME);
    let ebit = items.get(EBIT);
    let equity = items.get(EQUITY);
    let total_assets = items.get(TOTAL_ASSETS);

    // Gross debt is the sum of short- and long-term loan lines.
    let gross_debt = sum2(items.get(SHORT_TERM_DEBT), items.get(LONG_TERM_DEBT));

    let dry_numerator = (|| {
        Some(current_assets? - items.get(INVENTORY)? - items.get(PREPAID_EXPENSES)?)
    })();

    // NOPAT over invested capital (equity plus gross debt).
    let nopat = (|| Some(ebit? - items.get(INCOME_TAX)?))();
    let invested_capital = sum2(equity, gross_debt);

    IndicatorRecord {
        company: company.to_string(),
        period,
        immediate_liquidity: ratio(items.get(CASH), current_liabilities),
        dry_liquidity: ratio(dry_numerator, current_liabilities),
        current_liquidity: ratio(current_assets, current_liabilities),
        general_liquidity: ratio(
            sum2(current_assets, items.get(LONG_TERM_ASSETS)),
            sum2(current_liabilities, items.get(LONG_TERM_LIABILITIES)),
        ),
        debt_to_equity: ratio(gross_debt, equity),
        debt_to_assets: ratio(gross_debt, total_assets),
        debt_to_ebit: ratio(gross_debt, ebit),
        gross_margin: ratio(items.get(GROSS_PROFIT), revenue),
        net_margin: ratio(net_income, revenue),
        ebit_margin: ratio(ebit, revenue),
        roe: ratio(net_income, equity),
        roa: ratio(net_income, total_assets),
        roic: ratio(nopat, invested_capital),
    }
}

#[cfg(test)]
mod tests {
    use super::accounts::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn period() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn full_items() -> LineItems {
        let mut items = LineItems::new();
        items.insert(TOTAL_ASSETS, dec("1000"));
        items.insert(CURRENT_ASSETS, dec("400"));
        items.insert(CASH, dec("100"));
        items.insert(INVENTORY, dec("80"));
        items.insert(PREPAID_EXPENSES, dec("20"));
        items.insert(LONG_TERM_ASSETS, dec("600"));
        items.insert(CURRENT_LIABILITIES, dec("50"));
        items.insert(SHORT_TERM_DEBT, dec("30"));
        items.insert(LONG_TERM_LIABILITIES, dec("150"));
        items.insert(LONG_TERM_DEBT, dec("90"));
        items.insert(EQUITY, dec("800"));
        items.insert(REVENUE, dec("500"));
        items.insert(GROSS_PROFIT, dec("200"));
        items.insert(EBIT, dec("120"));
        items.insert(INCOME_TAX, dec("28"));
        items.insert(NET_INCOME, dec("80"));
        items
    }

    #[test]
    fn known_values() {
        let record = compute("ACME SA", period(), &full_items());

        // cash 100 / current liabilities 50
        assert_eq!(record.immediate_liquidity, Some(dec("2")));
        // (400 - 80 - 20) / 50
        assert_eq!(record.dry_liquidity, Some(dec("6")));
        assert_eq!(record.current_liquidity, Some(dec("8")));
        // (400 + 600) / (50 + 150)
        assert_eq!(record.general_liquidity, Some(dec("5")));
        // debt = 30 + 90 = 120
        assert_eq!(record.debt_to_equity, Some(dec("0.15")));
        assert_eq!(record.debt_to_assets, Some(dec("0.12")));
        assert_eq!(record.debt_to_ebit, Some(dec("1")));
        assert_eq!(record.gross_margin, Some(dec("0.4")));
        assert_eq!(record.net_margin, Some(dec("0.16")));
        assert_eq!(record.ebit_margin, Some(dec("0.24")));
        assert_eq!(record.roe, Some(dec("0.1")));
        assert_eq!(record.roa, Some(dec("0.08")));
        // NOPAT (120 - 28) / invested capital (800 + 120)
        assert_eq!(record.roic, Some(dec("0.1")));
    }

    #[test]
    fn zero_current_liabilities_is_undefined_not_a_crash() {
        let mut items = full_items();
        items.insert(CURRENT_LIABILITIES, Decimal::ZERO);
        let record = compute("ACME SA", period(), &items);

        assert_eq!(record.immediate_liquidity, None);
        assert_eq!(record.dry_liquidity, None);
        assert_eq!(record.current_liquidity, None);
        // General liquidity divides by 0 + 150, still defined.
        assert!(record.general_liquidity.is_some());
    }

    #[test]
    fn missing_operand_is_undefined() {
        let mut items = LineItems::new();
        items.insert(CASH, dec("100"));
        // No current liabilities at all.
        let record = compute("ACME SA", period(), &items);
        assert_eq!(record.immediate_liquidity, None);
        assert_eq!(record.roe, None);
        assert_eq!(record.roic, None);
    }

    #[test]
    fn zero_revenue_margins_undefined() {
        let mut items = full_items();
        items.insert(REVENUE, Decimal::ZERO);
        let record = compute("ACME SA", period(), &items);
        assert_eq!(record.gross_margin, None);
        assert_eq!(record.net_margin, None);
        assert_eq!(record.ebit_margin, None);
    }

    #[test]
    fn negative_values_stay_exact() {
        let mut items = full_items();
        items.insert(NET_INCOME, dec("-25"));
        let record = compute("ACME SA", period(), &items);
        assert_eq!(record.net_margin, Some(dec("-0.05")));
        assert_eq!(record.roe, Some(dec("-0.03125")));
    }
}
