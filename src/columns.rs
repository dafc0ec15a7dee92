// 🧭 Column Detection - Which naming convention does this export use?
// Ordered rules, first match wins, explicit default when nothing matches

use crate::ledger::{Ledger, Row};
use crate::money::{MoneyError, MoneyPolicy};
use serde::{Deserialize, Serialize};

// Column names seen in the wild
pub const COL_DATE: &str = "Date";
pub const COL_TYPE: &str = "Type";
pub const COL_NET: &str = "Net";
pub const COL_AMOUNT: &str = "Amount";
pub const COL_TITLE: &str = "Title";
pub const COL_INFO: &str = "Info";
pub const COL_FEES_AND_TAXES: &str = "Fees & Taxes";
pub const COL_ORDER_VALUE: &str = "Order Value";
pub const COL_ORDER_VALUE_UNDERSCORE: &str = "Order_Value";
pub const COL_PRODUCT_TITLE_SNAKE: &str = "product_title";
pub const COL_PRODUCT_TITLE: &str = "Product Title";

/// Transaction type marking a completed sale
pub const TYPE_SALE: &str = "Sale";
/// Line items that belong to a sale
pub const FEE_TYPES: [&str; 2] = ["Fee", "Tax"];

// ============================================================================
// DETECTION RULE
// ============================================================================

/// A named predicate over a ledger's columns, yielding a source when it holds
#[derive(Debug, Clone, Copy)]
pub struct DetectionRule<S: Copy> {
    pub name: &'static str,
    pub required_columns: &'static [&'static str],
    pub source: S,
}

impl<S: Copy> DetectionRule<S> {
    pub fn matches(&self, ledger: &Ledger) -> bool {
        self.required_columns.iter().all(|c| ledger.has_column(c))
    }
}

/// Evaluate rules in priority order
pub fn detect<S: Copy>(rules: &[DetectionRule<S>], ledger: &Ledger, default: S) -> S {
    rules
        .iter()
        .find(|rule| rule.matches(ledger))
        .map(|rule| rule.source)
        .unwrap_or(default)
}

// ============================================================================
// REVENUE SOURCE (orders ledger)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueSource {
    /// `Net` summed over `Type == "Sale"` rows (Etsy payments export)
    SaleNet,
    /// `Amount` summed over every row
    AllAmount,
    /// Nothing recognisable
    None,
}

pub const REVENUE_RULES: &[DetectionRule<RevenueSource>] = &[
    DetectionRule {
        name: "net-of-sales",
        required_columns: &[COL_NET, COL_TYPE],
        source: RevenueSource::SaleNet,
    },
    DetectionRule {
        name: "amount-of-all-rows",
        required_columns: &[COL_AMOUNT],
        source: RevenueSource::AllAmount,
    },
];

impl RevenueSource {
    pub fn detect(ledger: &Ledger) -> Self {
        detect(REVENUE_RULES, ledger, RevenueSource::None)
    }

    pub fn name(&self) -> &str {
        match self {
            RevenueSource::SaleNet => "net-of-sales",
            RevenueSource::AllAmount => "amount-of-all-rows",
            RevenueSource::None => "none",
        }
    }

    /// Does this row count towards revenue?
    pub fn includes(&self, row: &Row<'_>) -> bool {
        match self {
            RevenueSource::SaleNet => is_sale(row),
            RevenueSource::AllAmount => true,
            RevenueSource::None => false,
        }
    }

    /// Revenue contributed by one row (0.0 for excluded rows)
    pub fn extract(&self, row: &Row<'_>, policy: MoneyPolicy) -> Result<f64, MoneyError> {
        match self {
            RevenueSource::SaleNet if is_sale(row) => policy.apply(&row.cell(COL_NET)),
            RevenueSource::AllAmount => policy.apply(&row.cell(COL_AMOUNT)),
            _ => Ok(0.0),
        }
    }
}

// ============================================================================
// COST SOURCE (costs ledger)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostSource {
    /// `Order Value`
    OrderValue,
    /// `Order_Value`
    OrderValueUnderscore,
    None,
}

pub const COST_RULES: &[DetectionRule<CostSource>] = &[
    DetectionRule {
        name: "order-value",
        required_columns: &[COL_ORDER_VALUE],
        source: CostSource::OrderValue,
    },
    DetectionRule {
        name: "order-value-underscore",
        required_columns: &[COL_ORDER_VALUE_UNDERSCORE],
        source: CostSource::OrderValueUnderscore,
    },
];

impl CostSource {
    pub fn detect(ledger: &Ledger) -> Self {
        detect(COST_RULES, ledger, CostSource::None)
    }

    pub fn name(&self) -> &str {
        match self {
            CostSource::OrderValue => "order-value",
            CostSource::OrderValueUnderscore => "order-value-underscore",
            CostSource::None => "none",
        }
    }

    pub fn column(&self) -> Option<&'static str> {
        match self {
            CostSource::OrderValue => Some(COL_ORDER_VALUE),
            CostSource::OrderValueUnderscore => Some(COL_ORDER_VALUE_UNDERSCORE),
            CostSource::None => None,
        }
    }

    pub fn extract(&self, row: &Row<'_>, policy: MoneyPolicy) -> Result<f64, MoneyError> {
        match self.column() {
            Some(column) => policy.apply(&row.cell(column)),
            None => Ok(0.0),
        }
    }
}

// ============================================================================
// ROW HELPERS
// ============================================================================

pub fn is_sale(row: &Row<'_>) -> bool {
    row.get(COL_TYPE) == Some(TYPE_SALE)
}

pub fn is_fee_or_tax(row: &Row<'_>) -> bool {
    row.get(COL_TYPE).map_or(false, |t| FEE_TYPES.contains(&t))
}

/// `Net` when the column exists, otherwise `Amount`
pub fn order_value_column(ledger: &Ledger) -> &'static str {
    if ledger.has_column(COL_NET) {
        COL_NET
    } else {
        COL_AMOUNT
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn orders(csv: &str) -> Ledger {
        Ledger::orders_from_bytes(csv.as_bytes()).unwrap()
    }

    fn costs(csv: &str) -> Ledger {
        Ledger::costs_from_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_revenue_priority() {
        // Net+Type beats Amount when both are present
        let ledger = orders("Type,Net,Amount\nSale,$1.00,$2.00\n");
        assert_eq!(RevenueSource::detect(&ledger), RevenueSource::SaleNet);

        let ledger = orders("Net,Amount\n$1.00,$2.00\n");
        assert_eq!(RevenueSource::detect(&ledger), RevenueSource::AllAmount);

        let ledger = orders("Date,Title\n2024-01-01,Something\n");
        assert_eq!(RevenueSource::detect(&ledger), RevenueSource::None);
    }

    #[test]
    fn test_cost_priority() {
        let ledger = costs("Order Value,Order_Value\n$1.00,$2.00\n");
        assert_eq!(CostSource::detect(&ledger), CostSource::OrderValue);

        let ledger = costs("Order_Value\n$2.00\n");
        assert_eq!(CostSource::detect(&ledger), CostSource::OrderValueUnderscore);

        let ledger = costs("Total\n$2.00\n");
        assert_eq!(CostSource::detect(&ledger), CostSource::None);
    }

    #[test]
    fn test_rule_names_match_sources() {
        for rule in REVENUE_RULES {
            assert_eq!(rule.name, rule.source.name());
        }
        for rule in COST_RULES {
            assert_eq!(rule.name, rule.source.name());
        }
    }

    #[test]
    fn test_sale_net_extract_skips_non_sales() {
        let ledger = orders("Type,Net\nSale,$10.00\nFee,-$1.00\n");
        let source = RevenueSource::detect(&ledger);
        let values: Vec<f64> = ledger
            .rows()
            .map(|row| source.extract(&row, MoneyPolicy::Strict).unwrap())
            .collect();

        assert_eq!(values, vec![10.0, 0.0]);
    }

    #[test]
    fn test_fee_or_tax() {
        let ledger = orders("Type\nFee\nTax\nSale\nRefund\n");
        let flags: Vec<bool> = ledger.rows().map(|r| is_fee_or_tax(&r)).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }
}
