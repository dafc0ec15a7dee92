// ⚖️ Reconciliation Engine - Orders vs supplier costs
// Revenue - costs = profit; fee/tax rows folded back into their parent sale
//
//   net_profit        = total_revenue - total_costs
//   profit_margin     = net_profit / total_revenue * 100   (0 when revenue <= 0)
//   predicted_revenue = total_revenue * 3                  (next quarter)

use crate::columns::{
    is_fee_or_tax, is_sale, order_value_column, CostSource, RevenueSource, COL_DATE,
    COL_FEES_AND_TAXES, COL_INFO, COL_ORDER_VALUE, COL_PRODUCT_TITLE, COL_PRODUCT_TITLE_SNAKE,
    COL_TITLE, COL_TYPE,
};
use crate::error::Result;
use crate::ledger::{Ledger, Row};
use crate::money::{format_currency, format_percent, MoneyPolicy, RawCell};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Marker preceding the order number in a sale's title ("Payment for Order #3784084180")
pub const ORDER_MARKER: &str = "Order #";

pub const COST_RECORD_TYPE: &str = "Product Cost";
pub const COST_RECORD_CATEGORY: &str = "Inventory";
pub const DEFAULT_COST_DESCRIPTION: &str = "AliExpress Order";
pub const DEFAULT_COST_VALUE: &str = "$0.00";

/// Months covered by the revenue projection
pub const PROJECTION_MONTHS: f64 = 3.0;

// ============================================================================
// ORDER NUMBER & FEE MATCHING
// ============================================================================

/// How fee/tax rows are tied back to the sale they belong to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeeMatching {
    /// `Info` contains the order number anywhere
    #[default]
    Substring,
    /// `Info` has a run of digits exactly equal to the order number
    OrderNumber,
}

impl FeeMatching {
    pub fn name(&self) -> &str {
        match self {
            FeeMatching::Substring => "substring",
            FeeMatching::OrderNumber => "order-number",
        }
    }
}

impl fmt::Display for FeeMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order number pulled out of a sale title, without the "Order #" prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Everything after the last "Order #" in the title, trimmed
    pub fn from_title(title: &str) -> Option<Self> {
        let (_, rest) = title.rsplit_once(ORDER_MARKER)?;
        let number = rest.trim();
        if number.is_empty() {
            None
        } else {
            Some(OrderNumber(number.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Does a fee row's `Info` text refer to this order?
    pub fn matches(&self, info: &str, strategy: FeeMatching) -> bool {
        match strategy {
            FeeMatching::Substring => info.contains(self.as_str()),
            FeeMatching::OrderNumber => info
                .split(|c: char| !c.is_ascii_digit())
                .any(|token| token == self.as_str()),
        }
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ORDER_MARKER, self.0)
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_revenue: f64,
    pub total_costs: f64,
    pub net_profit: f64,
    pub profit_margin: f64,
    pub predicted_revenue: f64,
    pub sales_count: usize,
    pub purchase_count: usize,
}

impl Summary {
    pub fn new(total_revenue: f64, total_costs: f64, sales_count: usize, purchase_count: usize) -> Self {
        let net_profit = total_revenue - total_costs;
        let profit_margin = if total_revenue > 0.0 {
            net_profit / total_revenue * 100.0
        } else {
            0.0
        };

        Summary {
            total_revenue,
            total_costs,
            net_profit,
            profit_margin,
            predicted_revenue: total_revenue * PROJECTION_MONTHS,
            sales_count,
            purchase_count,
        }
    }

    /// Pre-formatted strings for the dashboard cards
    pub fn display(&self) -> SummaryDisplay {
        SummaryDisplay {
            total_revenue: format_currency(self.total_revenue),
            total_costs: format_currency(self.total_costs),
            net_profit: format_currency(self.net_profit),
            profit_margin: format_percent(self.profit_margin),
            predicted_revenue: format_currency(self.predicted_revenue),
            revenue_period: format!("{} orders", self.sales_count),
            costs_period: format!("{} purchases", self.purchase_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDisplay {
    pub total_revenue: String,
    pub total_costs: String,
    pub net_profit: String,
    pub profit_margin: String,
    pub predicted_revenue: String,
    pub revenue_period: String,
    pub costs_period: String,
}

// ============================================================================
// DISPLAY RECORDS
// ============================================================================

/// One line of the orders table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub date: String,
    pub order_id: String,
    pub order_value: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub fees_taxes: String,
}

/// One line of the costs table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub description: String,
    pub amount: String,
    pub net_cost: String,
    pub category: String,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub summary: Summary,
    pub orders: Vec<OrderRecord>,
    pub costs: Vec<CostRecord>,
    pub revenue_source: RevenueSource,
    pub cost_source: CostSource,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn summary_line(&self) -> String {
        format!(
            "Revenue {} from {} sales ({}), costs {} from {} purchases ({}), margin {}",
            format_currency(self.summary.total_revenue),
            self.summary.sales_count,
            self.revenue_source.name(),
            format_currency(self.summary.total_costs),
            self.summary.purchase_count,
            self.cost_source.name(),
            format_percent(self.summary.profit_margin)
        )
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    /// Strict: one malformed money cell fails the whole run
    pub money_policy: MoneyPolicy,

    /// How fee/tax rows find their sale
    pub fee_matching: FeeMatching,
}

impl Reconciler {
    pub fn new() -> Self {
        Reconciler::default()
    }

    pub fn with_options(money_policy: MoneyPolicy, fee_matching: FeeMatching) -> Self {
        Reconciler {
            money_policy,
            fee_matching,
        }
    }

    /// Single pass over both ledgers; nothing is kept between calls
    pub fn reconcile(&self, orders: &Ledger, costs: &Ledger) -> Result<ReconciliationReport> {
        let revenue_source = RevenueSource::detect(orders);
        let cost_source = CostSource::detect(costs);
        debug!(
            "Detected revenue source '{}', cost source '{}'",
            revenue_source.name(),
            cost_source.name()
        );

        let (total_revenue, sales_count) = self.total_revenue(orders, revenue_source)?;
        let total_costs = self.total_costs(costs, cost_source)?;
        let summary = Summary::new(total_revenue, total_costs, sales_count, costs.len());

        Ok(ReconciliationReport {
            summary,
            orders: self.order_records(orders)?,
            costs: cost_records(costs),
            revenue_source,
            cost_source,
            reconciled_at: Utc::now(),
        })
    }

    fn total_revenue(&self, orders: &Ledger, source: RevenueSource) -> Result<(f64, usize)> {
        let mut total = 0.0;
        let mut count = 0;

        for row in orders.rows().filter(|row| source.includes(row)) {
            total += source.extract(&row, self.money_policy)?;
            count += 1;
        }

        Ok((total, count))
    }

    fn total_costs(&self, costs: &Ledger, source: CostSource) -> Result<f64> {
        let mut total = 0.0;
        for row in costs.rows() {
            total += source.extract(&row, self.money_policy)?;
        }
        Ok(total)
    }

    /// Orders table: sales only when the export distinguishes types
    fn order_records(&self, orders: &Ledger) -> Result<Vec<OrderRecord>> {
        let has_type = orders.has_column(COL_TYPE);
        let value_column = order_value_column(orders);

        // Fee/tax line items, gathered once: (Info, Fees & Taxes)
        let fee_rows: Vec<(&str, RawCell)> = orders
            .rows()
            .filter(is_fee_or_tax)
            .filter_map(|row| row.get(COL_INFO).map(|info| (info, row.cell(COL_FEES_AND_TAXES))))
            .collect();

        let mut records = Vec::new();
        for row in orders.rows().filter(|row| !has_type || is_sale(row)) {
            let order_value = self.money_policy.apply(&row.cell(value_column))?;

            let (order_id, fees_taxes) = if is_sale(&row) {
                match OrderNumber::from_title(row.text(COL_TITLE)) {
                    Some(number) => {
                        let fees = self.fees_for_order(&number, &fee_rows)?;
                        (number.to_string(), fees)
                    }
                    None => (String::new(), 0.0),
                }
            } else {
                let fees = self.money_policy.apply(&row.cell(COL_FEES_AND_TAXES))?;
                (row.text(COL_INFO).to_string(), fees)
            };

            records.push(OrderRecord {
                date: row.text(COL_DATE).to_string(),
                order_id,
                order_value: format_currency(order_value),
                transaction_type: row.text(COL_TYPE).to_string(),
                fees_taxes: format_currency(fees_taxes.abs()),
            });
        }

        Ok(records)
    }

    fn fees_for_order(&self, number: &OrderNumber, fee_rows: &[(&str, RawCell)]) -> Result<f64> {
        let mut total = 0.0;
        for (info, fee) in fee_rows {
            if number.matches(info, self.fee_matching) {
                total += self.money_policy.apply(fee)?;
            }
        }
        Ok(total)
    }
}

/// Costs table: every row, raw `Order Value` text
fn cost_records(costs: &Ledger) -> Vec<CostRecord> {
    costs
        .rows()
        .map(|row| CostRecord {
            record_type: COST_RECORD_TYPE.to_string(),
            description: cost_description(&row).to_string(),
            amount: cost_value(&row).to_string(),
            net_cost: cost_value(&row).to_string(),
            category: COST_RECORD_CATEGORY.to_string(),
        })
        .collect()
}

fn cost_description<'a>(row: &Row<'a>) -> &'a str {
    row.non_empty(COL_PRODUCT_TITLE_SNAKE)
        .or_else(|| row.non_empty(COL_PRODUCT_TITLE))
        .unwrap_or(DEFAULT_COST_DESCRIPTION)
}

fn cost_value<'a>(row: &Row<'a>) -> &'a str {
    row.non_empty(COL_ORDER_VALUE).unwrap_or(DEFAULT_COST_VALUE)
}

// ============================================================================
// TESTS
// ============================================================================
