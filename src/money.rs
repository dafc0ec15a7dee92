// 💵 Money Normalizer - Currency cells to canonical amounts
// "$1,234.56" / "-$5.00" / "--" / "" / 12.5 → f64

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Placeholder some exports write for "no value"
pub const SENTINEL: &str = "--";

/// Cells a dataframe reader treats as missing. "N/A" is not one of them.
pub const MISSING_TOKENS: [&str; 10] = [
    "NaN", "nan", "-NaN", "-nan", "NA", "<NA>", "NULL", "null", "None", "#N/A",
];

pub fn is_missing_token(text: &str) -> bool {
    MISSING_TOKENS.contains(&text.trim())
}

// ============================================================================
// RAW CELL
// ============================================================================

/// RawCell - An untyped value lifted out of a parsed ledger
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    /// Column missing from the ledger, or row too short to reach it
    Absent,
    /// Field present but empty
    Empty,
    /// The `--` placeholder
    Sentinel,
    /// Field that reads directly as a number
    Numeric(f64),
    /// Anything else ("$12.50", "N/A", "Payment for Order #555")
    Text(String),
}

impl RawCell {
    /// Classify a CSV field the way a dataframe reader would
    pub fn from_field(field: Option<&str>) -> Self {
        match field {
            None => RawCell::Absent,
            Some("") => RawCell::Empty,
            Some(SENTINEL) => RawCell::Sentinel,
            Some(text) if is_missing_token(text) => RawCell::Absent,
            Some(text) => match text.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => RawCell::Numeric(n),
                _ => RawCell::Text(text.to_string()),
            },
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::from_field(Some(value))
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Numeric(value)
    }
}

impl<T> From<Option<T>> for RawCell
where
    T: Into<RawCell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawCell::Absent)
    }
}

// ============================================================================
// ERRORS & POLICY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoneyError {
    #[error("could not convert string to float: '{0}'")]
    Parse(String),
}

/// What to do with a money cell that is not a number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MoneyPolicy {
    /// Fail the whole reconciliation
    #[default]
    Strict,
    /// Count the cell as 0.00 and keep going
    CoerceToZero,
}

impl MoneyPolicy {
    pub fn name(&self) -> &str {
        match self {
            MoneyPolicy::Strict => "strict",
            MoneyPolicy::CoerceToZero => "coerce-to-zero",
        }
    }

    /// Normalize under this policy
    pub fn apply(&self, cell: &RawCell) -> Result<f64, MoneyError> {
        match (normalize(cell), self) {
            (Ok(amount), _) => Ok(amount),
            (Err(e), MoneyPolicy::Strict) => Err(e),
            (Err(e), MoneyPolicy::CoerceToZero) => {
                warn!("Treating malformed money value as 0.00: {}", e);
                Ok(0.0)
            }
        }
    }
}

impl fmt::Display for MoneyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Convert any cell into an amount
///
/// - Absent, empty or `--` → 0.0
/// - Numeric → unchanged
/// - Text → whitespace trimmed, every `$` and `,` removed, then parsed
///
/// Idempotent over its own rendering: `normalize(format_currency(x)) == x`
/// to two decimals.
pub fn normalize(cell: &RawCell) -> Result<f64, MoneyError> {
    match cell {
        RawCell::Absent | RawCell::Empty | RawCell::Sentinel => Ok(0.0),
        RawCell::Numeric(n) => Ok(*n),
        RawCell::Text(text) => parse_money(text),
    }
}

/// Parse a money string like "$11.49", "-$5.00" or "1,234.56"
pub fn parse_money(value: &str) -> Result<f64, MoneyError> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == SENTINEL {
        return Ok(0.0);
    }

    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(MoneyError::Parse(cleaned.to_string())),
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

/// "$1234.50" - negative values keep the sign after the dollar ("$-5.00")
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// "37.5%"
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reference_values() {
        let cases: Vec<(RawCell, f64)> = vec![
            (RawCell::Absent, 0.0),
            (RawCell::from(""), 0.0),
            (RawCell::from("--"), 0.0),
            (RawCell::Numeric(0.0), 0.0),
            (RawCell::Numeric(12.5), 12.5),
            (RawCell::from("$12.50"), 12.5),
            (RawCell::from("$1,234.56"), 1234.56),
        ];

        for (cell, expected) in cases {
            let amount = normalize(&cell).unwrap();
            assert!(
                (amount - expected).abs() < 1e-9,
                "{:?} → {} (expected {})",
                cell,
                amount,
                expected
            );
        }
    }

    #[test]
    fn test_normalize_negative_and_padded() {
        assert_eq!(parse_money("-$5.00").unwrap(), -5.0);
        assert_eq!(parse_money("  $ 42.10 ").unwrap(), 42.10);
        assert_eq!(parse_money("$--").unwrap(), 0.0);
        assert_eq!(parse_money("$").unwrap(), 0.0);
    }

    #[test]
    fn test_normalize_rejects_non_numeric() {
        let err = normalize(&RawCell::from("N/A")).unwrap_err();
        assert_eq!(err, MoneyError::Parse("N/A".to_string()));
        assert!(err.to_string().contains("N/A"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for value in [0.0, 0.01, 5.0, 12.5, 99.99, 1234.56, -5.0, 100000.0] {
            let first = normalize(&RawCell::Numeric(value)).unwrap();
            let rendered = format_currency(first);
            let second = normalize(&RawCell::from(rendered.as_str())).unwrap();
            assert_eq!(format!("{:.2}", first), format!("{:.2}", second));
        }
    }

    #[test]
    fn test_from_field_classification() {
        assert_eq!(RawCell::from_field(None), RawCell::Absent);
        assert_eq!(RawCell::from_field(Some("")), RawCell::Empty);
        assert_eq!(RawCell::from_field(Some("--")), RawCell::Sentinel);
        assert_eq!(RawCell::from_field(Some("7.25")), RawCell::Numeric(7.25));
        assert_eq!(
            RawCell::from_field(Some("$7.25")),
            RawCell::Text("$7.25".to_string())
        );
    }

    #[test]
    fn test_policy_coerce_to_zero() {
        let bad = RawCell::from("N/A");
        assert!(MoneyPolicy::Strict.apply(&bad).is_err());
        assert_eq!(MoneyPolicy::CoerceToZero.apply(&bad).unwrap(), 0.0);
        assert_eq!(MoneyPolicy::CoerceToZero.apply(&RawCell::from("$3.00")).unwrap(), 3.0);
    }

    #[test]
    fn test_nan_cell_is_zero() {
        for token in ["NaN", "nan", "NA", "null", "None", " NaN "] {
            let cell = RawCell::from(token);
            assert_eq!(cell, RawCell::Absent, "{:?}", token);
            assert_eq!(normalize(&cell).unwrap(), 0.0);
        }

        // N/A stays malformed
        assert!(normalize(&RawCell::from("N/A")).is_err());
    }

    #[test]
    fn test_non_finite_values_are_malformed() {
        assert_eq!(RawCell::from("inf"), RawCell::Text("inf".to_string()));
        assert!(normalize(&RawCell::from("inf")).is_err());
        assert!(parse_money("$NaN").is_err());
        assert_eq!(MoneyPolicy::CoerceToZero.apply(&RawCell::from("-inf")).unwrap(), 0.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(100.0), "$100.00");
        assert_eq!(format_currency(1234.567), "$1234.57");
        assert_eq!(format_currency(-5.0), "$-5.00");
        assert_eq!(format_percent(37.54), "37.5%");
    }
}
