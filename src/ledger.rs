// 📄 Ledger Loader - Uploaded CSV exports as header-addressed tables
// Orders: comma-delimited. Costs: comma-delimited, or pipe-delimited behind a `sep=|` line.

use crate::error::{LedgerError, Result};
use crate::money::{is_missing_token, RawCell};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Marker line some exporters (AliExpress) put before a pipe-delimited body
pub const PIPE_SEPARATOR_MARKER: &str = "sep=|";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// LEDGER KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerKind {
    /// Sales/payments export (Etsy style)
    Orders,
    /// Supplier purchase export (AliExpress style)
    Costs,
}

impl LedgerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerKind::Orders => "orders",
            LedgerKind::Costs => "costs",
        }
    }
}

// ============================================================================
// LEDGER
// ============================================================================

/// Ledger - One parsed CSV export
///
/// Cells are addressed by header name; the first column with a given name wins.
#[derive(Debug, Clone)]
pub struct Ledger {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl Ledger {
    /// Parse an orders export (always comma-delimited)
    pub fn orders_from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(LedgerKind::Orders, strip_bom(bytes), b',')
    }

    /// Parse a costs export, honouring a leading `sep=|` line
    pub fn costs_from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = strip_bom(bytes);

        match split_separator_marker(bytes) {
            Some(body) => {
                debug!("Detected pipe-delimited costs CSV, skipping marker line");
                Self::parse(LedgerKind::Costs, body, b'|')
            }
            None => Self::parse(LedgerKind::Costs, bytes, b','),
        }
    }

    /// Read and parse a ledger from disk
    pub fn from_path(kind: LedgerKind, path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        match kind {
            LedgerKind::Orders => Self::orders_from_bytes(&bytes),
            LedgerKind::Costs => Self::costs_from_bytes(&bytes),
        }
    }

    fn parse(kind: LedgerKind, bytes: &[u8], delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(LedgerError::EmptyLedger(kind.name()));
        }

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;

        debug!(
            "Parsed {} ledger: {} rows × {} columns",
            kind.name(),
            records.len(),
            headers.len()
        );

        Ok(Ledger { headers, records })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Rows in file order
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().map(move |record| Row {
            ledger: self,
            record,
        })
    }

    /// (rows, columns), for logging
    pub fn shape(&self) -> (usize, usize) {
        (self.records.len(), self.headers.len())
    }
}

// ============================================================================
// ROW
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    ledger: &'a Ledger,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// Raw field: `None` when the column is missing or the row is too short
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.ledger.column_index(column)?;
        self.record.get(index)
    }

    /// Field as text; missing and empty both read as ""
    pub fn text(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or("")
    }

    /// Field as a non-empty value; missing-value tokens ("NaN", "null") read as absent
    pub fn non_empty(&self, column: &str) -> Option<&'a str> {
        self.get(column).filter(|v| !v.is_empty() && !is_missing_token(v))
    }

    pub fn cell(&self, column: &str) -> RawCell {
        RawCell::from_field(self.get(column))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// If the first line is `sep=|`, return everything after it
fn split_separator_marker(bytes: &[u8]) -> Option<&[u8]> {
    let line_end = bytes.iter().position(|b| *b == b'\n');
    let first_line = match line_end {
        Some(end) => &bytes[..end],
        None => bytes,
    };

    let first_line = String::from_utf8_lossy(first_line);
    if first_line.trim() != PIPE_SEPARATOR_MARKER {
        return None;
    }

    Some(match line_end {
        Some(end) => &bytes[end + 1..],
        None => &[],
    })
}

// ============================================================================
// TESTS
// ============================================================================
