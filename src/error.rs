use crate::money::MoneyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    Money(#[from] MoneyError),

    #[error("No columns to parse from file ({0} ledger is empty)")]
    EmptyLedger(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
