//! Error types for the rebalancing engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for the rebalancing engine and its collaborators.
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Degenerate portfolio state on {date}: total value {value}")]
    DegenerateState { date: NaiveDate, value: f64 },

    #[error("Empty parameter grid: no {0} to evaluate")]
    EmptyGrid(&'static str),

    #[error("Invalid price data: {0}")]
    InvalidPrices(String),

    #[error("Price provider error: {0}")]
    Provider(#[from] yahoo_finance_api::YahooError),

    #[error("TOML parsing error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DataFrame error: {0}")]
    Frame(#[from] polars::error::PolarsError),
}

/// Result type alias for rebalancing operations.
pub type Result<T> = std::result::Result<T, BalanceError>;
