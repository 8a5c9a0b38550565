//! Error types.

use chrono::NaiveDate;

pub type Result<T> = std::result::Result<T, CaseTrendsError>;

#[derive(thiserror::Error, Debug)]
pub enum CaseTrendsError {
    /// The source dataset could not be read, lacks a required column, or
    /// contains an unparseable date. Fatal for the whole load.
    #[error("failed to load dataset: {0}")]
    LoadFailure(String),
    /// A caller-supplied date string is not in the expected format.
    #[error("invalid date {value:?}: expected format {format}")]
    ParseError { value: String, format: &'static str },
    /// The resolved window is inverted.
    #[error("the start date {start} must be earlier than the end date {end}")]
    ValidationError { start: NaiveDate, end: NaiveDate },
    #[error("wrapped polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
