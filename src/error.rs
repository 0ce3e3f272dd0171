use thiserror::Error;

use crate::period::Period;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("invalid window: {from} is after {to}")]
    InvalidRange { from: Period, to: Period },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
