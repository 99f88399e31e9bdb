//! Error handling for trackport
//!
//! Domain failures are typed with `PortfolioError`; everything is propagated
//! through `anyhow` so callers can attach context on the way up.

use thiserror::Error;

/// Core error types for portfolio operations
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("pricing error: {0}")]
    PricingError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("no quote for {0}")]
    MissingQuote(String),
}

/// Result type alias for portfolio operations
pub type Result<T> = anyhow::Result<T>;
