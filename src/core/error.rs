//! Errors raised by the rate source, the rate cache and the converter.

/// Failure of a rate fetch or a currency conversion.
///
/// None of these are retried or swallowed inside the core; they surface
/// directly to the caller of `convert` / `get_rates`.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Request to rate provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {status} from rate provider")]
    Status { status: reqwest::StatusCode },

    #[error("Failed to deserialize the API response: {0}")]
    Decode(String),

    #[error("API request unsuccessful: {0}")]
    Provider(String),

    #[error("The API response did not contain a 'quotes' object")]
    MissingData,

    #[error("The rate table is empty, verify the provider response and the fetch options")]
    EmptyRateTable,

    #[error("Currency conversion rate for '{currency}' was not found. Available currencies: {available}")]
    RateNotFound { currency: String, available: String },

    #[error("Rate {rate} for '{pair}' cannot be used for conversion")]
    InvalidRate { pair: String, rate: f64 },

    #[error("Fixed rate {divisor} for '{currency}' cannot be used for conversion")]
    InvalidOverride {
        currency: String,
        divisor: rust_decimal::Decimal,
    },

    #[error("Rate table is quoted against {actual}, conversions expect {expected}")]
    BaseMismatch { expected: String, actual: String },

    #[error("Invalid rate provider endpoint: {0}")]
    Endpoint(String),

    #[error("Rate fetch was cancelled")]
    Cancelled,
}

pub type Result<T, E = RateError> = std::result::Result<T, E>;
