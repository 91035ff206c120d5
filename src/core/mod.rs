//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod converter;
pub mod error;
pub mod log;
pub mod quote;
pub mod rates;
pub mod schedule;
pub mod throttle;

// Re-export main types for cleaner imports
pub use cache::RateCache;
pub use converter::{ConversionService, CurrencyConverter, Overrides};
pub use error::RateError;
pub use quote::{Quote, QuoteProvider, SymbolMatch, SymbolSearch};
pub use rates::{FetchOptions, RateSnapshot, RateSource, RateTable};
pub use throttle::RequestThrottle;
