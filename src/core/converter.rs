//! Conversion of amounts into the base currency.

use super::cache::RateCache;
use super::error::{RateError, Result};
use super::rates::RateSource;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Converts `amount` expressed in `from` into the base currency.
    async fn convert(&self, amount: Decimal, from: &str) -> Result<Decimal>;

    fn base_currency(&self) -> String;
}

/// Fixed divisors (units of the currency per one unit of the base) that
/// bypass the live rates entirely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides(HashMap<String, Decimal>);

impl Overrides {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        Self(
            entries
                .into_iter()
                .map(|(code, divisor)| (code.as_ref().to_uppercase(), divisor))
                .collect(),
        )
    }

    /// 1 USD = 7.12 DKK, 1 USD = 10.71 SEK.
    pub fn usd_defaults() -> Self {
        Self::new([
            ("DKK", Decimal::new(712, 2)),
            ("SEK", Decimal::new(1071, 2)),
        ])
    }

    pub fn divisor(&self, currency: &str) -> Option<Decimal> {
        self.0.get(&currency.to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct ConversionService<S: RateSource> {
    cache: RateCache<S>,
    overrides: Overrides,
    base_currency: String,
}

impl<S: RateSource> ConversionService<S> {
    /// The base currency is taken from the cache's default fetch options and
    /// stays fixed for the lifetime of the service.
    pub fn new(cache: RateCache<S>, overrides: Overrides) -> Self {
        let base_currency = cache.options().base_currency.to_uppercase();
        Self {
            cache,
            overrides,
            base_currency,
        }
    }

    pub fn cache(&self) -> &RateCache<S> {
        &self.cache
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    fn lookup_key(&self, from: &str) -> String {
        format!("{}{}", self.base_currency, from.to_uppercase())
    }
}

#[async_trait]
impl<S: RateSource> CurrencyConverter for ConversionService<S> {
    #[instrument(name = "Convert", skip(self), fields(base = %self.base_currency))]
    async fn convert(&self, amount: Decimal, from: &str) -> Result<Decimal> {
        if from.eq_ignore_ascii_case(&self.base_currency) {
            return Ok(amount);
        }

        if let Some(divisor) = self.overrides.divisor(from) {
            debug!(%divisor, "Using fixed override rate");
            return Some(divisor)
                .filter(|d| d.is_sign_positive() && !d.is_zero())
                .and_then(|d| amount.checked_div(d))
                .ok_or_else(|| RateError::InvalidOverride {
                    currency: from.to_uppercase(),
                    divisor,
                });
        }

        let snapshot = self.cache.get_snapshot(false, None).await?;
        let rates = &snapshot.rates;
        if rates.is_empty() {
            return Err(RateError::EmptyRateTable);
        }
        if !snapshot.base.eq_ignore_ascii_case(&self.base_currency) {
            return Err(RateError::BaseMismatch {
                expected: self.base_currency.clone(),
                actual: snapshot.base.clone(),
            });
        }

        let key = self.lookup_key(from);
        let rate = rates.get(&key).ok_or_else(|| RateError::RateNotFound {
            currency: from.to_string(),
            available: rates.pairs().join(", "),
        })?;

        // Rates are quoted base -> target, so target -> base divides.
        let divisor = Decimal::from_f64(rate)
            .filter(|d| d.is_sign_positive() && !d.is_zero())
            .ok_or_else(|| RateError::InvalidRate {
                pair: key.clone(),
                rate,
            })?;
        debug!(pair = %key, rate, "Converting with live rate");
        amount
            .checked_div(divisor)
            .ok_or(RateError::InvalidRate { pair: key, rate })
    }

    fn base_currency(&self) -> String {
        self.base_currency.clone()
    }
}
