//! Rate table types and the source abstraction

use super::error::{RateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

/// Pair code (base + target, e.g. `USDGBP`) to rate.
///
/// Immutable once built. Clones share the same underlying map, so a table
/// handed out twice by an unrefreshed cache is the same instance.
#[derive(Debug, Clone, Default)]
pub struct RateTable(Arc<HashMap<String, f64>>);

impl RateTable {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        Self(Arc::new(rates))
    }

    pub fn get(&self, pair: &str) -> Option<f64> {
        self.0.get(pair).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Pair codes in lexical order.
    pub fn pairs(&self) -> Vec<&str> {
        let mut pairs: Vec<&str> = self.0.keys().map(String::as_str).collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl FromIterator<(String, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One fetch result: the table, when it was retrieved and the base it was
/// requested against.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub rates: RateTable,
    pub retrieved_at: DateTime<Utc>,
    pub base: String,
}

/// Parameters of a rate fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub endpoint: String,
    pub access_key: String,
    pub base_currency: String,
    /// Restricts the response to these targets when non-empty.
    pub currencies: Vec<String>,
}

impl FetchOptions {
    pub fn new(endpoint: &str, access_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            access_key: access_key.to_string(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            currencies: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.base_currency = base.to_uppercase();
        self
    }

    pub fn with_currencies<I, S>(mut self, currencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.currencies = currencies
            .into_iter()
            .map(|c| c.as_ref().to_uppercase())
            .collect();
        self
    }

    /// `{endpoint}/live?access_key=..[&currencies=..][&source=..]`
    pub fn live_url(&self) -> Result<reqwest::Url> {
        let mut params = vec![("access_key", self.access_key.clone())];
        if !self.currencies.is_empty() {
            params.push(("currencies", self.currencies.join(",")));
        }
        if !self.base_currency.eq_ignore_ascii_case(DEFAULT_BASE_CURRENCY) {
            params.push(("source", self.base_currency.clone()));
        }

        let live = format!("{}/live", self.endpoint.trim_end_matches('/'));
        reqwest::Url::parse_with_params(&live, &params)
            .map_err(|e| RateError::Endpoint(format!("{live}: {e}")))
    }
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self, options: &FetchOptions) -> Result<RateSnapshot>;

    /// [`fetch`](Self::fetch) that gives up with [`RateError::Cancelled`] once
    /// `cancel` fires. Sources that hold a throttle should override this and
    /// cancel through it.
    async fn fetch_until(
        &self,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<RateSnapshot> {
        tokio::select! {
            snapshot = self.fetch(options) => snapshot,
            _ = cancel.cancelled() => Err(RateError::Cancelled),
        }
    }
}
