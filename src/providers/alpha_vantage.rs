use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::quote::{SymbolMatch, SymbolSearch};
use crate::core::throttle::RequestThrottle;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Ticker lookup through the Alpha Vantage `SYMBOL_SEARCH` function.
pub struct AlphaVantageSearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    throttle: Arc<RequestThrottle>,
}

impl AlphaVantageSearch {
    pub fn new(base_url: &str, api_key: &str, throttle: Arc<RequestThrottle>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("stockdash/0.1")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            throttle,
        })
    }
}

/// Matches are objects keyed `"1. symbol"`, `"2. name"`, ...
fn parse_matches(body: &Value) -> Vec<SymbolMatch> {
    let Some(matches) = body.get("bestMatches").and_then(Value::as_array) else {
        return Vec::new();
    };

    matches
        .iter()
        .filter_map(|entry| {
            let symbol = entry.get("1. symbol")?.as_str()?.trim();
            let name = entry.get("2. name")?.as_str()?;
            (!symbol.is_empty()).then(|| SymbolMatch {
                symbol: symbol.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl SymbolSearch for AlphaVantageSearch {
    #[instrument(name = "SymbolSearch", skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/query", self.base_url),
            &[
                ("function", "SYMBOL_SEARCH"),
                ("keywords", query),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .context("Invalid symbol search URL")?;
        let response = self
            .throttle
            .run(|| self.client.get(url).send())
            .await
            .context("Symbol search request failed")?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Symbol search returned an error status");
            return Ok(Vec::new());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse symbol search response")?;
        let matches = parse_matches(&body);
        debug!(count = matches.len(), "Symbol search complete");
        Ok(matches)
    }
}
