use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::quote::{Quote, QuoteProvider};
use crate::core::throttle::RequestThrottle;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

pub struct YahooQuoteProvider {
    base_url: String,
    client: reqwest::Client,
    throttle: Arc<RequestThrottle>,
}

impl YahooQuoteProvider {
    pub fn new(base_url: &str, throttle: Arc<RequestThrottle>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("stockdash/0.1")
            .build()?;
        Ok(YahooQuoteProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            throttle,
        })
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: f64,
    currency: String,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    #[instrument(
        name = "YahooQuoteFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("Requesting quote from {}", url);

        let text = self
            .throttle
            .run(|| async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, symbol))?;
                if !response.status().is_success() {
                    return Err(anyhow!(
                        "HTTP error: {} for symbol: {}",
                        response.status(),
                        symbol
                    ));
                }
                Ok::<_, anyhow::Error>(response.text().await?)
            })
            .await?;

        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| anyhow!("No quote data found for symbol: {}", symbol))?;

        let meta = item.meta;
        Ok(Quote {
            symbol: symbol.to_string(),
            currency: meta.currency,
            price: meta.regular_market_price,
            previous_close: meta.chart_previous_close,
            day_high: meta.regular_market_day_high,
            day_low: meta.regular_market_day_low,
            long_name: meta.long_name,
            short_name: meta.short_name,
        })
    }
}
