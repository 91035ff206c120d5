use crate::core::error::{RateError, Result};
use crate::core::rates::{FetchOptions, RateSnapshot, RateSource, RateTable};
use crate::core::throttle::RequestThrottle;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct LiveResponse {
    success: bool,
    #[allow(dead_code)]
    terms: Option<String>,
    #[allow(dead_code)]
    privacy: Option<String>,
    timestamp: Option<i64>,
    source: Option<String>,
    quotes: Option<HashMap<String, f64>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    info: String,
}

impl ApiError {
    fn describe(&self) -> String {
        format!("{} (Code: {}): {}", self.kind, self.code, self.info)
    }
}

/// Lowercases the envelope keys and the keys of the `error` object so field
/// matching is case-insensitive. Pair codes under `quotes` are left alone.
fn normalize_keys(value: Value) -> Value {
    fn lower(map: Map<String, Value>) -> Map<String, Value> {
        map.into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect()
    }

    match value {
        Value::Object(map) => {
            let mut map = lower(map);
            if let Some(Value::Object(error)) = map.remove("error") {
                map.insert("error".to_string(), Value::Object(lower(error)));
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn decode(body: &str) -> Result<LiveResponse> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| RateError::Decode(e.to_string()))?;
    serde_json::from_value(normalize_keys(value)).map_err(|e| RateError::Decode(e.to_string()))
}

/// Live rates from an exchangerate.host compatible `/live` endpoint.
pub struct ExchangeRateHostSource {
    client: reqwest::Client,
    throttle: Arc<RequestThrottle>,
}

impl ExchangeRateHostSource {
    pub fn new(throttle: Arc<RequestThrottle>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("stockdash/0.1")
            .build()?;
        Ok(Self { client, throttle })
    }

    async fn get_live(&self, url: reqwest::Url) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RateError::Status {
                status: response.status(),
            });
        }
        Ok(response.text().await?)
    }
}

fn to_snapshot(body: &str, options: &FetchOptions) -> Result<RateSnapshot> {
    let model = decode(body)?;

    if !model.success {
        let info = model
            .error
            .as_ref()
            .map_or_else(|| "Unknown error.".to_string(), ApiError::describe);
        return Err(RateError::Provider(info));
    }

    let quotes = model.quotes.ok_or(RateError::MissingData)?;
    let timestamp = model
        .timestamp
        .ok_or_else(|| RateError::Decode("missing field `timestamp`".to_string()))?;
    let retrieved_at = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| RateError::Decode(format!("Invalid timestamp: {timestamp}")))?;

    if let Some(source) = model.source.as_deref() {
        if !source.eq_ignore_ascii_case(&options.base_currency) {
            warn!(
                requested = %options.base_currency,
                returned = %source,
                "Provider quoted rates against a different source currency"
            );
        }
    }

    debug!(pairs = quotes.len(), %retrieved_at, "Received live rates");
    Ok(RateSnapshot {
        rates: RateTable::new(quotes),
        retrieved_at,
        base: options.base_currency.clone(),
    })
}

#[async_trait]
impl RateSource for ExchangeRateHostSource {
    #[instrument(
        name = "LiveRatesFetch",
        skip(self, options),
        fields(base = %options.base_currency, currencies = options.currencies.len())
    )]
    async fn fetch(&self, options: &FetchOptions) -> Result<RateSnapshot> {
        let url = options.live_url()?;
        debug!(endpoint = %options.endpoint, "Requesting live rates");

        let body = self.throttle.run(|| self.get_live(url)).await?;
        to_snapshot(&body, options)
    }

    #[instrument(
        name = "LiveRatesFetch",
        skip(self, options, cancel),
        fields(base = %options.base_currency, currencies = options.currencies.len())
    )]
    async fn fetch_until(
        &self,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<RateSnapshot> {
        let url = options.live_url()?;
        debug!(endpoint = %options.endpoint, "Requesting live rates");

        let body = self
            .throttle
            .run_until(cancel, || self.get_live(url))
            .await
            .map_err(|_| RateError::Cancelled)??;
        to_snapshot(&body, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_live(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .and(query_param("access_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn source() -> ExchangeRateHostSource {
        let throttle = Arc::new(RequestThrottle::new(Duration::from_millis(1)));
        ExchangeRateHostSource::new(throttle).unwrap()
    }

    fn options(server: &MockServer) -> FetchOptions {
        FetchOptions::new(&server.uri(), "test-key")
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let server = mock_live(
            r#"{
                "success": true,
                "terms": "https://currencylayer.com/terms",
                "privacy": "https://currencylayer.com/privacy",
                "timestamp": 1700000000,
                "source": "USD",
                "quotes": {"USDGBP": 0.8, "USDEUR": 0.92}
            }"#,
        )
        .await;

        let snapshot = source().fetch(&options(&server)).await.unwrap();
        assert_eq!(snapshot.base, "USD");
        assert_eq!(snapshot.rates.get("USDGBP"), Some(0.8));
        assert_eq!(snapshot.rates.len(), 2);
        assert_eq!(
            snapshot.retrieved_at,
            Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
        );
    }

    #[tokio::test]
    async fn test_field_matching_is_case_insensitive() {
        let server = mock_live(
            r#"{"Success": true, "TimeStamp": 0, "Source": "USD", "QUOTES": {"USDGBP": 0.8}}"#,
        )
        .await;

        let snapshot = source().fetch(&options(&server)).await.unwrap();
        assert_eq!(snapshot.rates.get("USDGBP"), Some(0.8));
        assert_eq!(snapshot.retrieved_at.timestamp(), 0);
    }

    #[tokio::test]
    async fn test_currency_subset_is_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .and(query_param("access_key", "test-key"))
            .and(query_param("currencies", "GBP,EUR"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"success": true, "timestamp": 1, "quotes": {"USDGBP": 0.8, "USDEUR": 0.9}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let options = options(&server).with_currencies(["gbp", "eur"]);
        let snapshot = source().fetch(&options).await.unwrap();
        assert_eq!(snapshot.rates.len(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_message() {
        let server = mock_live(
            r#"{
                "success": false,
                "error": {
                    "code": 101,
                    "type": "invalid_access_key",
                    "info": "You have not supplied a valid API Access Key."
                }
            }"#,
        )
        .await;

        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert!(matches!(err, RateError::Provider(_)));
        assert_eq!(
            err.to_string(),
            "API request unsuccessful: invalid_access_key (Code: 101): You have not supplied a valid API Access Key."
        );
    }

    #[tokio::test]
    async fn test_provider_error_without_details() {
        let server = mock_live(r#"{"success": false}"#).await;

        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert_eq!(err.to_string(), "API request unsuccessful: Unknown error.");
    }

    #[tokio::test]
    async fn test_missing_quotes() {
        let server = mock_live(r#"{"success": true, "timestamp": 1700000000}"#).await;

        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert!(matches!(err, RateError::MissingData));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = mock_live(r#"{"success": "maybe", "quotes": []}"#).await;
        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert!(matches!(err, RateError::Decode(_)));

        let server = mock_live("<html>Service Unavailable</html>").await;
        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert!(matches!(err, RateError::Decode(_)));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "HTTP error: 500 Internal Server Error from rate provider"
        );
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_rejected() {
        let server = mock_live(r#"{"success": true, "quotes": {"USDGBP": 0.8}}"#).await;

        let err = source().fetch(&options(&server)).await.unwrap_err();
        assert!(matches!(err, RateError::Decode(_)), "{err}");
        assert!(err.to_string().contains("timestamp"));
    }

    #[tokio::test]
    async fn test_cancelled_fetch_keeps_throttle_gap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success": true, "timestamp": 1, "quotes": {}}"#)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let gap = Duration::from_millis(300);
        let throttle = Arc::new(RequestThrottle::new(gap));
        let source = ExchangeRateHostSource::new(Arc::clone(&throttle)).unwrap();
        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };

        let started = std::time::Instant::now();
        let err = source
            .fetch_until(&options(&server), &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, RateError::Cancelled));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100) + gap, "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    }
}
