use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use super::converter::Overrides;
use super::rates::{DEFAULT_BASE_CURRENCY, FetchOptions};
use super::throttle::DEFAULT_MIN_DELAY;

fn default_endpoint() -> String {
    "https://api.exchangerate.host".to_string()
}

fn default_base() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

fn default_overrides() -> BTreeMap<String, Decimal> {
    BTreeMap::from([
        ("DKK".to_string(), Decimal::new(712, 2)),
        ("SEK".to_string(), Decimal::new(1071, 2)),
    ])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RatesConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub access_key: String,
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default)]
    pub currencies: Vec<String>,
    /// Units of the currency per one unit of `base`.
    #[serde(default = "default_overrides")]
    pub overrides: BTreeMap<String, Decimal>,
}

impl RatesConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::new(&self.endpoint, &self.access_key)
            .with_base(&self.base)
            .with_currencies(&self.currencies)
    }

    pub fn overrides(&self) -> Overrides {
        Overrides::new(self.overrides.iter().map(|(code, d)| (code, *d)))
    }

    /// Override divisors must be positive.
    pub fn validate(&self) -> Result<()> {
        if let Some((code, divisor)) = self
            .overrides
            .iter()
            .find(|(_, divisor)| divisor.is_sign_negative() || divisor.is_zero())
        {
            anyhow::bail!("rates.overrides.{code} must be a positive number, got {divisor}");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlphaVantageProviderConfig {
    #[serde(default = "alpha_vantage_default_url")]
    pub base_url: String,
    pub api_key: String,
}

fn alpha_vantage_default_url() -> String {
    crate::providers::alpha_vantage::DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub alpha_vantage: Option<AlphaVantageProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: crate::providers::yahoo_finance::DEFAULT_BASE_URL.to_string(),
            }),
            alpha_vantage: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThrottleConfig {
    pub min_delay_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_MIN_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub rates: RatesConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "stockdash", "stockdash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .rates
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or(crate::providers::yahoo_finance::DEFAULT_BASE_URL, |p| {
                &p.base_url
            })
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.throttle.min_delay_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs)
    }
}
