pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionService, RateCache, RequestThrottle};
use crate::providers::alpha_vantage::AlphaVantageSearch;
use crate::providers::exchangerate_host::ExchangeRateHostSource;
use crate::providers::yahoo_finance::YahooQuoteProvider;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum AppCommand {
    Convert { amount: Decimal, currency: String },
    Rates { refresh: bool },
    Quote { symbols: Vec<String> },
    Search { query: String },
    Watch {
        symbols: Vec<String>,
        interval: Option<Duration>,
    },
}

/// Services wired from one configuration. Every outbound provider call goes
/// through the same throttle.
pub struct App {
    pub config: AppConfig,
    pub throttle: Arc<RequestThrottle>,
    pub converter: ConversionService<ExchangeRateHostSource>,
    pub quotes: YahooQuoteProvider,
    pub search: Option<AlphaVantageSearch>,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let throttle = Arc::new(RequestThrottle::new(config.min_delay()));

        let source = ExchangeRateHostSource::new(Arc::clone(&throttle))
            .context("Failed to create rate provider client")?;
        let cache = RateCache::new(source, config.rates.fetch_options());
        let converter = ConversionService::new(cache, config.rates.overrides());

        let quotes = YahooQuoteProvider::new(config.yahoo_base_url(), Arc::clone(&throttle))
            .context("Failed to create quote provider client")?;
        let search = config
            .providers
            .alpha_vantage
            .as_ref()
            .map(|p| AlphaVantageSearch::new(&p.base_url, &p.api_key, Arc::clone(&throttle)))
            .transpose()
            .context("Failed to create symbol search client")?;

        Ok(Self {
            config,
            throttle,
            converter,
            quotes,
            search,
        })
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Stock dashboard starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::from_config(config)?;

    match command {
        AppCommand::Convert { amount, currency } => {
            cli::convert::run(&app.converter, amount, &currency).await
        }
        AppCommand::Rates { refresh } => cli::rates::run(&app.converter, refresh).await,
        AppCommand::Quote { symbols } => {
            cli::quote::run(&symbols, &app.quotes, &app.converter).await
        }
        AppCommand::Search { query } => {
            let search = app
                .search
                .as_ref()
                .context("Symbol search needs an `alpha_vantage` provider in the configuration")?;
            cli::search::run(search, &query).await
        }
        AppCommand::Watch { symbols, interval } => {
            let interval = interval.unwrap_or_else(|| app.config.watch_interval());
            cli::watch::run(&symbols, interval, &app.quotes, &app.converter).await
        }
    }
}
