//! Stock quote and symbol search abstractions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub currency: String,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
}

impl Quote {
    pub fn change(&self) -> Option<f64> {
        self.previous_close.map(|prev| self.price - prev)
    }

    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }

    pub fn display_name(&self) -> &str {
        self.long_name
            .as_deref()
            .or(self.short_name.as_deref())
            .unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

#[async_trait]
pub trait SymbolSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>>;
}
