use super::ui;
use crate::core::{CurrencyConverter, Quote, QuoteProvider};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::debug;

#[derive(Debug)]
pub struct QuoteRow {
    pub symbol: String,
    pub quote: Option<Quote>,
    /// Price in the base currency.
    pub converted: Option<Decimal>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct QuoteBoard {
    pub base_currency: String,
    pub rows: Vec<QuoteRow>,
}

impl QuoteBoard {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Name"),
            ui::header_cell("Price"),
            ui::header_cell("Change"),
            ui::header_cell("Day range"),
            ui::header_cell(&format!("Price ({})", self.base_currency)),
        ]);

        for row in &self.rows {
            let Some(quote) = &row.quote else {
                table.add_row(vec![
                    Cell::new(&row.symbol),
                    Cell::new(row.error.as_deref().unwrap_or("N/A")),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                    ui::na_cell(true),
                ]);
                continue;
            };

            let range = quote.day_low.zip(quote.day_high);
            let converted = row.converted.map_or_else(
                || ui::na_cell(row.error.is_some()),
                |v| Cell::new(format!("{:.2}", v.round_dp(2))).set_alignment(CellAlignment::Right),
            );

            table.add_row(vec![
                Cell::new(&quote.symbol),
                Cell::new(quote.display_name()),
                Cell::new(format!("{:.2} {}", quote.price, quote.currency)),
                ui::change_cell(quote.change_percent()),
                ui::format_optional_cell(range, |(low, high)| format!("{low:.2} - {high:.2}")),
                converted,
            ]);
        }

        let mut output = table.to_string();
        for row in self.rows.iter().filter(|r| r.quote.is_some()) {
            if let Some(error) = &row.error {
                output.push_str(&format!(
                    "\n{}",
                    ui::style_text(&format!("{}: {}", row.symbol, error), ui::StyleType::Error)
                ));
            }
        }
        output
    }
}

async fn quote_row(
    symbol: &str,
    provider: &dyn QuoteProvider,
    converter: &dyn CurrencyConverter,
) -> QuoteRow {
    let quote = match provider.fetch_quote(symbol).await {
        Ok(quote) => quote,
        Err(e) => {
            return QuoteRow {
                symbol: symbol.to_string(),
                quote: None,
                converted: None,
                error: Some(e.to_string()),
            };
        }
    };

    let conversion = match Decimal::from_f64(quote.price) {
        Some(price) => converter
            .convert(price, &quote.currency)
            .await
            .map_err(|e| e.to_string()),
        None => Err(format!("Price {} is not representable", quote.price)),
    };
    debug!(symbol, ?conversion, "Converted quote price");

    let (converted, error) = match conversion {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    QuoteRow {
        symbol: symbol.to_string(),
        quote: Some(quote),
        converted,
        error,
    }
}

/// Fetches every symbol and converts its price to the base currency. A
/// failing symbol or conversion only affects its own row.
pub async fn collect(
    symbols: &[String],
    provider: &dyn QuoteProvider,
    converter: &dyn CurrencyConverter,
) -> QuoteBoard {
    let pb = ui::new_progress_bar(symbols.len() as u64, "Fetching quotes...");
    let futures = symbols.iter().map(|symbol| {
        let pb = pb.clone();
        async move {
            let row = quote_row(symbol, provider, converter).await;
            pb.inc(1);
            row
        }
    });
    let rows = join_all(futures).await;
    pb.finish_and_clear();

    QuoteBoard {
        base_currency: converter.base_currency(),
        rows,
    }
}

pub async fn run(
    symbols: &[String],
    provider: &dyn QuoteProvider,
    converter: &dyn CurrencyConverter,
) -> Result<()> {
    let board = collect(symbols, provider, converter).await;
    println!("{}", board.display_as_table());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RateError;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StaticQuotes;

    #[async_trait]
    impl QuoteProvider for StaticQuotes {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
            let currency = match symbol {
                "NOVO-B.CO" => "DKK",
                "VOD.L" => "GBP",
                "7203.T" => "JPY",
                _ => return Err(anyhow!("No quote data found for symbol: {symbol}")),
            };
            Ok(Quote {
                symbol: symbol.to_string(),
                currency: currency.to_string(),
                price: 71.2,
                previous_close: Some(70.0),
                day_high: None,
                day_low: None,
                long_name: None,
                short_name: None,
            })
        }
    }

    struct GbpOnly;

    #[async_trait]
    impl CurrencyConverter for GbpOnly {
        async fn convert(&self, amount: Decimal, from: &str) -> Result<Decimal, RateError> {
            match from {
                "DKK" => Ok(amount / Decimal::new(712, 2)),
                "GBP" => Ok(amount * Decimal::new(125, 2)),
                _ => Err(RateError::RateNotFound {
                    currency: from.to_string(),
                    available: "USDGBP".to_string(),
                }),
            }
        }

        fn base_currency(&self) -> String {
            "USD".to_string()
        }
    }

    #[tokio::test]
    async fn test_rows_fail_independently() {
        let symbols: Vec<String> = ["NOVO-B.CO", "VOD.L", "7203.T", "NOPE"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let board = collect(&symbols, &StaticQuotes, &GbpOnly).await;
        assert_eq!(board.base_currency, "USD");
        assert_eq!(board.rows.len(), 4);

        assert_eq!(board.rows[0].converted, Some(Decimal::new(10, 0)));
        assert_eq!(board.rows[1].converted, Some(Decimal::new(89, 0)));

        let jpy = &board.rows[2];
        assert!(jpy.quote.is_some());
        assert!(jpy.converted.is_none());
        assert!(jpy.error.as_deref().unwrap().contains("USDGBP"));

        let missing = &board.rows[3];
        assert!(missing.quote.is_none());
        assert_eq!(
            missing.error.as_deref(),
            Some("No quote data found for symbol: NOPE")
        );

        let rendered = board.display_as_table();
        assert!(rendered.contains("NOVO-B.CO"));
        assert!(rendered.contains("Price (USD)"));
    }
}
