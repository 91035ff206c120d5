use super::ui;
use crate::core::CurrencyConverter;
use anyhow::{Context, Result};
use rust_decimal::Decimal;

pub async fn run(converter: &dyn CurrencyConverter, amount: Decimal, currency: &str) -> Result<()> {
    let converted = converter
        .convert(amount, currency)
        .await
        .with_context(|| format!("Failed to convert {amount} {currency}"))?;

    let base = converter.base_currency();
    println!(
        "{} {} = {}",
        amount,
        currency.to_uppercase(),
        ui::style_text(&format!("{:.2} {}", converted.round_dp(2), base), ui::StyleType::TotalValue)
    );
    Ok(())
}
