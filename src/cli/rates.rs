use super::ui;
use crate::core::{ConversionService, RateSnapshot, RateSource};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment};

impl RateSnapshot {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Pair"),
            ui::header_cell("Rate"),
            ui::header_cell(&format!("1 unit in {}", self.base)),
        ]);

        for pair in self.rates.pairs() {
            let rate = self.rates.get(pair).unwrap_or_default();
            let inverse = (rate > 0.0).then(|| 1.0 / rate);
            table.add_row(vec![
                Cell::new(pair),
                Cell::new(format!("{rate:.6}")).set_alignment(CellAlignment::Right),
                ui::format_optional_cell(inverse, |v| format!("{v:.6}")),
            ]);
        }

        format!(
            "Rates against {} {}\n\n{}",
            ui::style_text(&self.base, ui::StyleType::Title),
            ui::style_text(
                &format!("(retrieved {})", self.retrieved_at.format("%Y-%m-%d %H:%M:%S UTC")),
                ui::StyleType::Subtle
            ),
            table
        )
    }
}

pub async fn run<S: RateSource>(converter: &ConversionService<S>, refresh: bool) -> Result<()> {
    let cache = converter.cache();
    cache
        .get_rates(refresh, None)
        .await
        .context("Failed to load exchange rates")?;

    match cache.snapshot().await {
        Some(snapshot) if !snapshot.rates.is_empty() => println!("{}", snapshot.display_as_table()),
        _ => println!(
            "{}",
            ui::style_text("Provider returned no rates", ui::StyleType::Error)
        ),
    }

    let overrides = converter.overrides();
    if !overrides.is_empty() {
        println!(
            "\n{}",
            ui::style_text(
                &format!("{} fixed override rate(s) bypass the live table", overrides.len()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
