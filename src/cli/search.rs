use super::ui;
use crate::core::SymbolSearch;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(search: &dyn SymbolSearch, query: &str) -> Result<()> {
    let matches = search.search(query).await?;
    if matches.is_empty() {
        println!(
            "{}",
            ui::style_text(&format!("No symbols match '{query}'"), ui::StyleType::Subtle)
        );
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Symbol"), ui::header_cell("Name")]);
    for m in &matches {
        table.add_row(vec![Cell::new(&m.symbol), Cell::new(&m.name)]);
    }
    println!("{table}");
    Ok(())
}
