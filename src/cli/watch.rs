use super::{quote, ui};
use crate::core::schedule::poll_every;
use crate::core::{ConversionService, QuoteProvider, RateSource};
use anyhow::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Re-renders the quote board every `interval` until Ctrl-C.
///
/// Each tick forces a rate refresh first. A failed refresh keeps the previous
/// snapshot, so conversions continue on the last good rates.
pub async fn run<S: RateSource>(
    symbols: &[String],
    interval: Duration,
    provider: &dyn QuoteProvider,
    converter: &ConversionService<S>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping watch");
        }
        on_signal.cancel();
    });

    let stop = &cancel;
    poll_every(interval, &cancel, move || async move {
        if let Err(e) = converter
            .cache()
            .get_rates_until(true, None, stop)
            .await
        {
            warn!(error = %e, "Rate refresh failed, using previous snapshot");
        }

        let board = quote::collect(symbols, provider, converter).await;
        ui::print_separator();
        println!("{}", board.display_as_table());
        Ok(())
    })
    .await;
    Ok(())
}
