use super::error::{RateError, Result};
use super::rates::{FetchOptions, RateSnapshot, RateSource, RateTable};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Holds the latest rate snapshot and refreshes it on demand.
///
/// There is no time-based expiry: a snapshot stays until a caller forces a
/// refresh or calls [`invalidate`](Self::invalidate). Fetches made with
/// one-off options are handed back to the caller and never stored.
/// Concurrent refreshes are not deduplicated.
pub struct RateCache<S: RateSource> {
    source: S,
    options: StdRwLock<FetchOptions>,
    snapshot: RwLock<Option<Arc<RateSnapshot>>>,
}

impl<S: RateSource> RateCache<S> {
    pub fn new(source: S, options: FetchOptions) -> Self {
        Self {
            source,
            options: StdRwLock::new(options),
            snapshot: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Default options used by refreshes that don't supply their own.
    pub fn options(&self) -> FetchOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the default fetch options. The stored snapshot is kept until
    /// the next refresh.
    pub fn reconfigure(&self, options: FetchOptions) {
        info!(base = %options.base_currency, "Reconfiguring rate cache");
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    pub async fn snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn invalidate(&self) {
        debug!("Rate cache INVALIDATE");
        *self.snapshot.write().await = None;
    }

    /// Returns the cached table, fetching a new snapshot when the cache is
    /// empty or `force_refresh` is set.
    ///
    /// When `options` is supplied the provider is always called with them and
    /// the result is returned without touching the stored snapshot or the
    /// default options.
    pub async fn get_rates(
        &self,
        force_refresh: bool,
        options: Option<FetchOptions>,
    ) -> Result<RateTable> {
        let snapshot = self.load(force_refresh, options, None).await?;
        Ok(snapshot.rates.clone())
    }

    /// [`get_rates`](Self::get_rates), returning the whole snapshot.
    pub async fn get_snapshot(
        &self,
        force_refresh: bool,
        options: Option<FetchOptions>,
    ) -> Result<Arc<RateSnapshot>> {
        self.load(force_refresh, options, None).await
    }

    /// [`get_rates`](Self::get_rates) that aborts with
    /// [`RateError::Cancelled`] when `cancel` fires. The token is handed to
    /// the source, so a throttled provider keeps its spacing. A cancelled
    /// refresh leaves the stored snapshot untouched.
    pub async fn get_rates_until(
        &self,
        force_refresh: bool,
        options: Option<FetchOptions>,
        cancel: &CancellationToken,
    ) -> Result<RateTable> {
        if cancel.is_cancelled() {
            return Err(RateError::Cancelled);
        }
        let snapshot = self.load(force_refresh, options, Some(cancel)).await?;
        Ok(snapshot.rates.clone())
    }

    /// Blocking entry point over [`get_rates`](Self::get_rates).
    ///
    /// Must be called from a thread that is not driving an async task (a
    /// plain thread or `spawn_blocking`). Calling it from inside the runtime
    /// panics, and calling it while another task on the same cache is
    /// awaiting this call deadlocks.
    pub fn get_rates_blocking(
        &self,
        runtime: &Handle,
        force_refresh: bool,
        options: Option<FetchOptions>,
    ) -> Result<RateTable> {
        runtime.block_on(self.get_rates(force_refresh, options))
    }

    async fn load(
        &self,
        force_refresh: bool,
        options: Option<FetchOptions>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<RateSnapshot>> {
        if let Some(options) = options {
            let snapshot = self.fetch(&options, cancel).await?;
            debug!(base = %snapshot.base, pairs = snapshot.rates.len(), "Rate cache BYPASS");
            return Ok(Arc::new(snapshot));
        }

        if !force_refresh {
            if let Some(cached) = self.cached_snapshot().await {
                debug!("Rate cache HIT");
                return Ok(cached);
            }
            debug!("Rate cache MISS");
        }

        let options = self.options();
        let snapshot = Arc::new(self.fetch(&options, cancel).await?);
        debug!(
            base = %snapshot.base,
            pairs = snapshot.rates.len(),
            retrieved_at = %snapshot.retrieved_at,
            "Rate cache PUT"
        );
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn fetch(
        &self,
        options: &FetchOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<RateSnapshot> {
        match cancel {
            Some(cancel) => self.source.fetch_until(options, cancel).await,
            None => self.source.fetch(options).await,
        }
    }

    async fn cached_snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.snapshot
            .read()
            .await
            .as_ref()
            .filter(|snapshot| !snapshot.rates.is_empty())
            .cloned()
    }
}
