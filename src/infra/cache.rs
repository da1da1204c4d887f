//! In-memory catalog cache with a staleness window and stale fallbacks.
//!
//! - Shipping grid and carton catalog are cached independently.
//! - Reads inside the window never touch the catalog service.
//! - Concurrent misses share one outstanding fetch per catalog.
//! - A failed or timed-out refresh serves the previous snapshot, however old.

use std::{sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};

use crate::domain::{CartonCatalog, ShippingGrid};
use crate::infra::catalog::{CatalogError, CatalogKind, CatalogSource};
use crate::util::config::PricingConfig;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fetched by this very read.
    Fresh,
    /// Served from memory inside the staleness window.
    Cached,
    /// Refresh failed; older snapshot served.
    Stale,
    /// Refresh failed and nothing was ever loaded.
    Empty,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: Arc<T>,
    pub fetched_at: Option<Instant>,
    pub status: CacheStatus,
    /// Failure absorbed while producing this payload.
    pub error: Option<CatalogError>,
}

impl<T> CachedPayload<T> {
    pub fn is_loaded(&self) -> bool {
        self.status != CacheStatus::Empty
    }

    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }
}

/// Size hint for log lines.
pub trait CatalogSnapshot: Default + Send + Sync + 'static {
    fn entry_count(&self) -> usize;
}

impl CatalogSnapshot for ShippingGrid {
    fn entry_count(&self) -> usize {
        self.rate_count()
    }
}

impl CatalogSnapshot for CartonCatalog {
    fn entry_count(&self) -> usize {
        self.len()
    }
}

type FetchResult<T> = Result<(Arc<T>, Instant), CatalogError>;
type SharedFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;
type Starter<T> = fn(Arc<dyn CatalogSource>) -> BoxFuture<'static, Result<T, CatalogError>>;

struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() <= ttl
    }

    fn payload(&self, status: CacheStatus, error: Option<CatalogError>) -> CachedPayload<T> {
        CachedPayload {
            data: Arc::clone(&self.value),
            fetched_at: Some(self.fetched_at),
            status,
            error,
        }
    }
}

struct Slot<T> {
    entry: Option<Cached<T>>,
    in_flight: Option<SharedFetch<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            entry: None,
            in_flight: None,
        }
    }
}

pub struct PricingCache {
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
    fetch_timeout: Duration,
    shipping: Mutex<Slot<ShippingGrid>>,
    cartons: Mutex<Slot<CartonCatalog>>,
}

impl PricingCache {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            shipping: Mutex::new(Slot::default()),
            cartons: Mutex::new(Slot::default()),
        }
    }

    pub fn from_config(source: Arc<dyn CatalogSource>, config: &PricingConfig) -> Self {
        Self::new(source)
            .with_ttl(config.cache_ttl())
            .with_fetch_timeout(config.fetch_timeout())
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn shipping_grid(&self) -> CachedPayload<ShippingGrid> {
        self.read(CatalogKind::Shipping, &self.shipping, false, fetch_shipping)
            .await
    }

    /// Bypasses the window; the carton catalog is left alone.
    pub async fn refresh_shipping_grid(&self) -> CachedPayload<ShippingGrid> {
        self.read(CatalogKind::Shipping, &self.shipping, true, fetch_shipping)
            .await
    }

    pub async fn carton_catalog(&self) -> CachedPayload<CartonCatalog> {
        self.read(CatalogKind::Cartons, &self.cartons, false, fetch_cartons)
            .await
    }

    /// Bypasses the window; the shipping grid is left alone.
    pub async fn refresh_carton_catalog(&self) -> CachedPayload<CartonCatalog> {
        self.read(CatalogKind::Cartons, &self.cartons, true, fetch_cartons)
            .await
    }

    pub async fn fetched_at(&self, kind: CatalogKind) -> Option<Instant> {
        match kind {
            CatalogKind::Shipping => self.shipping.lock().await.entry.as_ref().map(|e| e.fetched_at),
            CatalogKind::Cartons => self.cartons.lock().await.entry.as_ref().map(|e| e.fetched_at),
        }
    }

    /// Drops both snapshots; the next reads go to the catalog service.
    pub async fn clear(&self) {
        self.shipping.lock().await.entry = None;
        self.cartons.lock().await.entry = None;
    }

    async fn read<T>(
        &self,
        kind: CatalogKind,
        slot: &Mutex<Slot<T>>,
        force: bool,
        start: Starter<T>,
    ) -> CachedPayload<T>
    where
        T: CatalogSnapshot,
    {
        let pending = {
            let mut guard = slot.lock().await;
            if !force {
                if let Some(entry) = guard.entry.as_ref().filter(|e| e.is_fresh(self.ttl)) {
                    debug!(catalog = %kind, age = ?entry.fetched_at.elapsed(), "serving cached catalog");
                    return entry.payload(CacheStatus::Cached, None);
                }
            }

            match guard.in_flight.as_ref() {
                Some(pending) => {
                    debug!(catalog = %kind, "joining in-flight catalog fetch");
                    pending.clone()
                }
                None => {
                    let pending = self.start_fetch(kind, start).shared();
                    guard.in_flight = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut guard = slot.lock().await;
        if guard
            .in_flight
            .as_ref()
            .map(|current| current.ptr_eq(&pending))
            .unwrap_or(false)
        {
            guard.in_flight = None;
        }

        match result {
            Ok((value, fetched_at)) => {
                let newer = guard
                    .entry
                    .as_ref()
                    .map(|entry| entry.fetched_at < fetched_at)
                    .unwrap_or(true);
                if newer {
                    info!(catalog = %kind, entries = value.entry_count(), "catalog snapshot replaced");
                    guard.entry = Some(Cached {
                        value: Arc::clone(&value),
                        fetched_at,
                    });
                }
                CachedPayload {
                    data: value,
                    fetched_at: Some(fetched_at),
                    status: CacheStatus::Fresh,
                    error: None,
                }
            }
            Err(error) => match guard.entry.as_ref() {
                Some(entry) => {
                    warn!(
                        catalog = %kind,
                        %error,
                        age = ?entry.fetched_at.elapsed(),
                        "catalog refresh failed, serving stale snapshot"
                    );
                    entry.payload(CacheStatus::Stale, Some(error))
                }
                None => {
                    warn!(catalog = %kind, %error, "catalog unavailable and nothing cached");
                    CachedPayload {
                        data: Arc::new(T::default()),
                        fetched_at: None,
                        status: CacheStatus::Empty,
                        error: Some(error),
                    }
                }
            },
        }
    }

    fn start_fetch<T>(&self, kind: CatalogKind, start: Starter<T>) -> BoxFuture<'static, FetchResult<T>>
    where
        T: CatalogSnapshot,
    {
        let source = Arc::clone(&self.source);
        let timeout = self.fetch_timeout;
        async move {
            debug!(catalog = %kind, "fetching catalog");
            match tokio::time::timeout(timeout, start(source)).await {
                Ok(Ok(value)) => Ok((Arc::new(value), Instant::now())),
                Ok(Err(error)) => Err(error),
                Err(_) => Err(CatalogError::Timeout(timeout)),
            }
        }
        .boxed()
    }
}

fn fetch_shipping(source: Arc<dyn CatalogSource>) -> BoxFuture<'static, Result<ShippingGrid, CatalogError>> {
    async move { source.fetch_shipping_grid().await }.boxed()
}

fn fetch_cartons(source: Arc<dyn CatalogSource>) -> BoxFuture<'static, Result<CartonCatalog, CatalogError>> {
    async move { source.fetch_carton_catalog().await }.boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::domain::CartonEntry;

    #[derive(Default)]
    struct CountingSource {
        grid_calls: AtomicUsize,
        carton_calls: AtomicUsize,
        failing: AtomicBool,
        delay: Option<Duration>,
    }

    impl CountingSource {
        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        fn grid_calls(&self) -> usize {
            self.grid_calls.load(Ordering::SeqCst)
        }

        fn carton_calls(&self) -> usize {
            self.carton_calls.load(Ordering::SeqCst)
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        async fn pause(&self) -> Result<(), CatalogError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                Err(CatalogError::Unauthenticated)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn fetch_shipping_grid(&self) -> Result<ShippingGrid, CatalogError> {
            self.grid_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await?;
            Ok(ShippingGrid::default())
        }

        async fn fetch_carton_catalog(&self) -> Result<CartonCatalog, CatalogError> {
            let call = self.carton_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await?;
            let entry = CartonEntry {
                reference: format!("CARTON-{call}"),
                price: Some(8.0),
                inner: None,
                active: true,
            };
            Ok(CartonCatalog::new(vec![entry])?)
        }
    }

    fn cache_over(source: &Arc<CountingSource>) -> PricingCache {
        PricingCache::new(Arc::clone(source) as Arc<dyn CatalogSource>)
    }

    #[tokio::test(start_paused = true)]
    async fn reads_inside_window_do_not_refetch() {
        let source = Arc::new(CountingSource::default());
        let cache = cache_over(&source);

        assert_eq!(cache.carton_catalog().await.status, CacheStatus::Fresh);

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        let payload = cache.carton_catalog().await;
        assert_eq!(payload.status, CacheStatus::Cached);
        assert_eq!(source.carton_calls(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        let payload = cache.carton_catalog().await;
        assert_eq!(payload.status, CacheStatus::Fresh);
        assert_eq!(payload.data.entries()[0].reference, "CARTON-1");
        assert_eq!(source.carton_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_previous_snapshot() {
        let source = Arc::new(CountingSource::default());
        let cache = cache_over(&source);

        let first = cache.carton_catalog().await;
        source.fail(true);
        tokio::time::advance(Duration::from_secs(60 * 60)).await;

        let stale = cache.carton_catalog().await;
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(stale.error, Some(CatalogError::Unauthenticated));
        assert!(Arc::ptr_eq(&stale.data, &first.data));
        assert_eq!(stale.fetched_at, first.fetched_at);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_snapshot_is_empty() {
        let source = Arc::new(CountingSource::default());
        source.fail(true);
        let cache = cache_over(&source);

        let payload = cache.shipping_grid().await;
        assert_eq!(payload.status, CacheStatus::Empty);
        assert!(!payload.is_loaded());
        assert!(payload.data.is_empty());
        assert!(payload.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let source = Arc::new(CountingSource::slow(Duration::from_secs(1)));
        let cache = cache_over(&source);

        let (a, b, c) = tokio::join!(
            cache.shipping_grid(),
            cache.shipping_grid(),
            cache.refresh_shipping_grid()
        );

        assert_eq!(source.grid_calls(), 1);
        assert_eq!(a.status, CacheStatus::Fresh);
        assert!(Arc::ptr_eq(&a.data, &b.data));
        assert!(Arc::ptr_eq(&a.data, &c.data));
        assert_eq!(cache.shipping_grid().await.status, CacheStatus::Cached);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_catalog_times_out_like_a_failure() {
        let source = Arc::new(CountingSource::slow(Duration::from_secs(60)));
        let cache = cache_over(&source).with_fetch_timeout(Duration::from_secs(5));

        let payload = cache.carton_catalog().await;
        assert_eq!(payload.status, CacheStatus::Empty);
        assert_eq!(
            payload.error,
            Some(CatalogError::Timeout(Duration::from_secs(5)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_is_per_catalog() {
        let source = Arc::new(CountingSource::default());
        let cache = cache_over(&source);

        cache.shipping_grid().await;
        cache.carton_catalog().await;

        let refreshed = cache.refresh_carton_catalog().await;
        assert_eq!(refreshed.status, CacheStatus::Fresh);
        assert_eq!(source.carton_calls(), 2);

        assert_eq!(cache.shipping_grid().await.status, CacheStatus::Cached);
        assert_eq!(source.grid_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forces_next_read_to_fetch() {
        let source = Arc::new(CountingSource::default());
        let cache = cache_over(&source);

        cache.shipping_grid().await;
        assert!(cache.fetched_at(CatalogKind::Shipping).await.is_some());

        cache.clear().await;
        assert!(cache.fetched_at(CatalogKind::Shipping).await.is_none());
        cache.shipping_grid().await;
        assert_eq!(source.grid_calls(), 2);
    }
}
