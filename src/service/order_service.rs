use std::sync::Arc;
use std::time::Instant;

use super::errors::ServiceError;
use crate::cache::OrderCache;
use crate::config::CacheConfig;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::OrderRepository;

// ============================================================================
// Order Service
// ============================================================================
//
// Read:  cache -> (miss) repository -> (found) cache.set -> caller
// Write: repository.save -> (ok) cache.set
//
// The cache only ever holds orders the repository has accepted, so a crash
// never loses an order that was visible to readers.
//
// ============================================================================

/// How a successful read was served.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    CacheHit(Order),
    StoreHit(Order),
}

impl Lookup {
    pub fn into_order(self) -> Order {
        match self {
            Lookup::CacheHit(order) | Lookup::StoreHit(order) => order,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Lookup::CacheHit(_))
    }
}

pub struct OrderService {
    cache: OrderCache,
    repository: Arc<dyn OrderRepository>,
    metrics: Arc<Metrics>,
}

impl OrderService {
    /// Build the service around an already constructed cache without warming it.
    pub fn new(
        cache: OrderCache,
        repository: Arc<dyn OrderRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cache,
            repository,
            metrics,
        }
    }

    /// Build the service and warm the cache with the most recent orders.
    ///
    /// Fails on an invalid capacity or when the repository cannot deliver the
    /// warm-up set; the service is not usable in either case.
    pub async fn bootstrap(
        config: &CacheConfig,
        repository: Arc<dyn OrderRepository>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ServiceError> {
        let capacity = config.validated_capacity()?;
        let bootstrap_count = config.bootstrap_count();

        tracing::info!(
            capacity = capacity.get(),
            bootstrap_count = bootstrap_count,
            "Warming order cache"
        );

        let orders = repository.get_most_recent(bootstrap_count).await?;
        let loaded = orders.len();

        // Oldest first, so the newest orders end up most recently used.
        let cache = OrderCache::new(capacity);
        let evicted = cache.load_many(orders.into_iter().rev());
        metrics.record_cache_size(cache.len(), evicted);

        tracing::info!(loaded = loaded, cached = cache.len(), "✅ Order cache warmed");

        Ok(Self::new(cache, repository, metrics))
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Cache-aside read that reports where the order came from.
    pub async fn lookup(&self, order_uid: &str) -> Result<Lookup, ServiceError> {
        if let Some(order) = self.cache.get(order_uid) {
            self.metrics.record_cache_lookup(true);
            tracing::debug!(order_uid = %order_uid, "Order found in cache");
            return Ok(Lookup::CacheHit(order));
        }

        self.metrics.record_cache_lookup(false);
        tracing::debug!(order_uid = %order_uid, "Order not in cache, querying store");

        match self.repository.get_by_id(order_uid).await {
            Ok(Some(order)) => {
                self.metrics.record_store_read("found");
                let evicted = self.cache.set(order.clone());
                self.metrics
                    .record_cache_size(self.cache.len(), usize::from(evicted.is_some()));
                tracing::debug!(order_uid = %order_uid, "Order found in store, cached");
                Ok(Lookup::StoreHit(order))
            }
            Ok(None) => {
                self.metrics.record_store_read("not_found");
                tracing::debug!(order_uid = %order_uid, "Order not found in store");
                Err(ServiceError::NotFound {
                    order_uid: order_uid.to_string(),
                })
            }
            Err(e) => {
                self.metrics.record_store_read("error");
                tracing::error!(order_uid = %order_uid, error = %e, "Store read failed");
                Err(ServiceError::Store(e))
            }
        }
    }

    /// Cache-aside read. `ServiceError::NotFound` when neither the cache nor
    /// the store holds the order; store failures are passed through.
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, ServiceError> {
        self.lookup(order_uid).await.map(Lookup::into_order)
    }

    /// Persist the order, then make it visible in the cache.
    pub async fn ingest_order(&self, order: Order) -> Result<(), ServiceError> {
        let started = Instant::now();

        if let Err(e) = self.repository.save(&order).await {
            self.metrics
                .record_ingest(started.elapsed().as_secs_f64(), false);
            tracing::error!(
                order_uid = %order.order_uid,
                error = %e,
                "Failed to persist order, cache left untouched"
            );
            return Err(e.into());
        }

        let order_uid = order.order_uid.clone();
        let evicted = self.cache.set(order);
        self.metrics
            .record_cache_size(self.cache.len(), usize::from(evicted.is_some()));
        self.metrics
            .record_ingest(started.elapsed().as_secs_f64(), true);

        tracing::info!(order_uid = %order_uid, "Order ingested");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryOrderRepository, StoreError};
    use crate::synthetic::{sample_order, sample_order_at};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps the in-memory repository, counting calls and injecting failures.
    #[derive(Default)]
    struct CountingRepository {
        inner: InMemoryOrderRepository,
        get_calls: AtomicUsize,
        save_calls: AtomicUsize,
        fail_reads: AtomicBool,
        fail_saves: AtomicBool,
    }

    fn io_error() -> StoreError {
        StoreError::Database(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }

    #[async_trait]
    impl OrderRepository for CountingRepository {
        async fn get_by_id(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.get_by_id(order_uid).await
        }

        async fn get_most_recent(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.get_most_recent(limit).await
        }

        async fn save(&self, order: &Order) -> Result<(), StoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(io_error());
            }
            self.inner.save(order).await
        }
    }

    fn cache_config(capacity: usize, bootstrap_count: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            bootstrap_count: Some(bootstrap_count),
        }
    }

    async fn service_with(
        repo: Arc<CountingRepository>,
        capacity: usize,
    ) -> OrderService {
        let metrics = Arc::new(Metrics::new().unwrap());
        OrderService::bootstrap(&cache_config(capacity, 0), repo, metrics)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;
        service.ingest_order(sample_order("a")).await.unwrap();

        let lookup = service.lookup("a").await.unwrap();

        assert!(lookup.is_cache_hit());
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_hit_populates_cache() {
        let repo = Arc::new(CountingRepository::default());
        repo.inner.save(&sample_order("a")).await.unwrap();
        let service = service_with(repo.clone(), 4).await;

        let first = service.lookup("a").await.unwrap();
        assert!(matches!(first, Lookup::StoreHit(_)));
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 1);

        let second = service.get_order("a").await.unwrap();
        assert_eq!(second.order_uid, "a");
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_miss_is_not_found_without_negative_caching() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;

        let err = service.get_order("ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { ref order_uid } if order_uid == "ghost"));
        assert!(service.cache().is_empty());

        // No negative caching: the store is asked again.
        service.get_order("ghost").await.unwrap_err();
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_error_is_not_masked_as_not_found() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;
        repo.fail_reads.store(true, Ordering::SeqCst);

        let err = service.get_order("a").await.unwrap_err();

        assert!(matches!(err, ServiceError::Store(StoreError::Database(_))));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_cache_untouched() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;
        repo.fail_saves.store(true, Ordering::SeqCst);

        let err = service.ingest_order(sample_order("a")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert!(!service.cache().contains("a"));
        assert!(repo.inner.is_empty());
    }

    #[tokio::test]
    async fn test_conflicting_save_keeps_cache_consistent() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;
        service.ingest_order(sample_order("a")).await.unwrap();

        let mut duplicate = sample_order("a");
        duplicate.track_number = "DIFFERENT".to_string();
        let err = service.ingest_order(duplicate).await.unwrap_err();

        assert!(matches!(err, ServiceError::Store(StoreError::Conflict(_))));
        assert_eq!(service.get_order("a").await.unwrap().track_number, "WBILMTESTTRACK");
    }

    #[tokio::test]
    async fn test_ingested_order_is_readable_without_store_round_trip() {
        let repo = Arc::new(CountingRepository::default());
        let service = service_with(repo.clone(), 4).await;

        let order = sample_order("fresh");
        service.ingest_order(order.clone()).await.unwrap();

        assert_eq!(service.get_order("fresh").await.unwrap(), order);
        assert_eq!(repo.save_calls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_loads_most_recent_orders() {
        let repo = Arc::new(CountingRepository::default());
        let now = Utc::now();
        for i in 0..5 {
            let order = sample_order_at(&format!("o{}", i), now - Duration::hours(5 - i));
            repo.inner.save(&order).await.unwrap();
        }

        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderService::bootstrap(&cache_config(10, 3), repo.clone(), metrics)
            .await
            .unwrap();

        assert_eq!(service.cache().len(), 3);
        for uid in ["o4", "o3", "o2"] {
            assert!(service.lookup(uid).await.unwrap().is_cache_hit());
        }
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 0);
        assert!(!service.cache().contains("o1"));
    }

    #[tokio::test]
    async fn test_bootstrap_keeps_newest_orders_hot() {
        let repo = Arc::new(CountingRepository::default());
        let now = Utc::now();
        for i in 0..5 {
            let order = sample_order_at(&format!("o{}", i), now - Duration::hours(5 - i));
            repo.inner.save(&order).await.unwrap();
        }

        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderService::bootstrap(&cache_config(3, 5), repo.clone(), metrics)
            .await
            .unwrap();

        assert_eq!(service.cache().keys(), vec!["o4", "o3", "o2"]);

        // A read-through now evicts the oldest warmed order, not the newest.
        service.get_order("o0").await.unwrap();
        assert!(service.cache().contains("o4"));
        assert!(!service.cache().contains("o2"));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_fatal() {
        let repo = Arc::new(CountingRepository::default());
        repo.fail_reads.store(true, Ordering::SeqCst);
        let metrics = Arc::new(Metrics::new().unwrap());

        let result = OrderService::bootstrap(&cache_config(10, 3), repo, metrics).await;

        assert!(matches!(result, Err(ServiceError::Store(_))));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_a_configuration_error() {
        let repo = Arc::new(CountingRepository::default());
        let metrics = Arc::new(Metrics::new().unwrap());

        let result = OrderService::bootstrap(&cache_config(0, 0), repo, metrics).await;

        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_read_through_respects_capacity() {
        let repo = Arc::new(CountingRepository::default());
        for uid in ["a", "b", "c"] {
            repo.inner.save(&sample_order(uid)).await.unwrap();
        }
        let service = service_with(repo.clone(), 2).await;

        service.get_order("a").await.unwrap();
        service.get_order("b").await.unwrap();
        service.get_order("a").await.unwrap();
        service.get_order("c").await.unwrap();

        assert_eq!(service.cache().keys(), vec!["c", "a"]);
        assert_eq!(repo.get_calls.load(Ordering::SeqCst), 3);
    }
}
