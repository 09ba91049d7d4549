use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Cache lookups (hit / miss), evictions and current size
// - Store reads behind cache misses (found / not_found / error)
// - Ingestion outcomes and latency
// - Feed messages by handling status
//
// Exposed in text format on GET /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Cache Metrics
    pub cache_lookups: IntCounterVec,
    pub cache_evictions: IntCounter,
    pub cache_entries: IntGauge,

    // Store Metrics
    pub store_reads: IntCounterVec,

    // Ingestion Metrics
    pub orders_ingested: IntCounterVec,
    pub ingest_duration: Histogram,
    pub feed_messages: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cache_lookups = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Order cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_evictions = IntCounter::new(
            "cache_evictions_total",
            "Orders evicted from the cache under capacity pressure",
        )?;
        registry.register(Box::new(cache_evictions.clone()))?;

        let cache_entries = IntGauge::new("cache_entries", "Orders currently cached")?;
        registry.register(Box::new(cache_entries.clone()))?;

        let store_reads = IntCounterVec::new(
            Opts::new("store_reads_total", "Store reads after a cache miss by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(store_reads.clone()))?;

        let orders_ingested = IntCounterVec::new(
            Opts::new("orders_ingested_total", "Orders handed to the write path by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_duration = Histogram::with_opts(
            HistogramOpts::new("ingest_duration_seconds", "Time to persist and cache one order")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(ingest_duration.clone()))?;

        let feed_messages = IntCounterVec::new(
            Opts::new("feed_messages_total", "Messages consumed from the order feed by status"),
            &["status"],
        )?;
        registry.register(Box::new(feed_messages.clone()))?;

        Ok(Self {
            registry,
            cache_lookups,
            cache_evictions,
            cache_entries,
            store_reads,
            orders_ingested,
            ingest_duration,
            feed_messages,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn record_store_read(&self, outcome: &str) {
        self.store_reads.with_label_values(&[outcome]).inc();
    }

    pub fn record_ingest(&self, duration_secs: f64, success: bool) {
        let outcome = if success { "stored" } else { "failed" };
        self.orders_ingested.with_label_values(&[outcome]).inc();
        self.ingest_duration.observe(duration_secs);
    }

    pub fn record_feed_message(&self, status: &str) {
        self.feed_messages.with_label_values(&[status]).inc();
    }

    pub fn record_cache_size(&self, entries: usize, evicted: usize) {
        self.cache_entries.set(entries as i64);
        self.cache_evictions.inc_by(evicted as u64);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}
