// Private module declaration
mod lru;

use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::models::Order;

pub use lru::LruCache;

// ============================================================================
// Order Cache - bounded, thread-safe recency cache keyed by order_uid
// ============================================================================
//
// Every operation takes the single mutex for its whole duration, so a get
// racing a set on the same key sees either the old or the new order, never a
// mix. Values are cloned out; callers cannot mutate cached state.
//
// ============================================================================

pub struct OrderCache {
    inner: Mutex<LruCache<String, Order>>,
}

impl OrderCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        tracing::debug!(capacity = capacity.get(), "Creating order cache");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns a copy of the cached order and marks it most recently used.
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        let mut inner = self.inner.lock();
        inner.get(order_uid).cloned()
    }

    /// Inserts or replaces the order, evicting the least recently used entry
    /// when over capacity. Returns the evicted order_uid, if any.
    pub fn set(&self, order: Order) -> Option<String> {
        let key = order.order_uid.clone();
        let evicted = self.inner.lock().put(key, order);

        evicted.map(|(evicted_uid, _)| {
            tracing::debug!(order_uid = %evicted_uid, "Evicted order from cache");
            evicted_uid
        })
    }

    /// Applies `set` to each order in sequence. Returns how many entries were
    /// evicted along the way.
    pub fn load_many<I>(&self, orders: I) -> usize
    where
        I: IntoIterator<Item = Order>,
    {
        orders
            .into_iter()
            .filter_map(|order| self.set(order))
            .count()
    }

    /// Membership check that leaves the recency order alone.
    pub fn contains(&self, order_uid: &str) -> bool {
        self.inner.lock().contains(order_uid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    /// Cached order_uids from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().keys()
    }
}
