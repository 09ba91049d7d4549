use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;

// ============================================================================
// Arena LRU
// ============================================================================
//
// Entries live in a Vec and link to each other by index. The HashMap maps a
// key to its slot. Slots are never freed: once the arena is full, the tail
// slot is overwritten by the incoming entry, so the Vec never grows past
// capacity.
//
//   head (most recent) <-> ... <-> tail (least recent)
//
// ============================================================================

struct Entry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct LruCache<K, V> {
    entries: Vec<Entry<K, V>>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: NonZeroUsize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.get()),
            index: HashMap::with_capacity(capacity.get()),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Membership check that leaves the recency order alone.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.entries[idx].value)
    }

    /// Insert or replace `key`, marking it most recently used.
    ///
    /// Returns the evicted entry when the insert pushed the cache over
    /// capacity.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            self.entries[idx].value = value;
            self.move_to_front(idx);
            return None;
        }

        if self.entries.len() < self.capacity.get() {
            let idx = self.entries.len();
            self.entries.push(Entry {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.attach_front(idx);
            self.index.insert(key, idx);
            return None;
        }

        // Full: recycle the tail slot for the new entry.
        let idx = self.tail?;
        self.detach(idx);
        let slot = &mut self.entries[idx];
        let old_key = std::mem::replace(&mut slot.key, key.clone());
        let old_value = std::mem::replace(&mut slot.value, value);
        self.index.remove(&old_key);
        self.index.insert(key, idx);
        self.attach_front(idx);

        Some((old_key, old_value))
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.entries[idx].key.clone());
            cursor = self.entries[idx].next;
        }
        keys
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let entry = &self.entries[idx];
            (entry.prev, entry.next)
        };

        match prev {
            Some(p) => self.entries[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.entries[n].prev = prev,
            None => self.tail = prev,
        }

        let entry = &mut self.entries[idx];
        entry.prev = None;
        entry.next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let entry = &mut self.entries[idx];
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(h) = old_head {
            self.entries[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}
