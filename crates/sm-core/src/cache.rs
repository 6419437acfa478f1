//! Bounded FIFO cache
//!
//! Fixed-capacity key/value store evicting in strict insertion order.
//! Entries live in a slab of nodes threaded into a doubly-linked list, with a
//! `HashMap` from key to slot, so `get`, `set` and `delete` are all O(1) and
//! deleting from the middle keeps the order of everything else.
//!
//! Reads and overwrites never move an entry. Only capacity-driven eviction
//! fires the `on_evicted` callback; `delete` and `clear` stay silent.

use std::collections::HashMap;
use std::hash::Hash;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Sentinel for a missing link.
const NIL: usize = usize::MAX;

/// Callback invoked with each entry evicted for capacity.
pub type EvictionHook<K, V> = Box<dyn FnMut(&K, &V) + Send>;

struct Node<K, V> {
    key: K,
    value: V,
    /// Older neighbour
    prev: usize,
    /// Newer neighbour
    next: usize,
}

// =============================================================================
// BoundedCache
// =============================================================================

pub struct BoundedCache<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    map: HashMap<K, usize>,
    /// Oldest entry
    head: usize,
    /// Newest entry
    tail: usize,
    capacity: usize,
    evictions: u64,
    on_evicted: Option<EvictionHook<K, V>>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            map: HashMap::new(),
            head: NIL,
            tail: NIL,
            capacity,
            evictions: 0,
            on_evicted: None,
        }
    }

    pub fn with_on_evicted(mut self, hook: EvictionHook<K, V>) -> Self {
        self.on_evicted = Some(hook);
        self
    }

    pub fn set_on_evicted(&mut self, hook: Option<EvictionHook<K, V>>) {
        self.on_evicted = hook;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted for capacity so far.
    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = *self.map.get(key)?;
        self.node(slot).map(|node| &node.value)
    }

    /// Mutable access to a value. The entry keeps its position.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = *self.map.get(key)?;
        self.slots[slot].as_mut().map(|node| &mut node.value)
    }

    /// Insert or overwrite. A new key at capacity first evicts the oldest
    /// entry and hands it to `on_evicted`.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(&slot) = self.map.get(&key) {
            if let Some(node) = self.slots[slot].as_mut() {
                node.value = value;
            }
            return;
        }

        if self.map.len() >= self.capacity {
            self.evict_oldest();
        }

        let slot = self.alloc(Node {
            key: key.clone(),
            value,
            prev: self.tail,
            next: NIL,
        });
        match self.slots.get_mut(self.tail).and_then(Option::as_mut) {
            Some(newest) => newest.next = slot,
            None => self.head = slot,
        }
        self.tail = slot;
        self.map.insert(key, slot);
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &K) -> bool {
        match self.map.remove(key) {
            Some(slot) => {
                self.unlink(slot);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.map.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cache: self,
            cursor: self.head,
            remaining: self.map.len(),
        }
    }

    /// Values from oldest to newest, mutable in place.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        let mut order = Vec::with_capacity(self.map.len());
        let mut cursor = self.head;
        while let Some(node) = self.node(cursor) {
            order.push(cursor);
            cursor = node.next;
        }
        let mut by_slot: Vec<Option<&mut Node<K, V>>> =
            self.slots.iter_mut().map(Option::as_mut).collect();
        order
            .into_iter()
            .filter_map(move |slot| by_slot[slot].take())
            .map(|node| (&node.key, &mut node.value))
    }

    /// Keep only the entries for which `keep` returns true. Returns the
    /// number of entries removed. Removal is not eviction.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut doomed = Vec::new();
        let mut cursor = self.head;
        while let Some(node) = self.node(cursor) {
            if !keep(&node.key, &node.value) {
                doomed.push(node.key.clone());
            }
            cursor = node.next;
        }
        for key in &doomed {
            self.delete(key);
        }
        doomed.len()
    }

    // =========================================================================
    // Slab plumbing
    // =========================================================================

    #[inline]
    fn node(&self, slot: usize) -> Option<&Node<K, V>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Detach a slot from the list and free it, returning its node.
    fn unlink(&mut self, slot: usize) -> Option<Node<K, V>> {
        let node = self.slots.get_mut(slot)?.take()?;
        match self.slots.get_mut(node.prev).and_then(Option::as_mut) {
            Some(older) => older.next = node.next,
            None => self.head = node.next,
        }
        match self.slots.get_mut(node.next).and_then(Option::as_mut) {
            Some(newer) => newer.prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(slot);
        Some(node)
    }

    fn evict_oldest(&mut self) {
        let Some(node) = self.unlink(self.head) else {
            return;
        };
        self.map.remove(&node.key);
        self.evictions += 1;
        if let Some(hook) = self.on_evicted.as_mut() {
            hook(&node.key, &node.value);
        }
    }
}

impl<K: Eq + Hash + Clone, V> Default for BoundedCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K: std::fmt::Debug, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.map.len())
            .field("capacity", &self.capacity)
            .field("evictions", &self.evictions)
            .finish()
    }
}

/// Iterator over cache entries in insertion order.
pub struct Iter<'a, K, V> {
    cache: &'a BoundedCache<K, V>,
    cursor: usize,
    remaining: usize,
}

impl<'a, K: Eq + Hash + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cache.node(self.cursor)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn keys<V>(cache: &BoundedCache<String, V>) -> Vec<String> {
        cache.iter().map(|(k, _)| k.clone()).collect()
    }

    fn recording(capacity: usize) -> (BoundedCache<String, u32>, Arc<Mutex<Vec<String>>>) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let cache = BoundedCache::new(capacity)
            .with_on_evicted(Box::new(move |k: &String, _: &u32| sink.lock().unwrap().push(k.clone())));
        (cache, evicted)
    }

    #[test]
    fn test_evicts_oldest_and_reports_it() {
        let (mut cache, evicted) = recording(2);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        cache.set("c".into(), 3);

        assert_eq!(keys(&cache), vec!["b", "c"]);
        assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);
        assert!(!cache.contains_key(&"a".to_string()));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let (mut cache, evicted) = recording(5);
        for i in 0..23u32 {
            cache.set(format!("k{i}"), i);
            assert!(cache.len() <= cache.capacity());
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(evicted.lock().unwrap().len(), 23 - 5);
        assert_eq!(keys(&cache), vec!["k18", "k19", "k20", "k21", "k22"]);
    }

    #[test]
    fn test_reads_and_overwrites_do_not_move() {
        let (mut cache, evicted) = recording(2);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        assert_eq!(cache.get(&"a".to_string()), Some(&1));
        cache.set("a".into(), 10);
        *cache.get_mut(&"a".to_string()).unwrap() += 1;
        assert_eq!(keys(&cache), vec!["a", "b"]);
        assert_eq!(cache.get(&"a".to_string()), Some(&11));

        cache.set("c".into(), 3);
        assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_delete_keeps_order_and_is_silent() {
        let (mut cache, evicted) = recording(3);
        for (i, k) in ["a", "b", "c"].into_iter().enumerate() {
            cache.set(k.into(), i as u32);
        }
        assert!(cache.delete(&"b".to_string()));
        assert!(!cache.delete(&"b".to_string()));
        assert_eq!(keys(&cache), vec!["a", "c"]);

        cache.set("d".into(), 3);
        assert_eq!(keys(&cache), vec!["a", "c", "d"]);
        cache.set("e".into(), 4);
        assert_eq!(keys(&cache), vec!["c", "d", "e"]);
        assert_eq!(*evicted.lock().unwrap(), vec!["a".to_string()]);

        assert!(cache.delete(&"e".to_string()));
        assert!(cache.delete(&"c".to_string()));
        assert_eq!(keys(&cache), vec!["d"]);
    }

    #[test]
    fn test_clear_is_silent() {
        let (mut cache, evicted) = recording(2);
        cache.set("a".into(), 1);
        cache.set("b".into(), 2);
        cache.clear();
        assert!(cache.is_empty());
        assert!(evicted.lock().unwrap().is_empty());
        cache.set("c".into(), 3);
        assert_eq!(keys(&cache), vec!["c"]);
    }

    #[test]
    fn test_retain_and_iter_mut() {
        let mut cache = BoundedCache::new(10);
        for i in 0..6u32 {
            cache.set(i, i * 10);
        }
        assert_eq!(cache.retain(|k, _| k % 2 == 0), 3);
        for (_, v) in cache.iter_mut() {
            *v += 1;
        }
        let entries: Vec<(u32, u32)> = cache.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries, vec![(0, 1), (2, 21), (4, 41)]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = BoundedCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.set(1u8, "x");
        cache.set(2u8, "y");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(&"y"));
    }
}
