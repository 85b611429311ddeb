use std::collections::HashMap;
use crate::config::EvictionPolicy;
use crate::content::ContentId;
use crate::replacement_policies::{FirstInFirstOut, LeastFrequentlyUsed, LeastRecentlyUsed, ReplacementPolicy};

/// What happened to the cache on an insert
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored in a free slot
    Inserted,
    /// Already resident, treated as a read
    Touched,
    /// Stored in place of the evicted object
    Replaced(ContentId),
    /// The cache has no capacity
    Rejected,
}

/// A generic trait for caches
///
/// The strategy executor only talks to caches through this trait, so eviction orders can be
/// swapped without touching it
pub trait CacheTrait {
    /// Looks up an object, returning true on a cache hit and false otherwise
    ///
    /// On a hit the replacement policy is updated as for a read. A miss changes nothing
    fn lookup(&mut self, content: ContentId) -> bool;

    /// Checks residency without updating the replacement policy
    fn contains(&self, content: ContentId) -> bool;

    /// Stores an object, evicting one victim first if the cache is full
    ///
    /// Inserting a resident object only refreshes it
    fn insert(&mut self, content: ContentId) -> InsertOutcome;

    /// The maximum number of resident objects
    fn capacity(&self) -> usize;

    /// The number of resident objects
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resident objects in eviction order, next victim first
    ///
    /// Under LRU that is least recently used first
    fn resident(&self) -> Vec<ContentId>;

    /// Empties the cache
    fn clear(&mut self);
}

/// A cache of content objects, parameterised by a replacement policy
///
/// Objects live in a fixed set of slots; the index maps each resident object to its slot and the
/// policy only ever deals in slot numbers. Slots are filled in ascending order until the cache is
/// full, after which the policy picks which slot to overwrite
pub struct Cache<R: ReplacementPolicy> {
    capacity: usize,
    slots: Vec<ContentId>,
    index: HashMap<ContentId, usize>,
    replacement_policy: R,
}

impl<R: ReplacementPolicy> Cache<R> {
    pub fn new(capacity: usize, policy: R) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            replacement_policy: policy,
        }
    }
}

impl<R: ReplacementPolicy> CacheTrait for Cache<R> {
    fn lookup(&mut self, content: ContentId) -> bool {
        match self.index.get(&content) {
            Some(slot) => {
                self.replacement_policy.update_on_read(*slot);
                true
            }
            None => false,
        }
    }

    fn contains(&self, content: ContentId) -> bool {
        self.index.contains_key(&content)
    }

    fn insert(&mut self, content: ContentId) -> InsertOutcome {
        if self.capacity == 0 {
            return InsertOutcome::Rejected;
        }
        if self.lookup(content) {
            return InsertOutcome::Touched;
        }
        // Free slot
        if self.slots.len() < self.capacity {
            let slot = self.slots.len();
            self.slots.push(content);
            self.index.insert(content, slot);
            self.replacement_policy.update_on_insert(slot);
            return InsertOutcome::Inserted;
        }
        // Full, replace
        let Some(slot) = self.replacement_policy.get_victim_slot() else {
            debug_assert!(false, "a full cache must always have a victim");
            return InsertOutcome::Rejected;
        };
        let evicted = std::mem::replace(&mut self.slots[slot], content);
        self.index.remove(&evicted);
        self.index.insert(content, slot);
        self.replacement_policy.update_on_insert(slot);
        InsertOutcome::Replaced(evicted)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn resident(&self) -> Vec<ContentId> {
        self.replacement_policy.eviction_order().into_iter().map(|slot| self.slots[slot]).collect()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.replacement_policy.reset();
    }
}

/// Enum for every eviction policy provided by the library
///
/// A cache node is probed once per hop of every request, so it's much faster to explicitly branch
/// on all implementations than to go through a trait object: the compiler can reason about the
/// concrete types and inline the policy
pub enum GenericCache {
    LeastRecentlyUsed(Cache<LeastRecentlyUsed>),
    FirstInFirstOut(Cache<FirstInFirstOut>),
    LeastFrequentlyUsed(Cache<LeastFrequentlyUsed>),
}

impl GenericCache {
    /// Creates an empty cache of the given size using the configured policy
    pub fn with_policy(policy: EvictionPolicy, capacity: usize) -> Self {
        match policy {
            EvictionPolicy::LeastRecentlyUsed => Cache::new(capacity, LeastRecentlyUsed::new(capacity)).into(),
            EvictionPolicy::FirstInFirstOut => Cache::new(capacity, FirstInFirstOut::new(capacity)).into(),
            EvictionPolicy::LeastFrequentlyUsed => Cache::new(capacity, LeastFrequentlyUsed::new(capacity)).into(),
        }
    }
}

impl From<Cache<LeastRecentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<Cache<FirstInFirstOut>> for GenericCache {
    fn from(value: Cache<FirstInFirstOut>) -> Self {
        Self::FirstInFirstOut(value)
    }
}

impl From<Cache<LeastFrequentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastFrequentlyUsed>) -> Self {
        Self::LeastFrequentlyUsed(value)
    }
}

impl CacheTrait for GenericCache {
    fn lookup(&mut self, content: ContentId) -> bool {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.lookup(content),
            GenericCache::FirstInFirstOut(c) => c.lookup(content),
            GenericCache::LeastFrequentlyUsed(c) => c.lookup(content),
        }
    }

    fn contains(&self, content: ContentId) -> bool {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.contains(content),
            GenericCache::FirstInFirstOut(c) => c.contains(content),
            GenericCache::LeastFrequentlyUsed(c) => c.contains(content),
        }
    }

    fn insert(&mut self, content: ContentId) -> InsertOutcome {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.insert(content),
            GenericCache::FirstInFirstOut(c) => c.insert(content),
            GenericCache::LeastFrequentlyUsed(c) => c.insert(content),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.capacity(),
            GenericCache::FirstInFirstOut(c) => c.capacity(),
            GenericCache::LeastFrequentlyUsed(c) => c.capacity(),
        }
    }

    fn len(&self) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.len(),
            GenericCache::FirstInFirstOut(c) => c.len(),
            GenericCache::LeastFrequentlyUsed(c) => c.len(),
        }
    }

    fn resident(&self) -> Vec<ContentId> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.resident(),
            GenericCache::FirstInFirstOut(c) => c.resident(),
            GenericCache::LeastFrequentlyUsed(c) => c.resident(),
        }
    }

    fn clear(&mut self) {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.clear(),
            GenericCache::FirstInFirstOut(c) => c.clear(),
            GenericCache::LeastFrequentlyUsed(c) => c.clear(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resident_lists_next_victim_first() {
        for policy in [EvictionPolicy::LeastRecentlyUsed, EvictionPolicy::FirstInFirstOut, EvictionPolicy::LeastFrequentlyUsed] {
            let mut cache = GenericCache::with_policy(policy, 3);
            for id in [5, 6, 7] {
                cache.insert(id);
            }
            cache.lookup(5);
            cache.lookup(7);
            let victim = cache.resident()[0];
            assert_eq!(cache.insert(8), InsertOutcome::Replaced(victim), "{policy:?}");
        }
    }

    #[test]
    fn lru_cache_semantics() {
        let mut cache = GenericCache::with_policy(EvictionPolicy::LeastRecentlyUsed, 3);
        assert!(!cache.lookup(1));
        assert_eq!(cache.insert(1), InsertOutcome::Inserted);
        assert_eq!(cache.insert(2), InsertOutcome::Inserted);
        assert_eq!(cache.insert(3), InsertOutcome::Inserted);
        assert!(cache.lookup(1));
        assert_eq!(cache.insert(2), InsertOutcome::Touched);
        assert_eq!(cache.resident(), vec![3, 1, 2]);
        assert_eq!(cache.insert(4), InsertOutcome::Replaced(3));
        assert!(!cache.contains(3));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.resident(), vec![1, 2, 4]);
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        for policy in [EvictionPolicy::LeastRecentlyUsed, EvictionPolicy::FirstInFirstOut, EvictionPolicy::LeastFrequentlyUsed] {
            let mut cache = GenericCache::with_policy(policy, 0);
            assert_eq!(cache.insert(7), InsertOutcome::Rejected);
            assert!(!cache.lookup(7));
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn fifo_cache_evicts_oldest_even_if_read() {
        let mut cache = GenericCache::with_policy(EvictionPolicy::FirstInFirstOut, 2);
        cache.insert(10);
        cache.insert(11);
        assert!(cache.lookup(10));
        assert_eq!(cache.insert(12), InsertOutcome::Replaced(10));
        assert_eq!(cache.insert(13), InsertOutcome::Replaced(11));
    }

    #[test]
    fn clear_resets_policy_state() {
        let mut cache = GenericCache::with_policy(EvictionPolicy::LeastFrequentlyUsed, 2);
        cache.insert(1);
        cache.insert(2);
        cache.lookup(1);
        cache.clear();
        assert!(cache.is_empty());
        cache.insert(5);
        cache.insert(6);
        assert_eq!(cache.insert(7), InsertOutcome::Replaced(5));
    }
}
