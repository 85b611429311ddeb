use std::collections::BTreeSet;

/// A generic trait for implementing new replacement policies. Can be used to parameterise a Cache.
///
/// The cache owns the slots and the content stored in them; a policy only tracks slot indices and
/// decides which one to give up when the cache is full
pub trait ReplacementPolicy {
    /// Updates the policy when a resident object is read
    ///
    /// Not applicable for some policies, a default which does nothing is provided
    ///
    /// # Arguments
    ///
    /// * `slot`: The index of the slot which was read
    ///
    /// returns: ()
    fn update_on_read(&mut self, _slot: usize) {}

    /// Updates the policy after a new object has been written into `slot`
    fn update_on_insert(&mut self, slot: usize);

    /// Used by the cache to pick a slot to overwrite when it is full.
    ///
    /// Implementations should assume that when this method is called, every slot is occupied and
    /// the returned slot will be replaced. Returns `None` only if the policy tracks no slots at all
    fn get_victim_slot(&mut self) -> Option<usize>;

    /// The occupied slots, starting with the next victim
    fn eviction_order(&self) -> Vec<usize>;

    /// Forgets everything, as if the cache had just been created
    fn reset(&mut self);
}

const NIL: usize = usize::MAX;

/// Least Recently Used replacement policy
///
/// Keeps a doubly linked recency list threaded through two index vectors, so reads, inserts and
/// evictions are all O(1). The head is the most recently used slot, the tail the victim
pub struct LeastRecentlyUsed {
    prev: Vec<usize>,
    next: Vec<usize>,
    head: usize,
    tail: usize,
}

impl LeastRecentlyUsed {
    pub fn new(capacity: usize) -> Self {
        Self {
            prev: vec![NIL; capacity],
            next: vec![NIL; capacity],
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.prev[slot], self.next[slot]);
        if prev == NIL {
            self.head = next;
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.prev[next] = prev;
        }
        self.prev[slot] = NIL;
        self.next[slot] = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.next[slot] = self.head;
        self.prev[slot] = NIL;
        if self.head == NIL {
            self.tail = slot;
        } else {
            self.prev[self.head] = slot;
        }
        self.head = slot;
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn update_on_read(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn update_on_insert(&mut self, slot: usize) {
        self.push_front(slot);
    }

    fn get_victim_slot(&mut self) -> Option<usize> {
        if self.tail == NIL {
            return None;
        }
        let victim = self.tail;
        self.unlink(victim);
        Some(victim)
    }

    fn eviction_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut slot = self.tail;
        while slot != NIL {
            order.push(slot);
            slot = self.prev[slot];
        }
        order
    }

    fn reset(&mut self) {
        self.prev.iter_mut().for_each(|p| *p = NIL);
        self.next.iter_mut().for_each(|n| *n = NIL);
        self.head = NIL;
        self.tail = NIL;
    }
}

/// First in, first out
///
/// The cache fills slots in ascending order, so a round robin pointer over the slots always lands
/// on the oldest object. Reads don't change anything
pub struct FirstInFirstOut {
    capacity: usize,
    occupied: usize,
    next_victim: usize,
}

impl FirstInFirstOut {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, occupied: 0, next_victim: 0 }
    }
}

impl ReplacementPolicy for FirstInFirstOut {
    fn update_on_insert(&mut self, _slot: usize) {
        self.occupied = (self.occupied + 1).min(self.capacity);
    }

    fn get_victim_slot(&mut self) -> Option<usize> {
        if self.occupied == 0 {
            return None;
        }
        let victim = self.next_victim;
        self.next_victim = (self.next_victim + 1) % self.capacity;
        Some(victim)
    }

    fn eviction_order(&self) -> Vec<usize> {
        if self.occupied < self.capacity {
            (0..self.occupied).collect()
        } else {
            (0..self.capacity).map(|offset| (self.next_victim + offset) % self.capacity).collect()
        }
    }

    fn reset(&mut self) {
        self.occupied = 0;
        self.next_victim = 0;
    }
}

/// In-cache least frequently used replacement policy
///
/// Counts only accumulate while an object is resident; a new object starts at one. Ties are broken
/// by recency, the least recently used of the least frequently used objects goes first
pub struct LeastFrequentlyUsed {
    usages: Vec<u64>,
    last_used: Vec<u64>,
    // (usages, last used, slot), so the first element is always the victim
    ranking: BTreeSet<(u64, u64, usize)>,
    time: u64,
}

impl LeastFrequentlyUsed {
    pub fn new(capacity: usize) -> Self {
        Self {
            usages: vec![0; capacity],
            last_used: vec![0; capacity],
            ranking: BTreeSet::new(),
            time: 0,
        }
    }

    fn rank(&mut self, slot: usize, usages: u64) {
        self.usages[slot] = usages;
        self.last_used[slot] = self.time;
        self.time += 1;
        self.ranking.insert((usages, self.last_used[slot], slot));
    }
}

impl ReplacementPolicy for LeastFrequentlyUsed {
    fn update_on_read(&mut self, slot: usize) {
        self.ranking.remove(&(self.usages[slot], self.last_used[slot], slot));
        self.rank(slot, self.usages[slot] + 1);
    }

    fn update_on_insert(&mut self, slot: usize) {
        self.rank(slot, 1);
    }

    fn get_victim_slot(&mut self) -> Option<usize> {
        let victim = self.ranking.iter().next().copied()?;
        self.ranking.remove(&victim);
        Some(victim.2)
    }

    fn eviction_order(&self) -> Vec<usize> {
        self.ranking.iter().map(|(_, _, slot)| *slot).collect()
    }

    fn reset(&mut self) {
        self.usages.iter_mut().for_each(|u| *u = 0);
        self.last_used.iter_mut().for_each(|t| *t = 0);
        self.ranking.clear();
        self.time = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lru_evicts_least_recent_slot() {
        let mut lru = LeastRecentlyUsed::new(3);
        for slot in 0..3 {
            lru.update_on_insert(slot);
        }
        lru.update_on_read(0);
        assert_eq!(lru.eviction_order(), vec![1, 2, 0]);
        assert_eq!(lru.get_victim_slot(), Some(1));
        lru.update_on_insert(1);
        assert_eq!(lru.eviction_order(), vec![2, 0, 1]);
        lru.reset();
        assert_eq!(lru.get_victim_slot(), None);
    }

    #[test]
    fn fifo_ignores_reads() {
        let mut fifo = FirstInFirstOut::new(2);
        fifo.update_on_insert(0);
        fifo.update_on_insert(1);
        fifo.update_on_read(0);
        assert_eq!(fifo.get_victim_slot(), Some(0));
        fifo.update_on_insert(0);
        assert_eq!(fifo.eviction_order(), vec![1, 0]);
        assert_eq!(fifo.get_victim_slot(), Some(1));
    }

    #[test]
    fn lfu_breaks_ties_by_recency() {
        let mut lfu = LeastFrequentlyUsed::new(3);
        for slot in 0..3 {
            lfu.update_on_insert(slot);
        }
        lfu.update_on_read(0);
        lfu.update_on_read(0);
        lfu.update_on_read(2);
        // slot 1 has one use, slot 2 two, slot 0 three
        assert_eq!(lfu.eviction_order(), vec![1, 2, 0]);
        assert_eq!(lfu.get_victim_slot(), Some(1));
        lfu.update_on_insert(1);
        // The fresh object has the fewest uses
        assert_eq!(lfu.get_victim_slot(), Some(1));
    }
}
