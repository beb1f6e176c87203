//! Timer queue with lazy deletion.

use hashbrown::HashMap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::hash::Hash;
use std::time::Instant;

#[derive(Debug)]
struct TimerEntry<K> {
    expire: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for TimerEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.expire == other.expire && self.seq == other.seq
    }
}

impl<K> Eq for TimerEntry<K> {}

impl<K> PartialOrd for TimerEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for TimerEntry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expire
            .cmp(&other.expire)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// A min-heap of timers keyed by `K`.
///
/// Removal only forgets the key; the heap entry is discarded when it
/// reaches the top. Entries with equal expiry fire in insertion order.
#[derive(Debug)]
pub struct TimerQueue<K> {
    heap: BinaryHeap<Reverse<TimerEntry<K>>>,
    live: HashMap<K, u64>,
    next_seq: u64,
}

impl<K: Hash + Eq + Clone> TimerQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Returns the number of armed timers.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Arms a timer for `key`, replacing any timer already armed for it.
    pub fn add(&mut self, expire: Instant, key: K) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(key.clone(), seq);
        self.heap.push(Reverse(TimerEntry { expire, seq, key }));
    }

    /// Disarms the timer for `key`. Returns false if none was armed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.live.remove(key).is_some()
    }

    /// Returns the earliest armed expiry.
    pub fn current_expiration(&mut self) -> Option<Instant> {
        self.discard_removed();
        self.heap.peek().map(|Reverse(entry)| entry.expire)
    }

    /// Pops every timer with `expire <= now`, earliest first.
    pub fn get_expired(&mut self, now: Instant) -> Vec<K> {
        let mut expired = Vec::new();
        loop {
            self.discard_removed();
            match self.heap.peek() {
                Some(Reverse(entry)) if entry.expire <= now => {}
                _ => break,
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                self.live.remove(&entry.key);
                expired.push(entry.key);
            }
        }
        expired
    }

    fn discard_removed(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.live.get(&entry.key) == Some(&entry.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<K: Hash + Eq + Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
