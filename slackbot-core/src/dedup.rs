// ABOUTME: Bounded insertion-ordered set used to remember recently seen event keys
// ABOUTME: Evicts the oldest key first once the configured capacity is reached

use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Default number of event keys remembered by the dispatcher
pub const DEFAULT_CAPACITY: usize = 100;

/// A set that holds at most `maxsize` keys and forgets the oldest one first.
///
/// Re-adding a key that is already present does not move it: position is
/// decided by first insertion only. Not synchronized; wrap it in a lock when
/// it is shared between delivery paths.
#[derive(Debug, Clone)]
pub struct OrderedFixedSizeSet {
    maxsize: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl OrderedFixedSizeSet {
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize,
            order: VecDeque::with_capacity(maxsize),
            members: HashSet::with_capacity(maxsize),
        }
    }

    /// Insert `key` unless it is already present.
    pub fn add(&mut self, key: impl Into<String>) {
        self.insert_if_absent(key);
    }

    /// Insert `key` if it is new, evicting the oldest key when full.
    ///
    /// Returns `true` when the key was not present before the call. With a
    /// capacity of zero nothing is ever retained, but new keys still report
    /// `true`.
    pub fn insert_if_absent(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.members.contains(&key) {
            return false;
        }
        if self.maxsize == 0 {
            return true;
        }

        while self.order.len() >= self.maxsize {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.members.remove(&oldest);
                }
                None => break,
            }
        }

        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.maxsize
    }

    /// Keys from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl Default for OrderedFixedSizeSet {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for OrderedFixedSizeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.order.iter()).finish()
    }
}
