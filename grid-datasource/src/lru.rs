//! FILENAME: grid-datasource/src/lru.rs
//! PURPOSE: Access order for cached blocks.
//! CONTEXT: Every touch stamps a block with a fresh tick. `by_tick` keeps
//! the stamps ordered so the least recently touched block is the first
//! entry; both maps always hold the same set of blocks.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct AccessOrder {
    next_tick: u64,
    by_block: FxHashMap<usize, u64>,
    by_tick: BTreeMap<u64, usize>,
}

impl AccessOrder {
    pub fn new() -> Self {
        AccessOrder::default()
    }

    /// Marks a block as most recently used.
    pub fn touch(&mut self, block: usize) {
        if let Some(old) = self.by_block.insert(block, self.next_tick) {
            self.by_tick.remove(&old);
        }
        self.by_tick.insert(self.next_tick, block);
        self.next_tick += 1;
    }

    pub fn remove(&mut self, block: usize) {
        if let Some(tick) = self.by_block.remove(&block) {
            self.by_tick.remove(&tick);
        }
    }

    /// Blocks from least to most recently touched.
    pub fn oldest_first(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_tick.values().copied()
    }

    pub fn contains(&self, block: usize) -> bool {
        self.by_block.contains_key(&block)
    }

    pub fn len(&self) -> usize {
        self.by_block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_block.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_block.clear();
        self.by_tick.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_moves_to_back() {
        let mut order = AccessOrder::new();
        for block in [0, 1, 2] {
            order.touch(block);
        }
        order.touch(0);
        assert_eq!(order.oldest_first().collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut order = AccessOrder::new();
        order.touch(5);
        order.touch(7);
        order.remove(5);
        assert!(!order.contains(5));
        assert_eq!(order.oldest_first().collect::<Vec<_>>(), vec![7]);
        order.remove(42);
        order.clear();
        assert!(order.is_empty());
    }
}
