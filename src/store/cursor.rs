use std::sync::atomic::{AtomicI64, Ordering};

use crate::blockchain::BlockNumber;

/// Single-slot monotonic counter holding the last block number the
/// system has claimed to process. Written only by the Tip Watcher;
/// read by the public block-number query and by the Tip Watcher
/// itself. Lock-free: a single writer, many readers.
#[derive(Debug, Default)]
pub struct BlockCursorStore {
    last_claimed: AtomicI64,
}

impl BlockCursorStore {
    pub fn new() -> Self {
        BlockCursorStore {
            last_claimed: AtomicI64::new(BlockNumber::EARLIEST.as_i64()),
        }
    }

    /// Never blocks.
    pub fn get(&self) -> BlockNumber {
        BlockNumber(self.last_claimed.load(Ordering::SeqCst))
    }

    /// Sets the cursor unconditionally. Callers (the Tip Watcher) are
    /// responsible for only ever calling this with a non-decreasing
    /// value; the store itself does not enforce monotonicity, matching
    /// the single-writer contract in spec.md §4.5.
    pub fn set(&self, number: BlockNumber) {
        self.last_claimed.store(number.as_i64(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_earliest() {
        let store = BlockCursorStore::new();
        assert_eq!(store.get(), BlockNumber::EARLIEST);
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = BlockCursorStore::new();
        store.set(BlockNumber(100));
        assert_eq!(store.get(), BlockNumber(100));
    }
}
