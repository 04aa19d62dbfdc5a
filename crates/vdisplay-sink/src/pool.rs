//! Reusable frame allocations.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

/// Bounded stack of returned frame allocations.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    reused: AtomicU64,
    allocated: AtomicU64,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// A zeroed buffer of exactly `len` bytes, reusing a returned one if
    /// possible.
    pub fn take(&self, len: usize) -> Vec<u8> {
        let buffer = self.free.lock().pop();

        match buffer {
            Some(mut buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buffer.clear();
                buffer.resize(len, 0);
                buffer
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                vec![0; len]
            }
        }
    }

    /// Return an allocation. Dropped when the pool is already full.
    pub fn give_back(&self, buffer: Vec<u8>) {
        if buffer.capacity() == 0 {
            return;
        }

        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buffer);
        } else {
            trace!("Buffer pool full, dropping allocation");
        }
    }

    /// Allocations waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.free.lock().len()
    }

    /// Buffers handed out from the pool.
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// Buffers that needed a fresh allocation.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_keeps_exact_length() {
        let pool = BufferPool::new(2);
        let mut first = pool.take(64);
        first.fill(9);
        let ptr = first.as_ptr();
        pool.give_back(first);

        let second = pool.take(32);
        assert_eq!(second.len(), 32);
        assert!(second.iter().all(|&b| b == 0));
        assert_eq!(second.as_ptr(), ptr);
        assert_eq!(pool.reused(), 1);
        assert_eq!(pool.allocated(), 1);
    }

    #[test]
    fn test_pool_is_capped() {
        let pool = BufferPool::new(2);
        for _ in 0..4 {
            pool.give_back(vec![0; 8]);
        }
        pool.give_back(Vec::new());
        assert_eq!(pool.pooled(), 2);
    }
}
