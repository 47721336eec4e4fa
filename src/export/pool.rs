//! Shared backing-array pool and the pooled growable buffer built on it.
//!
//! Export records are short-lived and statistically similar in shape, so
//! the pool remembers the last capacity a buffer grew to and hands that
//! much out up front. Steady state is one rent and one return per record
//! collection, with no intermediate growth.

use crate::core::error::{Result, TracekitError};
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Capacity hint a fresh pool starts with.
const INITIAL_SIZE_HINT: usize = 64;

/// Free-list slots a pool keeps by default.
pub const DEFAULT_POOL_RETAIN: usize = 32;

/// A shared pool of backing arrays for one element type.
///
/// Buffers are handed out by value and come back through [`give`]. The
/// pool keeps an outstanding-rent count so that returning more buffers
/// than were rented (a double release upstream) is detected instead of
/// silently corrupting the free list.
///
/// [`give`]: ArrayPool::give
pub struct ArrayPool<T> {
    free: ArrayQueue<Vec<T>>,
    hint: AtomicUsize,
    outstanding: AtomicUsize,
}

impl<T> ArrayPool<T> {
    /// Creates a pool retaining up to `retain` free buffers.
    pub fn new(retain: usize) -> Self {
        Self {
            free: ArrayQueue::new(retain.max(1)),
            hint: AtomicUsize::new(INITIAL_SIZE_HINT),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Borrows a buffer sized to the last successful allocation.
    pub fn rent(&self) -> Vec<T> {
        let hint = self.hint.load(Ordering::Relaxed);
        self.rent_at_least(hint)
    }

    /// Borrows a buffer with at least `capacity` free slots.
    pub fn rent_at_least(&self, capacity: usize) -> Vec<T> {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        let want = capacity.max(1);
        match self.free.pop() {
            Some(mut buffer) => {
                if buffer.capacity() < want {
                    buffer.reserve(want);
                }
                buffer
            },
            None => Vec::with_capacity(want),
        }
    }

    /// Returns a buffer to the pool. The buffer is cleared; when the
    /// free list is full it is simply dropped.
    pub fn give(&self, mut buffer: Vec<T>) -> Result<()> {
        let balanced = self
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if !balanced {
            return Err(TracekitError::pool_misuse(
                "buffer returned more times than rented",
            ));
        }

        buffer.clear();
        if self.free.push(buffer).is_err() {
            tracing::trace!("pool free list full, dropping buffer");
        }
        Ok(())
    }

    /// Records a grown capacity as the hint for future rents.
    pub(crate) fn record_hint(&self, capacity: usize) {
        self.hint.store(capacity, Ordering::Relaxed);
    }

    /// Current size hint.
    pub fn size_hint(&self) -> usize {
        self.hint.load(Ordering::Relaxed)
    }

    /// Free buffers currently held.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl<T> Default for ArrayPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_RETAIN)
    }
}

/// A growable sequence over a buffer borrowed from an [`ArrayPool`].
///
/// Growth doubles through the pool: rent a bigger buffer, move the
/// elements, return the old one, and record the new capacity as the
/// pool's hint. Ownership makes a stale handle unrepresentable; the one
/// remaining misuse — releasing twice — is checked and surfaced as
/// [`TracekitError::PoolMisuse`]. Dropping an unreleased list returns
/// its buffer as a backstop.
pub struct PooledList<T> {
    items: Option<Vec<T>>,
    pool: Arc<ArrayPool<T>>,
}

impl<T> PooledList<T> {
    /// Borrows an initial buffer from `pool`.
    pub fn create(pool: &Arc<ArrayPool<T>>) -> Self {
        Self {
            items: Some(pool.rent()),
            pool: Arc::clone(pool),
        }
    }

    #[inline]
    fn buf(&self) -> &Vec<T> {
        self.items.as_ref().expect("pooled list used after release")
    }

    /// Appends an item, growing through the pool when full.
    pub fn push(&mut self, item: T) {
        let buffer = self.items.as_mut().expect("pooled list used after release");
        if buffer.len() == buffer.capacity() {
            let grown_capacity = (buffer.capacity() * 2).max(INITIAL_SIZE_HINT);
            let mut grown = self.pool.rent_at_least(grown_capacity);
            grown.append(buffer);
            let previous = std::mem::replace(buffer, grown);
            if let Err(err) = self.pool.give(previous) {
                tracing::warn!(error = %err, "returning outgrown buffer failed");
            }
            self.pool.record_hint(grown_capacity);
        }
        self.items
            .as_mut()
            .expect("pooled list used after release")
            .push(item);
    }

    /// Number of appended items.
    pub fn len(&self) -> usize {
        self.buf().len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buf().is_empty()
    }

    /// The items in insertion order.
    pub fn as_slice(&self) -> &[T] {
        self.buf()
    }

    /// Mutable view of the items in insertion order.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.items.as_mut().expect("pooled list used after release")
    }

    /// Iterates the items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.buf().iter()
    }

    /// Returns the backing buffer to the pool. Must be called exactly
    /// once; a second call reports [`TracekitError::PoolMisuse`].
    pub fn release(&mut self) -> Result<()> {
        match self.items.take() {
            Some(buffer) => self.pool.give(buffer),
            None => Err(TracekitError::pool_misuse("pooled list released twice")),
        }
    }
}

impl<T> std::ops::Index<usize> for PooledList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.buf()[index]
    }
}

impl<'a, T> IntoIterator for &'a PooledList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> Drop for PooledList<T> {
    fn drop(&mut self) {
        if let Some(buffer) = self.items.take() {
            let _ = self.pool.give(buffer);
        }
    }
}

impl<T> std::fmt::Debug for PooledList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.items {
            Some(buffer) => f
                .debug_struct("PooledList")
                .field("len", &buffer.len())
                .field("capacity", &buffer.capacity())
                .finish(),
            None => f.write_str("PooledList(released)"),
        }
    }
}
