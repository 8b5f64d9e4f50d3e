//! Bounded lock-free single-producer / single-consumer ring buffer.
//!
//! The batcher owns one ring per data mode and uses it for bounded
//! backpressure; producer and consumer normally share a thread, but the
//! protocol tolerates one producer and one consumer on different threads.
//!
//! Protocol: the producer acquires the consumer's head, writes the slot,
//! then release-stores the tail; the consumer acquires the producer's tail,
//! reads the slot, then release-stores the head. Head and tail indices are
//! free-running and masked on access; each sits on its own cache line to
//! avoid false sharing.

use crate::ladder::error::LadderError;
use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A bounded SPSC queue with fixed power-of-two capacity.
///
/// At most `capacity - 1` items are resident at once. `len` and `is_empty`
/// are approximate when observed from a third thread.
///
/// # Safety contract
///
/// At any moment at most one thread may call write-side methods
/// (`try_write`, `write_batch`) and at most one thread read-side methods
/// (`try_read`, `read_batch`). `clear` requires that neither side is active.
pub struct SpscQueue<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    tail: CachePadded<AtomicUsize>,
    head: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    /// Create a queue with the given capacity.
    ///
    /// # Errors
    /// Returns [`LadderError::InvalidQueueCapacity`] unless `capacity` is a
    /// power of two and at least 2.
    pub fn with_capacity(capacity: usize) -> Result<Self, LadderError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(LadderError::InvalidQueueCapacity { capacity });
        }

        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buffer,
            mask: capacity - 1,
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Total slot count (one slot is kept free to distinguish full from
    /// empty).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate number of resident items.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    /// Approximate emptiness check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue one item. Returns `false` when the queue is full.
    #[inline]
    pub fn try_write(&self, item: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= self.mask {
            return false;
        }

        unsafe {
            (*self.buffer[tail & self.mask].get()).write(item);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue one item. Returns `None` when the queue is empty.
    #[inline]
    pub fn try_read(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        let item = unsafe { (*self.buffer[head & self.mask].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Enqueue as many items from `items` as fit, front to back, with a
    /// single tail publication. Returns the number enqueued.
    pub fn write_batch(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        let free = self.mask - tail.wrapping_sub(head);
        let count = items.len().min(free);
        if count == 0 {
            return 0;
        }

        for (offset, item) in items[..count].iter().enumerate() {
            unsafe {
                (*self.buffer[tail.wrapping_add(offset) & self.mask].get()).write(*item);
            }
        }
        self.tail.store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    /// Dequeue every resident item into `out`, preserving order, with a
    /// single head publication. Returns the number dequeued.
    pub fn read_batch(&self, out: &mut Vec<T>) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        let count = tail.wrapping_sub(head);
        if count == 0 {
            return 0;
        }

        out.reserve(count);
        for offset in 0..count {
            let item = unsafe {
                (*self.buffer[head.wrapping_add(offset) & self.mask].get()).assume_init_read()
            };
            out.push(item);
        }
        self.head.store(tail, Ordering::Release);
        count
    }

    /// Drop every resident item.
    ///
    /// Not thread-safe: callable only while no producer or consumer is
    /// active on other threads.
    pub fn clear(&self) {
        while self.try_read().is_some() {}
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> std::fmt::Debug for SpscQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
