//! Lock-free single-producer/single-consumer ring buffer.
//!
//! [`SpscRing`] crosses the realtime/non-realtime thread boundary without
//! locks: one writer thread and one reader thread each advance only their
//! own cursor, publishing with Release and observing with Acquire. Storage
//! is `capacity + 1` slots with one slot always kept free, so full and
//! empty are distinguished structurally rather than with a counter.
//!
//! Writes and reads are all-or-nothing: a request larger than the space
//! currently available fails without touching the buffer. A wrapping
//! transfer runs as at most two contiguous passes.
//!
//! The workspace denies `unsafe`, so cells are [`AtomicU32`] and elements
//! are 32-bit POD values bit-cast through [`RingItem`] — the same SPSC
//! protocol the usual pointer-based rings use, minus the raw pointers.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// 32-bit plain-old-data element storable in a ring cell.
pub trait RingItem: Copy + Default {
    /// Reinterprets the value as raw bits.
    fn to_bits(self) -> u32;
    /// Reinterprets raw bits as a value.
    fn from_bits(bits: u32) -> Self;
}

impl RingItem for f32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self.to_bits()
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        f32::from_bits(bits)
    }
}

impl RingItem for i32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self as u32
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits as i32
    }
}

impl RingItem for u32 {
    #[inline]
    fn to_bits(self) -> u32 {
        self
    }
    #[inline]
    fn from_bits(bits: u32) -> Self {
        bits
    }
}

/// Fixed-capacity lock-free SPSC queue of 32-bit elements.
///
/// Safe for exactly one writer thread and one reader thread operating
/// concurrently. Shape changes ([`resize`](Self::resize),
/// [`reset`](Self::reset)) take `&mut self`, which statically rules out a
/// concurrent reader or writer.
pub struct SpscRing<T: RingItem> {
    cells: Vec<AtomicU32>,
    read: AtomicUsize,
    write: AtomicUsize,
    _marker: PhantomData<T>,
}

impl<T: RingItem> SpscRing<T> {
    /// Creates a ring that can hold up to `capacity` elements.
    ///
    /// Actual storage is `capacity + 1` slots; one stays free.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: (0..capacity + 1).map(|_| AtomicU32::new(0)).collect(),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Maximum number of elements the ring can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len() - 1
    }

    /// Number of elements currently readable.
    ///
    /// Exact on the reader thread; a lower bound anywhere else.
    pub fn available_read(&self) -> usize {
        let w = self.write.load(Ordering::Acquire);
        let r = self.read.load(Ordering::Acquire);
        (w + self.cells.len() - r) % self.cells.len()
    }

    /// Number of elements currently writable.
    ///
    /// Exact on the writer thread; a lower bound anywhere else.
    pub fn available_write(&self) -> usize {
        self.capacity() - self.available_read()
    }

    /// Appends `data` in order. All-or-nothing: returns false and writes
    /// nothing when `data` exceeds the available write space.
    ///
    /// Must only be called from the single writer thread.
    pub fn write(&self, data: &[T]) -> bool {
        let len = self.cells.len();
        let w = self.write.load(Ordering::Relaxed);
        let r = self.read.load(Ordering::Acquire);
        let used = (w + len - r) % len;
        if data.len() > self.capacity() - used {
            return false;
        }

        // First pass up to the end of storage, second from the start.
        let first = data.len().min(len - w);
        for (i, item) in data[..first].iter().enumerate() {
            self.cells[w + i].store(item.to_bits(), Ordering::Relaxed);
        }
        for (i, item) in data[first..].iter().enumerate() {
            self.cells[i].store(item.to_bits(), Ordering::Relaxed);
        }

        self.write.store((w + data.len()) % len, Ordering::Release);
        true
    }

    /// Removes elements into `out` in FIFO order. All-or-nothing: returns
    /// false and reads nothing when `out` exceeds the available data.
    ///
    /// Must only be called from the single reader thread.
    pub fn read(&self, out: &mut [T]) -> bool {
        let len = self.cells.len();
        let r = self.read.load(Ordering::Relaxed);
        let w = self.write.load(Ordering::Acquire);
        let avail = (w + len - r) % len;
        if out.len() > avail {
            return false;
        }

        let count = out.len();
        let first = count.min(len - r);
        for (i, slot) in out[..first].iter_mut().enumerate() {
            *slot = T::from_bits(self.cells[r + i].load(Ordering::Relaxed));
        }
        for (i, slot) in out[first..].iter_mut().enumerate() {
            *slot = T::from_bits(self.cells[i].load(Ordering::Relaxed));
        }

        self.read.store((r + count) % len, Ordering::Release);
        true
    }

    /// Discards all buffered elements.
    ///
    /// Not concurrency-safe; `&mut self` enforces exclusive access.
    pub fn reset(&mut self) {
        self.read.store(0, Ordering::Relaxed);
        self.write.store(0, Ordering::Relaxed);
    }

    /// Changes the capacity, discarding any buffered elements.
    ///
    /// Not concurrency-safe; `&mut self` enforces exclusive access.
    pub fn resize(&mut self, capacity: usize) {
        self.cells = (0..capacity + 1).map(|_| AtomicU32::new(0)).collect();
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_order_preserved() {
        let ring = SpscRing::<i32>::new(100);
        let data: Vec<i32> = (0..100).collect();
        assert!(ring.write(&data));
        assert_eq!(ring.available_read(), 100);
        let mut out = vec![0i32; 100];
        assert!(ring.read(&mut out));
        assert_eq!(out, data);
        assert_eq!(ring.available_read(), 0);
    }

    #[test]
    fn oversized_write_fails_without_partial_write() {
        let ring = SpscRing::<i32>::new(100);
        let data: Vec<i32> = (0..101).collect();
        assert!(!ring.write(&data));
        assert_eq!(ring.available_read(), 0);
        assert_eq!(ring.available_write(), 100);

        // A full write still fits afterwards.
        assert!(ring.write(&data[..100]));
        assert!(!ring.write(&[0]));
    }

    #[test]
    fn oversized_read_fails_without_consuming() {
        let ring = SpscRing::<f32>::new(8);
        assert!(ring.write(&[1.0, 2.0, 3.0]));
        let mut out = [0.0f32; 4];
        assert!(!ring.read(&mut out));
        assert_eq!(ring.available_read(), 3);
        let mut out = [0.0f32; 3];
        assert!(ring.read(&mut out));
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn wrapping_transfer_crosses_the_seam() {
        let ring = SpscRing::<u32>::new(5);
        assert!(ring.write(&[1, 2, 3, 4]));
        let mut out = [0u32; 3];
        assert!(ring.read(&mut out));
        // Cursors now sit near the end; this write wraps.
        assert!(ring.write(&[5, 6, 7, 8]));
        let mut out = [0u32; 5];
        assert!(ring.read(&mut out));
        assert_eq!(out, [4, 5, 6, 7, 8]);
    }

    #[test]
    fn zero_length_requests_always_succeed() {
        let ring = SpscRing::<f32>::new(4);
        assert!(ring.write(&[]));
        assert!(ring.read(&mut []));
    }

    #[test]
    fn resize_discards_content() {
        let mut ring = SpscRing::<i32>::new(4);
        assert!(ring.write(&[1, 2, 3]));
        ring.resize(16);
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.available_read(), 0);
    }

    // Deterministic PRNG so the soak test needs no external crate.
    struct Lcg(u64);
    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % bound
        }
    }

    #[test]
    fn spsc_soak_never_drops_or_reorders() {
        const TOTAL: u32 = 10_000;
        let ring = Arc::new(SpscRing::<u32>::new(64));

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut rng = Lcg(0x5eed);
                let mut next = 0u32;
                while next < TOTAL {
                    let chunk = (1 + rng.next(16)).min((TOTAL - next) as usize);
                    let data: Vec<u32> = (next..next + chunk as u32).collect();
                    if ring.write(&data) {
                        next += chunk as u32;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut rng = Lcg(0xfeed);
        let mut expected = 0u32;
        let mut out = vec![0u32; 32];
        while expected < TOTAL {
            let want = 1 + rng.next(31);
            let want = want.min((TOTAL - expected) as usize);
            if ring.read(&mut out[..want]) {
                for &v in &out[..want] {
                    assert_eq!(v, expected);
                    expected += 1;
                }
            } else {
                std::thread::yield_now();
            }
        }

        producer.join().expect("producer thread");
    }
}
