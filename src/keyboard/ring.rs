//! Single-producer single-consumer ring for key events.
//!
//! The producer is the keyboard IRQ handler, the consumer is top-level code.
//! Head and tail are free-running word counters; the slot is the counter
//! masked by the power-of-two capacity. On overflow the producer drops the
//! oldest event by advancing the tail itself. The consumer claims a slot with
//! a compare-exchange on the tail, so a value the producer dropped (and may
//! have overwritten) under its feet is discarded and re-read.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct Ring<T: Copy, const N: usize> {
    slots: UnsafeCell<[MaybeUninit<T>; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicUsize,
}

// Exactly one producer and one consumer touch the slots, coordinated by the
// counters.
unsafe impl<T: Copy + Send, const N: usize> Sync for Ring<T, N> {}

impl<T: Copy, const N: usize> Ring<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring capacity must be a power of two");
        N - 1
    };

    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            slots: UnsafeCell::new([MaybeUninit::uninit(); N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        self.head.load(Ordering::Acquire).wrapping_sub(tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events lost to overflow since creation.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Producer side. Never fails: a full ring loses its oldest event.
    pub fn push(&self, value: T) {
        let head = self.head.load(Ordering::Relaxed);
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            if head.wrapping_sub(tail) < N {
                break;
            }
            if self
                .tail
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }

        unsafe {
            let slot = (self.slots.get() as *mut MaybeUninit<T>).add(head & Self::MASK);
            slot.write_volatile(MaybeUninit::new(value));
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<T> {
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            if tail == head {
                return None;
            }

            let value = unsafe {
                let slot = (self.slots.get() as *const MaybeUninit<T>).add(tail & Self::MASK);
                slot.read_volatile()
            };
            if self
                .tail
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(unsafe { value.assume_init() });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_come_out_in_order() {
        let ring: Ring<u8, 8> = Ring::new();
        for byte in b"Hello\n" {
            ring.push(*byte);
        }
        assert_eq!(ring.len(), 6);

        let mut out = [0u8; 6];
        for slot in out.iter_mut() {
            *slot = ring.pop().unwrap();
        }
        assert_eq!(&out, b"Hello\n");
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn overflow_drops_the_oldest() {
        let ring: Ring<u32, 4> = Ring::new();
        for value in 0..6 {
            ring.push(value);
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.dropped(), 2);
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), Some(4));
        assert_eq!(ring.pop(), Some(5));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn counters_wrap_around_the_slots() {
        let ring: Ring<u16, 2> = Ring::new();
        for round in 0..1000u16 {
            ring.push(round);
            assert_eq!(ring.pop(), Some(round));
        }
        assert_eq!(ring.capacity(), 2);
        assert_eq!(ring.dropped(), 0);
    }
}
