//! Page-aligned sub-allocator.
//! Hands out whole 4 KiB pages from a small fixed region below the heap.

use core::fmt;
use core::ptr::{self, NonNull};

use crate::config::PAGE_HEAP_SLOTS;

pub const PAGE_SIZE: usize = 4096;

const BITMAP_BYTES: usize = (PAGE_HEAP_SLOTS + 7) / 8;

/// A bitmap is an array of bits, usable as a set.
pub struct Bitmap<const BYTES: usize> {
    data: [u8; BYTES],
}

impl<const BYTES: usize> Bitmap<BYTES> {
    pub const fn new() -> Self {
        Self { data: [0; BYTES] }
    }

    /// Get bit `i`.
    pub fn get(&self, i: usize) -> bool {
        let byte = i / 8;
        let bit = i % 8;
        self.data[byte] & (1 << bit) != 0
    }

    /// Set bit `i`.
    pub fn set(&mut self, i: usize) {
        let byte = i / 8;
        let bit = i % 8;
        self.data[byte] |= 1 << bit;
    }

    /// Unset bit `i`.
    pub fn unset(&mut self, i: usize) {
        let byte = i / 8;
        let bit = i % 8;
        self.data[byte] &= !(1 << bit);
    }

    /// First clear bit below `limit`.
    pub fn first_clear(&self, limit: usize) -> Option<usize> {
        (0..limit).find(|&i| !self.get(i))
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageHeapError {
    /// Every slot is taken.
    Exhausted,
    /// The address is outside the region or not on a slot boundary.
    Foreign { address: usize },
    /// The slot is not allocated.
    NotAllocated { address: usize },
    Misaligned { start: usize },
}

impl fmt::Display for PageHeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PageHeapError::Exhausted => {
                write!(f, "all {} page slots are in use", PAGE_HEAP_SLOTS)
            }
            PageHeapError::Foreign { address } => {
                write!(f, "{:#x} is not a page from the page heap", address)
            }
            PageHeapError::NotAllocated { address } => {
                write!(f, "page {:#x} is not allocated", address)
            }
            PageHeapError::Misaligned { start } => {
                write!(f, "page heap start {:#x} is not page aligned", start)
            }
        }
    }
}

pub struct PageHeap {
    start: usize,
    slots: Bitmap<BITMAP_BYTES>,
}

impl PageHeap {
    pub const fn empty() -> PageHeap {
        PageHeap {
            start: 0,
            slots: Bitmap::new(),
        }
    }

    /// # Safety
    /// `PAGE_HEAP_SLOTS` pages from `start` must be memory owned by nobody
    /// else for as long as the page heap lives.
    pub unsafe fn new(start: usize) -> Result<PageHeap, PageHeapError> {
        if start == 0 || start % PAGE_SIZE != 0 {
            return Err(PageHeapError::Misaligned { start });
        }
        Ok(PageHeap {
            start,
            slots: Bitmap::new(),
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.start + PAGE_HEAP_SLOTS * PAGE_SIZE
    }

    pub fn in_use(&self) -> usize {
        self.slots.count_set()
    }

    /// Claim a zeroed page.
    pub fn alloc_page(&mut self) -> Result<NonNull<u8>, PageHeapError> {
        if self.start == 0 {
            return Err(PageHeapError::Exhausted);
        }
        let slot = self
            .slots
            .first_clear(PAGE_HEAP_SLOTS)
            .ok_or(PageHeapError::Exhausted)?;
        self.slots.set(slot);

        let page = (self.start + slot * PAGE_SIZE) as *mut u8;
        unsafe {
            ptr::write_bytes(page, 0, PAGE_SIZE);
            Ok(NonNull::new_unchecked(page))
        }
    }

    pub fn free_page(&mut self, page: *mut u8) -> Result<(), PageHeapError> {
        let address = page as usize;
        if self.start == 0
            || address < self.start
            || address >= self.end()
            || (address - self.start) % PAGE_SIZE != 0
        {
            return Err(PageHeapError::Foreign { address });
        }
        let slot = (address - self.start) / PAGE_SIZE;
        if !self.slots.get(slot) {
            return Err(PageHeapError::NotAllocated { address });
        }
        self.slots.unset(slot);
        Ok(())
    }
}
