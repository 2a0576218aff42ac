//! First-fit kernel heap.
//!
//! Every block starts with an 8-byte header `{ status, size }` followed by
//! the payload, padded so the next header stays 4-byte aligned. Blocks are
//! carved off at `last_alloc` and, once freed, handed out again whole to the
//! first request that fits. There is no splitting and no coalescing.

use core::fmt;
use core::mem::size_of;
use core::ptr::{self, NonNull};

const FREE: u32 = 0;
const USED: u32 = 1;

const ALIGN: usize = 4;

#[repr(C)]
struct Header {
    status: u32,
    size: u32,
}

pub const HEADER_SIZE: usize = size_of::<Header>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// Zero-byte blocks are never carved.
    ZeroSize,
    /// Neither a free block nor the unclaimed tail can hold the request.
    OutOfMemory { requested: usize },
    /// Not a pointer this heap handed out, or already freed.
    InvalidFree { address: usize },
    /// The range given to `init` is empty or inverted.
    BadRange { start: usize, end: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HeapError::ZeroSize => f.write_str("zero-size allocation"),
            HeapError::OutOfMemory { requested } => {
                write!(f, "out of memory ({} bytes requested)", requested)
            }
            HeapError::InvalidFree { address } => write!(f, "invalid free of {:#x}", address),
            HeapError::BadRange { start, end } => {
                write!(f, "bad heap range {:#x}..{:#x}", start, end)
            }
        }
    }
}

/// Byte accounting. `used + free + unclaimed == capacity` between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Headers, payloads and padding of blocks in use.
    pub used: usize,
    /// Footprint of freed blocks waiting for reuse.
    pub free: usize,
    /// Never carved, between `last_alloc` and the end.
    pub unclaimed: usize,
    pub capacity: usize,
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Bytes a block with `size` payload bytes occupies, header included.
const fn footprint(size: usize) -> usize {
    HEADER_SIZE + align_up(size, ALIGN)
}

/// `footprint` for a size nobody has checked yet.
fn checked_footprint(size: usize) -> Option<usize> {
    size.checked_add(HEADER_SIZE + ALIGN - 1)
        .map(|n| n & !(ALIGN - 1))
}

pub struct Heap {
    start: usize,
    end: usize,
    last_alloc: usize,
    used: usize,
    free: usize,
}

impl Heap {
    /// A heap with no memory. Every allocation fails until it is replaced.
    pub const fn empty() -> Heap {
        Heap {
            start: 0,
            end: 0,
            last_alloc: 0,
            used: 0,
            free: 0,
        }
    }

    /// # Safety
    /// `[start, end)` must be memory owned by nobody else for as long as the
    /// heap lives.
    pub unsafe fn new(start: usize, end: usize) -> Result<Heap, HeapError> {
        let aligned = align_up(start, ALIGN);
        if aligned >= end {
            return Err(HeapError::BadRange { start, end });
        }
        Ok(Heap {
            start: aligned,
            end,
            last_alloc: aligned,
            used: 0,
            free: 0,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    fn header(&self, at: usize) -> *mut Header {
        at as *mut Header
    }

    /// Headers from `start` up to `last_alloc`, as (address, status, size).
    /// Every carved size is non-zero, so the walk always advances.
    fn blocks(&self) -> impl Iterator<Item = (usize, u32, usize)> + '_ {
        let mut cur = self.start;
        core::iter::from_fn(move || {
            if cur >= self.last_alloc {
                return None;
            }
            let at = cur;
            let (status, size) = unsafe {
                let header = self.header(at);
                ((*header).status, (*header).size as usize)
            };
            cur += footprint(size);
            Some((at, status, size))
        })
    }

    /// First free block holding at least `size` bytes.
    fn find_free(&self, size: usize) -> Option<usize> {
        self.blocks()
            .find(|&(_, status, block_size)| status == FREE && block_size >= size)
            .map(|(at, _, _)| at)
    }

    /// Allocate `size` zeroed bytes.
    pub fn try_alloc(&mut self, size: usize) -> Result<NonNull<u8>, HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        if let Some(at) = self.find_free(size) {
            let header = self.header(at);
            let block_size = unsafe {
                (*header).status = USED;
                (*header).size as usize
            };
            self.free -= footprint(block_size);
            self.used += footprint(block_size);
            return Ok(self.payload(at, size));
        }

        let needed = checked_footprint(size)
            .filter(|&needed| size <= u32::MAX as usize && needed <= self.end - self.last_alloc)
            .ok_or(HeapError::OutOfMemory { requested: size })?;

        let at = self.last_alloc;
        unsafe {
            self.header(at).write(Header {
                status: USED,
                size: size as u32,
            });
        }
        self.last_alloc += needed;
        self.used += needed;
        Ok(self.payload(at, size))
    }

    fn payload(&self, at: usize, size: usize) -> NonNull<u8> {
        let payload = (at + HEADER_SIZE) as *mut u8;
        unsafe {
            ptr::write_bytes(payload, 0, size);
            NonNull::new_unchecked(payload)
        }
    }

    /// Allocate `size` zeroed bytes. Zero bytes gives a null pointer;
    /// running out of memory panics.
    pub fn alloc(&mut self, size: usize) -> *mut u8 {
        match self.try_alloc(size) {
            Ok(ptr) => ptr.as_ptr(),
            Err(HeapError::ZeroSize) => ptr::null_mut(),
            Err(_) => panic!("out of memory"),
        }
    }

    /// Mark the block holding `ptr` free. Null is ignored.
    pub fn try_free(&mut self, ptr: *mut u8) -> Result<(), HeapError> {
        if ptr.is_null() {
            return Ok(());
        }
        let address = ptr as usize;
        if address < self.start + HEADER_SIZE || address >= self.last_alloc {
            return Err(HeapError::InvalidFree { address });
        }
        // Only a payload that starts right after a real header counts.
        let at = address - HEADER_SIZE;
        let size = match self.blocks().take_while(|&(block, _, _)| block <= at).last() {
            Some((block, USED, size)) if block == at => size,
            _ => return Err(HeapError::InvalidFree { address }),
        };
        unsafe { (*self.header(at)).status = FREE };
        self.used -= footprint(size);
        self.free += footprint(size);
        Ok(())
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            used: self.used,
            free: self.free,
            unclaimed: self.end - self.last_alloc,
            capacity: self.capacity(),
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::boxed::Box;
    use std::vec;

    /// A heap over a leaked host buffer.
    pub fn heap(bytes: usize) -> Heap {
        let buf = Box::leak(vec![0xa5u32; bytes / 4].into_boxed_slice());
        let start = buf.as_ptr() as usize;
        unsafe { Heap::new(start, start + bytes).unwrap() }
    }

    fn assert_balanced(heap: &Heap) {
        let stats = heap.stats();
        assert_eq!(stats.used + stats.free + stats.unclaimed, stats.capacity);
    }

    #[test]
    fn zero_size_is_null() {
        let mut heap = heap(256);
        assert!(heap.alloc(0).is_null());
        assert_eq!(heap.try_alloc(0), Err(HeapError::ZeroSize));
        assert_eq!(heap.stats().used, 0);
    }

    #[test]
    fn zero_size_request_leaves_first_fit_working() {
        let mut heap = heap(256);
        assert!(heap.try_alloc(0).is_err());
        let p = heap.alloc(32);
        heap.try_free(p).unwrap();
        assert_eq!(heap.alloc(32), p);
        assert_eq!(heap.stats().free, 0);
        assert_balanced(&heap);
    }

    #[test]
    fn huge_request_is_out_of_memory() {
        let mut heap = heap(256);
        for size in [usize::MAX, usize::MAX - 2, usize::MAX - HEADER_SIZE, usize::MAX / 2] {
            assert_eq!(
                heap.try_alloc(size),
                Err(HeapError::OutOfMemory { requested: size })
            );
        }
        assert_eq!(heap.stats().unclaimed, 256);
    }

    #[test]
    #[should_panic(expected = "out of memory")]
    fn huge_request_panics() {
        let mut heap = heap(256);
        heap.alloc(usize::MAX - 2);
    }

    #[test]
    fn first_fit_reuses_freed_block() {
        let mut heap = heap(4096);
        let p1 = heap.alloc(100);
        let p2 = heap.alloc(100);
        heap.try_free(p1).unwrap();
        let p3 = heap.alloc(100);
        assert_eq!(p3, p1);
        assert_ne!(p2, p1);
        assert_eq!(heap.stats().used, 2 * footprint(100));
        assert_balanced(&heap);
    }

    #[test]
    fn smaller_request_takes_whole_free_block() {
        let mut heap = heap(4096);
        let p1 = heap.alloc(64);
        heap.alloc(8);
        heap.try_free(p1).unwrap();
        let p3 = heap.alloc(10);
        assert_eq!(p3, p1);
        assert_eq!(heap.stats().free, 0);
        assert_balanced(&heap);
    }

    #[test]
    fn free_of_alloc_restores_used() {
        let mut heap = heap(4096);
        heap.alloc(7);
        let before = heap.stats().used;
        let p = heap.alloc(33);
        heap.try_free(p).unwrap();
        assert_eq!(heap.stats().used, before);
        assert_balanced(&heap);
    }

    #[test]
    fn allocations_are_zeroed_in_range_and_disjoint() {
        let mut heap = heap(4096);
        let sizes = [1usize, 3, 17, 100, 4, 250];
        let mut blocks = std::vec::Vec::new();
        for &n in &sizes {
            let p = heap.alloc(n);
            let addr = p as usize;
            assert!(addr >= heap.start() && addr + n <= heap.end());
            assert_eq!(addr % ALIGN, 0);
            let bytes = unsafe { core::slice::from_raw_parts_mut(p, n) };
            assert!(bytes.iter().all(|&b| b == 0));
            bytes.fill(0xff);
            blocks.push((addr, n));
        }
        for (i, &(a, n)) in blocks.iter().enumerate() {
            for &(b, m) in &blocks[i + 1..] {
                assert!(a + n <= b || b + m <= a);
            }
        }
        assert_balanced(&heap);
    }

    #[test]
    fn reused_block_is_zeroed() {
        let mut heap = heap(512);
        let p = heap.alloc(16);
        unsafe { ptr::write_bytes(p, 0xee, 16) };
        heap.try_free(p).unwrap();
        let q = heap.alloc(16);
        let bytes = unsafe { core::slice::from_raw_parts(q, 16) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut heap = heap(64);
        assert_eq!(
            heap.try_alloc(64),
            Err(HeapError::OutOfMemory { requested: 64 })
        );
        assert!(heap.try_alloc(64 - HEADER_SIZE).is_ok());
        assert_eq!(heap.stats().unclaimed, 0);
        assert_balanced(&heap);
    }

    #[test]
    #[should_panic(expected = "out of memory")]
    fn exhaustion_panics() {
        let mut heap = heap(64);
        heap.alloc(1000);
    }

    #[test]
    fn double_and_foreign_free_are_rejected() {
        let mut heap = heap(256);
        let p = heap.alloc(8);
        heap.try_free(p).unwrap();
        assert!(matches!(heap.try_free(p), Err(HeapError::InvalidFree { .. })));
        let outside = (heap.end() + 16) as *mut u8;
        assert!(matches!(heap.try_free(outside), Err(HeapError::InvalidFree { .. })));
        assert_eq!(heap.try_free(ptr::null_mut()), Ok(()));
        assert_balanced(&heap);
    }

    #[test]
    fn interior_pointer_free_is_rejected() {
        let mut heap = heap(256);
        let p = heap.alloc(16);
        // payload that looks like a used header
        unsafe {
            (p as *mut u32).write(1);
            (p as *mut u32).add(1).write(4);
        }
        let before = heap.stats();
        let inside = unsafe { p.add(HEADER_SIZE) };
        assert_eq!(
            heap.try_free(inside),
            Err(HeapError::InvalidFree { address: inside as usize })
        );
        assert_eq!(heap.stats(), before);
        assert_eq!(unsafe { (p as *const u32).read() }, 1);
        heap.try_free(p).unwrap();
        assert_balanced(&heap);
    }

    #[test]
    fn empty_heap_allocates_nothing() {
        let mut heap = Heap::empty();
        assert!(heap.try_alloc(1).is_err());
        assert!(unsafe { Heap::new(0x2000, 0x1000) }.is_err());
    }
}
