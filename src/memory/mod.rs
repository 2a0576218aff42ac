//! Kernel memory: the heap, the page heap and identity paging.
//!
//! Both heaps are top-level services. Interrupt handlers must not allocate
//! or free.

pub mod heap;
pub mod pages;
pub mod paging;

use core::fmt;
use core::ptr::NonNull;

use lazy_static::lazy_static;
use spin::Mutex;

pub use heap::{Heap, HeapError, HeapStats};
pub use pages::{PageHeap, PageHeapError, PAGE_SIZE};

use crate::config::{HEAP_END, HEAP_GUARD, PAGE_HEAP_END, PAGE_HEAP_SLOTS};

lazy_static! {
    static ref HEAP: Mutex<Heap> = Mutex::new(Heap::empty());
    static ref PAGES: Mutex<PageHeap> = Mutex::new(PageHeap::empty());
}

/// Set up the heap from `kernel_end` plus a guard gap up to `HEAP_END`, and
/// the page heap from `HEAP_END` to `PAGE_HEAP_END`.
pub fn init(kernel_end: usize) -> Result<(), HeapError> {
    let start = kernel_end + HEAP_GUARD;
    let heap = unsafe { Heap::new(start, HEAP_END)? };
    debug_assert_eq!(PAGE_HEAP_END - HEAP_END, PAGE_HEAP_SLOTS * PAGE_SIZE);
    let pages = unsafe { PageHeap::new(HEAP_END) }.map_err(|_| HeapError::BadRange {
        start: HEAP_END,
        end: PAGE_HEAP_END,
    })?;

    log!(
        "heap {:#x}..{:#x} ({}), page heap {:#x}..{:#x}",
        heap.start(),
        heap.end(),
        Size(heap.capacity()),
        pages.start(),
        pages.end()
    );
    *HEAP.lock() = heap;
    *PAGES.lock() = pages;
    Ok(())
}

/// Allocate `size` zeroed bytes. Returns null for zero bytes and panics when
/// the heap is exhausted.
pub fn malloc(size: usize) -> *mut u8 {
    HEAP.lock().alloc(size)
}

pub fn try_malloc(size: usize) -> Result<NonNull<u8>, HeapError> {
    HEAP.lock().try_alloc(size)
}

/// Release a block from `malloc`. Null is ignored; pointers the heap did not
/// hand out are logged and ignored.
pub fn free(ptr: *mut u8) {
    if let Err(e) = HEAP.lock().try_free(ptr) {
        warn!("free: {}", e);
    }
}

pub fn stats() -> HeapStats {
    HEAP.lock().stats()
}

/// Claim a zeroed, page-aligned 4 KiB page.
pub fn alloc_page() -> Result<NonNull<u8>, PageHeapError> {
    let page = PAGES.lock().alloc_page()?;
    trace!("alloc_page: {:#x}", page.as_ptr() as usize);
    Ok(page)
}

/// Give a page back. Foreign or unallocated pages are logged and ignored.
pub fn free_page(page: *mut u8) {
    if let Err(e) = PAGES.lock().free_page(page) {
        warn!("free_page: {}", e);
    }
}

/// Byte count printed as B, KiB or MiB with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub usize);

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: usize = 1024;
        const MIB: usize = 1024 * 1024;
        let bytes = self.0;
        if bytes < KIB {
            write!(f, "{} B", bytes)
        } else if bytes < MIB {
            write!(f, "{}.{} KiB", bytes / KIB, (bytes % KIB) * 10 / KIB)
        } else {
            write!(f, "{}.{} MiB", bytes / MIB, (bytes % MIB) * 10 / MIB)
        }
    }
}

fn write_layout(out: &mut impl fmt::Write, heap: &Heap, pages: &PageHeap) -> fmt::Result {
    let stats = heap.stats();
    writeln!(out, "Memory layout")?;
    writeln!(
        out,
        "  heap       {:#010x}..{:#010x} ({})",
        heap.start(),
        heap.end(),
        Size(stats.capacity)
    )?;
    writeln!(out, "  used       {}", Size(stats.used))?;
    writeln!(out, "  free list  {}", Size(stats.free))?;
    writeln!(out, "  unclaimed  {}", Size(stats.unclaimed))?;
    writeln!(
        out,
        "  pages      {:#010x}..{:#010x} ({}/{} in use)",
        pages.start(),
        pages.end(),
        pages.in_use(),
        PAGE_HEAP_SLOTS
    )
}

/// Print the heap ranges and usage on the console.
pub fn print_layout() {
    let heap = HEAP.lock();
    let pages = PAGES.lock();
    let mut console = crate::vga::CONSOLE.lock();
    // The console never fails.
    let _ = write_layout(&mut *console, &heap, &pages);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::string::String;

    #[test]
    fn sizes_pick_a_unit() {
        assert_eq!(std::format!("{}", Size(0)), "0 B");
        assert_eq!(std::format!("{}", Size(1023)), "1023 B");
        assert_eq!(std::format!("{}", Size(1536)), "1.5 KiB");
        assert_eq!(std::format!("{}", Size(3 * 1024 * 1024 + 900 * 1024)), "3.8 MiB");
    }

    #[test]
    fn layout_report() {
        let mut heap = heap::test::heap(2048);
        heap.alloc(100);
        let pages = PageHeap::empty();
        let mut out = String::new();
        write_layout(&mut out, &heap, &pages).unwrap();
        assert!(out.starts_with("Memory layout\n"));
        assert!(out.contains("(2.0 KiB)"));
        assert!(out.contains("used       108 B"));
        assert!(out.contains("unclaimed  1.8 KiB"));
        assert!(out.contains("(0/32 in use)"));
    }

    #[test]
    fn layout_constants_leave_room() {
        assert!(HEAP_END < PAGE_HEAP_END);
        assert_eq!(PAGE_HEAP_END - HEAP_END, PAGE_HEAP_SLOTS * PAGE_SIZE);
        assert_eq!(HEAP_END % PAGE_SIZE, 0);
    }
}
