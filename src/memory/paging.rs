//! Identity paging.
//!
//! A page directory at a fixed address with page tables packed right after
//! it. Only the first `IDENTITY_MAP_BYTES` are mapped, one-to-one,
//! supervisor read/write. Everything else faults.

use core::slice;

use bitflags::bitflags;

use crate::config::{IDENTITY_MAP_BYTES, PAGE_DIRECTORY_ADDR};
use crate::x86;

pub const ENTRIES: usize = 1024;
pub const PAGE_SIZE: usize = 4096;
/// Bytes covered by one page table.
pub const TABLE_SPAN: usize = ENTRIES * PAGE_SIZE;

bitflags! {
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
    }
}

const ADDRESS_MASK: u32 = !0xfff;

#[derive(Clone, Copy)]
#[repr(C, align(4096))]
pub struct PageTable {
    pub entries: [u32; ENTRIES],
}

impl PageTable {
    pub const fn new() -> PageTable {
        PageTable {
            entries: [0; ENTRIES],
        }
    }

    pub fn flags(&self, index: usize) -> PageFlags {
        PageFlags::from_bits_truncate(self.entries[index])
    }

    pub fn address(&self, index: usize) -> u32 {
        self.entries[index] & ADDRESS_MASK
    }
}

/// Page tables needed to map `bytes` from address zero.
pub const fn tables_needed(bytes: usize) -> usize {
    (bytes + TABLE_SPAN - 1) / TABLE_SPAN
}

/// Fill `directory` and `tables` with an identity map of the first
/// `tables.len() * 4 MiB`. `tables_phys` is where `tables` lives in physical
/// memory.
pub fn build_identity(directory: &mut PageTable, tables: &mut [PageTable], tables_phys: u32) {
    // not present, but writable once someone maps it
    for entry in directory.entries.iter_mut() {
        *entry = PageFlags::WRITABLE.bits();
    }

    let flags = (PageFlags::PRESENT | PageFlags::WRITABLE).bits();
    for (t, table) in tables.iter_mut().enumerate() {
        for (p, entry) in table.entries.iter_mut().enumerate() {
            let frame = (t * TABLE_SPAN + p * PAGE_SIZE) as u32;
            *entry = frame | flags;
        }
        let table_phys = tables_phys + (t * PAGE_SIZE) as u32;
        directory.entries[t] = table_phys | flags;
    }
}

/// Point CR3 at `directory` and turn paging on.
///
/// # Safety
/// `directory` must be a valid page directory that maps the running code,
/// the stack and everything reachable from them.
pub unsafe fn enable(directory: usize) {
    x86::write_cr3(directory);
    x86::write_cr0(x86::read_cr0() | x86::CR0_PG);
}

/// Identity-map low memory and enable paging.
///
/// # Safety
/// Runs once, before anything else uses the memory at
/// `PAGE_DIRECTORY_ADDR`.
pub unsafe fn init() {
    let count = tables_needed(IDENTITY_MAP_BYTES);
    let tables_addr = PAGE_DIRECTORY_ADDR + PAGE_SIZE;
    let directory = &mut *(PAGE_DIRECTORY_ADDR as *mut PageTable);
    let tables = slice::from_raw_parts_mut(tables_addr as *mut PageTable, count);

    build_identity(directory, tables, tables_addr as u32);
    enable(PAGE_DIRECTORY_ADDR);

    log!(
        "paging on: {} MiB identity mapped, directory at {:#x}, {} tables",
        IDENTITY_MAP_BYTES >> 20,
        PAGE_DIRECTORY_ADDR,
        count
    );
}
