//! Multiboot (version 1) boot protocol.
//! https://www.gnu.org/software/grub/manual/multiboot/multiboot.html
//!
//! The loader finds the header in the first 8 KiB of the image, enters
//! `_start` in 32-bit protected mode with paging off, EAX holding
//! `BOOTLOADER_MAGIC` and EBX pointing at a [`MultibootInfo`].

use core::ffi::CStr;

use bitflags::bitflags;

use crate::config::STACK_SIZE;

pub const HEADER_MAGIC: u32 = 0x1bad_b002;
/// What the loader leaves in EAX.
pub const BOOTLOADER_MAGIC: u32 = 0x2bad_b002;

bitflags! {
    /// Requests in the image header.
    pub struct HeaderFlags: u32 {
        /// Load modules on page boundaries.
        const PAGE_ALIGN = 1 << 0;
        /// Fill in `mem_lower` and `mem_upper`.
        const MEMORY_INFO = 1 << 1;
    }
}

bitflags! {
    /// Which fields of the info structure are valid.
    pub struct InfoFlags: u32 {
        const MEMORY = 1 << 0;
        const BOOT_DEVICE = 1 << 1;
        const CMDLINE = 1 << 2;
        const MODULES = 1 << 3;
    }
}

#[repr(C)]
pub struct Header {
    magic: u32,
    flags: u32,
    checksum: u32,
}

impl Header {
    const fn new(flags: HeaderFlags) -> Header {
        let flags = flags.bits();
        Header {
            magic: HEADER_MAGIC,
            flags,
            checksum: 0u32.wrapping_sub(HEADER_MAGIC.wrapping_add(flags)),
        }
    }
}

#[link_section = ".multiboot"]
#[no_mangle]
#[used]
static MULTIBOOT_HEADER: Header = Header::new(HeaderFlags::from_bits_truncate(
    HeaderFlags::PAGE_ALIGN.bits() | HeaderFlags::MEMORY_INFO.bits(),
));

#[repr(C, align(16))]
struct Align<T>(T);

static mut STACK: Align<[u8; STACK_SIZE]> = Align([0; STACK_SIZE]);

// Set up the boot stack and hand the loader's registers to kernel_main as
// its two cdecl arguments.
#[cfg(target_arch = "x86")]
core::arch::global_asm!(
    ".section .text",
    ".global _start",
    "_start:",
    "    cli",
    "    lea esp, [{stack} + {stack_size}]",
    "    xor ebp, ebp",
    "    push ebx",
    "    push eax",
    "    call {main}",
    "2:  cli",
    "    hlt",
    "    jmp 2b",
    stack = sym STACK,
    stack_size = const STACK_SIZE,
    main = sym crate::kernel_main,
);

/// The start of the structure the loader hands over. Later fields are not
/// used.
#[repr(C)]
pub struct MultibootInfo {
    pub flags: u32,
    /// KiB of memory below 1 MiB.
    pub mem_lower: u32,
    /// KiB of memory above 1 MiB, up to the first hole.
    pub mem_upper: u32,
    pub boot_device: u32,
    /// Physical address of a NUL-terminated string.
    pub cmdline: u32,
    pub mods_count: u32,
    pub mods_addr: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub lower_kib: u32,
    pub upper_kib: u32,
}

impl MemoryInfo {
    /// Highest usable address of the contiguous block starting at 1 MiB.
    pub fn upper_end(&self) -> usize {
        0x10_0000 + self.upper_kib as usize * 1024
    }
}

/// What the kernel keeps from the loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootInfo {
    pub memory: Option<MemoryInfo>,
    pub cmdline: &'static str,
}

impl MultibootInfo {
    pub fn flags(&self) -> InfoFlags {
        InfoFlags::from_bits_truncate(self.flags)
    }

    pub fn memory(&self) -> Option<MemoryInfo> {
        self.flags().contains(InfoFlags::MEMORY).then(|| MemoryInfo {
            lower_kib: self.mem_lower,
            upper_kib: self.mem_upper,
        })
    }

    /// # Safety
    /// `cmdline`, when flagged valid, must point at a NUL-terminated string
    /// that stays in place.
    pub unsafe fn cmdline(&self) -> Option<&'static str> {
        if !self.flags().contains(InfoFlags::CMDLINE) || self.cmdline == 0 {
            return None;
        }
        CStr::from_ptr(self.cmdline as usize as *const core::ffi::c_char)
            .to_str()
            .ok()
    }
}

/// Read what the loader passed, or `None` if it wasn't a multiboot loader.
///
/// # Safety
/// When `magic` is right, `info` must be the loader's info pointer.
pub unsafe fn read_info(magic: u32, info: *const MultibootInfo) -> Option<BootInfo> {
    if magic != BOOTLOADER_MAGIC || info.is_null() {
        return None;
    }
    let info = &*info;
    Some(BootInfo {
        memory: info.memory(),
        cmdline: info.cmdline().unwrap_or(""),
    })
}
