//! Global Descriptor Table.
//! Five flat segments spanning 0..4 GiB with 4 KiB granularity: null, kernel
//! code and data, user code and data. Nothing runs in ring 3 yet, but the
//! user entries are cheap and keep the selector layout stable.
//! Because it's a set-once structure, this module is very inflexible.

use crate::interrupts::{KERNEL_CS, KERNEL_DS};
use bitflags::bitflags;
use core::mem::size_of;

bitflags! {
    /// Upper nibble of byte 6.
    struct SegmentUpperFlags: u8 {
        /// Limit is counted in 4 KiB pages
        const GRANULARITY_4K = 1 << 7;
        /// 32-bit default operand size
        const SIZE_32 = 1 << 6;

        const FLAT_32 = Self::GRANULARITY_4K.bits | Self::SIZE_32.bits;
    }
}

bitflags! {
    /// Access byte. See Intel SDM vol. 3, 3.4.5 Segment Descriptors.
    struct SegmentAccess: u8 {
        const PRESENT = 1 << 7;
        /// Descriptor Privilege Level 0 = ring0, kernel
        const DPL_0 = 0 << 5;
        /// Descriptor Privilege Level 3 = ring3, user
        const DPL_3 = 3 << 5;
        /// Code or data segment, as opposed to a system segment
        const USER_DESCRIPTOR = 1 << 4;
        /// Segment is a code segment. If not set, the segment is a data segment
        const EXECUTE = 1 << 3;
        /// For a code segment, means the segment is readable.
        /// For a data segment, means the segment is writable.
        const ACCESSIBLE = 1 << 1;

        const KERNEL_CODE = Self::PRESENT.bits | Self::DPL_0.bits | Self::USER_DESCRIPTOR.bits
         | Self::EXECUTE.bits | Self::ACCESSIBLE.bits;
        const KERNEL_DATA = Self::PRESENT.bits | Self::DPL_0.bits | Self::USER_DESCRIPTOR.bits
         | Self::ACCESSIBLE.bits;
        const USER_CODE = Self::KERNEL_CODE.bits | Self::DPL_3.bits;
        const USER_DATA = Self::KERNEL_DATA.bits | Self::DPL_3.bits;
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct SegmentDescriptor {
    limit_15_0: u16,
    base_15_0: u16,
    base_23_16: u8,
    access: SegmentAccess,
    /// Bits 3:0 are limit 19:16,
    /// bits 7:4 are the flags.
    limit_and_upper_flags: u8,
    base_31_24: u8,
}

impl SegmentDescriptor {
    const NULL: Self = SegmentDescriptor::new(0, 0, SegmentAccess::empty(), SegmentUpperFlags::empty());

    /// Largest 20-bit limit: with 4 KiB granularity the segment covers 4 GiB.
    const MAX_LIMIT: u32 = 0xf_ffff;

    const fn new(base: u32, limit: u32, access: SegmentAccess, flags: SegmentUpperFlags) -> Self {
        Self {
            limit_15_0: limit as u16,
            base_15_0: base as u16,
            base_23_16: (base >> 16) as u8,
            access,
            limit_and_upper_flags: ((limit >> 16) as u8 & 0x0f) | flags.bits,
            base_31_24: (base >> 24) as u8,
        }
    }

    const fn flat(access: SegmentAccess) -> Self {
        Self::new(0, Self::MAX_LIMIT, access, SegmentUpperFlags::FLAT_32)
    }

    fn base(&self) -> u32 {
        (self.base_31_24 as u32) << 24 | (self.base_23_16 as u32) << 16 | self.base_15_0 as u32
    }

    fn limit(&self) -> u32 {
        ((self.limit_and_upper_flags & 0x0f) as u32) << 16 | self.limit_15_0 as u32
    }

    fn as_u64(&self) -> u64 {
        (self.base_31_24 as u64) << 56
            | (self.limit_and_upper_flags as u64) << 48
            | (self.access.bits() as u64) << 40
            | (self.base_23_16 as u64) << 32
            | (self.base_15_0 as u64) << 16
            | self.limit_15_0 as u64
    }
}

const NB_ENTRIES: usize = 5;

type GdtType = [SegmentDescriptor; NB_ENTRIES];

static GDT: GdtType = [
    SegmentDescriptor::NULL,
    SegmentDescriptor::flat(SegmentAccess::KERNEL_CODE),
    SegmentDescriptor::flat(SegmentAccess::KERNEL_DATA),
    SegmentDescriptor::flat(SegmentAccess::USER_CODE),
    SegmentDescriptor::flat(SegmentAccess::USER_DATA),
];

/// Load the table and reload every segment register from it.
///
/// Must run with interrupts off: until CS is reloaded the IDT gates would
/// name a selector that the loader's GDT may not have.
#[cfg(target_arch = "x86")]
pub fn load() {
    use crate::interrupts::DescriptorTableRegister;
    use core::arch::asm;

    let register_format = DescriptorTableRegister {
        limit: (size_of::<GdtType>() - 1) as u16,
        base: GDT.as_ptr() as *const u64,
    };

    unsafe {
        // CS can't be written with a mov: instructions are fetched from CS:IP.
        // A far return pops both, so push our selector and the label and retf.
        asm!(
            "lgdt [{gdt}]",
            "mov ax, {ds}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            "push {cs}",
            "lea {ip}, [2f]",
            "push {ip}",
            "retf",
            "2:",
            gdt = in(reg) &register_format,
            ds = const KERNEL_DS.bits(),
            cs = const KERNEL_CS.bits(),
            ip = lateout(reg) _,
            out("ax") _,
            options(readonly, preserves_flags)
        );
    }
    debug!("GDT loaded: {} entries, CS={:#x} DS={:#x}", NB_ENTRIES, KERNEL_CS.bits(), KERNEL_DS.bits());
}
