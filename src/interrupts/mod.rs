//! Manage x86 interrupts: descriptor tables, the 8259 PICs, the per-vector
//! entry stubs and the dispatcher that routes vectors to registered handlers.
//!
//! The multiboot loader leaves us in protected mode with a flat code selector
//! of its own choosing; `gdt::load` replaces it with ours.

pub mod dispatch;
mod frame;
pub mod gdt;
pub mod idt;
pub mod pic;
#[cfg(target_arch = "x86")]
mod stubs;

pub use dispatch::{register_handler, unregister_handler, Handler};
pub use frame::InterruptFrame;

/// Format for use by LIDT and LGDT
#[repr(C, packed(2))]
struct DescriptorTableRegister {
    /// Size of the DT in bytes, minus one.
    pub limit: u16,
    // Base address of the DT.
    pub base: *const u64,
}

#[derive(Debug, Clone, Copy)]
pub enum Ring {
    Ring0 = 0,
    Ring3 = 3,
}

bitflags::bitflags! {
    /// An index to a segment descriptor. The RPL indicates which privilege
    /// to use with this segment, but it cannot be higher than the RPL
    /// specified in the segment descriptor.
    #[repr(transparent)]
    pub struct SegmentSelector: u16 {
        const RPL_0 = 0;
        const RPL_3 = 3;
        const TI_GDT = 0 << 2;
        const TI_LDT = 1 << 2;
    }
}

impl SegmentSelector {
    const fn new(index: u16, rpl: Ring) -> Self {
        Self {
            bits: index << 3 | (rpl as u16),
        }
    }

    /// Index of the descriptor this selector points at.
    pub const fn index(self) -> usize {
        (self.bits >> 3) as usize
    }
}

pub const KERNEL_CS: SegmentSelector = SegmentSelector::new(1, Ring::Ring0);
pub const KERNEL_DS: SegmentSelector = SegmentSelector::new(2, Ring::Ring0);
pub const USER_CS: SegmentSelector = SegmentSelector::new(3, Ring::Ring3);
pub const USER_DS: SegmentSelector = SegmentSelector::new(4, Ring::Ring3);

/// First vector the PICs deliver on after remapping.
pub const IRQ_BASE: u8 = 32;
/// Vectors 32..48 are hardware IRQs.
pub const IRQ_COUNT: u8 = 16;

/// Vector for a legacy IRQ line.
pub const fn irq_vector(irq: u8) -> u8 {
    IRQ_BASE + irq
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn selectors_index_the_flat_table() {
        assert_eq!(KERNEL_CS.bits(), 0x08);
        assert_eq!(KERNEL_DS.bits(), 0x10);
        assert_eq!(USER_CS.bits(), 0x1b);
        assert_eq!(USER_DS.bits(), 0x23);
        assert_eq!(USER_DS.index(), 4);
    }

    #[test]
    fn irq_lines_follow_exceptions() {
        assert_eq!(irq_vector(0), 32);
        assert_eq!(irq_vector(1), 33);
        assert_eq!(irq_vector(15), 47);
    }
}
