//! Interrupt Descriptor Table.
//! Every one of the 256 vectors gets a present ring-0 interrupt gate pointing
//! at its own entry stub; what happens next is decided by the dispatcher.

use crate::interrupts::{SegmentSelector, KERNEL_CS};
use bitflags::bitflags;
use core::mem::size_of;

bitflags! {
    struct GateFlags: u8 {
        /// 32-bit interrupt gate: IF is cleared on entry.
        const INTERRUPT_GATE = 0b1110;
        const RING_0 = 0 << 5;
        const RING_3 = 3 << 5;
        const PRESENT = 1 << 7;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct IdtDescriptor {
    offset_15_0: u16,
    segment_selector: u16,
    _zero: u8,
    /// P, DPL, 0, Type
    attributes: GateFlags,
    offset_31_16: u16,
}

impl IdtDescriptor {
    const MISSING: Self = Self {
        offset_15_0: 0,
        segment_selector: 0,
        _zero: 0,
        attributes: GateFlags::empty(),
        offset_31_16: 0,
    };

    fn new(handler: u32, selector: SegmentSelector) -> Self {
        Self {
            offset_15_0: handler as u16,
            offset_31_16: (handler >> 16) as u16,
            segment_selector: selector.bits(),
            _zero: 0,
            attributes: GateFlags::INTERRUPT_GATE | GateFlags::PRESENT | GateFlags::RING_0,
        }
    }

    fn handler(&self) -> u32 {
        (self.offset_31_16 as u32) << 16 | self.offset_15_0 as u32
    }
}

pub const NB_ENTRIES: usize = 256;

#[repr(C, align(8))]
struct Idt([IdtDescriptor; NB_ENTRIES]);

impl Idt {
    const fn new() -> Self {
        Idt([IdtDescriptor::MISSING; NB_ENTRIES])
    }

    /// Point every vector at `stub_base + vector * stub_size`.
    fn fill(&mut self, stub_base: u32, stub_size: u32) {
        for (vector, entry) in self.0.iter_mut().enumerate() {
            *entry = IdtDescriptor::new(stub_base + vector as u32 * stub_size, KERNEL_CS);
        }
    }
}

static mut IDT: Idt = Idt::new();

/// Install a gate for every vector and load the table.
/// Must run after `gdt::load`, with interrupts off.
#[cfg(target_arch = "x86")]
pub fn load() {
    use crate::interrupts::{stubs, DescriptorTableRegister};
    use core::arch::asm;

    unsafe {
        let idt = &mut *core::ptr::addr_of_mut!(IDT);
        idt.fill(stubs::table_base(), stubs::STUB_SIZE);
        trace!("entry 33 {:#x?}", idt.0[33]);

        let register_format = DescriptorTableRegister {
            limit: (size_of::<Idt>() - 1) as u16,
            base: idt.0.as_ptr() as *const u64,
        };
        asm!("lidt [{}]", in(reg) &register_format, options(readonly, nostack, preserves_flags));
    }
    debug!("IDT loaded: {} gates", NB_ENTRIES);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gate_is_eight_bytes() {
        assert_eq!(size_of::<IdtDescriptor>(), 8);
        assert_eq!(size_of::<Idt>() - 1, 2047);
    }

    #[test]
    fn gate_splits_handler_address() {
        let gate = IdtDescriptor::new(0x1234_5678, KERNEL_CS);
        assert_eq!(gate.offset_15_0, 0x5678);
        assert_eq!(gate.offset_31_16, 0x1234);
        assert_eq!(gate.handler(), 0x1234_5678);
        assert_eq!(gate.attributes.bits(), 0x8e);
    }

    #[test]
    fn every_vector_gets_a_kernel_gate() {
        let mut idt = Idt::new();
        idt.fill(0x0010_2000, 16);
        for (vector, gate) in idt.0.iter().enumerate() {
            assert_eq!(gate.handler(), 0x0010_2000 + 16 * vector as u32);
            assert_eq!(gate.segment_selector, KERNEL_CS.bits());
            assert!(gate.attributes.contains(GateFlags::PRESENT));
        }
    }
}
