//! Wrappers around x86 instructions.
use core::arch::asm;

/// Interrupt flag in EFLAGS.
const EFLAGS_IF: usize = 1 << 9;

/// Paging enable bit in CR0.
pub const CR0_PG: usize = 1 << 31;

#[inline]
pub fn hlt() {
    unsafe {
        asm!("hlt", options(nomem, nostack));
    }
}

/// Mask maskable interrupts.
#[inline]
pub fn cli() {
    unsafe {
        asm!("cli", options(nomem, nostack));
    }
}

/// Unmask maskable interrupts.
#[inline]
pub fn sti() {
    unsafe {
        asm!("sti", options(nomem, nostack));
    }
}

/// Enable interrupts and halt until the next one arrives.
///
/// `sti` only takes effect after the following instruction, so an interrupt
/// cannot slip in between the two and leave us halted with nothing to wake us.
#[inline]
pub fn enable_and_hlt() {
    unsafe {
        asm!("sti; hlt", options(nomem, nostack));
    }
}

/// Stop the CPU for good.
pub fn halt_forever() -> ! {
    loop {
        cli();
        hlt();
    }
}

pub fn interrupts_enabled() -> bool {
    let flags: usize;
    unsafe {
        asm!("pushf", "pop {}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags & EFLAGS_IF != 0
}

/// Run `f` with interrupts masked, restoring the previous state afterwards.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let were_enabled = interrupts_enabled();
    if were_enabled {
        cli();
    }
    let ret = f();
    if were_enabled {
        sti();
    }
    ret
}

#[inline]
pub fn read_cr0() -> usize {
    let value: usize;
    unsafe {
        asm!("mov {}, cr0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// # Safety
/// Changing CR0 can switch paging or protection off under running code.
#[inline]
pub unsafe fn write_cr0(value: usize) {
    asm!("mov cr0, {}", in(reg) value, options(nostack, preserves_flags));
}

/// Faulting linear address of the last page fault.
#[inline]
pub fn read_cr2() -> usize {
    let value: usize;
    unsafe {
        asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

#[inline]
pub fn read_cr3() -> usize {
    let value: usize;
    unsafe {
        asm!("mov {}, cr3", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// # Safety
/// `value` must be the physical address of a valid page directory.
#[inline]
pub unsafe fn write_cr3(value: usize) {
    asm!("mov cr3, {}", in(reg) value, options(nostack, preserves_flags));
}
