//! Port-mapped I/O.
//!
//! None of these can fail. They are not marked `nomem` so the compiler treats
//! each access as a memory barrier and will not reorder framebuffer or ring
//! writes across them.

use core::arch::asm;

/// Read a byte from `port`.
///
/// # Safety
/// Reading some ports has side effects on the device behind them.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let value: u8;
    asm!("in al, dx", in("dx") port, out("al") value, options(nostack, preserves_flags));
    value
}

/// Write a byte to `port`.
///
/// # Safety
/// Writing to an arbitrary port can reprogram hardware.
#[inline]
pub unsafe fn outb(port: u16, value: u8) {
    asm!("out dx, al", in("dx") port, in("al") value, options(nostack, preserves_flags));
}

/// Read a 16-bit word from `port`.
///
/// # Safety
/// See [`inb`].
#[inline]
pub unsafe fn inw(port: u16) -> u16 {
    let value: u16;
    asm!("in ax, dx", in("dx") port, out("ax") value, options(nostack, preserves_flags));
    value
}

/// Write a 16-bit word to `port`.
///
/// # Safety
/// See [`outb`].
#[inline]
pub unsafe fn outw(port: u16, value: u16) {
    asm!("out dx, ax", in("dx") port, in("ax") value, options(nostack, preserves_flags));
}

/// Burn roughly a microsecond by writing to the unused POST port.
/// Old PICs need this between initialisation words.
///
/// # Safety
/// Port 0x80 is only used by firmware for POST codes.
#[inline]
pub unsafe fn io_wait() {
    outb(0x80, 0);
}
