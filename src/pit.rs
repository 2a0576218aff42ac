//! 8253/8254 PIT channel 0: periodic tick on IRQ0, plus the sleep services
//! built on it.
//!
//! The tick counter is written only by the IRQ0 handler and read only by
//! top-level code. It is a single word, so reads need no lock; elapsed time
//! is computed with wrapping arithmetic so the wrap after ~49 days at 1 kHz
//! is harmless.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::interrupts::{self, pic, InterruptFrame};
use crate::io::outb;
use crate::x86;

pub const CH0_DATA: u16 = 0x40;
pub const CH2_DATA: u16 = 0x42;
pub const CMD: u16 = 0x43;

/// PIT input clock (Hz). Divisor = BASE_HZ / desired frequency.
pub const BASE_HZ: u32 = 1_193_182;

/// Channel 0, lo/hi bytes, mode 3 (square wave), binary.
const CMD_CH0_SQUARE: u8 = 0x36;

static TICKS: AtomicU32 = AtomicU32::new(0);
static HZ: AtomicU32 = AtomicU32::new(0);

/// Reload value for a channel producing `hz`, clamped to what 16 bits hold.
pub fn divisor_for(hz: u32) -> u16 {
    (BASE_HZ / hz.max(1)).clamp(1, u16::MAX as u32) as u16
}

/// Program channel 0 at `target_hz` and hook IRQ0. Interrupts must be off.
pub fn init(target_hz: u32) {
    let divisor = divisor_for(target_hz);
    HZ.store(BASE_HZ / divisor as u32, Ordering::Relaxed);
    TICKS.store(0, Ordering::Relaxed);

    interrupts::register_handler(interrupts::irq_vector(pic::IRQ_TIMER), on_tick, core::ptr::null_mut());

    unsafe {
        outb(CMD, CMD_CH0_SQUARE);
        outb(CH0_DATA, divisor as u8);
        outb(CH0_DATA, (divisor >> 8) as u8);
    }
    log!(
        "PIT: requested {} Hz, divisor {}, actual {} Hz",
        target_hz,
        divisor,
        hz()
    );
}

fn on_tick(_frame: &InterruptFrame, _context: *mut ()) {
    // The dispatcher sends the EOI once we return.
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Ticks since `init`.
pub fn ticks() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// Tick rate actually programmed.
pub fn hz() -> u32 {
    HZ.load(Ordering::Relaxed)
}

pub fn uptime_ms() -> u64 {
    match hz() {
        0 => 0,
        hz => ticks() as u64 * 1000 / hz as u64,
    }
}

/// Ticks covering at least `ms` milliseconds at `hz`, rounded up.
pub fn ms_to_ticks(ms: u32, hz: u32) -> u32 {
    ((ms as u64 * hz as u64 + 999) / 1000) as u32
}

/// How many ticks a sleep of `ms` waits for.
///
/// The first tick after `start` is read may be only partly elapsed, so one
/// extra tick is waited for; this keeps every sleep at least `ms` long.
fn sleep_ticks(ms: u32, hz: u32) -> u32 {
    match ms {
        0 => 0,
        ms => ms_to_ticks(ms, hz) + 1,
    }
}

fn elapsed_since(start: u32) -> u32 {
    ticks().wrapping_sub(start)
}

/// Spin on the tick counter for at least `ms` milliseconds.
/// Interrupts must be enabled or this never returns.
pub fn sleep_busy(ms: u32) {
    let start = ticks();
    let wait = sleep_ticks(ms, hz());
    while elapsed_since(start) < wait {
        core::hint::spin_loop();
    }
}

/// Halt between ticks for at least `ms` milliseconds.
///
/// Only callable from top-level code: it enables interrupts. It can
/// overshoot when other handlers run long.
pub fn sleep_interrupt(ms: u32) {
    let start = ticks();
    let wait = sleep_ticks(ms, hz());
    while elapsed_since(start) < wait {
        x86::enable_and_hlt();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn divisor_fits_sixteen_bits() {
        assert_eq!(divisor_for(1000), 1193);
        assert_eq!(divisor_for(100), 11931);
        assert_eq!(divisor_for(18), u16::MAX);
        assert_eq!(divisor_for(0), u16::MAX);
        assert_eq!(divisor_for(BASE_HZ * 2), 1);
    }

    #[test]
    fn ms_round_up_to_whole_ticks() {
        assert_eq!(ms_to_ticks(500, 1000), 500);
        assert_eq!(ms_to_ticks(5, 100), 1);
        assert_eq!(ms_to_ticks(10, 100), 1);
        assert_eq!(ms_to_ticks(11, 100), 2);
        assert_eq!(ms_to_ticks(0, 1000), 0);
    }

    #[test]
    fn sleep_covers_a_partial_first_tick() {
        assert_eq!(sleep_ticks(0, 1000), 0);
        let wait = sleep_ticks(500, 1000);
        // within the 0.98..1.10 window of the nominal 500 ticks
        assert!(wait >= 490 && wait <= 550);
        assert!(wait > ms_to_ticks(500, 1000));
    }

    #[test]
    fn elapsed_survives_counter_wrap() {
        let start = u32::MAX - 2;
        assert_eq!(5u32.wrapping_sub(start), 8);
    }
}
