//! PS/2 keyboard on IRQ1.
//!
//! The IRQ handler reads one scan code, runs it through the decoder and
//! queues the resulting event; a registered callback also sees it, in
//! handler context. Top-level code reads events back with [`getc`] or
//! [`read_event`].

mod decoder;
pub mod layout;
mod ring;

pub use decoder::{Decoder, Key, KeyEvent, Modifiers};
pub use ring::Ring;

use lazy_static::lazy_static;
use spin::Mutex;

use crate::config::KEY_RING_CAPACITY;
use crate::interrupts::{self, pic, InterruptFrame};
use crate::io::inb;
use crate::x86;

const DATA_PORT: u16 = 0x60;
const STATUS_PORT: u16 = 0x64;
/// Status bit 0: a byte is waiting in the output buffer.
const STATUS_OUTPUT_FULL: u8 = 1 << 0;

/// Runs in handler context with interrupts off. Must not block.
pub type Callback = fn(KeyEvent);

static EVENTS: Ring<KeyEvent, KEY_RING_CAPACITY> = Ring::new();

lazy_static! {
    // Only the IRQ handler touches the decoder.
    static ref DECODER: Mutex<Decoder> = Mutex::new(Decoder::new());
    static ref CALLBACK: Mutex<Option<Callback>> = Mutex::new(None);
}

/// Drain whatever the controller buffered before we were listening and hook
/// IRQ1. Interrupts must be off.
pub fn init() {
    let mut stale = 0;
    unsafe {
        while inb(STATUS_PORT) & STATUS_OUTPUT_FULL != 0 {
            inb(DATA_PORT);
            stale += 1;
        }
    }
    interrupts::register_handler(interrupts::irq_vector(pic::IRQ_KEYBOARD), on_irq, core::ptr::null_mut());
    log!("keyboard: layout {}, ring of {}, {} stale bytes drained", layout::NAME, EVENTS.capacity(), stale);
}

fn on_irq(_frame: &InterruptFrame, _context: *mut ()) {
    let scancode = unsafe { inb(DATA_PORT) };
    let Some(event) = DECODER.lock().feed(scancode) else {
        return;
    };
    EVENTS.push(event);
    if let Some(callback) = *CALLBACK.lock() {
        callback(event);
    }
}

/// Have `callback` called for every make event, or stop with `None`.
pub fn set_callback(callback: Option<Callback>) {
    x86::without_interrupts(|| *CALLBACK.lock() = callback);
}

/// Next queued event, if any.
pub fn read_event() -> Option<KeyEvent> {
    EVENTS.pop()
}

/// Next queued character without waiting. Events without a character
/// (arrows, function keys) are consumed and skipped.
pub fn try_getc() -> Option<u8> {
    while let Some(event) = EVENTS.pop() {
        if let Some(byte) = event.ascii() {
            return Some(byte);
        }
    }
    None
}

/// Block until a character arrives, halting between interrupts.
/// Top level only: this enables interrupts.
pub fn getc() -> u8 {
    loop {
        if let Some(byte) = try_getc() {
            return byte;
        }
        x86::enable_and_hlt();
    }
}

/// Events lost because nobody read them fast enough.
pub fn dropped() -> usize {
    EVENTS.dropped()
}

pub fn pending() -> usize {
    EVENTS.len()
}
