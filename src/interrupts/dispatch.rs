//! Vector → handler routing.
//!
//! Every stub lands in [`interrupt_dispatch`], which looks the vector up in
//! the handler table, runs the handler if one is registered and then
//! acknowledges the PIC. Unhandled CPU exceptions are fatal; unhandled
//! vectors above the IRQ range are ignored.

use lazy_static::lazy_static;
use spin::Mutex;

use crate::interrupts::{pic, InterruptFrame, IRQ_BASE};
use crate::x86;

/// A handler receives the saved frame and the context pointer it was
/// registered with. It runs with interrupts off and must not block, print,
/// log or touch the heap.
pub type Handler = fn(&InterruptFrame, *mut ());

#[derive(Clone, Copy)]
struct Entry {
    handler: Handler,
    context: *mut (),
}

pub struct HandlerTable {
    entries: [Option<Entry>; 256],
}

// The context pointers are opaque to us; whoever registers one promises it
// stays valid for handler context.
unsafe impl Send for HandlerTable {}

impl HandlerTable {
    pub const fn new() -> Self {
        Self { entries: [None; 256] }
    }

    pub fn set(&mut self, vector: u8, handler: Handler, context: *mut ()) {
        self.entries[vector as usize] = Some(Entry { handler, context });
    }

    pub fn clear(&mut self, vector: u8) {
        self.entries[vector as usize] = None;
    }

    pub fn reset(&mut self) {
        self.entries = [None; 256];
    }

    fn get(&self, vector: u8) -> Option<Entry> {
        self.entries[vector as usize]
    }

    pub fn is_registered(&self, vector: u8) -> bool {
        self.entries[vector as usize].is_some()
    }
}

lazy_static! {
    static ref HANDLERS: Mutex<HandlerTable> = Mutex::new(HandlerTable::new());
}

/// Forget every registered handler.
pub fn reset() {
    x86::without_interrupts(|| HANDLERS.lock().reset());
}

/// Route `vector` to `handler`, replacing whatever was there.
///
/// The table is locked with interrupts off, so the dispatcher never finds
/// it held.
pub fn register_handler(vector: u8, handler: Handler, context: *mut ()) {
    x86::without_interrupts(|| HANDLERS.lock().set(vector, handler, context));
}

/// Fall back to the default action for `vector`.
pub fn unregister_handler(vector: u8) {
    x86::without_interrupts(|| HANDLERS.lock().clear(vector));
}

const EXCEPTION_NAMES: [&str; 32] = [
    "Divide Error",
    "Debug",
    "Non-Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack-Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 Floating-Point Exception",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating-Point Exception",
    "Virtualization Exception",
    "Control Protection Exception",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Hypervisor Injection Exception",
    "VMM Communication Exception",
    "Security Exception",
    "Reserved",
];

pub fn exception_name(vector: u8) -> Option<&'static str> {
    EXCEPTION_NAMES.get(vector as usize).copied()
}

/// What the dispatcher does with a vector nobody registered for.
#[derive(Debug, PartialEq, Eq)]
enum Fallback {
    Fatal(&'static str),
    Ignore,
}

fn fallback(vector: u8) -> Fallback {
    match exception_name(vector) {
        Some(name) if vector < IRQ_BASE => Fallback::Fatal(name),
        _ => Fallback::Ignore,
    }
}

/// Called by the common stub with a pointer to the frame it built.
pub extern "C" fn interrupt_dispatch(frame: *mut InterruptFrame) {
    let frame = unsafe { &*frame };
    let vector = frame.vector();

    // Copy the entry out so the lock isn't held while the handler runs.
    let entry = HANDLERS.lock().get(vector);
    match entry {
        Some(entry) => (entry.handler)(frame, entry.context),
        None => {
            if let Fallback::Fatal(name) = fallback(vector) {
                crate::panic::exception(frame, name);
            }
        }
    }

    // After the handler, so a slow handler can't be re-entered on its line.
    pic::end_of_interrupt(vector);
}
