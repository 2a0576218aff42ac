//! 16550 UART on COM1, used as the developer log sink.

use crate::io::{inb, outb};
use core::fmt::{self, Write};
use lazy_static::lazy_static;
use spin::Mutex;

pub struct Serial {
    base: u16,
}

impl Serial {
    // https://en.wikibooks.org/wiki/Serial_Programming/8250_UART_Programming

    pub const COM1: u16 = 0x3f8;

    /// Interrupt Enable Register
    const IER: u16 = 1;
    /// Fifo Control Register
    const FCR: u16 = 2;
    /// Line Control Register
    const LCR: u16 = 3;
    /// Modem Control Register
    const MCR: u16 = 4;
    /// Line Status Register
    const LSR: u16 = 5;

    /// Transmitter holding register empty.
    const LSR_THRE: u8 = 1 << 5;

    /// Program the port at `base` for 115200 baud, 8N1, FIFO on, no interrupts.
    pub fn new(base: u16) -> Self {
        unsafe {
            outb(base + Serial::IER, 0);
            // DLAB on, divisor 1 = 115200 baud
            outb(base + Serial::LCR, 1 << 7);
            outb(base, 0x1);
            outb(base + 1, 0);
            // DLAB off, 8 bit words, no parity, one stop bit
            outb(base + Serial::LCR, 0x3);
            // FIFO on, clear both queues, 14 byte threshold
            outb(base + Serial::FCR, 0b1100_0111);
            // DTR, RTS, OUT2
            outb(base + Serial::MCR, 0b1011);
        }
        Serial { base }
    }

    pub fn tx(&self, byte: u8) {
        unsafe {
            while inb(self.base + Serial::LSR) & Serial::LSR_THRE == 0 {
                core::hint::spin_loop();
            }
            outb(self.base, byte);
        }
    }
}

impl Write for Serial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.tx(b'\r');
            }
            self.tx(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref COM1: Mutex<Serial> = Mutex::new(Serial::new(Serial::COM1));
}

/// Write to COM1 unless someone already holds it. Used on the panic path,
/// where the holder may be the code that just blew up.
pub fn try_write_fmt(args: fmt::Arguments) -> bool {
    match COM1.try_lock() {
        Some(mut port) => port.write_fmt(args).is_ok(),
        None => false,
    }
}
