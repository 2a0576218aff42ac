//! 8259A PIC pair: remap IRQ 0..15 to vectors 32..47, mask, EOI.

use crate::interrupts::{IRQ_BASE, IRQ_COUNT};
use crate::io::{inb, io_wait, outb};

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

/// ICW1: edge triggered, cascade, ICW4 follows.
const ICW1_INIT: u8 = 0x11;
/// ICW4: 8086 mode.
const ICW4_8086: u8 = 0x01;
const MASTER_VECTOR: u8 = IRQ_BASE;
const SLAVE_VECTOR: u8 = IRQ_BASE + 8;
/// ICW3 for the master: a slave sits on IRQ2.
const MASTER_CASCADE: u8 = 1 << 2;
/// ICW3 for the slave: its cascade identity.
const SLAVE_CASCADE: u8 = 2;
const EOI: u8 = 0x20;

pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;

/// Only the timer and keyboard are unmasked after remapping.
const MASTER_MASK: u8 = !((1 << IRQ_TIMER) | (1 << IRQ_KEYBOARD));
const SLAVE_MASK: u8 = 0xFF;

/// Send the four initialisation words to both PICs and leave only the timer
/// and keyboard lines unmasked. Interrupts must be off.
pub fn remap() {
    unsafe {
        outb(MASTER_CMD, ICW1_INIT);
        io_wait();
        outb(SLAVE_CMD, ICW1_INIT);
        io_wait();
        outb(MASTER_DATA, MASTER_VECTOR);
        io_wait();
        outb(SLAVE_DATA, SLAVE_VECTOR);
        io_wait();
        outb(MASTER_DATA, MASTER_CASCADE);
        io_wait();
        outb(SLAVE_DATA, SLAVE_CASCADE);
        io_wait();
        outb(MASTER_DATA, ICW4_8086);
        io_wait();
        outb(SLAVE_DATA, ICW4_8086);
        io_wait();

        outb(MASTER_DATA, MASTER_MASK);
        outb(SLAVE_DATA, SLAVE_MASK);
    }
    debug!(
        "PIC remapped to {}..{}, masks {:#04x}/{:#04x}",
        MASTER_VECTOR,
        SLAVE_VECTOR + 8,
        MASTER_MASK,
        SLAVE_MASK
    );
}

fn data_port(irq: u8) -> (u16, u8) {
    if irq < 8 {
        (MASTER_DATA, irq)
    } else {
        (SLAVE_DATA, irq - 8)
    }
}

pub fn mask(irq: u8) {
    let (port, bit) = data_port(irq);
    unsafe {
        outb(port, inb(port) | 1 << bit);
    }
}

/// Unmasking a slave line also opens the cascade on the master.
pub fn unmask(irq: u8) {
    let (port, bit) = data_port(irq);
    unsafe {
        outb(port, inb(port) & !(1 << bit));
        if irq >= 8 {
            outb(MASTER_DATA, inb(MASTER_DATA) & !MASTER_CASCADE);
        }
    }
}

/// Which controllers need an EOI for `vector`: (slave, master).
/// Vectors outside the IRQ range need none.
pub fn eoi_targets(vector: u8) -> (bool, bool) {
    if !(IRQ_BASE..IRQ_BASE + IRQ_COUNT).contains(&vector) {
        return (false, false);
    }
    (vector >= SLAVE_VECTOR, true)
}

/// Acknowledge the interrupt on `vector`: the slave first when it came
/// through the slave, then always the master.
pub fn end_of_interrupt(vector: u8) {
    let (slave, master) = eoi_targets(vector);
    unsafe {
        if slave {
            outb(SLAVE_CMD, EOI);
        }
        if master {
            outb(MASTER_CMD, EOI);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_timer_and_keyboard_are_open() {
        assert_eq!(MASTER_MASK, 0b1111_1100);
        assert_eq!(SLAVE_MASK, 0xFF);
    }

    #[test]
    fn eoi_goes_to_the_right_controllers() {
        assert_eq!(eoi_targets(14), (false, false));
        assert_eq!(eoi_targets(32), (false, true));
        assert_eq!(eoi_targets(39), (false, true));
        assert_eq!(eoi_targets(40), (true, true));
        assert_eq!(eoi_targets(47), (true, true));
        assert_eq!(eoi_targets(48), (false, false));
    }

    #[test]
    fn slave_lines_map_to_slave_port() {
        assert_eq!(data_port(1), (MASTER_DATA, 1));
        assert_eq!(data_port(12), (SLAVE_DATA, 4));
    }
}
