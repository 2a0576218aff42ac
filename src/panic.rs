//! The end of the line: panics and fatal CPU exceptions.
//!
//! Both paint the screen through [`PanicWriter`], which pokes the
//! framebuffer directly. It takes no locks and needs no heap, so it still
//! works when the console lock is held or the heap is corrupt.

use core::fmt::{self, Write};
use core::ptr;

use crate::interrupts::InterruptFrame;
use crate::vga::{FRAMEBUFFER, HEIGHT, WIDTH};
use crate::x86;

/// White on red.
const ATTR: u16 = 0x4f;

const PAGE_FAULT: u8 = 14;

pub struct PanicWriter {
    cells: *mut u16,
    col: usize,
    row: usize,
}

impl PanicWriter {
    /// # Safety
    /// `cells` must point at `WIDTH * HEIGHT` writable cells.
    pub unsafe fn new(cells: *mut u16) -> PanicWriter {
        PanicWriter {
            cells,
            col: 0,
            row: 0,
        }
    }

    /// # Safety
    /// Only for the path that never returns; ignores whoever else owns the
    /// framebuffer.
    pub unsafe fn framebuffer() -> PanicWriter {
        PanicWriter::new(FRAMEBUFFER as *mut u16)
    }

    fn cell(&mut self, index: usize, byte: u8) {
        unsafe { ptr::write_volatile(self.cells.add(index), ATTR << 8 | byte as u16) }
    }

    /// Paint the whole screen and put `title` on the top line.
    pub fn banner(&mut self, title: &str) {
        for i in 0..WIDTH * HEIGHT {
            self.cell(i, b' ');
        }
        self.col = 0;
        self.row = 0;
        self.put_bytes(b"*** ");
        self.put_bytes(title.as_bytes());
        self.put_bytes(b" ***\n\n");
    }

    fn new_line(&mut self) {
        self.col = 0;
        // no scrolling; the last line gets overwritten
        if self.row + 1 < HEIGHT {
            self.row += 1;
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.new_line();
                continue;
            }
            self.cell(self.row * WIDTH + self.col, byte);
            self.col += 1;
            if self.col == WIDTH {
                self.new_line();
            }
        }
    }
}

impl Write for PanicWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            let byte = if c.is_ascii() { c as u8 } else { b'?' };
            self.put_bytes(&[byte]);
        }
        Ok(())
    }
}

/// What gets printed for a fatal exception.
struct ExceptionReport<'a> {
    frame: InterruptFrame,
    name: &'a str,
    cr2: Option<usize>,
}

impl fmt::Display for ExceptionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Copies; the frame is packed.
        let InterruptFrame {
            vector,
            error_code,
            eip,
            cs,
            eflags,
            eax,
            ebx,
            ecx,
            edx,
            esi,
            edi,
            ebp,
            ..
        } = self.frame;

        writeln!(f, "{} (vector {}, error {:#x})", self.name, vector, error_code)?;
        writeln!(f, "EIP={:#010x} CS={:#06x} EFLAGS={:#010x}", eip, cs, eflags)?;
        writeln!(f, "EAX={:#010x} EBX={:#010x} ECX={:#010x} EDX={:#010x}", eax, ebx, ecx, edx)?;
        writeln!(f, "ESI={:#010x} EDI={:#010x} EBP={:#010x}", esi, edi, ebp)?;
        if let Some(cr2) = self.cr2 {
            writeln!(f, "CR2={:#010x}", cr2)?;
        }
        Ok(())
    }
}

/// Report an unhandled CPU exception and stop.
pub fn exception(frame: &InterruptFrame, name: &str) -> ! {
    x86::cli();
    let frame = *frame;
    let cr2 = if frame.vector() == PAGE_FAULT {
        Some(x86::read_cr2())
    } else {
        None
    };
    let report = ExceptionReport { frame, name, cr2 };

    let mut screen = unsafe { PanicWriter::framebuffer() };
    screen.banner("CPU EXCEPTION");
    let _ = write!(screen, "{}", report);
    crate::serial::try_write_fmt(format_args!("EXCEPTION: {}", report));
    x86::halt_forever()
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    x86::cli();
    let mut screen = unsafe { PanicWriter::framebuffer() };
    screen.banner("KERNEL PANIC");
    let _ = write!(screen, "{}", info);
    crate::serial::try_write_fmt(format_args!("PANIC: {}\n", info));
    x86::halt_forever()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::boxed::Box;
    use std::string::String;
    use std::vec;

    fn screen() -> (PanicWriter, &'static [u16]) {
        let cells = Box::leak(vec![0u16; WIDTH * HEIGHT].into_boxed_slice());
        let writer = unsafe { PanicWriter::new(cells.as_mut_ptr()) };
        (writer, cells)
    }

    fn line(cells: &[u16], row: usize) -> String {
        cells[row * WIDTH..(row + 1) * WIDTH]
            .iter()
            .map(|&c| match (c & 0xff) as u8 {
                0 => ' ',
                byte => byte as char,
            })
            .collect::<String>()
            .trim_end()
            .into()
    }

    #[test]
    fn banner_paints_every_cell() {
        let (mut w, cells) = screen();
        w.banner("KERNEL PANIC");
        write!(w, "out of memory").unwrap();
        assert!(cells.iter().all(|&c| c >> 8 == ATTR));
        assert_eq!(line(cells, 0), "*** KERNEL PANIC ***");
        assert_eq!(line(cells, 2), "out of memory");
    }

    #[test]
    fn writer_wraps_and_sticks_to_the_last_line() {
        let (mut w, cells) = screen();
        for _ in 0..HEIGHT + 3 {
            write!(w, "x\n").unwrap();
        }
        write!(w, "last").unwrap();
        assert_eq!(line(cells, HEIGHT - 1), "last");
    }

    fn frame(vector: u32, error_code: u32) -> InterruptFrame {
        InterruptFrame {
            ds: 0x10,
            edi: 0,
            esi: 0,
            ebp: 0,
            esp_dummy: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0xcafe,
            vector,
            error_code,
            eip: 0x10_1234,
            cs: 0x08,
            eflags: 0x202,
        }
    }

    #[test]
    fn page_fault_report_includes_cr2() {
        let report = ExceptionReport {
            frame: frame(14, 2),
            name: "Page Fault",
            cr2: Some(0xdead_b000),
        };
        let text = std::format!("{}", report);
        assert!(text.starts_with("Page Fault (vector 14, error 0x2)\n"));
        assert!(text.contains("EIP=0x00101234 CS=0x0008 EFLAGS=0x00000202"));
        assert!(text.contains("EAX=0x0000cafe"));
        assert!(text.ends_with("CR2=0xdeadb000\n"));
    }

    #[test]
    fn other_reports_have_no_cr2() {
        let report = ExceptionReport {
            frame: frame(0, 0),
            name: "Divide Error",
            cr2: None,
        };
        assert!(!std::format!("{}", report).contains("CR2"));
    }
}
