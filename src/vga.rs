//! VGA text console.
//!
//! Owns the only mutable alias of the 80x25 framebuffer at 0xB8000. Each cell
//! is `(attribute << 8) | code_point`; the attribute's low nibble is the
//! foreground colour, the high nibble the background. Everyone else goes
//! through [`CONSOLE`] or the `print!` macros.

use core::fmt;

use ::volatile::Volatile;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::io::{inb, outb};

pub const WIDTH: usize = 80;
pub const HEIGHT: usize = 25;
pub const FRAMEBUFFER: usize = 0xb8000;

const TAB_WIDTH: usize = 8;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(fg: Color, bg: Color) -> ColorCode {
        ColorCode((bg as u8) << 4 | (fg as u8))
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct VgaChar {
    pub char: u8,
    pub color_code: ColorCode,
}

pub type Buffer = [[Volatile<VgaChar>; WIDTH]; HEIGHT];

/// Where the blinking hardware cursor is drawn.
pub trait CursorPort {
    fn move_to(&mut self, position: u16);
}

/// The CRTC cursor location registers.
pub struct Crtc;

impl Crtc {
    const INDEX: u16 = 0x3d4;
    const DATA: u16 = 0x3d5;
    const CURSOR_HIGH: u8 = 14;
    const CURSOR_LOW: u8 = 15;

    /// Linear cursor position as the hardware has it.
    pub fn position(&self) -> u16 {
        unsafe {
            outb(Crtc::INDEX, Crtc::CURSOR_HIGH);
            let high = inb(Crtc::DATA) as u16;
            outb(Crtc::INDEX, Crtc::CURSOR_LOW);
            let low = inb(Crtc::DATA) as u16;
            high << 8 | low
        }
    }
}

impl CursorPort for Crtc {
    fn move_to(&mut self, position: u16) {
        unsafe {
            outb(Crtc::INDEX, Crtc::CURSOR_HIGH);
            outb(Crtc::DATA, (position >> 8) as u8);
            outb(Crtc::INDEX, Crtc::CURSOR_LOW);
            outb(Crtc::DATA, position as u8);
        }
    }
}

pub struct Console<C: CursorPort> {
    buf: &'static mut Buffer,
    col: usize,
    row: usize,
    color_code: ColorCode,
    cursor: C,
}

impl<C: CursorPort> Console<C> {
    pub fn new(buf: &'static mut Buffer, cursor: C) -> Self {
        Self {
            buf,
            col: 0,
            row: 0,
            color_code: ColorCode::new(Color::LightGray, Color::Black),
            cursor,
        }
    }

    fn blank(&self) -> VgaChar {
        VgaChar {
            char: b' ',
            color_code: self.color_code,
        }
    }

    fn sync_cursor(&mut self) {
        let position = self.row * WIDTH + self.col;
        self.cursor.move_to(position as u16);
    }

    fn scroll(&mut self) {
        for row in 1..HEIGHT {
            for col in 0..WIDTH {
                let character = self.buf[row][col].read();
                self.buf[row - 1][col].write(character);
            }
        }

        // clear out last row
        let blank = self.blank();
        for col in 0..WIDTH {
            self.buf[HEIGHT - 1][col].write(blank);
        }
    }

    fn new_line(&mut self) {
        self.col = 0;
        if self.row + 1 < HEIGHT {
            self.row += 1;
        } else {
            self.scroll();
        }
    }

    fn put_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            b'\r' => self.col = 0,
            0x08 => {
                if self.col > 0 {
                    self.col -= 1;
                } else if self.row > 0 {
                    self.row -= 1;
                    self.col = WIDTH - 1;
                }
                let blank = self.blank();
                self.buf[self.row][self.col].write(blank);
            }
            b'\t' => {
                self.col = (self.col / TAB_WIDTH + 1) * TAB_WIDTH;
                if self.col >= WIDTH {
                    self.new_line();
                }
            }
            // no bell on the console; the speaker is for applications
            0x07 => {}
            byte => {
                self.buf[self.row][self.col].write(VgaChar {
                    char: byte,
                    color_code: self.color_code,
                });
                self.col += 1;
                if self.col == WIDTH {
                    self.new_line();
                }
            }
        }
    }

    /// Write one code page 437 byte at the cursor, interpreting `\n`, `\r`,
    /// backspace, `\t` and bell.
    pub fn putc(&mut self, byte: u8) {
        self.put_byte(byte);
        self.sync_cursor();
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(byte);
        }
        self.sync_cursor();
    }

    /// Write a cell without moving the cursor. Out-of-range cells are ignored.
    pub fn putc_at(&mut self, x: usize, y: usize, byte: u8, fg: Color, bg: Color) {
        if x < WIDTH && y < HEIGHT {
            self.buf[y][x].write(VgaChar {
                char: byte,
                color_code: ColorCode::new(fg, bg),
            });
        }
    }

    /// Write a string from (x, y) without moving the cursor, clipped at the
    /// right edge.
    pub fn put_str_at(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, byte) in s.bytes().enumerate() {
            self.putc_at(x + i, y, byte, fg, bg);
        }
    }

    pub fn clear(&mut self) {
        let blank = self.blank();
        for row in self.buf.iter_mut() {
            for cell in row.iter_mut() {
                cell.write(blank);
            }
        }
        self.col = 0;
        self.row = 0;
        self.sync_cursor();
    }

    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.color_code = ColorCode::new(fg, bg);
    }

    pub fn color(&self) -> ColorCode {
        self.color_code
    }

    /// Move the cursor, clamped to the screen.
    pub fn set_cursor(&mut self, x: usize, y: usize) {
        self.col = x.min(WIDTH - 1);
        self.row = y.min(HEIGHT - 1);
        self.sync_cursor();
    }

    pub fn get_cursor(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub fn cell(&self, x: usize, y: usize) -> VgaChar {
        self.buf[y][x].read()
    }
}

impl<C: CursorPort> fmt::Write for Console<C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            // Outside ASCII the font is code page 437, not Unicode.
            let byte = if c.is_ascii() { c as u8 } else { 0xfe };
            self.put_byte(byte);
        }
        self.sync_cursor();
        Ok(())
    }
}

lazy_static! {
    pub static ref CONSOLE: Mutex<Console<Crtc>> = Mutex::new(Console::new(
        unsafe { &mut *(FRAMEBUFFER as *mut Buffer) },
        Crtc
    ));
}

/// Blank the screen so early messages start at the top.
pub fn init() {
    let mut console = CONSOLE.lock();
    console.clear();
    debug!("console {}x{} at {:#x}", WIDTH, HEIGHT, FRAMEBUFFER);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    // The console itself never fails.
    let _ = CONSOLE.lock().write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::vga::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($fmt:expr) => ($crate::print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => ($crate::print!(
        concat!($fmt, "\n"), $($arg)*));
}
