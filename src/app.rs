//! The program the kernel runs once it is up: a banner, a start-up tone and
//! a line-echo prompt with a few built-in words.

use crate::keyboard;
use crate::memory;
use crate::pit;
use crate::speaker::{self, notes, Note};
use crate::vga::{Color, CONSOLE, WIDTH};

const PROMPT: &str = "> ";
const TITLE: &str = " corekern ";

const STARTUP: [Note; 4] = [
    Note::new(notes::C5, 90),
    Note::new(notes::E5, 90),
    Note::new(notes::G5, 90),
    Note::new(notes::C5 * 2, 180),
];

/// Input line, sized so prompt and text fit on one screen row.
pub struct LineBuffer {
    bytes: [u8; WIDTH - PROMPT.len() - 1],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> LineBuffer {
        LineBuffer {
            bytes: [0; WIDTH - PROMPT.len() - 1],
            len: 0,
        }
    }

    /// Append a printable byte. False when the line is full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == self.bytes.len() {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    /// Drop the last byte. False when the line is empty.
    pub fn backspace(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        self.len -= 1;
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    Mem,
    Uptime,
    Beep,
    Clear,
    Echo(&'a [u8]),
}

fn parse(line: &[u8]) -> Command<'_> {
    match line.trim_ascii() {
        b"help" => Command::Help,
        b"mem" => Command::Mem,
        b"uptime" => Command::Uptime,
        b"beep" => Command::Beep,
        b"clear" => Command::Clear,
        _ => Command::Echo(line),
    }
}

/// Title in the top right corner, drawn without moving the cursor.
fn status_line() {
    CONSOLE
        .lock()
        .put_str_at(WIDTH - TITLE.len(), 0, TITLE, Color::Black, Color::LightGray);
}

fn run(command: Command) {
    match command {
        Command::Help => println!("words: help mem uptime beep clear; anything else is echoed"),
        Command::Mem => {
            memory::print_layout();
            let stats = memory::stats();
            println!(
                "used {} + free {} + unclaimed {} of {}",
                memory::Size(stats.used),
                memory::Size(stats.free),
                memory::Size(stats.unclaimed),
                memory::Size(stats.capacity)
            );
        }
        Command::Uptime => {
            printf!("%u ms, %u ticks at %u Hz\n", pit::uptime_ms(), pit::ticks(), pit::hz());
        }
        Command::Beep => speaker::tone(notes::A4, 200),
        Command::Clear => {
            CONSOLE.lock().clear();
            status_line();
            println!();
        }
        Command::Echo(line) => {
            if !line.is_empty() {
                CONSOLE.lock().write_bytes(line);
                println!();
            }
        }
    }
}

fn read_line(line: &mut LineBuffer) {
    line.clear();
    loop {
        match keyboard::getc() {
            b'\n' => {
                println!();
                return;
            }
            0x08 => {
                if line.backspace() {
                    CONSOLE.lock().putc(0x08);
                }
            }
            byte if byte >= b' ' => {
                if line.push(byte) {
                    CONSOLE.lock().putc(byte);
                }
            }
            _ => {}
        }
    }
}

pub fn main() -> ! {
    println!("Kernel up");
    status_line();
    printf!(
        "timer %u Hz, %u ticks so far, keyboard layout %s\n",
        pit::hz(),
        pit::ticks(),
        keyboard::layout::NAME
    );
    let stats = memory::stats();
    println!("heap: {} free of {}", memory::Size(stats.unclaimed), memory::Size(stats.capacity));

    // the page heap is there for page-sized buffers; prove it works
    match memory::alloc_page() {
        Ok(page) => {
            printf!("page heap: first page at %p\n", page.as_ptr());
            memory::free_page(page.as_ptr());
        }
        Err(e) => println!("page heap: {}", e),
    }

    speaker::play_song(STARTUP);

    println!("type 'help' for a list of words");
    let mut line = LineBuffer::new();
    loop {
        print!("{}", PROMPT);
        read_line(&mut line);
        run(parse(line.as_bytes()));
        if keyboard::dropped() > 0 {
            log!("{} key events dropped so far", keyboard::dropped());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn line_buffer_edits() {
        let mut line = LineBuffer::new();
        assert!(!line.backspace());
        for &b in b"helo" {
            assert!(line.push(b));
        }
        assert!(line.backspace());
        assert!(line.push(b'l'));
        assert!(line.push(b'o'));
        assert_eq!(line.as_bytes(), b"hello");
        line.clear();
        assert_eq!(line.as_bytes(), b"");
    }

    #[test]
    fn line_buffer_stops_at_the_row_edge() {
        let mut line = LineBuffer::new();
        let room = WIDTH - PROMPT.len() - 1;
        for _ in 0..room {
            assert!(line.push(b'x'));
        }
        assert!(!line.push(b'y'));
        assert_eq!(line.as_bytes().len(), room);
    }

    #[test]
    fn words_are_recognised() {
        assert_eq!(parse(b"help"), Command::Help);
        assert_eq!(parse(b"  mem "), Command::Mem);
        assert_eq!(parse(b"uptime"), Command::Uptime);
        assert_eq!(parse(b"beep"), Command::Beep);
        assert_eq!(parse(b"clear"), Command::Clear);
        assert_eq!(parse(b"Hello"), Command::Echo(b"Hello"));
        assert_eq!(parse(b""), Command::Echo(b""));
    }

    #[test]
    fn startup_tune_is_audible() {
        assert!(STARTUP.iter().all(|n| !n.is_rest()));
    }
}
