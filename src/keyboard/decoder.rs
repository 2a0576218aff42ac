//! Scan-code set 1 decoder.
//!
//! Bit 7 of a code separates make (0) from break (1). 0xE0 announces one
//! extended code; 0xE1 starts the six-byte Pause sequence, which is skipped.
//! Shift is tracked on make and break, caps lock toggles on break.

use bitflags::bitflags;

use super::layout;

const EXTENDED_PREFIX: u8 = 0xE0;
const PAUSE_PREFIX: u8 = 0xE1;
/// Bytes following 0xE1 in the Pause sequence.
const PAUSE_TAIL: u8 = 5;
const BREAK_BIT: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2A;
const RIGHT_SHIFT: u8 = 0x36;
const CTRL: u8 = 0x1D;
const ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3A;

bitflags! {
    pub struct Modifiers: u8 {
        const LEFT_SHIFT = 1 << 0;
        const RIGHT_SHIFT = 1 << 1;
        const LEFT_CTRL = 1 << 2;
        const RIGHT_CTRL = 1 << 3;
        const LEFT_ALT = 1 << 4;
        const RIGHT_ALT = 1 << 5;
        const CAPS_LOCK = 1 << 6;
    }
}

impl Modifiers {
    pub fn shift(self) -> bool {
        self.intersects(Modifiers::LEFT_SHIFT | Modifiers::RIGHT_SHIFT)
    }

    pub fn ctrl(self) -> bool {
        self.intersects(Modifiers::LEFT_CTRL | Modifiers::RIGHT_CTRL)
    }

    pub fn alt(self) -> bool {
        self.intersects(Modifiers::LEFT_ALT | Modifiers::RIGHT_ALT)
    }

    pub fn caps_lock(self) -> bool {
        self.contains(Modifiers::CAPS_LOCK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A key with a character, already adjusted for shift and caps lock.
    Char(u8),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// F1..F12
    Function(u8),
}

/// One make event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn ascii(&self) -> Option<u8> {
        match self.key {
            Key::Char(byte) => Some(byte),
            _ => None,
        }
    }
}

pub struct Decoder {
    modifiers: Modifiers,
    extended: bool,
    pause_skip: u8,
}

impl Decoder {
    pub const fn new() -> Self {
        Self {
            modifiers: Modifiers::empty(),
            extended: false,
            pause_skip: 0,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Feed one byte from the controller; returns an event for makes that
    /// produce one.
    pub fn feed(&mut self, scancode: u8) -> Option<KeyEvent> {
        if self.pause_skip > 0 {
            self.pause_skip -= 1;
            return None;
        }
        match scancode {
            EXTENDED_PREFIX => {
                self.extended = true;
                return None;
            }
            PAUSE_PREFIX => {
                self.pause_skip = PAUSE_TAIL;
                return None;
            }
            _ => {}
        }

        let released = scancode & BREAK_BIT != 0;
        let code = scancode & !BREAK_BIT;

        if core::mem::take(&mut self.extended) {
            return self.extended_key(code, released);
        }

        match code {
            LEFT_SHIFT => self.modifiers.set(Modifiers::LEFT_SHIFT, !released),
            RIGHT_SHIFT => self.modifiers.set(Modifiers::RIGHT_SHIFT, !released),
            CTRL => self.modifiers.set(Modifiers::LEFT_CTRL, !released),
            ALT => self.modifiers.set(Modifiers::LEFT_ALT, !released),
            CAPS_LOCK => {
                if released {
                    self.modifiers.toggle(Modifiers::CAPS_LOCK);
                }
            }
            _ if released => {}
            0x3B..=0x44 => return self.event(Key::Function(code - 0x3B + 1)),
            0x57 => return self.event(Key::Function(11)),
            0x58 => return self.event(Key::Function(12)),
            _ => return self.char_key(code),
        }
        None
    }

    fn extended_key(&mut self, code: u8, released: bool) -> Option<KeyEvent> {
        let key = match code {
            CTRL => {
                self.modifiers.set(Modifiers::RIGHT_CTRL, !released);
                return None;
            }
            ALT => {
                self.modifiers.set(Modifiers::RIGHT_ALT, !released);
                return None;
            }
            _ if released => return None,
            0x48 => Key::Up,
            0x50 => Key::Down,
            0x4B => Key::Left,
            0x4D => Key::Right,
            0x47 => Key::Home,
            0x4F => Key::End,
            0x49 => Key::PageUp,
            0x51 => Key::PageDown,
            0x52 => Key::Insert,
            0x53 => Key::Delete,
            // keypad enter and slash
            0x1C => Key::Char(b'\n'),
            0x35 => Key::Char(b'/'),
            // fake shifts around Print Screen and friends
            _ => return None,
        };
        self.event(key)
    }

    fn char_key(&self, code: u8) -> Option<KeyEvent> {
        let shift = self.modifiers.shift();
        let upper = if layout::is_letter(code) {
            shift ^ self.modifiers.caps_lock()
        } else {
            shift
        };
        match layout::lookup(code, upper) {
            0 => None,
            byte => self.event(Key::Char(byte)),
        }
    }

    fn event(&self, key: Key) -> Option<KeyEvent> {
        Some(KeyEvent {
            key,
            modifiers: self.modifiers,
        })
    }
}

#[cfg(all(test, not(feature = "layout-no")))]
mod test {
    use super::*;

    fn make(code: u8) -> u8 {
        code
    }

    fn brk(code: u8) -> u8 {
        code | BREAK_BIT
    }

    /// Press and release each code, collecting the characters produced.
    fn type_codes(decoder: &mut Decoder, codes: &[u8], out: &mut [u8]) -> usize {
        let mut n = 0;
        for &code in codes {
            for byte in [make(code), brk(code)] {
                if let Some(c) = decoder.feed(byte).and_then(|e| e.ascii()) {
                    out[n] = c;
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn hello_enter() {
        let mut decoder = Decoder::new();
        let mut out = [0u8; 8];
        let codes = [0x23, 0x12, 0x26, 0x26, 0x18, 0x1C];
        decoder.feed(make(LEFT_SHIFT));
        assert_eq!(decoder.feed(make(0x23)).and_then(|e| e.ascii()), Some(b'H'));
        decoder.feed(brk(0x23));
        decoder.feed(brk(LEFT_SHIFT));
        let n = type_codes(&mut decoder, &codes[1..], &mut out);
        assert_eq!(&out[..n], b"ello\n");
    }

    #[test]
    fn caps_lock_toggles_on_break() {
        let mut decoder = Decoder::new();
        let mut out = [0u8; 4];
        // Caps, a, Caps, a
        let n = type_codes(&mut decoder, &[CAPS_LOCK, 0x1E, CAPS_LOCK, 0x1E], &mut out);
        assert_eq!(&out[..n], b"Aa");
    }

    #[test]
    fn shift_and_caps_cancel_for_letters_only() {
        let mut decoder = Decoder::new();
        decoder.feed(brk(CAPS_LOCK));
        decoder.feed(make(RIGHT_SHIFT));
        assert_eq!(decoder.feed(make(0x1E)).unwrap().key, Key::Char(b'a'));
        assert_eq!(decoder.feed(make(0x02)).unwrap().key, Key::Char(b'!'));
        decoder.feed(brk(RIGHT_SHIFT));
        assert_eq!(decoder.feed(make(0x02)).unwrap().key, Key::Char(b'1'));
    }

    #[test]
    fn breaks_and_modifiers_produce_nothing() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.feed(make(CTRL)), None);
        assert!(decoder.modifiers().ctrl());
        assert_eq!(decoder.feed(brk(0x1E)), None);
        assert_eq!(decoder.feed(brk(CTRL)), None);
        assert!(!decoder.modifiers().ctrl());
    }

    #[test]
    fn extended_arrows() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.feed(EXTENDED_PREFIX), None);
        let up = decoder.feed(0x48).unwrap();
        assert_eq!(up.key, Key::Up);
        assert_eq!(up.ascii(), None);

        // the prefix is one-shot: 0x48 alone is keypad 8
        assert_eq!(decoder.feed(0x48).unwrap().key, Key::Char(b'8'));

        decoder.feed(EXTENDED_PREFIX);
        assert_eq!(decoder.feed(brk(0x48)), None);
    }

    #[test]
    fn right_ctrl_is_tracked_through_the_prefix() {
        let mut decoder = Decoder::new();
        decoder.feed(EXTENDED_PREFIX);
        decoder.feed(make(CTRL));
        assert!(decoder.modifiers().contains(Modifiers::RIGHT_CTRL));
        let event = decoder.feed(make(0x2E)).unwrap();
        assert!(event.modifiers.ctrl());
        assert_eq!(event.key, Key::Char(b'c'));
    }

    #[test]
    fn pause_sequence_is_swallowed() {
        let mut decoder = Decoder::new();
        for byte in [0xE1, 0x1D, 0x45, 0xE1, 0x9D, 0xC5] {
            assert_eq!(decoder.feed(byte), None);
        }
        assert!(!decoder.modifiers().ctrl());
        assert_eq!(decoder.feed(make(0x1E)).unwrap().key, Key::Char(b'a'));
    }

    #[test]
    fn function_keys() {
        let mut decoder = Decoder::new();
        assert_eq!(decoder.feed(0x3B).unwrap().key, Key::Function(1));
        assert_eq!(decoder.feed(0x44).unwrap().key, Key::Function(10));
        assert_eq!(decoder.feed(0x58).unwrap().key, Key::Function(12));
    }
}
