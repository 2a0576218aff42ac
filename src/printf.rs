//! C-style formatted output for console programs.
//!
//! Directives: `%c %s %d %i %u %x %p %%`, an optional `-` or `0` flag, a
//! minimum width, and `%.Nf` for floats (at most 18 decimals; exact ties
//! round to even, as the C library does). A directive the formatter does not
//! know is echoed as `%` plus its character; a directive with no argument
//! left is echoed as written.
//!
//! Not re-entrant. Interrupt handlers must not call it.

use crate::vga::{Console, CursorPort, CONSOLE};

/// Receives formatted output one byte at a time.
pub trait ByteSink {
    fn put_byte(&mut self, byte: u8);
}

impl<C: CursorPort> ByteSink for Console<C> {
    fn put_byte(&mut self, byte: u8) {
        self.putc(byte);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Char(u8),
    Str(&'a str),
    Int(i64),
    Uint(u64),
    Ptr(usize),
    Float(f64),
}

impl From<char> for Arg<'_> {
    fn from(c: char) -> Self {
        Arg::Char(if c.is_ascii() { c as u8 } else { 0xfe })
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(s)
    }
}

macro_rules! from_int {
    ($variant:ident, $wide:ty, $($t:ty),*) => {
        $(impl From<$t> for Arg<'_> {
            fn from(value: $t) -> Self {
                Arg::$variant(value as $wide)
            }
        })*
    };
}

from_int!(Int, i64, i8, i16, i32, i64, isize);
from_int!(Uint, u64, u8, u16, u32, u64, usize);

impl From<f32> for Arg<'_> {
    fn from(value: f32) -> Self {
        Arg::Float(value as f64)
    }
}

impl From<f64> for Arg<'_> {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl<T> From<*const T> for Arg<'_> {
    fn from(ptr: *const T) -> Self {
        Arg::Ptr(ptr as usize)
    }
}

impl<T> From<*mut T> for Arg<'_> {
    fn from(ptr: *mut T) -> Self {
        Arg::Ptr(ptr as usize)
    }
}

const DEFAULT_PRECISION: usize = 6;
/// 10^18 is the largest power of ten in a u64.
const MAX_PRECISION: usize = 18;

// Largest u64 in decimal is 20 digits.
const ITOA_LEN: usize = 20;

/// Write `value` in `base` into `buf` and return the digits. Digits are
/// produced least significant first, then reversed in place.
fn itoa(mut value: u64, base: u64, buf: &mut [u8; ITOA_LEN]) -> &[u8] {
    let mut len = 0;
    loop {
        let digit = (value % base) as u8;
        buf[len] = if digit < 10 { b'0' + digit } else { b'a' + digit - 10 };
        len += 1;
        value /= base;
        if value == 0 {
            break;
        }
    }
    buf[..len].reverse();
    &buf[..len]
}

#[derive(Clone, Copy, Default)]
struct Flags {
    left: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

/// Counts what reaches the sink.
struct Counting<'s, S: ByteSink> {
    sink: &'s mut S,
    count: usize,
}

impl<S: ByteSink> Counting<'_, S> {
    fn put(&mut self, byte: u8) {
        self.sink.put_byte(byte);
        self.count += 1;
    }

    fn put_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put(byte);
        }
    }

    fn repeat(&mut self, byte: u8, n: usize) {
        for _ in 0..n {
            self.put(byte);
        }
    }

    /// Emit `prefix` and `body` padded to the minimum width. Zero padding
    /// goes between the prefix and the body.
    fn padded(&mut self, flags: Flags, prefix: &[u8], body: &[u8]) {
        let len = prefix.len() + body.len();
        let pad = flags.width.saturating_sub(len);
        if flags.left {
            self.put_all(prefix);
            self.put_all(body);
            self.repeat(b' ', pad);
        } else if flags.zero {
            self.put_all(prefix);
            self.repeat(b'0', pad);
            self.put_all(body);
        } else {
            self.repeat(b' ', pad);
            self.put_all(prefix);
            self.put_all(body);
        }
    }

    fn float(&mut self, flags: Flags, value: f64) {
        let precision = flags.precision.unwrap_or(DEFAULT_PRECISION).min(MAX_PRECISION);
        if value.is_nan() {
            return self.padded(Flags { zero: false, ..flags }, b"", b"nan");
        }
        let sign: &[u8] = if value.is_sign_negative() { b"-" } else { b"" };
        let magnitude = if value < 0.0 { -value } else { value };
        if magnitude > u64::MAX as f64 {
            return self.padded(Flags { zero: false, ..flags }, sign, b"inf");
        }

        let scale = 10u64.pow(precision as u32);
        let mut whole = magnitude as u64;
        let scaled = (magnitude - whole as f64) * scale as f64;
        let mut frac = scaled as u64;
        let rest = scaled - frac as f64;
        let last_digit = if precision == 0 { whole } else { frac };
        if rest > 0.5 || (rest == 0.5 && last_digit % 2 == 1) {
            frac += 1;
        }
        if frac >= scale {
            whole += 1;
            frac -= scale;
        }

        let mut body = [0u8; ITOA_LEN * 2 + 1];
        let mut len = 0;
        let mut digits = [0u8; ITOA_LEN];
        for &d in itoa(whole, 10, &mut digits) {
            body[len] = d;
            len += 1;
        }
        if precision > 0 {
            body[len] = b'.';
            len += 1;
            let written = itoa(frac, 10, &mut digits);
            for _ in written.len()..precision {
                body[len] = b'0';
                len += 1;
            }
            for &d in written {
                body[len] = d;
                len += 1;
            }
        }
        self.padded(flags, sign, &body[..len]);
    }
}

fn signed(arg: Arg) -> Option<i64> {
    match arg {
        Arg::Int(v) => Some(v),
        Arg::Uint(v) => Some(v as i64),
        Arg::Char(c) => Some(c as i64),
        Arg::Ptr(p) => Some(p as i64),
        _ => None,
    }
}

/// Integers as the 32-bit C library would see them: negative numbers wrap.
fn unsigned(arg: Arg) -> Option<u64> {
    match arg {
        Arg::Int(v) if v < 0 => Some(v as u32 as u64),
        Arg::Int(v) => Some(v as u64),
        Arg::Uint(v) => Some(v),
        Arg::Char(c) => Some(c as u64),
        Arg::Ptr(p) => Some(p as u64),
        _ => None,
    }
}

/// Format `fmt` with `args` into `sink`, returning the number of bytes
/// produced.
pub fn format<S: ByteSink>(sink: &mut S, fmt: &str, args: &[Arg]) -> usize {
    let mut out = Counting { sink, count: 0 };
    let bytes = fmt.as_bytes();
    let mut args = args.iter().copied();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.put(bytes[i]);
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        let mut flags = Flags::default();
        while let Some(&flag @ (b'-' | b'0')) = bytes.get(i) {
            if flag == b'-' {
                flags.left = true;
            } else {
                flags.zero = true;
            }
            i += 1;
        }
        while let Some(&d @ b'0'..=b'9') = bytes.get(i) {
            flags.width = flags.width * 10 + (d - b'0') as usize;
            i += 1;
        }
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let mut precision = 0;
            while let Some(&d @ b'0'..=b'9') = bytes.get(i) {
                precision = precision * 10 + (d - b'0') as usize;
                i += 1;
            }
            flags.precision = Some(precision);
        }

        let Some(&conversion) = bytes.get(i) else {
            // lone '%' at the end
            out.put_all(&bytes[start..]);
            break;
        };
        i += 1;
        let directive = &bytes[start..i];

        if conversion == b'%' {
            out.put(b'%');
            continue;
        }
        if !matches!(conversion, b'c' | b's' | b'd' | b'i' | b'u' | b'x' | b'p' | b'f') {
            out.put(b'%');
            out.put(conversion);
            continue;
        }
        let Some(arg) = args.next() else {
            out.put_all(directive);
            continue;
        };

        let mut digits = [0u8; ITOA_LEN];
        match (conversion, arg) {
            (b'c', Arg::Char(c)) => out.padded(Flags { zero: false, ..flags }, b"", &[c]),
            (b'c', other) => match unsigned(other) {
                Some(v) => out.padded(Flags { zero: false, ..flags }, b"", &[v as u8]),
                None => out.put_all(directive),
            },
            (b's', Arg::Str(s)) => out.padded(Flags { zero: false, ..flags }, b"", s.as_bytes()),
            (b's', _) => out.put_all(directive),
            (b'd' | b'i', arg) => match signed(arg) {
                Some(v) => {
                    let sign: &[u8] = if v < 0 { b"-" } else { b"" };
                    out.padded(flags, sign, itoa(v.unsigned_abs(), 10, &mut digits))
                }
                None => out.put_all(directive),
            },
            (b'u', arg) => match unsigned(arg) {
                Some(v) => out.padded(flags, b"", itoa(v, 10, &mut digits)),
                None => out.put_all(directive),
            },
            (b'x', arg) => match unsigned(arg) {
                Some(v) => out.padded(flags, b"", itoa(v, 16, &mut digits)),
                None => out.put_all(directive),
            },
            (b'p', arg) => match unsigned(arg) {
                Some(v) => out.padded(flags, b"0x", itoa(v, 16, &mut digits)),
                None => out.put_all(directive),
            },
            (b'f', Arg::Float(v)) => out.float(flags, v),
            (b'f', arg) => match signed(arg) {
                Some(v) => out.float(flags, v as f64),
                None => out.put_all(directive),
            },
            _ => out.put_all(directive),
        }
    }

    out.count
}

/// Format to the console.
pub fn printf(fmt: &str, args: &[Arg]) -> usize {
    format(&mut *CONSOLE.lock(), fmt, args)
}

#[macro_export]
macro_rules! printf {
    ($fmt:expr) => ($crate::printf::printf($fmt, &[]));
    ($fmt:expr, $($arg:expr),+ $(,)?) => (
        $crate::printf::printf($fmt, &[$($crate::printf::Arg::from($arg)),+])
    );
}

#[cfg(test)]
mod test {
    use super::*;
    use std::string::String;
    use std::vec::Vec;

    struct Buf(Vec<u8>);

    impl ByteSink for Buf {
        fn put_byte(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    fn fmt(f: &str, args: &[Arg]) -> String {
        let mut buf = Buf(Vec::new());
        let n = format(&mut buf, f, args);
        assert_eq!(n, buf.0.len());
        String::from_utf8(buf.0).unwrap()
    }

    #[test]
    fn itoa_reverses_digits() {
        let mut buf = [0u8; ITOA_LEN];
        assert_eq!(itoa(0, 10, &mut buf), b"0");
        assert_eq!(itoa(1234, 10, &mut buf), b"1234");
        assert_eq!(itoa(0xbeef, 16, &mut buf), b"beef");
        assert_eq!(itoa(u64::MAX, 10, &mut buf), b"18446744073709551615");
    }

    #[test]
    fn basic_directives() {
        assert_eq!(fmt("%c%s!", &['h'.into(), "ello".into()]), "hello!");
        assert_eq!(fmt("%d %i", &[Arg::Int(-42), Arg::Int(7)]), "-42 7");
        assert_eq!(fmt("%u", &[3000000000u32.into()]), "3000000000");
        assert_eq!(fmt("%x", &[255u32.into()]), "ff");
        assert_eq!(fmt("100%%", &[]), "100%");
    }

    #[test]
    fn negative_unsigned_wraps_to_32_bits() {
        assert_eq!(fmt("%u", &[Arg::Int(-1)]), "4294967295");
        assert_eq!(fmt("%x", &[Arg::Int(-1)]), "ffffffff");
    }

    #[test]
    fn pointer_has_prefix() {
        let p = 0xb8000 as *const u16;
        assert_eq!(fmt("%p", &[p.into()]), "0xb8000");
        assert_eq!(fmt("%p", &[Arg::Ptr(0)]), "0x0");
    }

    #[test]
    fn width_and_flags() {
        assert_eq!(fmt("[%5d]", &[Arg::Int(42)]), "[   42]");
        assert_eq!(fmt("[%05d]", &[Arg::Int(-42)]), "[-0042]");
        assert_eq!(fmt("[%-4s]", &["ab".into()]), "[ab  ]");
        assert_eq!(fmt("[%08x]", &[0xabcu32.into()]), "[00000abc]");
        assert_eq!(fmt("[%2d]", &[Arg::Int(12345)]), "[12345]");
    }

    #[test]
    fn float_precision() {
        assert_eq!(fmt("%.2f", &[Arg::Float(3.14159)]), "3.14");
        assert_eq!(fmt("%.1f", &[Arg::Float(-0.25)]), "-0.2");
        assert_eq!(fmt("%.3f", &[Arg::Float(2.0006)]), "2.001");
        assert_eq!(fmt("%.0f", &[Arg::Float(9.6)]), "10");
        assert_eq!(fmt("%f", &[Arg::Float(1.5)]), "1.500000");
        assert_eq!(fmt("%.2f", &[Arg::Float(0.999)]), "1.00");
        assert_eq!(fmt("%.3f", &[Arg::Float(1.05)]), "1.050");
        assert_eq!(fmt("[%7.2f]", &[Arg::from(1.5f32)]), "[   1.50]");
    }

    #[test]
    fn float_ties_round_to_even() {
        assert_eq!(fmt("%.2f", &[Arg::Float(0.125)]), "0.12");
        assert_eq!(fmt("%.2f", &[Arg::Float(0.375)]), "0.38");
        assert_eq!(fmt("%.0f", &[Arg::Float(2.5)]), "2");
        assert_eq!(fmt("%.0f", &[Arg::Float(3.5)]), "4");
        assert_eq!(fmt("%.1f", &[Arg::Float(0.26)]), "0.3");
    }

    #[test]
    fn float_precision_beyond_nine_digits() {
        assert_eq!(fmt("%.12f", &[Arg::Float(0.5)]), "0.500000000000");
        assert_eq!(fmt("%.18f", &[Arg::Float(1.0)]), "1.000000000000000000");
        // clamped at 18
        assert_eq!(fmt("%.25f", &[Arg::Float(2.0)]), "2.000000000000000000");
    }

    #[test]
    fn unknown_directive_is_echoed() {
        assert_eq!(fmt("a%qb", &[Arg::Int(1)]), "a%qb");
    }

    #[test]
    fn missing_argument_is_echoed() {
        assert_eq!(fmt("x=%d y=%5d", &[Arg::from(1u8)]), "x=1 y=%5d");
        assert_eq!(fmt("end%", &[]), "end%");
    }

    #[test]
    fn mismatched_argument_is_echoed() {
        assert_eq!(fmt("%s", &[Arg::Int(5)]), "%s");
        assert_eq!(fmt("%d", &["five".into()]), "%d");
    }

    #[test]
    fn same_input_same_output() {
        let args = [Arg::from("x"), Arg::from(-7i32), Arg::from(2.5f64)];
        let a = fmt("%s %d %.1f", &args);
        let b = fmt("%s %d %.1f", &args);
        assert_eq!(a, b);
    }
}
