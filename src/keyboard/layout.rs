//! Scan-code set 1 translation tables, indexed by the make code (0..128).
//!
//! US is the default. The `layout-no` feature swaps in the Norwegian tables;
//! their letters outside ASCII are code page 437 bytes, which is what the
//! text-mode font draws.

const TABLE_LEN: usize = 128;

pub type Table = [u8; TABLE_LEN];

/// Copy `bytes` into a full-size table, leaving the rest unmapped.
const fn table(bytes: &[u8]) -> Table {
    let mut out = [0; TABLE_LEN];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

#[cfg(not(feature = "layout-no"))]
mod tables {
    use super::{table, Table};

    pub const NAME: &str = "us";

    pub static NORMAL: Table = table(
        b"\0\x1b1234567890-=\x08\tqwertyuiop[]\n\0asdfghjkl;'`\0\\zxcvbnm,./\0*\0 \0\
          \0\0\0\0\0\0\0\0\0\0\0\0789-456+1230.",
    );

    pub static SHIFTED: Table = table(
        b"\0\x1b!@#$%^&*()_+\x08\tQWERTYUIOP{}\n\0ASDFGHJKL:\"~\0|ZXCVBNM<>?\0*\0 \0\
          \0\0\0\0\0\0\0\0\0\0\0\0789-456+1230.",
    );

    pub const EXTRA_LETTERS: &[u8] = &[];
}

#[cfg(feature = "layout-no")]
mod tables {
    use super::{table, Table};

    pub const NAME: &str = "no";

    pub static NORMAL: Table = table(
        b"\0\x1b1234567890+\\\x08\tqwertyuiop\x86\xf8\n\0asdfghjkl\x94\x91|\0'zxcvbnm,.-\0*\0 \0\
          \0\0\0\0\0\0\0\0\0\0\0\0789-456+1230.\0\0<",
    );

    pub static SHIFTED: Table = table(
        b"\0\x1b!\"#$%&/()=?`\x08\tQWERTYUIOP\x8f^\n\0ASDFGHJKL\x99\x92\x15\0*ZXCVBNM;:_\0*\0 \0\
          \0\0\0\0\0\0\0\0\0\0\0\0789-456+1230.\0\0>",
    );

    /// å, ø, æ in code page 437.
    pub const EXTRA_LETTERS: &[u8] = &[0x86, 0x94, 0x91];
}

pub use tables::NAME;

/// Character for `code` with shift held or not. Zero means unmapped.
pub fn lookup(code: u8, shifted: bool) -> u8 {
    let table = if shifted { &tables::SHIFTED } else { &tables::NORMAL };
    table.get(code as usize).copied().unwrap_or(0)
}

/// Whether caps lock applies to `code`: only letters are affected.
pub fn is_letter(code: u8) -> bool {
    let normal = lookup(code, false);
    normal.is_ascii_lowercase() || tables::EXTRA_LETTERS.contains(&normal)
}

#[cfg(all(test, not(feature = "layout-no")))]
mod test {
    use super::*;

    #[test]
    fn letters_and_digits_land_where_set_one_puts_them() {
        assert_eq!(lookup(0x1E, false), b'a');
        assert_eq!(lookup(0x1E, true), b'A');
        assert_eq!(lookup(0x02, false), b'1');
        assert_eq!(lookup(0x02, true), b'!');
        assert_eq!(lookup(0x1C, false), b'\n');
        assert_eq!(lookup(0x39, false), b' ');
        assert_eq!(lookup(0x47, false), b'7');
        assert_eq!(lookup(0x53, false), b'.');
    }

    #[test]
    fn modifiers_and_out_of_range_are_unmapped() {
        for code in [0x1D, 0x2A, 0x36, 0x38, 0x3A, 0x3B, 0x7F] {
            assert_eq!(lookup(code, false), 0);
        }
        assert_eq!(lookup(0xFF, false), 0);
    }

    #[test]
    fn caps_lock_only_touches_letters() {
        assert!(is_letter(0x1E));
        assert!(is_letter(0x32));
        assert!(!is_letter(0x02));
        assert!(!is_letter(0x1A));
    }
}
