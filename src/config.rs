//! Build-time constants and boot command line options.

use core::fmt;

use crate::logger::Level;

/// Timer interrupt rate. One tick is 1/TARGET_HZ seconds.
pub const TARGET_HZ: u32 = 1000;

/// Accepted range for `hz=` on the command line. Below 19 Hz the PIT divisor
/// no longer fits in 16 bits.
pub const HZ_RANGE: core::ops::RangeInclusive<u32> = 19..=10_000;

/// Capacity of the key event ring. Must be a power of two.
pub const KEY_RING_CAPACITY: usize = 128;

/// Gap left between the end of the kernel image and the heap.
pub const HEAP_GUARD: usize = 0x1000;

/// Number of 4 KiB slots in the page-aligned heap.
pub const PAGE_HEAP_SLOTS: usize = 32;

/// The page heap ends where the paging structures begin; the main heap ends
/// where the page heap begins.
pub const PAGE_HEAP_END: usize = PAGE_DIRECTORY_ADDR;
pub const HEAP_END: usize = PAGE_HEAP_END - PAGE_HEAP_SLOTS * 4096;

/// Physical address of the page directory. Page tables follow it.
pub const PAGE_DIRECTORY_ADDR: usize = 0x0040_0000;

/// Identity-mapped span, covering the kernel, heaps, paging structures and
/// the framebuffer with room to spare.
pub const IDENTITY_MAP_BYTES: usize = 16 * 1024 * 1024;

/// Boot stack size.
pub const STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    BadLogLevel,
    BadHz,
    UnknownOption,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::BadLogLevel => f.write_str("loglevel must be trace, debug, info, warn or error"),
            BootError::BadHz => write!(f, "hz must be within {}..={}", HZ_RANGE.start(), HZ_RANGE.end()),
            BootError::UnknownOption => f.write_str("unknown option"),
        }
    }
}

/// Options read from the multiboot command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOptions {
    pub log_level: Level,
    pub hz: u32,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            log_level: Level::Info,
            hz: TARGET_HZ,
        }
    }
}

impl BootOptions {
    /// Parse `key=value` words. The first word is usually the kernel path and
    /// anything without `=` is skipped. Bad options are reported through
    /// `on_error` and leave the default in place.
    pub fn parse(cmdline: &str, mut on_error: impl FnMut(&str, BootError)) -> Self {
        let mut options = BootOptions::default();

        for word in cmdline.split_ascii_whitespace() {
            let Some((key, value)) = word.split_once('=') else {
                continue;
            };
            let result = match key {
                "loglevel" => Level::parse(value)
                    .map(|level| options.log_level = level)
                    .ok_or(BootError::BadLogLevel),
                "hz" => value
                    .parse::<u32>()
                    .ok()
                    .filter(|hz| HZ_RANGE.contains(hz))
                    .map(|hz| options.hz = hz)
                    .ok_or(BootError::BadHz),
                _ => Err(BootError::UnknownOption),
            };
            if let Err(e) = result {
                on_error(word, e);
            }
        }

        options
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout_is_ordered() {
        assert!(HEAP_END < PAGE_HEAP_END);
        assert_eq!(PAGE_HEAP_END, PAGE_DIRECTORY_ADDR);
        assert_eq!(PAGE_DIRECTORY_ADDR % 4096, 0);
        assert!(PAGE_DIRECTORY_ADDR < IDENTITY_MAP_BYTES);
        assert!(KEY_RING_CAPACITY.is_power_of_two());
    }

    #[test]
    fn empty_cmdline_gives_defaults() {
        let options = BootOptions::parse("", |_, _| panic!("no errors expected"));
        assert_eq!(options, BootOptions::default());
    }

    #[test]
    fn cmdline_options_are_applied() {
        let options = BootOptions::parse("/boot/kernel loglevel=debug hz=100", |_, _| {
            panic!("no errors expected")
        });
        assert_eq!(options.log_level, Level::Debug);
        assert_eq!(options.hz, 100);
    }

    #[test]
    fn bad_options_keep_defaults() {
        let mut errors = 0;
        let options = BootOptions::parse("hz=5 loglevel=loud colour=red", |_, _| errors += 1);
        assert_eq!(errors, 3);
        assert_eq!(options, BootOptions::default());
    }
}
