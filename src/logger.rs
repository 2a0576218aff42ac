//! Leveled developer log.
//! NIH from log crate: records go to COM1 on the kernel, to stdout on the host.
//!
//! Interrupt handlers must not log: the serial port sits behind a spinlock
//! that top-level code may be holding.

use core::fmt::{self, write, Write};
use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    fn from_u8(value: u8) -> Level {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }

    /// Parse a level name as written on the boot command line.
    pub fn parse(name: &str) -> Option<Level> {
        match name {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

pub struct Record<'a> {
    pub line: u32,
    pub file: &'a str,
    pub level: Level,
}

struct Logger;

#[cfg(target_os = "none")]
impl Write for Logger {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        crate::serial::COM1.lock().write_str(s)
    }
}

#[cfg(not(target_os = "none"))]
impl Write for Logger {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        std::print!("{}", s);
        Ok(())
    }
}

pub fn _log(args: fmt::Arguments, record: Record) {
    if record.level < max_level() {
        return;
    }
    // A broken sink has nowhere to report to.
    let _ = emit(&mut Logger, args, &record);
}

fn emit(out: &mut impl Write, args: fmt::Arguments, record: &Record) -> fmt::Result {
    out.write_str(match record.level {
        Level::Trace => "\x1b[1mTRACE",
        Level::Debug => "\x1b[1;36mDEBUG",
        Level::Info => "\x1b[1;34mINFO ",
        Level::Warn => "\x1b[1;33mWARN ",
        Level::Error => "\x1b[1;31mERROR",
    })?;
    out.write_str("\x1b[1;39m")?;
    write!(out, " [{}:{}] ", record.file, record.line)?;
    out.write_str("\x1b[0m")?;
    write(out, args)?;
    out.write_str("\n")
}

#[macro_export]
macro_rules! log_macro {
    ($level: expr, $($arg:tt)*) => (
        $crate::logger::_log(format_args!($($arg)*),
        $crate::logger::Record { line: line!(), file: file!(), level: $level })
    );
}

macro_rules! trace {
    ($($arg:tt)+) => (log_macro!($crate::logger::Level::Trace, $($arg)+))
}
macro_rules! debug {
    ($($arg:tt)+) => (log_macro!($crate::logger::Level::Debug, $($arg)+))
}
macro_rules! log {
    ($($arg:tt)+) => (log_macro!($crate::logger::Level::Info, $($arg)+))
}
macro_rules! warn {
    ($($arg:tt)+) => (log_macro!($crate::logger::Level::Warn, $($arg)+))
}
macro_rules! error {
    ($($arg:tt)+) => (log_macro!($crate::logger::Level::Error, $($arg)+))
}

#[cfg(test)]
mod test {
    use super::*;

    struct Capture {
        buf: [u8; 128],
        len: usize,
    }

    impl Write for Capture {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let end = self.len + s.len();
            self.buf[self.len..end].copy_from_slice(s.as_bytes());
            self.len = end;
            Ok(())
        }
    }

    #[test]
    fn record_carries_level_location_and_message() {
        let mut out = Capture { buf: [0; 128], len: 0 };
        let record = Record { line: 7, file: "pit.rs", level: Level::Warn };
        emit(&mut out, format_args!("slow tick {}", 3), &record).unwrap();
        let text = core::str::from_utf8(&out.buf[..out.len]).unwrap();
        assert!(text.contains("WARN"));
        assert!(text.contains("[pit.rs:7]"));
        assert!(text.ends_with("slow tick 3\n"));
    }

    #[test]
    fn level_names_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("error"), Some(Level::Error));
        assert_eq!(Level::parse("loud"), None);
        assert!(Level::Trace < Level::Error);
    }
}
