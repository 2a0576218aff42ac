#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![allow(unused_macros)]
#![allow(dead_code)]

// Macro modules first, so everything below sees them.
#[macro_use]
mod logger;
#[macro_use]
mod vga;
#[macro_use]
mod printf;

mod app;
mod boot;
mod config;
mod interrupts;
mod io;
mod keyboard;
mod memory;
mod panic;
mod pit;
mod serial;
mod speaker;
mod x86;

#[cfg(all(target_arch = "x86", target_os = "none"))]
extern "C" {
    /// End of the kernel image, from linker.ld.
    static __kernel_end: u8;
}

/// Entered from `_start` with the loader's EAX and EBX.
///
/// The order of the steps matters: nothing before `x86::sti` may let an
/// interrupt through, and every handler is registered before it.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[no_mangle]
extern "C" fn kernel_main(magic: u32, info: *const boot::MultibootInfo) -> ! {
    use crate::config::{BootOptions, PAGE_DIRECTORY_ADDR};

    vga::init();

    // Read everything from the loader now; the heap may cover its data.
    let boot_info = unsafe { boot::read_info(magic, info) };
    let options = BootOptions::parse(boot_info.map_or("", |b| b.cmdline), |word, e| {
        warn!("ignoring '{}': {}", word, e)
    });
    logger::set_max_level(options.log_level);

    match boot_info {
        None => warn!("not loaded by a multiboot loader (magic {:#x})", magic),
        Some(boot::BootInfo { memory: Some(mem), .. }) => {
            log!("memory: {} KiB low, {} KiB high", mem.lower_kib, mem.upper_kib);
            if mem.upper_end() < PAGE_DIRECTORY_ADDR {
                warn!("RAM ends at {:#x}, below the kernel's fixed layout", mem.upper_end());
            }
        }
        Some(_) => warn!("loader gave no memory size"),
    }

    interrupts::gdt::load();
    interrupts::pic::remap();
    interrupts::idt::load();
    interrupts::dispatch::reset();

    let kernel_end = unsafe { core::ptr::addr_of!(__kernel_end) as usize };
    if let Err(e) = memory::init(kernel_end) {
        panic!("heap: {}", e);
    }
    unsafe { memory::paging::init() };

    pit::init(options.hz);
    keyboard::init();

    x86::sti();
    log!("interrupts enabled, starting the application");

    app::main()
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("corekern runs on bare metal: build it with `cargo kbuild`, boot it with `cargo krun`.");
}
