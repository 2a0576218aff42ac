//! Per-vector entry stubs.
//!
//! One stub per vector, each padded to `STUB_SIZE` bytes so the IDT can find
//! stub `v` at `isr_stub_table + v * STUB_SIZE` without a symbol per vector.
//! A stub pushes a dummy error code when the CPU doesn't push one, then its
//! vector, and jumps to the common body which saves the rest of the
//! `InterruptFrame`, switches to kernel data segments and calls the
//! dispatcher with a pointer to the frame.

use core::arch::global_asm;

use crate::interrupts::dispatch::interrupt_dispatch;
use crate::interrupts::KERNEL_DS;

pub const STUB_SIZE: u32 = 16;

extern "C" {
    fn isr_stub_table();
}

pub fn table_base() -> u32 {
    isr_stub_table as usize as u32
}

global_asm!(
    r#"
.section .text
.balign 16
.global isr_stub_table
isr_stub_table:
.set isr_vector, 0
.rept 256
    .balign 16
    .set isr_has_error_code, 0
    .irp err, 8, 10, 11, 12, 13, 14, 17, 21, 29, 30
        .if isr_vector == \err
            .set isr_has_error_code, 1
        .endif
    .endr
    .if isr_has_error_code == 0
        pushl $0
    .endif
    pushl $isr_vector
    jmp isr_common
    .set isr_vector, isr_vector + 1
.endr

isr_common:
    pushal
    xorl %eax, %eax
    movw %ds, %ax
    pushl %eax
    movw ${kernel_ds}, %ax
    movw %ax, %ds
    movw %ax, %es
    movw %ax, %fs
    movw %ax, %gs
    pushl %esp
    cld
    call {dispatch}
    addl $4, %esp
    popl %eax
    movw %ax, %ds
    movw %ax, %es
    movw %ax, %fs
    movw %ax, %gs
    popal
    addl $8, %esp
    iretl
"#,
    kernel_ds = const KERNEL_DS.bits(),
    dispatch = sym interrupt_dispatch,
    options(att_syntax)
);
