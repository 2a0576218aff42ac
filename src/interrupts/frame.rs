/// CPU state saved by the entry stubs, lowest address first.
///
/// The layout mirrors the push sequence in `stubs.rs`: the data segment,
/// then `pushad`, then the vector and error code pushed by the stub (or the
/// CPU), then what the CPU pushes on an interrupt without a privilege change.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct InterruptFrame {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// ESP as it was before `pushad`, not the interrupted one.
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    /// Zero when the CPU doesn't push one for this vector.
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

impl InterruptFrame {
    pub fn vector(&self) -> u8 {
        self.vector as u8
    }
}
