//! x86_64 System V continuation layout and switch routine.

use core::arch::global_asm;

use super::StartRoutine;

/// Default MXCSR: all exceptions masked, round to nearest.
const MXCSR_DEFAULT: u32 = 0x1F80;
/// Default x87 control word: all exceptions masked, 64-bit precision.
const FPU_CW_DEFAULT: u16 = 0x037F;

/// Callee-saved register state of a suspended thread.
///
/// Field offsets are relied upon by `uthreads_context_switch`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Context {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    mxcsr: u32,
    fpu_cw: u16,
    _pad: u16,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            rsp: 0,
            rbp: 0,
            rbx: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            mxcsr: MXCSR_DEFAULT,
            fpu_cw: FPU_CW_DEFAULT,
            _pad: 0,
        }
    }
}

impl Context {
    /// Builds a continuation that enters `start` on the stack ending at `top`.
    ///
    /// The switch routine finishes with `ret`, so the start address is planted
    /// where a return address would be. After the `ret` the stack pointer is
    /// 8 modulo 16, which is what the ABI guarantees at function entry. A
    /// zero above it terminates frame-pointer walks.
    ///
    /// # Safety
    ///
    /// `top` must be the end of a writable stack of at least 16 bytes that
    /// outlives the returned context.
    pub unsafe fn primed(top: usize, start: StartRoutine) -> Self {
        let sp = (top & !0xF) - 16;
        unsafe {
            (sp as *mut u64).write(start as usize as u64);
            ((sp + 8) as *mut u64).write(0);
        }
        Self {
            rsp: sp as u64,
            ..Self::default()
        }
    }

    /// Saved stack pointer.
    pub fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

global_asm!(
    ".text",
    ".global uthreads_context_switch",
    ".type uthreads_context_switch, @function",
    "uthreads_context_switch:",
    // Save into `from` (rdi).
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], rbp",
    "mov [rdi + 0x10], rbx",
    "mov [rdi + 0x18], r12",
    "mov [rdi + 0x20], r13",
    "mov [rdi + 0x28], r14",
    "mov [rdi + 0x30], r15",
    "stmxcsr dword ptr [rdi + 0x38]",
    "fnstcw word ptr [rdi + 0x3c]",
    // Restore from `to` (rsi).
    "mov rsp, [rsi + 0x00]",
    "mov rbp, [rsi + 0x08]",
    "mov rbx, [rsi + 0x10]",
    "mov r12, [rsi + 0x18]",
    "mov r13, [rsi + 0x20]",
    "mov r14, [rsi + 0x28]",
    "mov r15, [rsi + 0x30]",
    "ldmxcsr dword ptr [rsi + 0x38]",
    "fldcw word ptr [rsi + 0x3c]",
    "ret",
    ".size uthreads_context_switch, . - uthreads_context_switch",
);
