//! AArch64 AAPCS64 continuation layout and switch routine.

use core::arch::global_asm;

use super::StartRoutine;

/// Callee-saved register state of a suspended thread: sp, x19-x30, d8-d15.
///
/// Field offsets are relied upon by `uthreads_context_switch`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    sp: u64,
    x19_x28: [u64; 10],
    fp: u64,
    lr: u64,
    d8_d15: [u64; 8],
}

impl Context {
    /// Builds a continuation that enters `start` on the stack ending at `top`.
    ///
    /// The switch routine finishes with `ret`, which branches to the restored
    /// link register. A zero frame pointer terminates frame-record walks.
    ///
    /// # Safety
    ///
    /// `top` must be the end of a writable stack that outlives the returned
    /// context.
    pub unsafe fn primed(top: usize, start: StartRoutine) -> Self {
        Self {
            sp: (top & !0xF) as u64,
            fp: 0,
            lr: start as usize as u64,
            ..Self::default()
        }
    }

    /// Saved stack pointer.
    pub fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

global_asm!(
    ".text",
    ".global uthreads_context_switch",
    ".type uthreads_context_switch, %function",
    "uthreads_context_switch:",
    // Save into `from` (x0).
    "mov x9, sp",
    "str x9, [x0, #0]",
    "stp x19, x20, [x0, #8]",
    "stp x21, x22, [x0, #24]",
    "stp x23, x24, [x0, #40]",
    "stp x25, x26, [x0, #56]",
    "stp x27, x28, [x0, #72]",
    "stp x29, x30, [x0, #88]",
    "stp d8, d9, [x0, #104]",
    "stp d10, d11, [x0, #120]",
    "stp d12, d13, [x0, #136]",
    "stp d14, d15, [x0, #152]",
    // Restore from `to` (x1).
    "ldr x9, [x1, #0]",
    "mov sp, x9",
    "ldp x19, x20, [x1, #8]",
    "ldp x21, x22, [x1, #24]",
    "ldp x23, x24, [x1, #40]",
    "ldp x25, x26, [x1, #56]",
    "ldp x27, x28, [x1, #72]",
    "ldp x29, x30, [x1, #88]",
    "ldp d8, d9, [x1, #104]",
    "ldp d10, d11, [x1, #120]",
    "ldp d12, d13, [x1, #136]",
    "ldp d14, d15, [x1, #152]",
    "ret",
    ".size uthreads_context_switch, . - uthreads_context_switch",
);
