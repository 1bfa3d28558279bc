//! Continuation capture and restore.
//!
//! A [`Context`] holds the callee-saved register state of a suspended thread:
//! everything needed to resume it exactly where it called [`switch`]. The
//! caller-saved registers are already spilled by the compiler around the call,
//! so a continuation is just a stack pointer, a resume address and the
//! registers the ABI promises to preserve.
//!
//! [`switch`] is the only way control moves between threads. It saves the
//! running context into `from` and resumes `to` in one step; from the point
//! of view of the suspended thread the call simply returns, possibly much
//! later and after any number of other threads have run. A context produced
//! by [`Context::primed`] is resumed by "returning" into the start routine on
//! top of a fresh stack.
//!
//! The signal mask is deliberately not part of a [`Context`]: every switch
//! happens inside a critical section, and the critical section that was open
//! when a continuation was captured restores its own mask once the resumed
//! frame leaves it.

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Context;
#[cfg(target_arch = "x86_64")]
pub use x86_64::Context;

/// Routine a primed context starts in. It must never return: there is no
/// frame below it to return into.
pub type StartRoutine = extern "C" fn() -> !;

extern "C" {
    fn uthreads_context_switch(from: *mut Context, to: *const Context);
}

/// Saves the current continuation into `from` and resumes `to`.
///
/// Returns when some later switch resumes `from`.
///
/// # Safety
///
/// - `from` must be valid for writes and stay valid until it is resumed.
/// - `to` must hold either a continuation saved by a previous `switch` whose
///   stack is still alive, or one produced by [`Context::primed`].
/// - No borrow that another thread could conflict with may be held across
///   the call.
#[inline(never)]
pub unsafe fn switch(from: *mut Context, to: *const Context) {
    unsafe { uthreads_context_switch(from, to) }
}

/// Resumes `to`, discarding the current continuation.
///
/// # Safety
///
/// Same requirements on `to` as [`switch`]. The caller's stack must stay
/// mapped until `to` is running, since the discarded registers are written
/// to it.
pub unsafe fn resume(to: *const Context) -> ! {
    let mut discarded = Context::default();
    unsafe { switch(&mut discarded, to) };
    unreachable!("discarded continuation was resumed")
}

#[cfg(test)]
mod tests {
    use super::*;

    static mut MAIN_CONTEXT: Option<Context> = None;
    static mut SIDE_CONTEXT: Option<Context> = None;
    static mut VISITS: usize = 0;

    extern "C" fn side() -> ! {
        loop {
            unsafe {
                VISITS += 1;
                let main = (*core::ptr::addr_of_mut!(MAIN_CONTEXT)).as_mut().unwrap();
                let side = (*core::ptr::addr_of_mut!(SIDE_CONTEXT)).as_mut().unwrap();
                switch(side, main);
            }
        }
    }

    #[test]
    fn primed_context_round_trips() {
        let mut stack = vec![0u8; 64 * 1024].into_boxed_slice();
        let top = stack.as_mut_ptr() as usize + stack.len();

        unsafe {
            MAIN_CONTEXT = Some(Context::default());
            SIDE_CONTEXT = Some(Context::primed(top, side));

            for expected in 1..=3 {
                let main = (*core::ptr::addr_of_mut!(MAIN_CONTEXT)).as_mut().unwrap();
                let side = (*core::ptr::addr_of!(SIDE_CONTEXT)).as_ref().unwrap();
                switch(main, side);
                let visits = VISITS;
                assert_eq!(visits, expected);
            }
        }
        drop(stack);
    }
}
