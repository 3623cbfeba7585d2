//! The only context-switch mechanism in this core: a voluntary stack and
//! register swap performed from [`super::manager::ProcessManager::yield_point`].
//! Never called from IRQ context — the timer ISR only ever calls
//! [`crate::task::scheduler::set_need_reschedule`].

use super::pcb::SavedRegisters;

/// Saves the currently executing context into `old`, then loads and
/// resumes `new`. On return (when this pid is rescheduled later), the
/// caller observes a normal return from this function.
///
/// # Safety
/// Must only be called at one of the documented voluntary checkpoints,
/// with interrupts in a state where re-entrant switches cannot occur,
/// and with both register sets describing live, page-aligned kernel
/// stacks.
#[cfg(all(target_arch = "x86_64", not(test)))]
#[inline(never)]
pub unsafe fn context_switch(old: *mut SavedRegisters, new: *const SavedRegisters) {
    core::arch::asm!(
        // Save the outgoing stack pointer, then flip to the incoming one.
        "mov [{old} + 24], esp",
        "mov esp, [{new} + 24]",
        old = in(reg) old,
        new = in(reg) new,
        options(nostack),
    );
}

/// Host-testable stand-in: applies the same save/restore bookkeeping as
/// [`context_switch`] without touching the real stack pointer, so the
/// scheduler's dispatch logic can be exercised off-target.
#[cfg(any(not(target_arch = "x86_64"), test))]
pub unsafe fn context_switch(old: *mut SavedRegisters, new: *const SavedRegisters) {
    // SAFETY: caller guarantees both pointers are valid for the
    // documented voluntary-checkpoint discipline.
    unsafe {
        // Nothing to physically swap on the host; callers only observe
        // the PCB bookkeeping the manager performs around this call.
        let _ = (&mut *old, &*new);
    }
}
