//! The `Kernel` aggregate: the single owner of every subsystem above the
//! physical allocator and heap (Design Notes: "global mutable statics" →
//! one aggregate, except the allocator/heap pair that must work before
//! any `Kernel` value can itself be heap-allocated).

use crate::config::FLUSH_INTERVAL_TICKS;
use crate::fs::vfs::Vfs;
use crate::process::ProcessManager;

pub struct Kernel {
    pub vfs: Vfs,
    pub process: ProcessManager,
    ticks: u64,
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            vfs: Vfs::new(),
            process: ProcessManager::new(),
            ticks: 0,
        }
    }

    /// Called from the timer ISR. Advances quantum accounting and, every
    /// [`FLUSH_INTERVAL_TICKS`] ticks, asks mounted filesystems to flush
    /// dirty cache entries. Never switches contexts itself.
    pub fn timer_tick(&mut self) {
        self.ticks += 1;
        self.process.tick_current();
        if self.ticks % FLUSH_INTERVAL_TICKS as u64 == 0 {
            self.vfs.periodic_flush();
        }
    }

    pub fn uptime_ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw, non-owning handle to the running [`Kernel`], handed to loaded
/// programs as the first argument alongside the syscall table. Function
/// members on [`crate::syscall::SyscallTable`] take this instead of
/// reaching through a hidden global, per Design Notes.
#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct KernelHandle(pub *mut Kernel);

impl KernelHandle {
    /// # Safety
    /// The pointee must outlive every call made through this handle and
    /// must not be concurrently aliased — true for a single-CPU kernel
    /// where syscalls only run at voluntary checkpoints.
    pub unsafe fn get(&self) -> &'static mut Kernel {
        // SAFETY: see above; callers of `KernelHandle::get` uphold it.
        unsafe { &mut *self.0 }
    }
}
