//! Shared error taxonomy used by every layer in the core.

use core::fmt;

/// The small, closed set of error kinds every layer reports through.
///
/// Negative integer codes derived from this enum are what crosses the
/// loaded-program ABI boundary (see [`crate::syscall::table`]); within
/// the kernel crate itself the enum is passed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Named object does not exist (missing file, free pid, unknown mount).
    NotFound,
    /// Caller-supplied input is malformed (bad magic, bad header, misaligned free).
    Invalid,
    /// Capacity exhausted (full FAT, full directory, full process table, OOM).
    NoSpace,
    /// Backing device failed (sector read/write error, writeback failure).
    Io,
    /// Resource temporarily unavailable (all file handles in use).
    Busy,
    /// Request outside current implementation (names >8.3, nested subdirs).
    Unsupported,
}

impl KernelError {
    /// Negative error code used at the syscall-table ABI boundary.
    pub fn code(self) -> i32 {
        -(match self {
            KernelError::NotFound => 1,
            KernelError::Invalid => 2,
            KernelError::NoSpace => 3,
            KernelError::Io => 4,
            KernelError::Busy => 5,
            KernelError::Unsupported => 6,
        })
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::NotFound => "not found",
            KernelError::Invalid => "invalid argument",
            KernelError::NoSpace => "no space",
            KernelError::Io => "i/o error",
            KernelError::Busy => "busy",
            KernelError::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Result alias used throughout the core.
pub type KernelResult<T> = Result<T, KernelError>;
