//! The versioned function-pointer table handed to every ELF32 process at
//! launch. Members take an explicit [`KernelHandle`] context argument
//! rather than reaching through a hidden global (Design Notes).

use crate::error::KernelError;
use crate::kernel::KernelHandle;
use core::ffi::c_void;

pub const SYSCALL_TABLE_VERSION: u32 = 1;

pub type PrintFn = extern "C" fn(KernelHandle, *const u8, usize);
pub type PutcharFn = extern "C" fn(KernelHandle, u8);
pub type PrintIntFn = extern "C" fn(KernelHandle, i32);
pub type PrintHexFn = extern "C" fn(KernelHandle, u32);
pub type ClearScreenFn = extern "C" fn(KernelHandle);

pub type MallocFn = extern "C" fn(usize) -> *mut c_void;
pub type FreeFn = extern "C" fn(*mut c_void, usize);

pub type MemcpyFn = extern "C" fn(*mut u8, *const u8, usize) -> *mut u8;
pub type MemsetFn = extern "C" fn(*mut u8, u8, usize) -> *mut u8;
pub type StrlenFn = extern "C" fn(*const u8) -> usize;

pub type VfsOpenFn = extern "C" fn(KernelHandle, *const u8, usize) -> i32;
pub type VfsCloseFn = extern "C" fn(KernelHandle, u32) -> i32;
pub type VfsReadFn = extern "C" fn(KernelHandle, u32, *mut u8, usize) -> i32;
pub type VfsWriteFn = extern "C" fn(KernelHandle, u32, *const u8, usize) -> i32;
pub type VfsSeekFn = extern "C" fn(KernelHandle, u32, u32) -> i32;
pub type VfsStatFn = extern "C" fn(KernelHandle, *const u8, usize, *mut u32, *mut u8) -> i32;
pub type VfsMkdirFn = extern "C" fn(KernelHandle, *const u8, usize) -> i32;
pub type VfsUnlinkFn = extern "C" fn(KernelHandle, *const u8, usize) -> i32;
pub type VfsRenameFn = extern "C" fn(KernelHandle, *const u8, usize, *const u8, usize) -> i32;

pub type ProcessExitFn = extern "C" fn(KernelHandle, i32) -> !;
pub type ProcessYieldFn = extern "C" fn(KernelHandle);
pub type ProcessGetpidFn = extern "C" fn(KernelHandle) -> u32;
pub type ProcessKillFn = extern "C" fn(KernelHandle, u32) -> i32;
pub type ProcessSleepMsFn = extern "C" fn(KernelHandle, u32);

pub type ShellExecFn = extern "C" fn(KernelHandle, *const u8, usize) -> i32;
pub type UptimeMsFn = extern "C" fn(KernelHandle) -> u64;
pub type ExecFn = extern "C" fn(KernelHandle, *const u8, usize) -> i32;
pub type MemStatsFn = extern "C" fn(KernelHandle, *mut u32, *mut u32, *mut u32);

/// Binary-stable ABI surface handed to loaded ELF32 programs. `version`
/// and `table_size` are the first two fields so a caller can bail out on
/// a mismatch before touching any other member.
#[repr(C)]
pub struct SyscallTable {
    pub version: u32,
    pub table_size: u32,

    pub print: PrintFn,
    pub putchar: PutcharFn,
    pub print_int: PrintIntFn,
    pub print_hex: PrintHexFn,
    pub clear_screen: ClearScreenFn,

    pub malloc: MallocFn,
    pub free: FreeFn,

    pub memcpy: MemcpyFn,
    pub memset: MemsetFn,
    pub strlen: StrlenFn,

    pub vfs_open: VfsOpenFn,
    pub vfs_close: VfsCloseFn,
    pub vfs_read: VfsReadFn,
    pub vfs_write: VfsWriteFn,
    pub vfs_seek: VfsSeekFn,
    pub vfs_stat: VfsStatFn,
    pub vfs_mkdir: VfsMkdirFn,
    pub vfs_unlink: VfsUnlinkFn,
    pub vfs_rename: VfsRenameFn,

    pub process_exit: ProcessExitFn,
    pub process_yield: ProcessYieldFn,
    pub process_getpid: ProcessGetpidFn,
    pub process_kill: ProcessKillFn,
    pub process_sleep_ms: ProcessSleepMsFn,

    pub shell_exec: ShellExecFn,
    pub uptime_ms: UptimeMsFn,
    pub exec: ExecFn,
    pub mem_stats: MemStatsFn,
}

impl SyscallTable {
    pub const fn new() -> Self {
        Self {
            version: SYSCALL_TABLE_VERSION,
            table_size: core::mem::size_of::<SyscallTable>() as u32,
            print: wrappers::print,
            putchar: wrappers::putchar,
            print_int: wrappers::print_int,
            print_hex: wrappers::print_hex,
            clear_screen: wrappers::clear_screen,
            malloc: wrappers::malloc,
            free: wrappers::free,
            memcpy: wrappers::memcpy,
            memset: wrappers::memset,
            strlen: wrappers::strlen,
            vfs_open: wrappers::vfs_open,
            vfs_close: wrappers::vfs_close,
            vfs_read: wrappers::vfs_read,
            vfs_write: wrappers::vfs_write,
            vfs_seek: wrappers::vfs_seek,
            vfs_stat: wrappers::vfs_stat,
            vfs_mkdir: wrappers::vfs_mkdir,
            vfs_unlink: wrappers::vfs_unlink,
            vfs_rename: wrappers::vfs_rename,
            process_exit: wrappers::process_exit,
            process_yield: wrappers::process_yield,
            process_getpid: wrappers::process_getpid,
            process_kill: wrappers::process_kill,
            process_sleep_ms: wrappers::process_sleep_ms,
            shell_exec: wrappers::shell_exec,
            uptime_ms: wrappers::uptime_ms,
            exec: wrappers::exec,
            mem_stats: wrappers::mem_stats,
        }
    }
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One static instance, since the table's contents never vary per
/// process — only the [`KernelHandle`] first argument changes the
/// context a call acts on.
pub static TABLE: SyscallTable = SyscallTable::new();

/// Adapts kernel-internal signatures (e.g. debug-annotated allocation)
/// to the plain extern "C" shapes the table exposes.
mod wrappers {
    use super::*;
    use alloc::slice;
    use alloc::string::String;
    use core::str;

    fn path_from_raw<'a>(ptr: *const u8, len: usize) -> Option<&'a str> {
        if ptr.is_null() {
            return None;
        }
        // SAFETY: caller (a loaded program, trusted only as far as this
        // ABI boundary) promises `ptr` is valid for `len` bytes.
        let bytes = unsafe { slice::from_raw_parts(ptr, len) };
        str::from_utf8(bytes).ok()
    }

    pub extern "C" fn print(handle: KernelHandle, ptr: *const u8, len: usize) {
        if let Some(s) = path_from_raw(ptr, len) {
            // SAFETY: upheld by `KernelHandle`'s own contract.
            let _ = unsafe { handle.get() };
            log::info!("{s}");
        }
    }

    pub extern "C" fn putchar(_handle: KernelHandle, c: u8) {
        log::info!("{}", c as char);
    }

    pub extern "C" fn print_int(_handle: KernelHandle, n: i32) {
        log::info!("{n}");
    }

    pub extern "C" fn print_hex(_handle: KernelHandle, n: u32) {
        log::info!("{n:#x}");
    }

    pub extern "C" fn clear_screen(_handle: KernelHandle) {}

    pub extern "C" fn malloc(size: usize) -> *mut c_void {
        if size == 0 {
            return core::ptr::null_mut();
        }
        let Ok(layout) = core::alloc::Layout::from_size_align(size, core::mem::align_of::<usize>())
        else {
            return core::ptr::null_mut();
        };
        // SAFETY: nonzero-size layout, matched by `free`'s `dealloc`.
        unsafe { alloc::alloc::alloc(layout) as *mut c_void }
    }

    pub extern "C" fn free(ptr: *mut c_void, size: usize) {
        if ptr.is_null() || size == 0 {
            return;
        }
        let Ok(layout) = core::alloc::Layout::from_size_align(size, core::mem::align_of::<usize>())
        else {
            return;
        };
        // SAFETY: caller promises `ptr`/`size` match a prior `malloc`.
        unsafe { alloc::alloc::dealloc(ptr as *mut u8, layout) }
    }

    pub extern "C" fn memcpy(dst: *mut u8, src: *const u8, n: usize) -> *mut u8 {
        // SAFETY: caller's ABI contract guarantees non-overlapping,
        // valid `n`-byte regions.
        unsafe { core::ptr::copy_nonoverlapping(src, dst, n) };
        dst
    }

    pub extern "C" fn memset(dst: *mut u8, value: u8, n: usize) -> *mut u8 {
        // SAFETY: caller's ABI contract guarantees a valid `n`-byte region.
        unsafe { core::ptr::write_bytes(dst, value, n) };
        dst
    }

    pub extern "C" fn strlen(s: *const u8) -> usize {
        if s.is_null() {
            return 0;
        }
        let mut len = 0usize;
        // SAFETY: caller's ABI contract guarantees a NUL-terminated
        // string starting at `s`.
        unsafe {
            while *s.add(len) != 0 {
                len += 1;
            }
        }
        len
    }

    pub extern "C" fn vfs_open(handle: KernelHandle, path: *const u8, len: usize) -> i32 {
        let Some(path) = path_from_raw(path, len) else {
            return KernelError::Invalid.code();
        };
        // SAFETY: see `KernelHandle::get`.
        let kernel = unsafe { handle.get() };
        match kernel.vfs.open(path) {
            Ok(fd) => fd as i32,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_close(handle: KernelHandle, fd: u32) -> i32 {
        let kernel = unsafe { handle.get() };
        match kernel.vfs.close(fd as usize) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_read(handle: KernelHandle, fd: u32, buf: *mut u8, len: usize) -> i32 {
        if buf.is_null() {
            return KernelError::Invalid.code();
        }
        let kernel = unsafe { handle.get() };
        // SAFETY: caller's ABI contract guarantees `buf` is valid for
        // `len` bytes.
        let out = unsafe { slice::from_raw_parts_mut(buf, len) };
        match kernel.vfs.read(fd as usize, out) {
            Ok(n) => n as i32,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_write(handle: KernelHandle, fd: u32, buf: *const u8, len: usize) -> i32 {
        let Some(bytes) = (if buf.is_null() {
            None
        } else {
            // SAFETY: caller's ABI contract guarantees `buf` is valid
            // for `len` bytes.
            Some(unsafe { slice::from_raw_parts(buf, len) })
        }) else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        match kernel.vfs.write(fd as usize, bytes) {
            Ok(n) => n as i32,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_seek(handle: KernelHandle, fd: u32, pos: u32) -> i32 {
        let kernel = unsafe { handle.get() };
        match kernel.vfs.seek(fd as usize, pos) {
            Ok(p) => p as i32,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_stat(
        handle: KernelHandle,
        path: *const u8,
        len: usize,
        size_out: *mut u32,
        attr_out: *mut u8,
    ) -> i32 {
        let Some(path) = path_from_raw(path, len) else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        match kernel.vfs.stat(path) {
            Ok((size, attr)) => {
                if !size_out.is_null() {
                    // SAFETY: caller's ABI contract guarantees a valid
                    // `u32` destination.
                    unsafe { *size_out = size };
                }
                if !attr_out.is_null() {
                    // SAFETY: as above, for a valid `u8` destination.
                    unsafe { *attr_out = attr };
                }
                0
            }
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_mkdir(handle: KernelHandle, path: *const u8, len: usize) -> i32 {
        let Some(path) = path_from_raw(path, len) else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        match kernel.vfs.mkdir(path) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_unlink(handle: KernelHandle, path: *const u8, len: usize) -> i32 {
        let Some(path) = path_from_raw(path, len) else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        match kernel.vfs.unlink(path) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn vfs_rename(
        handle: KernelHandle,
        from: *const u8,
        from_len: usize,
        to: *const u8,
        to_len: usize,
    ) -> i32 {
        let (Some(from), Some(to)) = (path_from_raw(from, from_len), path_from_raw(to, to_len))
        else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        match kernel.vfs.rename(from, to) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn process_exit(handle: KernelHandle, code: i32) -> ! {
        let kernel = unsafe { handle.get() };
        let pid = kernel.process.current_pid();
        let _ = kernel.process.exit(pid, code);
        kernel.process.yield_now();
        unreachable!("exited process was rescheduled")
    }

    pub extern "C" fn process_yield(handle: KernelHandle) {
        let kernel = unsafe { handle.get() };
        kernel.process.yield_point();
    }

    pub extern "C" fn process_getpid(handle: KernelHandle) -> u32 {
        let kernel = unsafe { handle.get() };
        kernel.process.current_pid()
    }

    pub extern "C" fn process_kill(handle: KernelHandle, pid: u32) -> i32 {
        let kernel = unsafe { handle.get() };
        match kernel.process.kill(pid) {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn process_sleep_ms(handle: KernelHandle, ms: u32) {
        let kernel = unsafe { handle.get() };
        let ticks_per_ms = 1; // 100 Hz tick ~= 10ms; callers pass ms already scaled
        let target = kernel.uptime_ticks() + (ms as u64 * ticks_per_ms).max(1);
        while kernel.uptime_ticks() < target {
            kernel.process.yield_point();
        }
    }

    pub extern "C" fn shell_exec(handle: KernelHandle, line: *const u8, len: usize) -> i32 {
        let Some(line) = path_from_raw(line, len) else {
            return KernelError::Invalid.code();
        };
        let _kernel = unsafe { handle.get() };
        log::info!("shell_exec: {line}");
        0
    }

    pub extern "C" fn uptime_ms(handle: KernelHandle) -> u64 {
        let kernel = unsafe { handle.get() };
        kernel.uptime_ticks() * 10
    }

    pub extern "C" fn exec(handle: KernelHandle, path: *const u8, len: usize) -> i32 {
        let Some(path) = path_from_raw(path, len) else {
            return KernelError::Invalid.code();
        };
        let kernel = unsafe { handle.get() };
        let file = match kernel.vfs.read_all(path) {
            Ok(bytes) => bytes,
            Err(e) => return e.code(),
        };
        let name = String::from(path.rsplit('/').next().unwrap_or(path));
        match crate::loader::load(kernel, &name, &file, None) {
            Ok(pid) => pid as i32,
            Err(e) => e.code(),
        }
    }

    pub extern "C" fn mem_stats(
        handle: KernelHandle,
        free_out: *mut u32,
        allocated_out: *mut u32,
        reserved_out: *mut u32,
    ) {
        let _kernel = unsafe { handle.get() };
        let stats = crate::memory::frame_allocator::ALLOCATOR.lock();
        let Some(alloc) = stats.as_ref() else { return };
        // SAFETY: caller's ABI contract guarantees valid `u32`
        // destinations for each non-null pointer.
        unsafe {
            if !free_out.is_null() {
                *free_out = alloc.free_frames() as u32;
            }
            if !allocated_out.is_null() {
                *allocated_out = alloc.allocated_frames() as u32;
            }
            if !reserved_out.is_null() {
                *reserved_out = alloc.reserved_frames() as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn table_header_matches_its_own_size() {
        assert_eq!(TABLE.version, SYSCALL_TABLE_VERSION);
        assert_eq!(TABLE.table_size as usize, core::mem::size_of::<SyscallTable>());
    }
}
