//! Vfs: mount table of path prefixes to filesystem implementations.

mod fat16_adapter;
mod mount;
mod ops;

pub use fat16_adapter::Fat16Fs;
pub use mount::MountTable;
pub use ops::{DirListing, FileSystemOps};

use crate::config::MAX_FILE_HANDLES;
use crate::error::{KernelError, KernelResult};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

const MAX_FDS: usize = MAX_FILE_HANDLES * 2;

/// fds 0/1/2 are reserved for stdin/stdout/stderr and never handed out
/// by `open` — they're wired to an actual terminal stream by the
/// external collaborator that owns the console.
const STDIO_FDS: usize = 3;

#[derive(Clone, Copy)]
struct FdEntry {
    mount: usize,
    inner_handle: usize,
    position: u32,
}

#[derive(Clone, Copy)]
enum FdSlot {
    Terminal,
    Open(FdEntry),
}

/// Mount table plus a single global file descriptor table — "a
/// process-scoped (or, in this simplified core, a single global) small
/// array" per spec.
pub struct Vfs {
    mounts: MountTable,
    cwd: String,
    fds: [Option<FdSlot>; MAX_FDS],
}

impl Vfs {
    pub fn new() -> Self {
        const NONE: Option<FdSlot> = None;
        let mut fds = [NONE; MAX_FDS];
        for slot in fds.iter_mut().take(STDIO_FDS) {
            *slot = Some(FdSlot::Terminal);
        }
        Self {
            mounts: MountTable::new(),
            cwd: String::from("/"),
            fds,
        }
    }

    pub fn mount(&mut self, prefix: &str, fs: Box<dyn FileSystemOps>) {
        self.mounts.mount(prefix, fs);
    }

    pub fn unmount(&mut self, prefix: &str) -> KernelResult<()> {
        self.mounts.unmount(prefix)
    }

    pub fn set_cwd(&mut self, cwd: &str) {
        self.cwd = String::from(cwd);
    }

    /// Resolves a path (absolute, or relative to the stored cwd) against
    /// the mount table.
    fn resolve<'a>(&self, path: &'a str) -> KernelResult<(usize, String)> {
        let absolute;
        let full_path: &str = if path.starts_with('/') {
            path
        } else {
            absolute = alloc::format!("{}/{}", self.cwd.trim_end_matches('/'), path);
            &absolute
        };
        let (idx, rest) = self.mounts.resolve(full_path)?;
        Ok((idx, String::from(rest)))
    }

    pub fn open(&mut self, path: &str) -> KernelResult<usize> {
        let (mount, rest) = self.resolve(path)?;
        let inner_handle = self.mounts.fs_mut(mount)?.open(&rest)?;
        let slot = self.fds[STDIO_FDS..]
            .iter()
            .position(|f| f.is_none())
            .map(|i| i + STDIO_FDS)
            .ok_or(KernelError::Busy)?;
        self.fds[slot] = Some(FdSlot::Open(FdEntry {
            mount,
            inner_handle,
            position: 0,
        }));
        Ok(slot)
    }

    fn fd(&self, fd: usize) -> KernelResult<FdEntry> {
        match self.fds.get(fd).and_then(|f| *f) {
            Some(FdSlot::Open(entry)) => Ok(entry),
            _ => Err(KernelError::Invalid),
        }
    }

    fn fd_entry_mut(&mut self, fd: usize) -> Option<&mut FdEntry> {
        match self.fds.get_mut(fd)?.as_mut()? {
            FdSlot::Open(entry) => Some(entry),
            FdSlot::Terminal => None,
        }
    }

    pub fn close(&mut self, fd: usize) -> KernelResult<()> {
        let entry = self.fd(fd)?;
        self.mounts.fs_mut(entry.mount)?.close(entry.inner_handle)?;
        self.fds[fd] = None;
        Ok(())
    }

    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> KernelResult<usize> {
        let entry = self.fd(fd)?;
        let n = self.mounts.fs_mut(entry.mount)?.read(entry.inner_handle, buf)?;
        if let Some(entry) = self.fd_entry_mut(fd) {
            entry.position += n as u32;
        }
        Ok(n)
    }

    pub fn write(&mut self, fd: usize, buf: &[u8]) -> KernelResult<usize> {
        let entry = self.fd(fd)?;
        let n = self.mounts.fs_mut(entry.mount)?.write(entry.inner_handle, buf)?;
        if let Some(entry) = self.fd_entry_mut(fd) {
            entry.position += n as u32;
        }
        Ok(n)
    }

    pub fn seek(&mut self, fd: usize, pos: u32) -> KernelResult<u32> {
        let entry = self.fd(fd)?;
        let new_pos = self.mounts.fs_mut(entry.mount)?.seek(entry.inner_handle, pos)?;
        if let Some(entry) = self.fd_entry_mut(fd) {
            entry.position = new_pos;
        }
        Ok(new_pos)
    }

    pub fn stat(&mut self, path: &str) -> KernelResult<(u32, u8)> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.stat(&rest)
    }

    pub fn readdir(&mut self, path: &str) -> KernelResult<Vec<DirListing>> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.readdir(&rest)
    }

    pub fn mkdir(&mut self, path: &str) -> KernelResult<()> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.mkdir(&rest)
    }

    pub fn unlink(&mut self, path: &str) -> KernelResult<()> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.unlink(&rest)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> KernelResult<()> {
        let (mount_from, rest_from) = self.resolve(from)?;
        let (mount_to, rest_to) = self.resolve(to)?;
        if mount_from != mount_to {
            return Err(KernelError::Unsupported);
        }
        self.mounts.fs_mut(mount_from)?.rename(&rest_from, &rest_to)
    }

    pub fn copy_file(&mut self, from: &str, to: &str) -> KernelResult<()> {
        let (mount_from, rest_from) = self.resolve(from)?;
        let (mount_to, rest_to) = self.resolve(to)?;
        if mount_from != mount_to {
            let data = self.mounts.fs_mut(mount_from)?.read_all(&rest_from)?;
            return self.mounts.fs_mut(mount_to)?.write_all(&rest_to, &data);
        }
        self.mounts.fs_mut(mount_from)?.copy_file(&rest_from, &rest_to)
    }

    pub fn read_all(&mut self, path: &str) -> KernelResult<Vec<u8>> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.read_all(&rest)
    }

    pub fn write_all(&mut self, path: &str, data: &[u8]) -> KernelResult<()> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.write_all(&rest, data)
    }

    pub fn read_text(&mut self, path: &str) -> KernelResult<String> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.read_text(&rest)
    }

    pub fn write_text(&mut self, path: &str, text: &str) -> KernelResult<()> {
        let (mount, rest) = self.resolve(path)?;
        self.mounts.fs_mut(mount)?.write_text(&rest, text)
    }

    /// Flushes every mounted filesystem's dirty cache entries. Called
    /// from [`crate::kernel::Kernel::timer_tick`] every
    /// [`crate::config::FLUSH_INTERVAL_TICKS`] ticks.
    pub fn periodic_flush(&mut self) {
        self.mounts.flush_all();
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDevice, RamDisk};
    use crate::config::SECTOR_SIZE;
    use crate::fs::fat16::Fat16;

    fn make_fs() -> Box<dyn FileSystemOps> {
        let mut disk = RamDisk::new(16 * 1024 * 1024 / SECTOR_SIZE as u32);
        let mut sector0 = [0u8; SECTOR_SIZE];
        sector0[446 + 4] = 0x06;
        sector0[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        sector0[0x0D] = 1;
        sector0[0x0E..0x10].copy_from_slice(&1u16.to_le_bytes());
        sector0[0x10] = 2;
        sector0[0x11..0x13].copy_from_slice(&512u16.to_le_bytes());
        sector0[0x13..0x15].copy_from_slice(&((16 * 1024 * 1024 / SECTOR_SIZE as u32) as u16).to_le_bytes());
        sector0[0x16..0x18].copy_from_slice(&32u16.to_le_bytes());
        sector0[510] = 0x55;
        sector0[511] = 0xAA;
        disk.write(0, 1, &sector0).unwrap();
        Box::new(Fat16Fs::new(Fat16::mount(disk).unwrap()))
    }

    #[test_case]
    fn write_then_read_through_mount() {
        let mut vfs = Vfs::new();
        vfs.mount("/", make_fs());
        vfs.write_all("/hello.txt", b"hi").unwrap();
        let data = vfs.read_all("/hello.txt").unwrap();
        assert_eq!(data, b"hi");
    }

    #[test_case]
    fn open_skips_reserved_stdio_fds() {
        let mut vfs = Vfs::new();
        vfs.mount("/", make_fs());
        vfs.write_all("/f.txt", b"x").unwrap();
        let fd = vfs.open("/f.txt").unwrap();
        assert_eq!(fd, STDIO_FDS);
        assert_eq!(vfs.read(0, &mut [0u8; 1]).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn open_write_close_flushes_staged_data() {
        let mut vfs = Vfs::new();
        vfs.mount("/", make_fs());
        vfs.write_all("/f.txt", b"seed").unwrap();
        let fd = vfs.open("/f.txt").unwrap();
        vfs.write(fd, b"more").unwrap();
        vfs.close(fd).unwrap();
        let data = vfs.read_all("/f.txt").unwrap();
        assert_eq!(data, b"more");
    }
}
