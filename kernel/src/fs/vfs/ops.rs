//! The v-table every mountable filesystem implements.

use crate::error::KernelResult;
use alloc::string::String;
use alloc::vec::Vec;

/// A directory entry as surfaced by [`FileSystemOps::readdir`].
pub struct DirListing {
    pub name: String,
    pub size: u32,
    pub attr: u8,
}

/// Operations a filesystem implementation exposes to the [`super::Vfs`]
/// mount table. Paths passed in are already relative to the mount's
/// prefix.
pub trait FileSystemOps: Send {
    fn open(&mut self, path: &str) -> KernelResult<usize>;
    fn close(&mut self, handle: usize) -> KernelResult<()>;
    fn read(&mut self, handle: usize, buf: &mut [u8]) -> KernelResult<usize>;
    fn write(&mut self, handle: usize, buf: &[u8]) -> KernelResult<usize>;
    fn seek(&mut self, handle: usize, pos: u32) -> KernelResult<u32>;
    fn stat(&mut self, path: &str) -> KernelResult<(u32, u8)>;
    fn readdir(&mut self, path: &str) -> KernelResult<Vec<DirListing>>;
    fn mkdir(&mut self, path: &str) -> KernelResult<()>;
    fn unlink(&mut self, path: &str) -> KernelResult<()>;
    fn rename(&mut self, from: &str, to: &str) -> KernelResult<()>;
    fn copy_file(&mut self, from: &str, to: &str) -> KernelResult<()>;
    fn read_all(&mut self, path: &str) -> KernelResult<Vec<u8>>;
    fn write_all(&mut self, path: &str, data: &[u8]) -> KernelResult<()>;
    fn read_text(&mut self, path: &str) -> KernelResult<String>;
    fn write_text(&mut self, path: &str, text: &str) -> KernelResult<()>;

    /// Writes back any dirty cache entries. Called periodically by the
    /// kernel's timer tick, not exposed to loaded programs.
    fn flush(&mut self);
}
