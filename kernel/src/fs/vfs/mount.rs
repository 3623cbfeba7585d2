//! Mount table: ordered `(prefix, filesystem_impl)` pairs searched
//! longest-prefix-first.

use super::ops::FileSystemOps;
use crate::error::{KernelError, KernelResult};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

struct Mount {
    prefix: String,
    fs: Box<dyn FileSystemOps>,
}

#[derive(Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    pub fn mount(&mut self, prefix: &str, fs: Box<dyn FileSystemOps>) {
        self.mounts.retain(|m| m.prefix != prefix);
        self.mounts.push(Mount {
            prefix: String::from(prefix),
            fs,
        });
        // Longest prefix first so resolution doesn't need to scan further.
        self.mounts.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
    }

    pub fn unmount(&mut self, prefix: &str) -> KernelResult<()> {
        let before = self.mounts.len();
        self.mounts.retain(|m| m.prefix != prefix);
        if self.mounts.len() == before {
            return Err(KernelError::NotFound);
        }
        Ok(())
    }

    /// Finds the mount whose prefix is the longest proper prefix of
    /// `path`, returning the mount's index and the remainder path.
    pub fn resolve<'a>(&self, path: &'a str) -> KernelResult<(usize, &'a str)> {
        for (idx, mount) in self.mounts.iter().enumerate() {
            if let Some(rest) = path.strip_prefix(mount.prefix.as_str()) {
                if mount.prefix == "/" || rest.is_empty() || rest.starts_with('/') {
                    let rest = rest.trim_start_matches('/');
                    return Ok((idx, rest));
                }
            }
        }
        Err(KernelError::NotFound)
    }

    pub fn fs_mut(&mut self, idx: usize) -> KernelResult<&mut (dyn FileSystemOps + '_)> {
        match self.mounts.get_mut(idx) {
            Some(m) => Ok(&mut *m.fs),
            None => Err(KernelError::NotFound),
        }
    }

    pub fn flush_all(&mut self) {
        for mount in self.mounts.iter_mut() {
            mount.fs.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDevice, RamDisk};
    use crate::fs::fat16::Fat16;
    use crate::fs::vfs::fat16_adapter::Fat16Fs;
    use crate::config::SECTOR_SIZE;

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
    fn longest_prefix_wins() {
        let mut table = MountTable::new();
        table.mount("/", make_fs());
        table.mount("/data", make_fs());
        let (idx, rest) = table.resolve("/data/x.txt").unwrap();
        assert_eq!(rest, "x.txt");
        let (root_idx, _) = table.resolve("/other.txt").unwrap();
        assert_ne!(idx, root_idx);
    }
}
