//! An in-memory [`BlockDevice`], used as the end-to-end test double for
//! the "1 MiB virtual device" / "16 MiB image" scenarios in spec's
//! testable properties, and as the boot-time backing store until a real
//! disk driver is wired up.

use super::BlockDevice;
use crate::config::SECTOR_SIZE;
use crate::error::{KernelError, KernelResult};
use alloc::vec;
use alloc::vec::Vec;

pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    /// Create a zero-initialized disk of `sectors` sectors.
    pub fn new(sectors: u32) -> Self {
        Self {
            data: vec![0u8; sectors as usize * SECTOR_SIZE],
        }
    }

    fn bounds(&self, lba: u32, sector_count: u32) -> KernelResult<(usize, usize)> {
        let start = lba as usize * SECTOR_SIZE;
        let len = sector_count as usize * SECTOR_SIZE;
        let end = start.checked_add(len).ok_or(KernelError::Invalid)?;
        if end > self.data.len() {
            return Err(KernelError::Invalid);
        }
        Ok((start, end))
    }
}

impl BlockDevice for RamDisk {
    fn read(&mut self, lba: u32, sector_count: u32, buf: &mut [u8]) -> KernelResult<()> {
        let (start, end) = self.bounds(lba, sector_count)?;
        if buf.len() != end - start {
            return Err(KernelError::Invalid);
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write(&mut self, lba: u32, sector_count: u32, buf: &[u8]) -> KernelResult<()> {
        let (start, end) = self.bounds(lba, sector_count)?;
        if buf.len() != end - start {
            return Err(KernelError::Invalid);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn num_sectors(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn write_then_read_round_trips() {
        let mut disk = RamDisk::new(4);
        let pattern: Vec<u8> = (0..SECTOR_SIZE as u32).map(|i| i as u8).collect();
        disk.write(1, 1, &pattern).unwrap();
        let mut out = vec![0u8; SECTOR_SIZE];
        disk.read(1, 1, &mut out).unwrap();
        assert_eq!(out, pattern);
    }

    #[test_case]
    fn out_of_bounds_read_is_invalid() {
        let mut disk = RamDisk::new(2);
        let mut out = vec![0u8; SECTOR_SIZE];
        assert_eq!(disk.read(5, 1, &mut out), Err(KernelError::Invalid));
    }
}
