//! A 64-entry LRU write-back cache sitting in front of a [`BlockDevice`].

use super::BlockDevice;
use crate::config::{CACHE_ENTRIES, SECTOR_SIZE};
use crate::error::{KernelError, KernelResult};

#[derive(Clone)]
struct CacheEntry {
    lba: u32,
    valid: bool,
    dirty: bool,
    /// Widened to 64-bit per the open question on 32-bit overflow: at
    /// one touch per microsecond this would still take centuries to wrap.
    last_access: u64,
    data: [u8; SECTOR_SIZE],
}

impl CacheEntry {
    const fn empty() -> Self {
        Self {
            lba: 0,
            valid: false,
            dirty: false,
            last_access: 0,
            data: [0u8; SECTOR_SIZE],
        }
    }
}

/// Running counters, exposed for tests and diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writebacks: u64,
    /// True evictions only: a valid, previously-occupied slot was
    /// repurposed. Resolves the open question of whether claiming an
    /// invalid (never-used) slot should count — it does not.
    pub evictions: u64,
}

pub struct BlockCache<D: BlockDevice> {
    device: D,
    entries: [CacheEntry; CACHE_ENTRIES],
    access_counter: u64,
    stats: CacheStats,
}

impl<D: BlockDevice> BlockCache<D> {
    pub fn new(device: D) -> Self {
        const EMPTY: CacheEntry = CacheEntry::empty();
        Self {
            device,
            entries: [EMPTY; CACHE_ENTRIES],
            access_counter: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn next_stamp(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn find_valid(&self, lba: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.valid && e.lba == lba)
    }

    /// First invalid slot if any, else the valid entry with the smallest
    /// `last_access`. Matches P7.
    fn pick_victim(&self) -> usize {
        if let Some(idx) = self.entries.iter().position(|e| !e.valid) {
            return idx;
        }
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(idx, _)| idx)
            .expect("cache has at least one entry")
    }

    /// Evict `idx` if necessary (writing back dirty data) and load `lba`
    /// from the device into it. Returns the device read's result.
    fn load_into(&mut self, idx: usize, lba: u32) -> KernelResult<()> {
        let was_valid = self.entries[idx].valid;
        if was_valid && self.entries[idx].dirty {
            self.writeback(idx)?;
        }
        if was_valid {
            self.stats.evictions += 1;
        }
        let mut buf = [0u8; SECTOR_SIZE];
        self.device.read(lba, 1, &mut buf)?;
        let stamp = self.next_stamp();
        let entry = &mut self.entries[idx];
        entry.lba = lba;
        entry.data = buf;
        entry.valid = true;
        entry.dirty = false;
        entry.last_access = stamp;
        Ok(())
    }

    fn writeback(&mut self, idx: usize) -> KernelResult<()> {
        let (lba, data) = (self.entries[idx].lba, self.entries[idx].data);
        self.device.write(lba, 1, &data)?;
        self.entries[idx].dirty = false;
        self.stats.writebacks += 1;
        Ok(())
    }

    /// Read one sector through the cache.
    pub fn read(&mut self, lba: u32, out_buf: &mut [u8; SECTOR_SIZE]) -> KernelResult<()> {
        if let Some(idx) = self.find_valid(lba) {
            out_buf.copy_from_slice(&self.entries[idx].data);
            let stamp = self.next_stamp();
            self.entries[idx].last_access = stamp;
            self.stats.hits += 1;
            return Ok(());
        }
        let idx = self.pick_victim();
        self.load_into(idx, lba)?;
        out_buf.copy_from_slice(&self.entries[idx].data);
        self.stats.misses += 1;
        Ok(())
    }

    /// Write one sector through the cache (write-back, write-allocate).
    pub fn write(&mut self, lba: u32, in_buf: &[u8; SECTOR_SIZE]) -> KernelResult<()> {
        if let Some(idx) = self.find_valid(lba) {
            self.entries[idx].data = *in_buf;
            self.entries[idx].dirty = true;
            let stamp = self.next_stamp();
            self.entries[idx].last_access = stamp;
            return Ok(());
        }
        let idx = self.pick_victim();
        self.load_into(idx, lba)?;
        self.entries[idx].data = *in_buf;
        self.entries[idx].dirty = true;
        let stamp = self.next_stamp();
        self.entries[idx].last_access = stamp;
        Ok(())
    }

    /// Write back every valid dirty entry. Per-entry failures are
    /// reported in the returned vector but do not abort the sweep, and a
    /// failed entry's dirty bit is left set so the data is never
    /// silently dropped.
    pub fn flush_all(&mut self) -> alloc::vec::Vec<(u32, KernelError)> {
        let mut failures = alloc::vec::Vec::new();
        for idx in 0..self.entries.len() {
            if self.entries[idx].valid && self.entries[idx].dirty {
                if let Err(e) = self.writeback(idx) {
                    failures.push((self.entries[idx].lba, e));
                }
            }
        }
        failures
    }

    /// Alias for [`Self::flush_all`] exposed as a durability point.
    pub fn sync(&mut self) -> alloc::vec::Vec<(u32, KernelError)> {
        self.flush_all()
    }

    /// Invoked from the 5-second periodic timer tick.
    pub fn periodic_flush(&mut self) {
        let _ = self.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDisk;
    use alloc::vec::Vec;

    fn pattern(seed: u8) -> [u8; SECTOR_SIZE] {
        let mut buf = [0u8; SECTOR_SIZE];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = seed.wrapping_add(i as u8);
        }
        buf
    }

    #[test_case]
    fn write_through_then_read_matches() {
        let disk = RamDisk::new(2048);
        let mut cache = BlockCache::new(disk);
        let data = pattern(1);
        cache.write(0, &data).unwrap();
        let mut out = [0u8; SECTOR_SIZE];
        cache.read(0, &mut out).unwrap();
        assert_eq!(out, data);
        cache.sync();
    }

    #[test_case]
    fn lru_eviction_at_65th_distinct_lba() {
        let disk = RamDisk::new(2048);
        let mut cache = BlockCache::new(disk);
        for lba in 0..65u32 {
            cache.write(lba, &pattern(lba as u8)).unwrap();
        }
        assert!(cache.stats().writebacks >= 1);
        let mut out = [0u8; SECTOR_SIZE];
        let misses_before = cache.stats().misses;
        cache.read(0, &mut out).unwrap();
        assert_eq!(cache.stats().misses, misses_before + 1);
        assert_eq!(out, pattern(0));
    }

    #[test_case]
    fn at_most_one_valid_entry_per_lba() {
        let disk = RamDisk::new(128);
        let mut cache = BlockCache::new(disk);
        for _ in 0..3 {
            cache.write(5, &pattern(9)).unwrap();
        }
        let matches: Vec<_> = cache.entries.iter().filter(|e| e.valid && e.lba == 5).collect();
        assert_eq!(matches.len(), 1);
    }

    #[test_case]
    fn sync_is_idempotent_with_no_intervening_writes() {
        let disk = RamDisk::new(128);
        let mut cache = BlockCache::new(disk);
        cache.write(0, &pattern(1)).unwrap();
        cache.sync();
        let writebacks_after_first_sync = cache.stats().writebacks;
        cache.sync();
        assert_eq!(cache.stats().writebacks, writebacks_after_first_sync);
    }

    #[test_case]
    fn claiming_invalid_slot_is_not_an_eviction() {
        let disk = RamDisk::new(128);
        let mut cache = BlockCache::new(disk);
        cache.write(0, &pattern(1)).unwrap();
        assert_eq!(cache.stats().evictions, 0);
    }
}
