//! FAT16 filesystem operations: mount, cluster chains, file and
//! directory manipulation.

use super::boot_sector::{find_fat16_partition, BiosParameterBlock, Fat16Layout};
use super::dir_entry::{
    from_83, to_83, DirEntry, ATTR_ARCHIVE, ATTR_DIRECTORY, ENTRY_SIZE,
};
use crate::block::{BlockCache, BlockDevice};
use crate::config::{MAX_FILE_HANDLES, SECTOR_SIZE};
use crate::error::{KernelError, KernelResult};
use alloc::vec;
use alloc::vec::Vec;

const FREE_CLUSTER_SENTINEL: u16 = 0x0000;
const BAD_CLUSTER: u16 = 0xFFF7;
const EOC: u16 = 0xFFFF;
const EOC_THRESHOLD: u16 = 0xFFF8;

fn is_free(entry: u16) -> bool {
    entry < 0x0002
}

fn is_eoc(entry: u16) -> bool {
    entry >= EOC_THRESHOLD
}

/// An open file handle. `first_cluster == 0` denotes an empty file.
#[derive(Debug, Clone, Copy)]
pub struct FileHandle {
    pub first_cluster: u16,
    pub file_size: u32,
    pub position: u32,
    pub is_open: bool,
    /// Directory location of the owning entry, needed by future writers;
    /// root entries use `dir_first_cluster = 0`.
    dir_first_cluster: u16,
    entry_lba: u32,
    entry_offset: usize,
}

enum DirLocation {
    Root,
    Sub(u16),
}

/// Visitor callback signature for directory enumeration.
pub type DirVisitor<'a> = dyn FnMut(&str, u32, u8) + 'a;

pub struct Fat16<D: BlockDevice> {
    cache: BlockCache<D>,
    layout: Fat16Layout,
    handles: [Option<FileHandle>; MAX_FILE_HANDLES],
}

impl<D: BlockDevice> Fat16<D> {
    /// Parses the MBR and boot sector once, per spec's "layout
    /// discovery at mount".
    pub fn mount(device: D) -> KernelResult<Self> {
        let mut cache = BlockCache::new(device);
        let mut sector0 = [0u8; SECTOR_SIZE];
        cache.read(0, &mut sector0)?;
        let partition_lba = find_fat16_partition(&sector0)?;

        let mut boot_sector = [0u8; SECTOR_SIZE];
        cache.read(partition_lba, &mut boot_sector)?;
        let bpb = BiosParameterBlock::decode(&boot_sector)?;
        let layout = Fat16Layout::derive(partition_lba, bpb);

        const NONE: Option<FileHandle> = None;
        Ok(Self {
            cache,
            layout,
            handles: [NONE; MAX_FILE_HANDLES],
        })
    }

    // ---- FAT access -----------------------------------------------

    fn fat_entry_location(&self, cluster: u16) -> (u32, usize) {
        let byte_offset = 2 * cluster as u32;
        let sector_in_fat = byte_offset / SECTOR_SIZE as u32;
        let offset_in_sector = (byte_offset % SECTOR_SIZE as u32) as usize;
        (self.layout.fat_start + sector_in_fat, offset_in_sector)
    }

    fn read_fat_entry(&mut self, cluster: u16) -> KernelResult<u16> {
        let (lba, offset) = self.fat_entry_location(cluster);
        let mut sector = [0u8; SECTOR_SIZE];
        self.cache.read(lba, &mut sector)?;
        Ok(u16::from_le_bytes([sector[offset], sector[offset + 1]]))
    }

    /// Mirrors the write to every FAT copy.
    fn write_fat_entry(&mut self, cluster: u16, value: u16) -> KernelResult<()> {
        let (lba, offset) = self.fat_entry_location(cluster);
        for copy in 0..self.layout.bpb.num_fats as u32 {
            let copy_lba = lba + copy * self.layout.bpb.sectors_per_fat as u32;
            let mut sector = [0u8; SECTOR_SIZE];
            self.cache.read(copy_lba, &mut sector)?;
            sector[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            self.cache.write(copy_lba, &sector)?;
        }
        Ok(())
    }

    fn follow_chain(&mut self, first_cluster: u16) -> KernelResult<Vec<u16>> {
        let mut chain = Vec::new();
        if first_cluster == 0 {
            return Ok(chain);
        }
        let mut cluster = first_cluster;
        loop {
            chain.push(cluster);
            let next = self.read_fat_entry(cluster)?;
            if next == BAD_CLUSTER {
                return Err(KernelError::Io);
            }
            if is_eoc(next) {
                break;
            }
            cluster = next;
        }
        Ok(chain)
    }

    fn free_chain(&mut self, first_cluster: u16) -> KernelResult<()> {
        if first_cluster == 0 {
            return Ok(());
        }
        let chain = self.follow_chain(first_cluster)?;
        for cluster in chain {
            self.write_fat_entry(cluster, FREE_CLUSTER_SENTINEL)?;
        }
        Ok(())
    }

    /// First-fit allocation of `count` free clusters. On partial
    /// failure, every cluster claimed so far is freed before returning
    /// [`KernelError::NoSpace`].
    fn allocate_chain(&mut self, count: u32) -> KernelResult<Vec<u16>> {
        let mut claimed = Vec::new();
        let max_cluster = self.layout.max_cluster();
        let mut cluster = 2u16;
        while claimed.len() < count as usize && cluster <= max_cluster {
            if is_free(self.read_fat_entry(cluster)?) {
                self.write_fat_entry(cluster, EOC)?;
                claimed.push(cluster);
            }
            cluster = cluster.wrapping_add(1);
            if cluster < 2 {
                break; // wrapped around u16
            }
        }
        if claimed.len() < count as usize {
            for c in &claimed {
                self.write_fat_entry(*c, FREE_CLUSTER_SENTINEL)?;
            }
            return Err(KernelError::NoSpace);
        }
        // Link consecutive clusters; the last one keeps the EOC value it
        // was claimed with, so there is exactly one write of EOC to the
        // final cluster rather than a redundant second pass.
        for i in 0..claimed.len().saturating_sub(1) {
            self.write_fat_entry(claimed[i], claimed[i + 1])?;
        }
        Ok(claimed)
    }

    // ---- directory region iteration --------------------------------

    fn dir_sectors(&mut self, location: &DirLocation) -> KernelResult<Vec<u32>> {
        match location {
            DirLocation::Root => {
                Ok((0..self.layout.root_dir_sectors).map(|i| self.layout.root_dir_start + i).collect())
            }
            DirLocation::Sub(first_cluster) => {
                let chain = self.follow_chain(*first_cluster)?;
                let mut sectors = Vec::new();
                for cluster in chain {
                    let base = self.layout.cluster_to_lba(cluster);
                    for s in 0..self.layout.bpb.sectors_per_cluster as u32 {
                        sectors.push(base + s);
                    }
                }
                Ok(sectors)
            }
        }
    }

    /// Scans `location` for `name83`, returning the decoded entry plus
    /// its on-disk location, skipping deleted slots and stopping at the
    /// end marker.
    fn find_entry(&mut self, location: &DirLocation, name83: &[u8; 11]) -> KernelResult<Option<(DirEntry, u32, usize)>> {
        let sectors = self.dir_sectors(location)?;
        for lba in sectors {
            let mut sector = [0u8; SECTOR_SIZE];
            self.cache.read(lba, &mut sector)?;
            for slot in 0..SECTOR_SIZE / ENTRY_SIZE {
                let offset = slot * ENTRY_SIZE;
                let mut raw = [0u8; ENTRY_SIZE];
                raw.copy_from_slice(&sector[offset..offset + ENTRY_SIZE]);
                let entry = DirEntry::decode(&raw);
                if entry.is_end() {
                    return Ok(None);
                }
                if entry.is_deleted() {
                    continue;
                }
                if entry.name83 == *name83 {
                    return Ok(Some((entry, lba, offset)));
                }
            }
        }
        Ok(None)
    }

    /// First reusable slot: a deleted entry, or the first end-of-list
    /// (zeroed) entry.
    fn find_free_slot(&mut self, location: &DirLocation) -> KernelResult<(u32, usize)> {
        let sectors = self.dir_sectors(location)?;
        for lba in sectors {
            let mut sector = [0u8; SECTOR_SIZE];
            self.cache.read(lba, &mut sector)?;
            for slot in 0..SECTOR_SIZE / ENTRY_SIZE {
                let offset = slot * ENTRY_SIZE;
                let first_byte = sector[offset];
                if first_byte == super::dir_entry::DELETED_MARKER || first_byte == super::dir_entry::END_MARKER {
                    return Ok((lba, offset));
                }
            }
        }
        Err(KernelError::NoSpace)
    }

    fn write_entry_at(&mut self, lba: u32, offset: usize, entry: &DirEntry) -> KernelResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.cache.read(lba, &mut sector)?;
        sector[offset..offset + ENTRY_SIZE].copy_from_slice(&entry.encode());
        self.cache.write(lba, &sector)
    }

    fn mark_deleted_at(&mut self, lba: u32, offset: usize) -> KernelResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.cache.read(lba, &mut sector)?;
        sector[offset] = super::dir_entry::DELETED_MARKER;
        self.cache.write(lba, &sector)
    }

    // ---- path resolution --------------------------------------------

    /// Paths contain at most one `/`. Returns the directory to search
    /// and the final component's normalized 8.3 name.
    fn resolve_parent(&mut self, path: &str) -> KernelResult<(DirLocation, [u8; 11])> {
        match path.split_once('/') {
            None => Ok((DirLocation::Root, to_83(path)?)),
            Some((dir_name, rest)) => {
                if rest.contains('/') {
                    return Err(KernelError::Unsupported);
                }
                let dir83 = to_83(dir_name)?;
                let (entry, _, _) = self
                    .find_entry(&DirLocation::Root, &dir83)?
                    .ok_or(KernelError::NotFound)?;
                if !entry.is_directory() {
                    return Err(KernelError::Invalid);
                }
                Ok((DirLocation::Sub(entry.first_cluster), to_83(rest)?))
            }
        }
    }

    // ---- public operations --------------------------------------------

    /// Opens `path`, allocating one of the 8 concurrent handle slots.
    pub fn open(&mut self, path: &str) -> KernelResult<usize> {
        let slot = self.handles.iter().position(|h| h.is_none()).ok_or(KernelError::Busy)?;
        let (location, name83) = self.resolve_parent(path)?;
        let (entry, lba, offset) = self.find_entry(&location, &name83)?.ok_or(KernelError::NotFound)?;
        let dir_first_cluster = match location {
            DirLocation::Root => 0,
            DirLocation::Sub(c) => c,
        };
        self.handles[slot] = Some(FileHandle {
            first_cluster: entry.first_cluster,
            file_size: entry.file_size,
            position: 0,
            is_open: true,
            dir_first_cluster,
            entry_lba: lba,
            entry_offset: offset,
        });
        Ok(slot)
    }

    pub fn close(&mut self, handle: usize) -> KernelResult<()> {
        let h = self.handles.get_mut(handle).ok_or(KernelError::Invalid)?;
        if h.take().is_none() {
            return Err(KernelError::Invalid);
        }
        Ok(())
    }

    /// Sets an open handle's byte position, clamped to `[0, file_size]`.
    pub fn seek(&mut self, handle: usize, pos: u32) -> KernelResult<u32> {
        let h = self.handle_mut(handle)?;
        h.position = pos.min(h.file_size);
        Ok(h.position)
    }

    /// Returns `(file_size, attribute_byte)` for `path` without opening it.
    pub fn stat(&mut self, path: &str) -> KernelResult<(u32, u8)> {
        let (location, name83) = self.resolve_parent(path)?;
        let (entry, _, _) = self.find_entry(&location, &name83)?.ok_or(KernelError::NotFound)?;
        Ok((entry.file_size, entry.attr))
    }

    /// Reads up to `n` bytes (clamped to remaining file size) into `out`.
    pub fn read(&mut self, handle: usize, out: &mut [u8], n: usize) -> KernelResult<usize> {
        let (first_cluster, file_size, mut position) = {
            let h = self.handle_ref(handle)?;
            (h.first_cluster, h.file_size, h.position)
        };
        let remaining = file_size.saturating_sub(position) as usize;
        let to_read = n.min(remaining).min(out.len());
        if to_read == 0 || first_cluster == 0 {
            return Ok(0);
        }

        let cluster_size = self.layout.cluster_size();
        let chain = self.follow_chain(first_cluster)?;
        let mut produced = 0usize;
        let mut skip_clusters = (position / cluster_size) as usize;
        let mut pos_in_cluster = position % cluster_size;

        for &cluster in chain.iter().skip(0) {
            if skip_clusters > 0 {
                skip_clusters -= 1;
                continue;
            }
            if produced >= to_read {
                break;
            }
            let base_lba = self.layout.cluster_to_lba(cluster);
            let sectors = self.layout.bpb.sectors_per_cluster as u32;
            let mut offset_in_cluster = pos_in_cluster;
            pos_in_cluster = 0;
            for s in 0..sectors {
                if produced >= to_read {
                    break;
                }
                if offset_in_cluster >= SECTOR_SIZE as u32 {
                    offset_in_cluster -= SECTOR_SIZE as u32;
                    continue;
                }
                let mut sector = [0u8; SECTOR_SIZE];
                self.cache.read(base_lba + s, &mut sector)?;
                let start = offset_in_cluster as usize;
                let avail = SECTOR_SIZE - start;
                let take = avail.min(to_read - produced);
                out[produced..produced + take].copy_from_slice(&sector[start..start + take]);
                produced += take;
                offset_in_cluster = 0;
            }
        }
        position += produced as u32;
        self.handle_mut(handle)?.position = position;
        Ok(produced)
    }

    fn handle_ref(&self, handle: usize) -> KernelResult<&FileHandle> {
        self.handles.get(handle).and_then(|h| h.as_ref()).ok_or(KernelError::Invalid)
    }

    fn handle_mut(&mut self, handle: usize) -> KernelResult<&mut FileHandle> {
        self.handles.get_mut(handle).and_then(|h| h.as_mut()).ok_or(KernelError::Invalid)
    }

    /// Creates or overwrites `path` with `data[0..size]`.
    pub fn write_file(&mut self, path: &str, data: &[u8], size: usize) -> KernelResult<()> {
        if size > data.len() {
            return Err(KernelError::Invalid);
        }
        let (location, name83) = self.resolve_parent(path)?;
        let existing = self.find_entry(&location, &name83)?;

        let cluster_size = self.layout.cluster_size() as usize;
        let clusters_needed = if size == 0 {
            0
        } else {
            (size + cluster_size - 1) / cluster_size
        };

        let chain = if clusters_needed == 0 {
            Vec::new()
        } else {
            self.allocate_chain(clusters_needed as u32)?
        };

        // Write data sector-by-sector, zero-padding the tail of every
        // allocated cluster.
        let mut written = 0usize;
        for &cluster in &chain {
            let base_lba = self.layout.cluster_to_lba(cluster);
            for s in 0..self.layout.bpb.sectors_per_cluster as u32 {
                let mut sector = [0u8; SECTOR_SIZE];
                let remaining = size.saturating_sub(written);
                let take = remaining.min(SECTOR_SIZE);
                if take > 0 {
                    sector[..take].copy_from_slice(&data[written..written + take]);
                }
                self.cache.write(base_lba + s, &sector)?;
                written += take;
            }
        }

        let (write_lba, write_offset) = if let Some((old_entry, lba, offset)) = existing {
            if old_entry.first_cluster != 0 {
                self.free_chain(old_entry.first_cluster)?;
            }
            (lba, offset)
        } else {
            self.find_free_slot(&location)?
        };

        let new_entry = DirEntry {
            name83,
            attr: ATTR_ARCHIVE,
            first_cluster: chain.first().copied().unwrap_or(0),
            file_size: size as u32,
        };
        self.write_entry_at(write_lba, write_offset, &new_entry)?;
        self.cache.sync();
        Ok(())
    }

    /// Deletes `path`: frees its cluster chain and marks the directory
    /// slot deleted.
    pub fn delete(&mut self, path: &str) -> KernelResult<()> {
        let (location, name83) = self.resolve_parent(path)?;
        let (entry, lba, offset) = self.find_entry(&location, &name83)?.ok_or(KernelError::NotFound)?;
        self.free_chain(entry.first_cluster)?;
        self.mark_deleted_at(lba, offset)?;
        self.cache.sync();
        Ok(())
    }

    /// Creates a subdirectory named `name` in the root directory.
    pub fn mkdir(&mut self, name: &str) -> KernelResult<()> {
        let name83 = to_83(name)?;
        if self.find_entry(&DirLocation::Root, &name83)?.is_some() {
            return Err(KernelError::Invalid);
        }
        let chain = self.allocate_chain(1)?;
        let cluster = chain[0];
        let base_lba = self.layout.cluster_to_lba(cluster);

        let mut sector = [0u8; SECTOR_SIZE];
        let dot = DirEntry {
            name83: *b".          ",
            attr: ATTR_DIRECTORY,
            first_cluster: cluster,
            file_size: 0,
        };
        let dotdot = DirEntry {
            name83: *b"..         ",
            attr: ATTR_DIRECTORY,
            first_cluster: 0,
            file_size: 0,
        };
        sector[0..ENTRY_SIZE].copy_from_slice(&dot.encode());
        sector[ENTRY_SIZE..2 * ENTRY_SIZE].copy_from_slice(&dotdot.encode());
        self.cache.write(base_lba, &sector)?;
        for s in 1..self.layout.bpb.sectors_per_cluster as u32 {
            self.cache.write(base_lba + s, &[0u8; SECTOR_SIZE])?;
        }

        let (slot_lba, slot_offset) = self.find_free_slot(&DirLocation::Root)?;
        let entry = DirEntry {
            name83,
            attr: ATTR_DIRECTORY,
            first_cluster: cluster,
            file_size: 0,
        };
        self.write_entry_at(slot_lba, slot_offset, &entry)?;
        self.cache.sync();
        Ok(())
    }

    fn enumerate(&mut self, location: &DirLocation, visitor: &mut DirVisitor) -> KernelResult<()> {
        let sectors = self.dir_sectors(location)?;
        for lba in sectors {
            let mut sector = [0u8; SECTOR_SIZE];
            self.cache.read(lba, &mut sector)?;
            for slot in 0..SECTOR_SIZE / ENTRY_SIZE {
                let offset = slot * ENTRY_SIZE;
                let mut raw = [0u8; ENTRY_SIZE];
                raw.copy_from_slice(&sector[offset..offset + ENTRY_SIZE]);
                let entry = DirEntry::decode(&raw);
                if entry.is_end() {
                    return Ok(());
                }
                if entry.is_deleted() || entry.is_volume_label() {
                    continue;
                }
                let name = from_83(&entry.name83);
                if name == "." || name == ".." {
                    continue;
                }
                visitor(&from_83(&entry.name83), entry.file_size, entry.attr);
            }
        }
        Ok(())
    }

    pub fn enumerate_root(&mut self, visitor: &mut DirVisitor) -> KernelResult<()> {
        self.enumerate(&DirLocation::Root, visitor)
    }

    pub fn enumerate_subdir(&mut self, dir_name: &str, visitor: &mut DirVisitor) -> KernelResult<()> {
        let dir83 = to_83(dir_name)?;
        let (entry, _, _) = self.find_entry(&DirLocation::Root, &dir83)?.ok_or(KernelError::NotFound)?;
        if !entry.is_directory() {
            return Err(KernelError::Invalid);
        }
        self.enumerate(&DirLocation::Sub(entry.first_cluster), visitor)
    }

    pub fn list_root(&mut self) -> KernelResult<Vec<(alloc::string::String, u32, u8)>> {
        let mut out = Vec::new();
        self.enumerate_root(&mut |name, size, attr| out.push((alloc::string::String::from(name), size, attr)))?;
        Ok(out)
    }

    pub fn sync(&mut self) -> Vec<(u32, KernelError)> {
        self.cache.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::RamDisk;
    use alloc::string::String;
    use alloc::vec::Vec as StdVec;

    const BYTES_PER_SECTOR: u16 = 512;

    fn format_disk(total_sectors: u32, sectors_per_cluster: u8, root_entries: u16) -> RamDisk {
        let mut disk = RamDisk::new(total_sectors);
        let reserved_sectors: u16 = 1;
        let num_fats: u8 = 2;
        let root_dir_sectors = ((root_entries as u32 * 32) + 511) / 512;
        let data_sectors = total_sectors - reserved_sectors as u32 - root_dir_sectors;
        let total_clusters = data_sectors / sectors_per_cluster as u32;
        let fat_bytes = (total_clusters + 2) * 2;
        let sectors_per_fat = ((fat_bytes + 511) / 512) as u16;

        // partition_lba is 0 in this test layout, so the MBR partition
        // entry and the BPB share a single sector.
        let mut sector0 = [0u8; SECTOR_SIZE];
        sector0[446 + 4] = 0x06;
        sector0[446 + 8..446 + 12].copy_from_slice(&0u32.to_le_bytes());
        sector0[0x0B..0x0D].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
        sector0[0x0D] = sectors_per_cluster;
        sector0[0x0E..0x10].copy_from_slice(&reserved_sectors.to_le_bytes());
        sector0[0x10] = num_fats;
        sector0[0x11..0x13].copy_from_slice(&root_entries.to_le_bytes());
        sector0[0x13..0x15].copy_from_slice(&(total_sectors as u16).to_le_bytes());
        sector0[0x16..0x18].copy_from_slice(&sectors_per_fat.to_le_bytes());
        sector0[510] = 0x55;
        sector0[511] = 0xAA;
        disk.write(0, 1, &sector0).unwrap();

        disk
    }

    fn mount_fresh(total_sectors: u32, sectors_per_cluster: u8) -> Fat16<RamDisk> {
        let disk = format_disk(total_sectors, sectors_per_cluster, 512);
        Fat16::mount(disk).unwrap()
    }

    #[test_case]
    fn round_trip_small_file() {
        let mut fs = mount_fresh(16 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        fs.write_file("HELLO.TXT", b"hi", 2).unwrap();
        let names: StdVec<String> = fs.list_root().unwrap().into_iter().map(|(n, _, _)| n).collect();
        assert!(names.contains(&String::from("hello.txt")));
        let handle = fs.open("hello.txt").unwrap();
        let mut buf = [0u8; 2];
        let n = fs.read(handle, &mut buf, 2).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf, b"hi");
    }

    #[test_case]
    fn grow_to_multi_cluster_chain() {
        let mut fs = mount_fresh(64 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        let payload: StdVec<u8> = (0..65536u32).map(|i| (i % 251) as u8).collect();
        fs.write_file("A.BIN", &payload, payload.len()).unwrap();
        let handle = fs.open("a.bin").unwrap();
        let mut out = vec![0u8; payload.len()];
        let n = fs.read(handle, &mut out, payload.len()).unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(out, payload);
        fs.close(handle).unwrap();
        fs.delete("a.bin").unwrap();
        assert!(fs.open("a.bin").is_err());
    }

    #[test_case]
    fn delete_then_rewrite_different_size() {
        let mut fs = mount_fresh(16 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        fs.write_file("X.TXT", b"short", 5).unwrap();
        fs.delete("x.txt").unwrap();
        let longer = b"a much longer replacement payload";
        fs.write_file("X.TXT", longer, longer.len()).unwrap();
        let handle = fs.open("x.txt").unwrap();
        let mut out = vec![0u8; longer.len()];
        fs.read(handle, &mut out, longer.len()).unwrap();
        assert_eq!(&out, longer);
    }

    #[test_case]
    fn mkdir_creates_subdirectory_with_dot_entries() {
        let mut fs = mount_fresh(16 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        fs.mkdir("SUBDIR").unwrap();
        fs.write_file("subdir/f.txt", b"nested", 6).unwrap();
        let handle = fs.open("subdir/f.txt").unwrap();
        let mut out = [0u8; 6];
        fs.read(handle, &mut out, 6).unwrap();
        assert_eq!(&out, b"nested");
    }

    #[test_case]
    fn paths_with_more_than_one_slash_are_unsupported() {
        let mut fs = mount_fresh(16 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        assert_eq!(fs.open("a/b/c.txt"), Err(KernelError::Unsupported));
    }

    #[test_case]
    fn ninth_concurrent_handle_is_busy() {
        let mut fs = mount_fresh(16 * 1024 * 1024 / SECTOR_SIZE as u32, 1);
        for i in 0..8 {
            let name = alloc::format!("F{}.TXT", i);
            fs.write_file(&name, b"x", 1).unwrap();
        }
        let mut handles = StdVec::new();
        for i in 0..8 {
            let name = alloc::format!("f{}.txt", i);
            handles.push(fs.open(&name).unwrap());
        }
        assert_eq!(fs.open("f0.txt"), Err(KernelError::Busy));
    }
}
