//! Flat "CUPD" executable format: a 20-byte header followed by code then
//! initialized data. BSS is zero-filled at load time.

use crate::error::{KernelError, KernelResult};
use alloc::vec::Vec;

/// Little-endian `"CUPD"`.
pub const CUPD_MAGIC: u32 = 0x4455_5043;

const HEADER_SIZE: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct CupdHeader {
    pub magic: u32,
    pub entry_offset: u32,
    pub code_size: u32,
    pub data_size: u32,
    pub bss_size: u32,
}

impl CupdHeader {
    pub fn decode(buf: &[u8]) -> KernelResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(KernelError::Invalid);
        }
        let read_u32 = |off: usize| -> u32 {
            u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
        };
        let header = Self {
            magic: read_u32(0),
            entry_offset: read_u32(4),
            code_size: read_u32(8),
            data_size: read_u32(12),
            bss_size: read_u32(16),
        };
        if header.magic != CUPD_MAGIC {
            return Err(KernelError::Invalid);
        }
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> KernelResult<()> {
        let total = self
            .code_size
            .checked_add(self.data_size)
            .and_then(|s| s.checked_add(self.bss_size))
            .ok_or(KernelError::Invalid)?;
        if total == 0 || total > crate::config::FLAT_MAX_IMAGE_SIZE {
            return Err(KernelError::Invalid);
        }
        if self.entry_offset >= self.code_size {
            return Err(KernelError::Invalid);
        }
        Ok(())
    }

    pub fn total_size(&self) -> u32 {
        self.code_size + self.data_size + self.bss_size
    }
}

/// An image assembled in a heap-backed buffer, ready to be copied into a
/// reserved physical region by the caller.
#[derive(Debug)]
pub struct FlatImage {
    pub header: CupdHeader,
    pub bytes: Vec<u8>,
}

/// Decodes the header, validates it, and assembles code+data+zeroed BSS
/// into a single contiguous buffer. Does not touch physical memory —
/// [`super::load`] copies the result into a reserved region.
pub fn decode(file: &[u8]) -> KernelResult<FlatImage> {
    let header = CupdHeader::decode(file)?;
    let body_end = HEADER_SIZE + (header.code_size + header.data_size) as usize;
    if file.len() < body_end {
        return Err(KernelError::Invalid);
    }

    let mut bytes = Vec::with_capacity(header.total_size() as usize);
    bytes.extend_from_slice(&file[HEADER_SIZE..body_end]);
    bytes.resize(header.total_size() as usize, 0);

    Ok(FlatImage { header, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(code: &[u8], data: &[u8], bss: u32, entry_offset: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CUPD_MAGIC.to_le_bytes());
        buf.extend_from_slice(&entry_offset.to_le_bytes());
        buf.extend_from_slice(&(code.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&bss.to_le_bytes());
        buf.extend_from_slice(code);
        buf.extend_from_slice(data);
        buf
    }

    #[test_case]
    fn decodes_code_data_and_zeroed_bss() {
        let file = build(&[0x90; 4], &[0xAA; 2], 6, 0);
        let image = decode(&file).unwrap();
        assert_eq!(image.bytes.len(), 12);
        assert_eq!(&image.bytes[0..4], &[0x90; 4]);
        assert_eq!(&image.bytes[4..6], &[0xAA; 2]);
        assert_eq!(&image.bytes[6..12], &[0; 6]);
    }

    #[test_case]
    fn rejects_bad_magic() {
        let mut file = build(&[0x90], &[], 0, 0);
        file[0] = 0;
        assert_eq!(decode(&file).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn rejects_entry_offset_past_code() {
        let file = build(&[0x90; 4], &[], 0, 4);
        assert_eq!(decode(&file).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn rejects_empty_image() {
        let file = build(&[], &[], 0, 0);
        assert_eq!(decode(&file).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn rejects_oversized_image() {
        let header = CupdHeader {
            magic: CUPD_MAGIC,
            entry_offset: 0,
            code_size: crate::config::FLAT_MAX_IMAGE_SIZE,
            data_size: 1,
            bss_size: 0,
        };
        assert_eq!(header.validate().unwrap_err(), KernelError::Invalid);
    }
}
