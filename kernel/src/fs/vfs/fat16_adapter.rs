//! Adapts [`Fat16`]'s whole-file write model to the per-handle
//! `write`/`seek` surface the VFS exposes.

use super::ops::{DirListing, FileSystemOps};
use crate::block::BlockDevice;
use crate::config::MAX_FILE_HANDLES;
use crate::error::{KernelError, KernelResult};
use crate::fs::fat16::{to_83, Fat16, ATTR_DIRECTORY};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

struct Staged {
    path: String,
    buffer: Vec<u8>,
}

pub struct Fat16Fs<D: BlockDevice> {
    fs: Fat16<D>,
    staged: [Option<Staged>; MAX_FILE_HANDLES],
}

impl<D: BlockDevice> Fat16Fs<D> {
    pub fn new(fs: Fat16<D>) -> Self {
        const NONE: Option<Staged> = None;
        Self {
            fs,
            staged: [NONE; MAX_FILE_HANDLES],
        }
    }

    fn is_dir(&mut self, path: &str) -> bool {
        self.fs.stat(path).map(|(_, attr)| attr & ATTR_DIRECTORY != 0).unwrap_or(false)
    }
}

impl<D: BlockDevice> FileSystemOps for Fat16Fs<D> {
    fn open(&mut self, path: &str) -> KernelResult<usize> {
        let handle = self.fs.open(path)?;
        self.staged[handle] = Some(Staged {
            path: path.to_string(),
            buffer: Vec::new(),
        });
        Ok(handle)
    }

    fn close(&mut self, handle: usize) -> KernelResult<()> {
        if let Some(staged) = self.staged.get_mut(handle).and_then(|s| s.take()) {
            if !staged.buffer.is_empty() {
                self.fs.write_file(&staged.path, &staged.buffer, staged.buffer.len())?;
            }
        }
        self.fs.close(handle)
    }

    fn read(&mut self, handle: usize, buf: &mut [u8]) -> KernelResult<usize> {
        let n = buf.len();
        self.fs.read(handle, buf, n)
    }

    fn write(&mut self, handle: usize, buf: &[u8]) -> KernelResult<usize> {
        let staged = self.staged.get_mut(handle).and_then(|s| s.as_mut()).ok_or(KernelError::Invalid)?;
        staged.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn seek(&mut self, handle: usize, pos: u32) -> KernelResult<u32> {
        self.fs.seek(handle, pos)
    }

    fn stat(&mut self, path: &str) -> KernelResult<(u32, u8)> {
        self.fs.stat(path)
    }

    fn readdir(&mut self, path: &str) -> KernelResult<Vec<DirListing>> {
        let mut out = Vec::new();
        if path.is_empty() || path == "/" {
            self.fs.enumerate_root(&mut |name, size, attr| {
                out.push(DirListing {
                    name: name.to_string(),
                    size,
                    attr,
                })
            })?;
        } else {
            self.fs.enumerate_subdir(path, &mut |name, size, attr| {
                out.push(DirListing {
                    name: name.to_string(),
                    size,
                    attr,
                })
            })?;
        }
        Ok(out)
    }

    fn mkdir(&mut self, path: &str) -> KernelResult<()> {
        if path.contains('/') {
            return Err(KernelError::Unsupported);
        }
        self.fs.mkdir(path)
    }

    fn unlink(&mut self, path: &str) -> KernelResult<()> {
        self.fs.delete(path)
    }

    fn rename(&mut self, from: &str, to: &str) -> KernelResult<()> {
        let data = self.read_all(from)?;
        self.write_all(to, &data)?;
        self.fs.delete(from)
    }

    fn copy_file(&mut self, from: &str, to: &str) -> KernelResult<()> {
        let data = self.read_all(from)?;
        self.write_all(to, &data)
    }

    fn read_all(&mut self, path: &str) -> KernelResult<Vec<u8>> {
        if self.is_dir(path) {
            return Err(KernelError::Invalid);
        }
        let (size, _) = self.fs.stat(path)?;
        let handle = self.fs.open(path)?;
        let mut buf = alloc::vec![0u8; size as usize];
        let n = self.fs.read(handle, &mut buf, size as usize)?;
        self.fs.close(handle)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn write_all(&mut self, path: &str, data: &[u8]) -> KernelResult<()> {
        let _ = to_83(path.rsplit('/').next().unwrap_or(path))?;
        self.fs.write_file(path, data, data.len())
    }

    fn read_text(&mut self, path: &str) -> KernelResult<String> {
        let bytes = self.read_all(path)?;
        String::from_utf8(bytes).map_err(|_| KernelError::Invalid)
    }

    fn write_text(&mut self, path: &str, text: &str) -> KernelResult<()> {
        self.write_all(path, text.as_bytes())
    }

    fn flush(&mut self) {
        for err in self.fs.sync() {
            log::warn!("fat16 writeback failed: lba={} err={}", err.0, err.1);
        }
    }
}
