//! Dual-format executable loader: detects ELF32 i386 vs. flat "CUPD",
//! reserves and zeroes the target physical region, copies the image in,
//! and hands off to [`crate::process::ProcessManager`].

pub mod elf;
pub mod flat;

use crate::config::DEFAULT_STACK_SIZE;
use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::memory::frame_allocator;
use crate::process::{ImageRegion, ImageSource, SavedRegisters};
use alloc::string::String;

/// Loads `file` (already read in full from the VFS) as a new process and
/// yields immediately so it gets a slice, per spec. Returns the new pid.
pub fn load(kernel: &mut Kernel, name: &str, file: &[u8], argv: Option<String>) -> KernelResult<u32> {
    if file.len() >= 4 && file[0..4] == elf::ELF_MAGIC {
        load_elf(kernel, name, file, argv)
    } else if file.len() >= 4 && u32::from_le_bytes([file[0], file[1], file[2], file[3]]) == flat::CUPD_MAGIC {
        load_flat(kernel, name, file, argv)
    } else {
        Err(KernelError::Invalid)
    }
}

fn load_elf(kernel: &mut Kernel, name: &str, file: &[u8], argv: Option<String>) -> KernelResult<u32> {
    let image = elf::decode(file)?;
    frame_allocator::reserve_region(image.span_base, image.span_size)?;

    // reserve_region rounds [span_base, span_base+span_size) outward to
    // page boundaries before claiming frames; zero that whole aligned
    // range; otherwise the alignment-gap bytes at the edges of the
    // first/last page keep whatever the previous owner left there.
    let (aligned_base, aligned_end) = frame_allocator::aligned_bounds(image.span_base, image.span_size)?;

    // SAFETY: the region was just reserved by this call and is not yet
    // visible to any other process; zeroing and writing segment data
    // into it is exclusive.
    unsafe {
        core::ptr::write_bytes(aligned_base as *mut u8, 0, (aligned_end - aligned_base) as usize);
        image.copy_segments_into(image.span_base);
    }

    let pid = match spawn(
        kernel,
        name,
        crate::config::DEFAULT_PRIORITY,
        argv,
        image.entry,
        ImageRegion {
            base: image.span_base,
            size: image.span_size,
            source: ImageSource::ReservedFrames,
        },
        DEFAULT_STACK_SIZE * crate::config::ELF_STACK_MULTIPLIER,
    ) {
        Ok(pid) => pid,
        Err(e) => {
            let _ = frame_allocator::release_region(image.span_base, image.span_size);
            return Err(e);
        }
    };

    kernel.process.yield_point();
    Ok(pid)
}

fn load_flat(kernel: &mut Kernel, name: &str, file: &[u8], argv: Option<String>) -> KernelResult<u32> {
    let image = flat::decode(file)?;
    let size = image.header.total_size() as usize;

    // Flat images get one heap block rather than a reserved frame span —
    // the "allocate one heap block of the total size" branch in §4.9,
    // distinct from ELF's identity-mapped frame reservation.
    let layout = core::alloc::Layout::from_size_align(size, crate::config::PAGE_SIZE as usize)
        .map_err(|_| KernelError::Invalid)?;
    // SAFETY: `layout` has nonzero size (validated by `flat::decode`).
    let ptr = unsafe { alloc::alloc::alloc(layout) };
    if ptr.is_null() {
        return Err(KernelError::NoSpace);
    }
    // SAFETY: `ptr` is a freshly allocated, exclusively owned block of
    // at least `image.bytes.len()` bytes.
    unsafe {
        core::ptr::copy_nonoverlapping(image.bytes.as_ptr(), ptr, image.bytes.len());
    }

    let base = ptr as u32;
    let entry = base + image.header.entry_offset;
    let pid = spawn(
        kernel,
        name,
        crate::config::DEFAULT_PRIORITY,
        argv,
        entry,
        ImageRegion {
            base,
            size: size as u32,
            source: ImageSource::HeapBlock,
        },
        DEFAULT_STACK_SIZE,
    )?;

    kernel.process.yield_point();
    Ok(pid)
}

fn spawn(
    kernel: &mut Kernel,
    name: &str,
    priority: u8,
    argv: Option<String>,
    entry: u32,
    image: ImageRegion,
    stack_size: usize,
) -> KernelResult<u32> {
    let pid = kernel.process.create_with_arg(name, priority, argv)?;
    kernel.process.set_image(pid, image)?;
    let pcb = kernel.process.get_mut(pid).ok_or(KernelError::NotFound)?;
    pcb.stack_size = stack_size as u32;
    pcb.registers = SavedRegisters {
        eip: entry,
        ..SavedRegisters::default()
    };
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn rejects_unrecognized_magic() {
        let mut kernel = Kernel::new();
        assert_eq!(
            load(&mut kernel, "x", &[0, 0, 0, 0], None).unwrap_err(),
            KernelError::Invalid
        );
    }

    #[test_case]
    fn loads_a_flat_binary_and_schedules_it() {
        let mut kernel = Kernel::new();
        let mut file = alloc::vec::Vec::new();
        file.extend_from_slice(&flat::CUPD_MAGIC.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes()); // entry_offset
        file.extend_from_slice(&4u32.to_le_bytes()); // code_size
        file.extend_from_slice(&0u32.to_le_bytes()); // data_size
        file.extend_from_slice(&0u32.to_le_bytes()); // bss_size
        file.extend_from_slice(&[0x90; 4]);

        let before = kernel.process.current_pid();
        let pid = load(&mut kernel, "flat-test", &file, None).unwrap();
        assert!(kernel.process.get(pid).is_some());
        // yield_point only acts on a pending flag; a freshly created
        // process doesn't preempt the caller without one.
        assert_eq!(kernel.process.current_pid(), before);
    }
}
