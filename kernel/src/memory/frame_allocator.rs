//! PhysicalAllocator: a bitmap over the fixed identity-mapped range.
//!
//! Frames below [`crate::config::KERNEL_END`] are never tracked; the
//! allocator only manages the range
//! `[KERNEL_END, IDENTITY_MAP_CEILING)`.

use crate::config::{FRAME_COUNT, IDENTITY_MAP_CEILING, KERNEL_END, PAGE_SIZE};
use crate::error::{KernelError, KernelResult};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Free,
    Allocated,
    Reserved,
}

/// Bitmap-backed first-fit page frame allocator.
pub struct PhysicalAllocator {
    states: alloc::vec::Vec<FrameState>,
    free: usize,
    allocated: usize,
    reserved: usize,
}

impl PhysicalAllocator {
    /// Build an allocator over the whole identity-mapped range, all
    /// frames initially free.
    pub fn new() -> Self {
        Self {
            states: alloc::vec![FrameState::Free; FRAME_COUNT],
            free: FRAME_COUNT,
            allocated: 0,
            reserved: 0,
        }
    }

    fn index_of(addr: u32) -> Option<usize> {
        if addr < KERNEL_END || addr >= IDENTITY_MAP_CEILING || addr % PAGE_SIZE != 0 {
            return None;
        }
        Some(((addr - KERNEL_END) / PAGE_SIZE) as usize)
    }

    fn addr_of(index: usize) -> u32 {
        KERNEL_END + (index as u32) * PAGE_SIZE
    }

    /// Returns the lowest-address free frame, marking it allocated.
    pub fn allocate_page(&mut self) -> Option<u32> {
        let idx = self.states.iter().position(|s| *s == FrameState::Free)?;
        self.states[idx] = FrameState::Allocated;
        self.free -= 1;
        self.allocated += 1;
        Some(Self::addr_of(idx))
    }

    /// Marks a previously allocated, page-aligned frame free.
    ///
    /// # Panics
    /// Panics on a double-free or on an address that was never
    /// allocated — this mirrors spec's "double-free is a fatal error".
    pub fn free_page(&mut self, addr: u32) {
        let idx = Self::index_of(addr).expect("free_page: address not page-aligned or out of range");
        match self.states[idx] {
            FrameState::Allocated => {
                self.states[idx] = FrameState::Free;
                self.allocated -= 1;
                self.free += 1;
            }
            FrameState::Free => panic!("double free of frame {:#x}", addr),
            FrameState::Reserved => panic!("free_page on reserved frame {:#x}", addr),
        }
    }

    /// Marks every frame in `[base, base+size)`, rounded outward to page
    /// boundaries, reserved. Fails with [`KernelError::Busy`] if any
    /// frame in the span is already `Allocated` (owned by the heap),
    /// rather than silently stealing it out from under its owner.
    pub fn reserve_region(&mut self, base: u32, size: u32) -> KernelResult<()> {
        let (start, end) = Self::align_span(base, size)?;
        if self.states[start..end].iter().any(|s| *s == FrameState::Allocated) {
            return Err(KernelError::Busy);
        }
        for idx in start..end {
            if self.states[idx] == FrameState::Free {
                self.free -= 1;
            }
            self.states[idx] = FrameState::Reserved;
            self.reserved += 1;
        }
        Ok(())
    }

    /// Inverse of [`Self::reserve_region`]: returns the frames to free.
    pub fn release_region(&mut self, base: u32, size: u32) -> KernelResult<()> {
        let (start, end) = Self::align_span(base, size)?;
        for idx in start..end {
            debug_assert_eq!(self.states[idx], FrameState::Reserved);
            self.states[idx] = FrameState::Free;
            self.reserved -= 1;
            self.free += 1;
        }
        Ok(())
    }

    /// Rounds `[base, base+size)` outward to page boundaries, returning
    /// the aligned bounds as addresses. Callers that reserve a region
    /// (e.g. the loader) must zero this full range, not the raw
    /// `[base, base+size)` passed in — the aligned portion can extend
    /// below `base` and above `base+size` and those alignment-gap bytes
    /// are otherwise never touched.
    pub fn aligned_bounds(base: u32, size: u32) -> KernelResult<(u32, u32)> {
        if size == 0 {
            return Err(KernelError::Invalid);
        }
        let aligned_base = base - (base % PAGE_SIZE);
        let end_addr = base.checked_add(size).ok_or(KernelError::Invalid)?;
        let aligned_end = (end_addr + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;
        Ok((aligned_base, aligned_end))
    }

    fn align_span(base: u32, size: u32) -> KernelResult<(usize, usize)> {
        let (aligned_base, aligned_end) = Self::aligned_bounds(base, size)?;
        let start_idx = Self::index_of(aligned_base).ok_or(KernelError::Invalid)?;
        // `aligned_end` is exclusive and may equal the ceiling exactly.
        let end_idx = if aligned_end == IDENTITY_MAP_CEILING {
            FRAME_COUNT
        } else {
            Self::index_of(aligned_end).ok_or(KernelError::Invalid)?
        };
        if end_idx <= start_idx {
            return Err(KernelError::Invalid);
        }
        Ok((start_idx, end_idx))
    }

    pub fn total_frames(&self) -> usize {
        FRAME_COUNT
    }

    pub fn free_frames(&self) -> usize {
        self.free
    }

    pub fn allocated_frames(&self) -> usize {
        self.allocated
    }

    pub fn reserved_frames(&self) -> usize {
        self.reserved
    }
}

impl Default for PhysicalAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Global allocator instance, initialized once during boot. The heap
/// itself must bootstrap frames from here before `alloc::Vec` can be
/// used to back the allocator's own bitmap, so this stays a process-wide
/// static rather than a `Kernel`-owned field — the one case Design Notes
/// explicitly carves out.
pub static ALLOCATOR: Mutex<Option<PhysicalAllocator>> = Mutex::new(None);

/// Initialize the global allocator. Must run once, before the heap.
pub fn init() {
    *ALLOCATOR.lock() = Some(PhysicalAllocator::new());
}

/// Allocate a single page frame from the global allocator.
pub fn allocate_frame() -> Option<u32> {
    ALLOCATOR.lock().as_mut().expect("allocator not initialized").allocate_page()
}

/// Free a single page frame via the global allocator.
pub fn free_frame(addr: u32) {
    ALLOCATOR.lock().as_mut().expect("allocator not initialized").free_page(addr)
}

/// Reserve `[base, base+size)` via the global allocator. Used by the
/// loader to carve out a program image's physical region.
pub fn reserve_region(base: u32, size: u32) -> KernelResult<()> {
    ALLOCATOR
        .lock()
        .as_mut()
        .expect("allocator not initialized")
        .reserve_region(base, size)
}

/// Release a region previously reserved via [`reserve_region`].
pub fn release_region(base: u32, size: u32) -> KernelResult<()> {
    ALLOCATOR
        .lock()
        .as_mut()
        .expect("allocator not initialized")
        .release_region(base, size)
}

/// Page-aligned bounds `reserve_region(base, size)` will actually cover.
/// Callers must zero this full range, not `[base, base+size)`.
pub fn aligned_bounds(base: u32, size: u32) -> KernelResult<(u32, u32)> {
    PhysicalAllocator::aligned_bounds(base, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> PhysicalAllocator {
        PhysicalAllocator::new()
    }

    #[test_case]
    fn allocate_returns_lowest_free_frame() {
        let mut a = fresh();
        let first = a.allocate_page().unwrap();
        assert_eq!(first, KERNEL_END);
        let second = a.allocate_page().unwrap();
        assert_eq!(second, KERNEL_END + PAGE_SIZE);
    }

    #[test_case]
    fn free_then_allocate_reuses_frame() {
        let mut a = fresh();
        let p = a.allocate_page().unwrap();
        a.free_page(p);
        let reused = a.allocate_page().unwrap();
        assert_eq!(reused, p);
    }

    #[test_case]
    #[should_panic]
    fn double_free_panics() {
        let mut a = fresh();
        let p = a.allocate_page().unwrap();
        a.free_page(p);
        a.free_page(p);
    }

    #[test_case]
    fn reserve_then_release_restores_counts() {
        let mut a = fresh();
        let before_free = a.free_frames();
        a.reserve_region(KERNEL_END, PAGE_SIZE * 4).unwrap();
        assert_eq!(a.reserved_frames(), 4);
        assert_eq!(a.free_frames(), before_free - 4);
        a.release_region(KERNEL_END, PAGE_SIZE * 4).unwrap();
        assert_eq!(a.reserved_frames(), 0);
        assert_eq!(a.free_frames(), before_free);
    }

    #[test_case]
    fn frame_count_conserved() {
        let mut a = fresh();
        a.allocate_page();
        a.allocate_page();
        a.reserve_region(KERNEL_END + PAGE_SIZE * 10, PAGE_SIZE * 3).unwrap();
        assert_eq!(a.free_frames() + a.allocated_frames() + a.reserved_frames(), a.total_frames());
    }

    #[test_case]
    fn reserve_rejects_frame_already_allocated() {
        let mut a = fresh();
        let allocated = a.allocate_page().unwrap();
        assert_eq!(a.reserve_region(allocated, PAGE_SIZE), Err(KernelError::Busy));
        assert_eq!(a.allocated_frames(), 1);
        assert_eq!(a.reserved_frames(), 0);
    }

    #[test_case]
    fn aligned_bounds_rounds_outward() {
        let base = KERNEL_END + 100;
        let (start, end) = PhysicalAllocator::aligned_bounds(base, PAGE_SIZE).unwrap();
        assert_eq!(start, KERNEL_END);
        assert_eq!(end, KERNEL_END + PAGE_SIZE * 2);
    }
}
