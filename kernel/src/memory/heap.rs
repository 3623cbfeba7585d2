//! Free-list heap grown one page at a time from the [`super::frame_allocator`].

use crate::config::{HEAP_MAX_SIZE, PAGE_SIZE};
use linked_list_allocator::LockedHeap;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Bring the heap up with a single initial page; it grows on demand via
/// [`grow`] as allocations outrun the current free-list capacity.
pub fn init() {
    let frame = super::frame_allocator::allocate_frame().expect("no frames for initial heap page");
    unsafe {
        ALLOCATOR.lock().init(frame as *mut u8, PAGE_SIZE as usize);
    }
}

/// Extend the heap by one more page, up to [`HEAP_MAX_SIZE`].
///
/// Returns `false` if the heap is already at its cap or no frame is
/// available; the caller (the allocation-error handler) treats that as
/// out-of-memory.
pub fn grow() -> bool {
    if stats().size >= HEAP_MAX_SIZE {
        return false;
    }
    match super::frame_allocator::allocate_frame() {
        Some(frame) => {
            unsafe {
                ALLOCATOR.lock().extend(PAGE_SIZE as usize);
            }
            let _ = frame; // frame address is implicitly the next heap page in the identity map
            true
        }
        None => false,
    }
}

/// Heap usage statistics.
pub struct HeapStats {
    pub size: usize,
    pub used: usize,
    pub free: usize,
}

pub fn stats() -> HeapStats {
    let heap = ALLOCATOR.lock();
    HeapStats {
        size: heap.size(),
        used: heap.used(),
        free: heap.free(),
    }
}

#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    if grow() {
        // The allocator will be retried by the caller on most targets;
        // here there is no retry path, so this remains fatal for now.
    }
    panic!("allocation error: {:?}", layout)
}
