//! Memory core: [`frame_allocator::PhysicalAllocator`] plus a heap grown
//! from it.

pub mod frame_allocator;
pub mod heap;

/// Bring up the memory core. Must run before any `alloc` use.
pub fn init() {
    frame_allocator::init();
    heap::init();
}
