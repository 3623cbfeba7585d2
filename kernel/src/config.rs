//! Compile-time layout and sizing constants shared across subsystems.

/// Page size in bytes. Fixed at the standard x86 4 KiB page.
pub const PAGE_SIZE: u32 = 4096;

/// First address managed by the [`crate::memory::frame_allocator`].
/// Everything below this is the kernel image itself.
pub const KERNEL_END: u32 = 0x0010_0000; // 1 MiB

/// End of the identity-mapped physical range (exclusive).
pub const IDENTITY_MAP_CEILING: u32 = 32 * 1024 * 1024; // 32 MiB

/// Number of page frames tracked by the allocator.
pub const FRAME_COUNT: usize = ((IDENTITY_MAP_CEILING - KERNEL_END) / PAGE_SIZE) as usize;

/// Byte size of the kernel heap, grown one page at a time up to this cap.
pub const HEAP_MAX_SIZE: usize = 8 * 1024 * 1024; // 8 MiB

/// Sector size assumed by every block device in this core.
pub const SECTOR_SIZE: usize = 512;

/// Number of entries in the block cache.
pub const CACHE_ENTRIES: usize = 64;

/// Periodic flush interval, expressed in timer ticks at 100 Hz (5 seconds).
pub const FLUSH_INTERVAL_TICKS: u32 = 500;

/// Maximum number of live process control blocks.
pub const MAX_PROCESSES: usize = 32;

/// Maximum number of concurrently open FAT16 file handles.
pub const MAX_FILE_HANDLES: usize = 8;

/// Number of scheduler priority levels.
pub const PRIORITY_LEVELS: usize = 8;

/// Default priority assigned to newly created processes.
pub const DEFAULT_PRIORITY: u8 = 4;

/// Per-priority quantum length in timer ticks, index 0 = highest priority.
pub const QUANTUM_TABLE: [u32; PRIORITY_LEVELS] = [50, 45, 40, 30, 25, 20, 15, 10];

/// Default kernel-assigned stack size for a new process, in bytes.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// ELF32 programs get a stack four times the default size; the embedded
/// self-hosted compiler the loader targets needs the extra headroom.
pub const ELF_STACK_MULTIPLIER: usize = 4;

/// Lower bound (inclusive) of valid ELF32 load addresses.
pub const ELF_LOAD_FLOOR: u32 = 4 * 1024 * 1024;

/// Upper bound (exclusive) of valid ELF32 load addresses; matches the
/// identity map ceiling.
pub const ELF_LOAD_CEILING: u32 = IDENTITY_MAP_CEILING;

/// Largest permitted span between the lowest and highest byte of any
/// PT_LOAD segment set.
pub const ELF_MAX_SPAN: u32 = 1024 * 1024;

/// Largest permitted total size (code + data + bss) of a flat binary.
pub const FLAT_MAX_IMAGE_SIZE: u32 = 256 * 1024;

/// Maximum number of PT_LOAD program headers accepted by the ELF loader.
pub const ELF_MAX_PROGRAM_HEADERS: usize = 16;
