//! Process control block layout and the saved-register set.

use alloc::string::String;

/// The pid reserved for the idle/fallback process. Always Ready when
/// nothing else is.
pub const IDLE_PID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Free,
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// Saved general-purpose register set restored on a context switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub esp: u32,
    pub eip: u32,
    pub eflags: u32,
}

/// Distinguishes how a loaded program's image memory was obtained, so
/// `exit` knows how to give it back: a frame-reserved ELF span goes
/// through the physical allocator's region bookkeeping, while a flat
/// binary's single heap block goes through the ordinary allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    ReservedFrames,
    HeapBlock,
}

/// A region of memory backing a loaded program image, released on exit.
#[derive(Debug, Clone, Copy)]
pub struct ImageRegion {
    pub base: u32,
    pub size: u32,
    pub source: ImageSource,
}

pub struct Pcb {
    pub pid: u32,
    pub name: String,
    pub registers: SavedRegisters,
    pub priority: u8,
    pub state: ProcessState,
    pub quantum_remaining: u32,
    pub quantum_total: u32,
    pub stack_base: u32,
    pub stack_size: u32,
    pub ticks_used: u64,
    pub parent_pid: u32,
    pub exit_code: i32,
    pub image: Option<ImageRegion>,
    pub argv: Option<String>,
}

impl Pcb {
    /// A fresh, unused slot.
    pub fn free() -> Self {
        Self {
            pid: 0,
            name: String::new(),
            registers: SavedRegisters::default(),
            priority: 0,
            state: ProcessState::Free,
            quantum_remaining: 0,
            quantum_total: 0,
            stack_base: 0,
            stack_size: 0,
            ticks_used: 0,
            parent_pid: 0,
            exit_code: 0,
            image: None,
            argv: None,
        }
    }
}
