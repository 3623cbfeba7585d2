//! Process table, PCB layout, and the voluntary context switch.

pub mod manager;
pub mod pcb;
pub mod switch;

pub use manager::ProcessManager;
pub use pcb::{ImageRegion, ImageSource, Pcb, ProcessState, SavedRegisters, IDLE_PID};
