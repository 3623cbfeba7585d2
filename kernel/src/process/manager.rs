//! Owns the process table and is the only place a context switch happens.
//!
//! The PCB table is a fixed 32-slot array (pids assigned monotonically,
//! never reused within a boot). Every operation here is synchronous and
//! runs with the caller's interrupts already disabled by convention —
//! this core has no internal locking of its own.

use super::pcb::{ImageRegion, ImageSource, Pcb, ProcessState, SavedRegisters, IDLE_PID};
use super::switch::context_switch;
use crate::config::{MAX_PROCESSES, PRIORITY_LEVELS};
use crate::error::{KernelError, KernelResult};
use crate::task::scheduler::{take_need_reschedule, Scheduler};
use alloc::string::String;

pub struct ProcessManager {
    table: [Pcb; MAX_PROCESSES],
    scheduler: Scheduler,
    next_pid: u32,
    current: u32,
}

impl ProcessManager {
    pub fn new() -> Self {
        let mut mgr = Self {
            table: core::array::from_fn(|_| Pcb::free()),
            scheduler: Scheduler::new(),
            next_pid: IDLE_PID,
            current: IDLE_PID,
        };
        mgr.spawn_idle();
        mgr
    }

    fn spawn_idle(&mut self) {
        let slot = &mut self.table[0];
        slot.pid = IDLE_PID;
        slot.name = String::from("idle");
        slot.state = ProcessState::Running;
        slot.priority = (PRIORITY_LEVELS - 1) as u8;
        slot.quantum_remaining = Scheduler::quantum_for(slot.priority);
        slot.quantum_total = slot.quantum_remaining;
        self.next_pid = IDLE_PID + 1;
    }

    fn find_slot(&self, pid: u32) -> Option<usize> {
        self.table.iter().position(|p| p.pid == pid && p.state != ProcessState::Free)
    }

    fn free_slot(&self) -> KernelResult<usize> {
        self.table
            .iter()
            .position(|p| p.state == ProcessState::Free)
            .ok_or(KernelError::NoSpace)
    }

    /// Creates a new Ready process at `priority` and places it on the
    /// scheduler's ready queue. Returns its pid.
    pub fn create(&mut self, name: &str, priority: u8) -> KernelResult<u32> {
        self.create_with_arg(name, priority, None)
    }

    pub fn create_with_arg(
        &mut self,
        name: &str,
        priority: u8,
        argv: Option<String>,
    ) -> KernelResult<u32> {
        if priority as usize >= PRIORITY_LEVELS {
            return Err(KernelError::Invalid);
        }
        let slot = self.free_slot()?;
        let pid = self.next_pid;
        self.next_pid += 1;

        let pcb = &mut self.table[slot];
        *pcb = Pcb::free();
        pcb.pid = pid;
        pcb.name = String::from(name);
        pcb.priority = priority;
        pcb.state = ProcessState::Ready;
        pcb.quantum_remaining = Scheduler::quantum_for(priority);
        pcb.quantum_total = pcb.quantum_remaining;
        pcb.parent_pid = self.current;
        pcb.argv = argv;

        self.scheduler.add(pcb);
        Ok(pid)
    }

    /// Adopts the calling control flow as a new PCB — pid 2, the first
    /// non-idle process, on the first call after boot. Unlike `create`,
    /// the new PCB needs no synthetic stack frame to resume into: it is
    /// already running, so it starts Running and current rather than
    /// Ready and queued.
    pub fn register_current(&mut self, name: &str) -> KernelResult<u32> {
        let slot = self.free_slot()?;
        let pid = self.next_pid;
        self.next_pid += 1;

        let pcb = &mut self.table[slot];
        *pcb = Pcb::free();
        pcb.pid = pid;
        pcb.name = String::from(name);
        pcb.priority = crate::config::DEFAULT_PRIORITY;
        pcb.state = ProcessState::Running;
        pcb.quantum_remaining = Scheduler::quantum_for(pcb.priority);
        pcb.quantum_total = pcb.quantum_remaining;
        pcb.parent_pid = IDLE_PID;

        self.current = pid;
        Ok(pid)
    }

    pub fn current_pid(&self) -> u32 {
        self.current
    }

    pub fn get(&self, pid: u32) -> Option<&Pcb> {
        self.find_slot(pid).map(|i| &self.table[i])
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut Pcb> {
        self.find_slot(pid).map(move |i| &mut self.table[i])
    }

    pub fn set_image(&mut self, pid: u32, image: ImageRegion) -> KernelResult<()> {
        let pcb = self.get_mut(pid).ok_or(KernelError::NotFound)?;
        pcb.image = Some(image);
        Ok(())
    }

    pub fn set_program_args(&mut self, pid: u32, argv: String) -> KernelResult<()> {
        let pcb = self.get_mut(pid).ok_or(KernelError::NotFound)?;
        pcb.argv = Some(argv);
        Ok(())
    }

    /// Marks `pid` Terminated, removes it from the ready queue, and
    /// releases its image region if any. This core implements no
    /// `wait`, so nothing ever observes `exit_code`; the slot is
    /// intentionally never reclaimed afterward (see DESIGN.md).
    pub fn exit(&mut self, pid: u32, exit_code: i32) -> KernelResult<()> {
        let slot = self.find_slot(pid).ok_or(KernelError::NotFound)?;
        let priority = self.table[slot].priority;
        self.scheduler.remove(pid, priority);
        self.table[slot].state = ProcessState::Terminated;
        self.table[slot].exit_code = exit_code;
        if let Some(image) = self.table[slot].image.take() {
            release_image(image);
        }
        Ok(())
    }

    pub fn kill(&mut self, pid: u32) -> KernelResult<()> {
        if pid == IDLE_PID {
            return Err(KernelError::Invalid);
        }
        self.exit(pid, -1)
    }

    pub fn block(&mut self, pid: u32) -> KernelResult<()> {
        let slot = self.find_slot(pid).ok_or(KernelError::NotFound)?;
        let priority = self.table[slot].priority;
        self.scheduler.remove(pid, priority);
        self.table[slot].state = ProcessState::Blocked;
        Ok(())
    }

    pub fn unblock(&mut self, pid: u32) -> KernelResult<()> {
        let slot = self.find_slot(pid).ok_or(KernelError::NotFound)?;
        if self.table[slot].state != ProcessState::Blocked {
            return Err(KernelError::Invalid);
        }
        self.table[slot].state = ProcessState::Ready;
        self.table[slot].quantum_remaining = Scheduler::quantum_for(self.table[slot].priority);
        self.scheduler.add(&self.table[slot]);
        Ok(())
    }

    /// Called once per timer tick by the IRQ handler, on the currently
    /// running pcb. Sets the deferred-reschedule flag if the quantum
    /// just expired; never switches.
    pub fn tick_current(&mut self) {
        let Some(slot) = self.find_slot(self.current) else {
            return;
        };
        if self.scheduler.tick(&mut self.table[slot]) {
            crate::task::scheduler::set_need_reschedule();
        }
    }

    /// The single callsite that consults the deferred-reschedule flag.
    /// Called at voluntary checkpoints (syscall return, idle loop). A
    /// no-op if no switch is pending.
    pub fn yield_point(&mut self) {
        if take_need_reschedule() {
            self.switch_to_next();
        }
    }

    /// Forces a switch regardless of the flag (used by `block` callers
    /// that must give up the CPU immediately rather than wait for the
    /// next checkpoint).
    pub fn yield_now(&mut self) {
        self.switch_to_next();
    }

    fn switch_to_next(&mut self) {
        let old_pid = self.current;
        let next_pid = self.scheduler.next();
        if next_pid == old_pid {
            return;
        }

        if let Some(slot) = self.find_slot(old_pid) {
            if self.table[slot].state == ProcessState::Running {
                self.table[slot].state = ProcessState::Ready;
                self.table[slot].quantum_remaining =
                    Scheduler::quantum_for(self.table[slot].priority);
                self.scheduler.add(&self.table[slot]);
            }
        }

        let Some(new_slot) = self.find_slot(next_pid) else {
            return;
        };
        self.table[new_slot].state = ProcessState::Running;
        self.current = next_pid;

        let old_regs = self
            .find_slot(old_pid)
            .map(|i| &mut self.table[i].registers as *mut SavedRegisters)
            .unwrap_or(core::ptr::null_mut());
        let new_regs = &self.table[new_slot].registers as *const _;

        // SAFETY: both pcbs are live table entries owned by this
        // manager for the duration of the switch.
        unsafe {
            if !old_regs.is_null() {
                context_switch(old_regs, new_regs);
            }
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Gives an exited process's image memory back to whichever allocator
/// originally provided it.
fn release_image(image: ImageRegion) {
    match image.source {
        ImageSource::ReservedFrames => {
            if let Err(e) = crate::memory::frame_allocator::release_region(image.base, image.size) {
                log::warn!("failed to release image region {:#x}: {e}", image.base);
            }
        }
        ImageSource::HeapBlock => {
            let Ok(layout) = core::alloc::Layout::from_size_align(
                image.size as usize,
                crate::config::PAGE_SIZE as usize,
            ) else {
                return;
            };
            // SAFETY: `image.base` was returned by `alloc::alloc::alloc`
            // with this exact layout in `crate::loader::load_flat`, and
            // this is the only place that frees it.
            unsafe {
                alloc::alloc::dealloc(image.base as *mut u8, layout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn idle_process_exists_at_boot() {
        let mgr = ProcessManager::new();
        assert_eq!(mgr.current_pid(), IDLE_PID);
        assert!(mgr.get(IDLE_PID).is_some());
    }

    #[test_case]
    fn create_assigns_increasing_pids() {
        let mut mgr = ProcessManager::new();
        let a = mgr.create("a", 4).unwrap();
        let b = mgr.create("b", 4).unwrap();
        assert!(b > a);
    }

    #[test_case]
    fn create_rejects_out_of_range_priority() {
        let mut mgr = ProcessManager::new();
        assert_eq!(mgr.create("x", 200).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn table_exhaustion_is_no_space() {
        let mut mgr = ProcessManager::new();
        for i in 0..(MAX_PROCESSES - 1) {
            mgr.create_with_arg(&alloc::format!("p{i}"), 4, None).unwrap();
        }
        assert_eq!(
            mgr.create("overflow", 4).unwrap_err(),
            KernelError::NoSpace
        );
    }

    #[test_case]
    fn exit_frees_the_slot_for_reuse() {
        let mut mgr = ProcessManager::new();
        let pid = mgr.create("a", 4).unwrap();
        mgr.exit(pid, 0).unwrap();
        assert_eq!(mgr.get(pid).unwrap().state, ProcessState::Terminated);
    }

    #[test_case]
    fn block_then_unblock_restores_ready_state() {
        let mut mgr = ProcessManager::new();
        let pid = mgr.create("a", 4).unwrap();
        mgr.block(pid).unwrap();
        assert_eq!(mgr.get(pid).unwrap().state, ProcessState::Blocked);
        mgr.unblock(pid).unwrap();
        assert_eq!(mgr.get(pid).unwrap().state, ProcessState::Ready);
    }

    #[test_case]
    fn unblock_on_a_ready_pcb_is_rejected() {
        let mut mgr = ProcessManager::new();
        let pid = mgr.create("a", 4).unwrap();
        assert_eq!(mgr.unblock(pid).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn kill_refuses_the_idle_process() {
        let mut mgr = ProcessManager::new();
        assert_eq!(mgr.kill(IDLE_PID).unwrap_err(), KernelError::Invalid);
    }

    #[test_case]
    fn yield_point_is_a_no_op_without_a_pending_flag() {
        let mut mgr = ProcessManager::new();
        let before = mgr.current_pid();
        mgr.yield_point();
        assert_eq!(mgr.current_pid(), before);
    }

    #[test_case]
    fn register_current_adopts_pid_2_as_running() {
        let mut mgr = ProcessManager::new();
        let pid = mgr.register_current("init").unwrap();
        assert_eq!(pid, IDLE_PID + 1);
        assert_eq!(mgr.current_pid(), pid);
        assert_eq!(mgr.get(pid).unwrap().state, ProcessState::Running);
    }

    #[test_case]
    fn yield_now_switches_to_the_next_ready_process() {
        let mut mgr = ProcessManager::new();
        let pid = mgr.create("a", 0).unwrap();
        mgr.yield_now();
        assert_eq!(mgr.current_pid(), pid);
    }
}
