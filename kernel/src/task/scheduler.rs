//! Multi-level (8-priority) FIFO ready queues and quantum accounting.
//!
//! The deferred-reschedule flag is set from timer-IRQ context and only
//! ever consumed at a voluntary checkpoint (see [`crate::process::manager`]
//! `yield_point`), so it is the one piece of scheduler state that stays a
//! process-wide static rather than a `Kernel`-owned field — an IRQ
//! handler cannot safely borrow into the aggregate.

use crate::config::{MAX_PROCESSES, PRIORITY_LEVELS, QUANTUM_TABLE};
use crate::process::pcb::{Pcb, ProcessState, IDLE_PID};
use alloc::collections::VecDeque;
use core::sync::atomic::{AtomicBool, Ordering};

static NEED_RESCHEDULE: AtomicBool = AtomicBool::new(false);

/// Called from the timer ISR once a quantum has expired. Sets the flag
/// only; it must never itself switch contexts.
pub fn set_need_reschedule() {
    NEED_RESCHEDULE.store(true, Ordering::SeqCst);
}

/// Tested and cleared at a voluntary checkpoint.
pub fn take_need_reschedule() -> bool {
    NEED_RESCHEDULE.swap(false, Ordering::SeqCst)
}

#[cfg(any(test, feature = "testing"))]
pub fn peek_need_reschedule() -> bool {
    NEED_RESCHEDULE.load(Ordering::SeqCst)
}

pub struct Scheduler {
    queues: [VecDeque<u32>; PRIORITY_LEVELS],
    enabled: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|_| VecDeque::with_capacity(MAX_PROCESSES)),
            enabled: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Appends `pcb.pid` to its priority's queue.
    pub fn add(&mut self, pcb: &Pcb) {
        self.queues[pcb.priority as usize].push_back(pcb.pid);
    }

    /// O(n) scan within `priority`'s queue, closing the gap.
    pub fn remove(&mut self, pid: u32, priority: u8) {
        self.queues[priority as usize].retain(|&p| p != pid);
    }

    /// Scans priorities 0..=7 in order; returns and dequeues the head of
    /// the first non-empty queue. Falls back to the idle pid if every
    /// queue is empty.
    pub fn next(&mut self) -> u32 {
        for queue in self.queues.iter_mut() {
            if let Some(pid) = queue.pop_front() {
                return pid;
            }
        }
        IDLE_PID
    }

    /// Advances quantum accounting for the currently running process.
    /// Returns `true` iff its quantum has just expired.
    pub fn tick(&self, current: &mut Pcb) -> bool {
        if !self.enabled || current.state != ProcessState::Running {
            return false;
        }
        current.ticks_used += 1;
        current.quantum_remaining = current.quantum_remaining.saturating_sub(1);
        current.quantum_remaining == 0
    }

    pub fn quantum_for(priority: u8) -> u32 {
        QUANTUM_TABLE[priority as usize]
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::pcb::Pcb;

    fn pcb(pid: u32, priority: u8) -> Pcb {
        let mut p = Pcb::free();
        p.pid = pid;
        p.priority = priority;
        p.state = ProcessState::Ready;
        p.quantum_remaining = Scheduler::quantum_for(priority);
        p.quantum_total = p.quantum_remaining;
        p
    }

    #[test_case]
    fn higher_priority_dispatched_first() {
        let mut sched = Scheduler::new();
        sched.add(&pcb(2, 4));
        sched.add(&pcb(3, 0));
        assert_eq!(sched.next(), 3);
        assert_eq!(sched.next(), 2);
    }

    #[test_case]
    fn round_robin_within_a_level() {
        let mut sched = Scheduler::new();
        sched.add(&pcb(2, 4));
        sched.add(&pcb(3, 4));
        sched.add(&pcb(4, 4));
        assert_eq!(sched.next(), 2);
        assert_eq!(sched.next(), 3);
        assert_eq!(sched.next(), 4);
    }

    #[test_case]
    fn empty_queues_fall_back_to_idle() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.next(), IDLE_PID);
    }

    #[test_case]
    fn tick_expires_at_zero_quantum() {
        let sched = Scheduler::new();
        let mut p = pcb(5, 7);
        p.state = ProcessState::Running;
        p.quantum_remaining = 1;
        assert!(sched.tick(&mut p));
        assert_eq!(p.ticks_used, 1);
    }

    #[test_case]
    fn tick_on_non_running_pcb_is_a_no_op() {
        let sched = Scheduler::new();
        let mut p = pcb(5, 7);
        assert!(!sched.tick(&mut p));
        assert_eq!(p.ticks_used, 0);
    }

    #[test_case]
    fn deferred_reschedule_flag_is_set_then_cleared() {
        set_need_reschedule();
        assert!(take_need_reschedule());
        assert!(!take_need_reschedule());
    }

    #[test_case]
    fn remove_closes_the_gap() {
        let mut sched = Scheduler::new();
        sched.add(&pcb(2, 4));
        sched.add(&pcb(3, 4));
        sched.remove(2, 4);
        assert_eq!(sched.next(), 3);
    }
}
