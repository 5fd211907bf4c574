//! Prioritized interrupt delivery.
//!
//! Seven FIFO queues, one per priority 7..1, behind a single mutex, plus
//! an atomic pending flag the CPU loop polls between instructions.
//! Device threads post; the CPU thread consumes. Two posts at the same
//! priority are delivered in order; across priorities the higher one
//! always wins.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interrupt state between device threads and the CPU loop.
#[derive(Debug)]
pub struct InterruptLines {
    /// Index 0 holds priority 7, index 6 priority 1.
    queues: Mutex<[VecDeque<u8>; 7]>,
    pending: AtomicBool,
}

impl Default for InterruptLines {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptLines {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Default::default()),
            pending: AtomicBool::new(false),
        }
    }

    /// Post an interrupt. Priorities outside 1..=7 are ignored; the
    /// vector number is truncated to 8 bits.
    pub fn post(&self, prio: u32, vecno: u32) {
        if !(1..=7).contains(&prio) {
            return;
        }
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues[(7 - prio) as usize].push_back((vecno & 0xff) as u8);
        self.pending.store(true, Ordering::Release);
    }

    /// True when any queue holds an undelivered vector.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Take the highest-priority pending vector, subject to the current
    /// interrupt mask: a vector is deliverable when its priority is 7 or
    /// exceeds `mask`. Returns the priority and vector number.
    pub fn take(&self, mask: u16) -> Option<(u16, u8)> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        for (i, queue) in queues.iter_mut().enumerate() {
            if queue.is_empty() {
                continue;
            }
            let prio = 7 - i as u16;
            if prio != 7 && prio <= mask {
                // Everything further down is lower priority; nothing
                // deliverable this time.
                break;
            }
            let vecno = queue.pop_front()?;
            let still_pending = queues.iter().any(|q| !q.is_empty());
            self.pending.store(still_pending, Ordering::Release);
            return Some((prio, vecno));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_wins_then_fifo() {
        let lines = InterruptLines::new();
        lines.post(3, 0x40);
        lines.post(5, 0x45);
        lines.post(3, 0x41);
        assert_eq!(lines.take(2), Some((5, 0x45)));
        assert_eq!(lines.take(2), Some((3, 0x40)));
        assert_eq!(lines.take(2), Some((3, 0x41)));
        assert!(!lines.pending());
        assert_eq!(lines.take(2), None);
    }

    #[test]
    fn masked_priorities_stay_queued() {
        let lines = InterruptLines::new();
        lines.post(3, 0x40);
        assert_eq!(lines.take(3), None);
        assert!(lines.pending());
        assert_eq!(lines.take(2), Some((3, 0x40)));
    }

    #[test]
    fn priority_seven_is_unmaskable() {
        let lines = InterruptLines::new();
        lines.post(7, 0x1f);
        assert_eq!(lines.take(7), Some((7, 0x1f)));
    }

    #[test]
    fn out_of_range_priorities_are_ignored() {
        let lines = InterruptLines::new();
        lines.post(0, 0x40);
        lines.post(8, 0x40);
        assert!(!lines.pending());
    }
}
