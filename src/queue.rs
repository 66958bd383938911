//! Bounded MPSC/SPMC work queue with condvar wait and lifecycle states
//! (C3, spec §3, §4.3).
//!
//! This is implemented with a `Mutex` + two `Condvar`s rather than reaching
//! for `crossbeam-channel`, because the lifecycle semantics spec.md demands
//! — `push`/`pop` block on `Running`, both unblock and drop/return-null on
//! `Halting`, `empty()` reads size under the lock — aren't quite what a
//! generic MPMC channel's `send`/`recv`/`close` trio gives you (a channel
//! close doesn't let in-flight pushes free their payload, for instance).
//! §9 calls out both options as acceptable; the explicit state machine is
//! the one that matches the invariants in spec §8 byte for byte.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::QueueError;

/// Lifecycle state of a [`Queue`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Running,
    Halting,
    Halted,
}

struct Inner<T> {
    ring: VecDeque<T>,
    capacity: usize,
    state: QueueState,
}

/// A bounded, blocking FIFO queue with a `Running -> Halting -> Halted`
/// lifecycle (spec §4.3).
pub struct Queue<T> {
    name: String,
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> Queue<T> {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Queue {
            name: name.into(),
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(capacity),
                capacity,
                state: QueueState::Running,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks while `size == capacity && state == Running`. If the state is
    /// not `Running` when it would otherwise enqueue, the item is dropped
    /// (freed) and `Err(QueueError::Halted)` is returned without blocking.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            match guard.state {
                QueueState::Running => {
                    if guard.ring.len() < guard.capacity {
                        guard.ring.push_back(item);
                        self.not_empty.notify_one();
                        return Ok(());
                    }
                    guard = self.not_full.wait(guard).unwrap();
                }
                QueueState::Halting | QueueState::Halted => {
                    drop(item);
                    return Err(QueueError::Halted);
                }
            }
        }
    }

    /// Like [`push`](Self::push) but returns immediately with
    /// `Err(QueueError::Halted)` disguised as a full-queue timeout if the
    /// wait would exceed `timeout` (used by back-pressure tests).
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        let mut guard = self.inner.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match guard.state {
                QueueState::Running => {
                    if guard.ring.len() < guard.capacity {
                        guard.ring.push_back(item);
                        self.not_empty.notify_one();
                        return Ok(());
                    }
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        drop(item);
                        return Err(QueueError::Halted);
                    }
                    let (g, _) = self.not_full.wait_timeout(guard, deadline - now).unwrap();
                    guard = g;
                }
                QueueState::Halting | QueueState::Halted => {
                    drop(item);
                    return Err(QueueError::Halted);
                }
            }
        }
    }

    /// Blocks while `size == 0 && state == Running`. Returns `None` once the
    /// queue transitions to `Halting`/`Halted` with nothing left to drain.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(item) = guard.ring.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            match guard.state {
                QueueState::Running => {
                    guard = self.not_empty.wait(guard).unwrap();
                }
                QueueState::Halting | QueueState::Halted => {
                    return None;
                }
            }
        }
    }

    /// Non-blocking pop: returns `None` immediately if nothing is queued,
    /// rather than waiting on `not_empty`. Used by the reactor's response
    /// drain, which is already woken by an explicit doorbell and must not
    /// block the single I/O thread waiting for more work that may not come.
    pub fn try_pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        let item = guard.ring.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn empty(&self) -> bool {
        self.inner.lock().unwrap().ring.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().unwrap().state
    }

    /// Transitions to `Halting` and wakes every waiter on both condvars.
    /// Idempotent: calling this again once the state is no longer `Running`
    /// is a no-op (spec §8 "Idempotent shutdown").
    pub fn halt(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.state == QueueState::Running {
            guard.state = QueueState::Halting;
            drop(guard);
            self.not_empty.notify_all();
            self.not_full.notify_all();
        }
    }

    /// Marks the queue fully `Halted` after all consumers have drained and
    /// exited. Idempotent.
    pub fn mark_halted(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.state = QueueState::Halted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order() {
        let q = Queue::new("test", 8);
        q.push('a').unwrap();
        q.push('b').unwrap();
        q.push('c').unwrap();
        assert_eq!(q.pop(), Some('a'));
        assert_eq!(q.pop(), Some('b'));
        assert_eq!(q.pop(), Some('c'));
    }

    #[test]
    fn push_on_halting_drops_and_does_not_block() {
        let q: Queue<u32> = Queue::new("test", 1);
        q.halt();
        assert!(q.push(1).is_err());
    }

    #[test]
    fn pop_on_halting_returns_none_once_drained() {
        let q = Queue::new("test", 4);
        q.push(1).unwrap();
        q.halt();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn idempotent_halt() {
        let q: Queue<u32> = Queue::new("test", 4);
        q.halt();
        q.halt();
        assert_eq!(q.state(), QueueState::Halting);
    }

    #[test]
    fn backpressure_blocks_producer_until_consumer_drains() {
        let q = Arc::new(Queue::new("bp", 2));
        q.push(1).unwrap();
        q.push(2).unwrap();

        let q2 = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            q2.pop()
        });

        // Third push blocks until the consumer thread above pops one item.
        q.push(3).unwrap();
        assert_eq!(handle.join().unwrap(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }
}
