//! The microtask queue.
//!
//! Reactions are enqueued on promise settlement and drained when the current
//! synchronous fragment of hosted code completes. Each job runs in its own
//! micro-turn against the VM-thread context; ordering is FIFO.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::context::NativeContext;

/// A queued micro-turn.
pub type Microtask = Box<dyn FnOnce(&mut NativeContext) + Send>;

/// FIFO queue of microtasks.
pub struct MicrotaskQueue {
    queue: Mutex<VecDeque<Microtask>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce(&mut NativeContext) + Send + 'static,
    {
        self.queue.lock().push_back(Box::new(task));
    }

    pub fn dequeue(&self) -> Option<Microtask> {
        self.queue.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for MicrotaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
