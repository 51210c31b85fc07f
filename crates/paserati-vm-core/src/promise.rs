//! The promise state machine.
//!
//! A promise is `pending`, `fulfilled`, or `rejected`, with a list of
//! registered reactions. Transitions are one-shot: settling an already
//! settled promise is a no-op. Reactions never run inline; settlement hands
//! them to the microtask queue through `NativeContext`, so hosted code only
//! ever observes fully settled promises.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::gc::GcRef;
use crate::value::Value;

/// Promise state.
#[derive(Debug, Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

/// A registered reaction: handlers plus the derived promise they settle.
pub struct PromiseReaction {
    pub on_fulfilled: Option<Value>,
    pub on_rejected: Option<Value>,
    pub result: GcRef<JsPromise>,
}

/// A JavaScript promise.
pub struct JsPromise {
    state: Mutex<PromiseState>,
    reactions: Mutex<Vec<PromiseReaction>>,
    /// Set once a rejection handler is attached; unhandled rejections are
    /// reported exactly once at quiescence.
    handled: AtomicBool,
}

impl JsPromise {
    pub fn new_pending() -> GcRef<JsPromise> {
        GcRef::new(Self {
            state: Mutex::new(PromiseState::Pending),
            reactions: Mutex::new(Vec::new()),
            handled: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> PromiseState {
        self.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Rejected(_))
    }

    pub fn value(&self) -> Option<Value> {
        match &*self.state.lock() {
            PromiseState::Fulfilled(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<Value> {
        match &*self.state.lock() {
            PromiseState::Rejected(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Transition to fulfilled and take the registered reactions for
    /// scheduling. Returns `None` if the promise was already settled
    /// (re-resolution is a no-op).
    pub fn settle_fulfilled(&self, value: Value) -> Option<Vec<PromiseReaction>> {
        let mut state = self.state.lock();
        if !matches!(*state, PromiseState::Pending) {
            return None;
        }
        *state = PromiseState::Fulfilled(value);
        drop(state);
        Some(std::mem::take(&mut *self.reactions.lock()))
    }

    /// Transition to rejected; same one-shot contract.
    pub fn settle_rejected(&self, reason: Value) -> Option<Vec<PromiseReaction>> {
        let mut state = self.state.lock();
        if !matches!(*state, PromiseState::Pending) {
            return None;
        }
        *state = PromiseState::Rejected(reason);
        drop(state);
        Some(std::mem::take(&mut *self.reactions.lock()))
    }

    /// Register a reaction. If the promise is still pending the reaction is
    /// stored; otherwise the caller receives it back to schedule against the
    /// settled state.
    pub fn register(&self, reaction: PromiseReaction) -> Option<PromiseReaction> {
        if reaction.on_rejected.is_some() {
            self.mark_handled();
        }
        let state = self.state.lock();
        if matches!(*state, PromiseState::Pending) {
            self.reactions.lock().push(reaction);
            None
        } else {
            Some(reaction)
        }
    }

    pub fn mark_handled(&self) {
        self.handled.store(true, Ordering::Relaxed);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for JsPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            PromiseState::Pending => write!(f, "Promise {{ <pending> }}"),
            PromiseState::Fulfilled(v) => write!(f, "Promise {{ <fulfilled>: {v:?} }}"),
            PromiseState::Rejected(v) => write!(f, "Promise {{ <rejected>: {v:?} }}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_fulfillment() {
        let p = JsPromise::new_pending();
        assert!(p.is_pending());

        assert!(p.settle_fulfilled(Value::int32(1)).is_some());
        assert!(p.is_fulfilled());
        assert_eq!(p.value().unwrap().as_int32(), Some(1));

        // Second resolution is ignored.
        assert!(p.settle_fulfilled(Value::int32(2)).is_none());
        assert_eq!(p.value().unwrap().as_int32(), Some(1));

        // Rejection after fulfillment is ignored too.
        assert!(p.settle_rejected(Value::string("nope")).is_none());
        assert!(p.is_fulfilled());
    }

    #[test]
    fn test_register_while_pending_stores() {
        let p = JsPromise::new_pending();
        let derived = JsPromise::new_pending();
        let stored = p.register(PromiseReaction {
            on_fulfilled: None,
            on_rejected: None,
            result: derived,
        });
        assert!(stored.is_none());

        let reactions = p.settle_fulfilled(Value::int32(5)).unwrap();
        assert_eq!(reactions.len(), 1);
    }

    #[test]
    fn test_register_after_settled_returns_reaction() {
        let p = JsPromise::new_pending();
        p.settle_fulfilled(Value::int32(5));
        let derived = JsPromise::new_pending();
        let returned = p.register(PromiseReaction {
            on_fulfilled: None,
            on_rejected: None,
            result: derived,
        });
        assert!(returned.is_some());
    }

    #[test]
    fn test_rejection_handler_marks_handled() {
        let p = JsPromise::new_pending();
        assert!(!p.is_handled());
        p.register(PromiseReaction {
            on_fulfilled: None,
            on_rejected: Some(Value::Undefined),
            result: JsPromise::new_pending(),
        });
        assert!(p.is_handled());
    }
}
