//! Failure capture for a single node invocation
//!
//! Every node body runs with its own [`Failer`]. The first outcome reported
//! (explicit failure, skip, abort or a trapped panic) is kept; later reports
//! are ignored until the slot is drained.

use parking_lot::Mutex;
use std::any::Any;

use crate::models::{CodeLocation, Failure, SpecState};

/// Panic payload used to unwind out of a body after its failure was recorded.
/// The runner recognises it and does not treat it as a trapped panic.
#[derive(Debug, Clone, Copy)]
pub struct FailureSignal;

#[derive(Debug)]
struct Slot {
    state: SpecState,
    failure: Failure,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: SpecState::Passed,
            failure: Failure::default(),
        }
    }
}

/// Synchronized single-slot outcome recorder
#[derive(Debug, Default)]
pub struct Failer {
    slot: Mutex<Slot>,
}

impl Failer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, message: impl Into<String>, location: CodeLocation) {
        self.record(SpecState::Failed, message.into(), location, None);
    }

    pub fn skip(&self, message: impl Into<String>, location: CodeLocation) {
        self.record(SpecState::Skipped, message.into(), location, None);
    }

    pub fn abort_suite(&self, message: impl Into<String>, location: CodeLocation) {
        self.record(SpecState::Aborted, message.into(), location, None);
    }

    /// Record a trapped panic, forwarding its payload text
    pub fn panic(&self, location: CodeLocation, forwarded_panic: impl Into<String>) {
        self.record(
            SpecState::Panicked,
            "Test Panicked".to_string(),
            location,
            Some(forwarded_panic.into()),
        );
    }

    pub fn state(&self) -> SpecState {
        self.slot.lock().state
    }

    /// Take the recorded outcome and reset to Passed
    pub fn drain(&self) -> (SpecState, Failure) {
        let slot = std::mem::take(&mut *self.slot.lock());
        (slot.state, slot.failure)
    }

    fn record(
        &self,
        state: SpecState,
        message: String,
        location: CodeLocation,
        forwarded_panic: Option<String>,
    ) {
        let mut slot = self.slot.lock();
        if slot.state != SpecState::Passed {
            return;
        }
        slot.state = state;
        slot.failure = Failure {
            message,
            location,
            forwarded_panic,
            ..Default::default()
        };
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic)".to_string()
    }
}
