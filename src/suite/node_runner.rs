//! Running a single node body
//!
//! The body runs on a fresh thread with its own [`Failer`] and its own copy
//! of the current spec report. Its outcome comes back over a oneshot channel
//! that is raced against the interrupt channel. If the interrupt wins, the
//! thread is abandoned: it keeps running but nothing it reports is observed.

use futures::future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use super::runner::Runner;
use crate::context::{self, SpecContext};
use crate::failer::{panic_message, Failer, FailureSignal};
use crate::models::{Failure, Node, SpecState};

/// A prepared node body, ready to move onto its own thread
pub(crate) type Invocation = Box<dyn FnOnce() + Send + 'static>;

impl Runner<'_> {
    /// Run one body and return its outcome. `interrupt` is `None` for
    /// report hooks, which are never interrupted.
    pub(crate) async fn run_node(
        &mut self,
        node: &Node,
        invocation: Invocation,
        interrupt: Option<watch::Receiver<bool>>,
        text: &str,
    ) -> (SpecState, Failure) {
        if self.config.emit_spec_progress {
            let text = if text.is_empty() { "TOP-LEVEL" } else { text };
            self.writer.write_str(&format!(
                "[{}] {}\n  {}\n",
                node.node_type(),
                text,
                node.location()
            ));
        }

        let mut failure = Failure::for_node(node);
        let slot = SpecContext::new(Arc::clone(&self.writer));
        slot.publish(&self.current);

        let (tx, rx) = oneshot::channel();
        let failer = Arc::new(Failer::new());
        let spec_context = slot.clone();
        let location = node.location().clone();

        let spawned = thread::Builder::new()
            .name(format!("speckle-{}", node.node_type()))
            .spawn(move || {
                let _scope = context::enter(Arc::clone(&failer), spec_context);
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(invocation)) {
                    if !payload.is::<FailureSignal>() {
                        failer.panic(location, panic_message(payload.as_ref()));
                    }
                }
                let _ = tx.send(failer.drain());
            });
        if let Err(err) = spawned {
            warn!("Failed to start {} at {}: {}", node.node_type(), node.location(), err);
        }

        let received = tokio::select! {
            biased;
            outcome = rx => Some(outcome),
            _ = interrupted(interrupt) => None,
        };
        self.current.report_entries = slot.report_entries();

        let Some(received) = received else {
            debug!("{} at {} was interrupted", node.node_type(), node.location());
            failure.message = self.interrupts.interrupt_message_with_stack_traces();
            failure.location = node.location().clone();
            return (SpecState::Interrupted, failure);
        };

        match received {
            Ok((SpecState::Passed, _)) => (SpecState::Passed, Failure::default()),
            Ok((state, from_run)) => {
                failure.message = from_run.message;
                failure.location = from_run.location;
                failure.forwarded_panic = from_run.forwarded_panic;
                (state, failure)
            }
            // The thread went away without sending
            Err(_) => {
                failure.message = "Test Panicked".to_string();
                failure.location = node.location().clone();
                failure.forwarded_panic =
                    Some("node exited without reporting an outcome".to_string());
                (SpecState::Panicked, failure)
            }
        }
    }
}

/// Resolves once the interrupt channel flips to `true`; never without a channel
async fn interrupted(channel: Option<watch::Receiver<bool>>) {
    if let Some(mut channel) = channel {
        let fired = channel.wait_for(|interrupted| *interrupted).await.is_ok();
        if fired {
            return;
        }
    }
    future::pending::<()>().await
}
