//! Interrupt handling
//!
//! An interrupt (operator ctrl-c, a suite timeout, or an abort broadcast by a
//! peer worker) is advisory for a running body, which cannot be preempted, but
//! authoritative for control flow: the running node is reported Interrupted
//! and every later spec is skipped.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::parallel::ParallelClient;

/// Why the suite was interrupted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptCause {
    Signal,
    Timeout,
    AbortedByPeer,
}

impl fmt::Display for InterruptCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptCause::Signal => write!(f, "Interrupted by User"),
            InterruptCause::Timeout => write!(f, "Interrupted by Timeout"),
            InterruptCause::AbortedByPeer => write!(f, "Interrupted by Other Worker"),
        }
    }
}

/// Snapshot of the interrupt state. `channel` flips to `true` once interrupted.
#[derive(Clone, Debug)]
pub struct InterruptStatus {
    pub interrupted: bool,
    pub channel: watch::Receiver<bool>,
    pub cause: Option<InterruptCause>,
}

/// Source of interrupts consulted by the orchestrator
pub trait InterruptHandler: Send + Sync {
    fn status(&self) -> InterruptStatus;

    /// Shown instead of interrupting while a report hook runs
    fn set_interrupt_placeholder_message(&self, message: String);
    fn clear_interrupt_placeholder_message(&self);

    /// Message recorded on the node that was interrupted
    fn interrupt_message_with_stack_traces(&self) -> String;
}

#[derive(Debug, Default)]
struct ControllerState {
    cause: Option<InterruptCause>,
    placeholder_message: Option<String>,
}

/// Default [`InterruptHandler`] driven by explicit calls or spawned watchers
pub struct InterruptController {
    tx: watch::Sender<bool>,
    state: Mutex<ControllerState>,
}

impl InterruptController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Deliver an interrupt; the first cause wins
    pub fn interrupt(&self, cause: InterruptCause) {
        {
            let mut state = self.state.lock();
            if state.cause.is_some() {
                return;
            }
            state.cause = Some(cause);
            if let Some(message) = &state.placeholder_message {
                warn!("{message}");
            }
        }
        debug!("Interrupt received: {}", cause);
        self.tx.send_replace(true);
    }

    /// Interrupt on ctrl-c
    pub fn listen_for_ctrl_c(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.interrupt(InterruptCause::Signal);
            }
        })
    }

    /// Interrupt once `timeout` has elapsed
    pub fn interrupt_after(self: &Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            controller.interrupt(InterruptCause::Timeout);
        })
    }

    /// Poll the coordination service and interrupt when a peer aborts
    pub fn watch_for_peer_abort(
        self: &Arc<Self>,
        client: Arc<dyn ParallelClient>,
        poll_interval: Duration,
    ) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interrupted = controller.tx.subscribe();
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {
                        if client.should_abort().await {
                            controller.interrupt(InterruptCause::AbortedByPeer);
                            return;
                        }
                    }
                    // The borrow guard is not Send; drop it inside the branch
                    _ = async { let _ = interrupted.wait_for(|i| *i).await; } => return,
                }
            }
        })
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandler for InterruptController {
    fn status(&self) -> InterruptStatus {
        let cause = self.state.lock().cause;
        InterruptStatus {
            interrupted: cause.is_some(),
            channel: self.tx.subscribe(),
            cause,
        }
    }

    fn set_interrupt_placeholder_message(&self, message: String) {
        self.state.lock().placeholder_message = Some(message);
    }

    fn clear_interrupt_placeholder_message(&self) {
        self.state.lock().placeholder_message = None;
    }

    fn interrupt_message_with_stack_traces(&self) -> String {
        let cause = self
            .state
            .lock()
            .cause
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Interrupted".to_string());
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            format!("{cause}\n\nInterrupt handler backtrace:\n{backtrace}")
        } else {
            format!("{cause}\n\nThe running node was abandoned and may still be executing.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::LocalCoordinator;

    #[test]
    fn test_first_cause_wins() {
        let controller = InterruptController::new();
        assert!(!controller.status().interrupted);

        controller.interrupt(InterruptCause::Timeout);
        controller.interrupt(InterruptCause::Signal);

        let status = controller.status();
        assert!(status.interrupted);
        assert_eq!(status.cause, Some(InterruptCause::Timeout));
        assert!(*status.channel.borrow());
        assert!(controller
            .interrupt_message_with_stack_traces()
            .starts_with("Interrupted by Timeout"));
    }

    #[tokio::test]
    async fn test_channel_fires_for_existing_subscribers() {
        let controller = InterruptController::new();
        let mut channel = controller.status().channel;
        controller.interrupt(InterruptCause::Signal);
        assert!(channel.wait_for(|i| *i).await.is_ok());
    }

    #[tokio::test]
    async fn test_interrupt_after_timeout() {
        let controller = Arc::new(InterruptController::new());
        controller
            .interrupt_after(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(controller.status().cause, Some(InterruptCause::Timeout));
    }

    #[tokio::test]
    async fn test_peer_abort_interrupts() {
        let coordinator = LocalCoordinator::new(2);
        let watched = coordinator.client(1).unwrap();
        let peer = coordinator.client(2).unwrap();
        watched.connect().await.unwrap();
        peer.connect().await.unwrap();

        let controller = Arc::new(InterruptController::new());
        let watcher = controller.watch_for_peer_abort(watched, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!controller.status().interrupted);

        peer.post_abort().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), watcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.status().cause, Some(InterruptCause::AbortedByPeer));
        assert!(controller
            .interrupt_message_with_stack_traces()
            .starts_with("Interrupted by Other Worker"));
    }

    #[tokio::test]
    async fn test_peer_watcher_stops_after_other_interrupt() {
        let coordinator = LocalCoordinator::new(2);
        let watched = coordinator.client(1).unwrap();
        watched.connect().await.unwrap();

        let controller = Arc::new(InterruptController::new());
        let watcher = controller.watch_for_peer_abort(watched, Duration::from_millis(5));
        controller.interrupt(InterruptCause::Signal);
        tokio::time::timeout(Duration::from_secs(2), watcher)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.status().cause, Some(InterruptCause::Signal));
    }

    #[test]
    fn test_placeholder_message_round_trip() {
        let controller = InterruptController::new();
        controller.set_interrupt_placeholder_message("report hook running".into());
        controller.interrupt(InterruptCause::Signal);
        controller.clear_interrupt_placeholder_message();
        assert!(controller.state.lock().placeholder_message.is_none());
        assert!(controller.status().interrupted);
    }
}
