//! In-process coordination service
//!
//! Every worker is a [`Suite`](crate::suite::Suite) in the same process,
//! each holding its own [`LocalClient`]. State lives behind one mutex; a
//! [`Notify`] wakes blocked workers whenever it changes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

use super::ParallelClient;
use crate::errors::TransportError;
use crate::models::{Report, SpecReport};

#[derive(Debug, Default)]
enum BeforeSuiteState {
    #[default]
    Pending,
    Succeeded(Vec<u8>),
    Failed,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    counter: usize,
    aborted: bool,
    before_suite: BeforeSuiteState,
    begun: HashSet<usize>,
    finished: HashSet<usize>,
    final_reports: BTreeMap<usize, Report>,
    spec_reports: Vec<SpecReport>,
}

/// Shared state for `total` workers
pub struct LocalCoordinator {
    total: usize,
    state: Mutex<CoordinatorState>,
    changed: Notify,
}

impl LocalCoordinator {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            total,
            state: Mutex::new(CoordinatorState::default()),
            changed: Notify::new(),
        })
    }

    /// Client for worker `worker` (1-based)
    pub fn client(self: &Arc<Self>, worker: usize) -> Result<Arc<LocalClient>, TransportError> {
        if worker == 0 || worker > self.total {
            return Err(TransportError::InvalidWorker {
                worker,
                total: self.total,
            });
        }
        Ok(Arc::new(LocalClient {
            worker,
            coordinator: Arc::clone(self),
            connected: AtomicBool::new(false),
        }))
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Every spec report posted so far, in arrival order
    pub fn spec_reports(&self) -> Vec<SpecReport> {
        self.state.lock().spec_reports.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    fn update(&self, f: impl FnOnce(&mut CoordinatorState)) {
        f(&mut self.state.lock());
        self.changed.notify_waiters();
    }

    /// Wait until `check` yields a value
    async fn wait_for<T>(&self, mut check: impl FnMut(&CoordinatorState) -> Option<T>) -> T {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = check(&self.state.lock());
            if let Some(value) = ready {
                return value;
            }
            notified.await;
        }
    }

    fn nonprimary_finished(&self, state: &CoordinatorState) -> bool {
        (2..=self.total).all(|w| state.finished.contains(&w))
    }
}

/// One worker's handle on a [`LocalCoordinator`]
pub struct LocalClient {
    worker: usize,
    coordinator: Arc<LocalCoordinator>,
    connected: AtomicBool,
}

impl LocalClient {
    pub fn worker(&self) -> usize {
        self.worker
    }

    fn ensure_connected(&self) -> Result<&LocalCoordinator, TransportError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(&self.coordinator)
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl ParallelClient for LocalClient {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::Release);
        debug!("Worker {} connected", self.worker);
        Ok(())
    }

    async fn post_suite_will_begin(&self, _report: &Report) -> Result<(), TransportError> {
        let worker = self.worker;
        self.ensure_connected()?.update(|s| {
            s.begun.insert(worker);
        });
        Ok(())
    }

    async fn post_did_run(&self, report: &SpecReport) -> Result<(), TransportError> {
        let report = report.clone();
        self.ensure_connected()?
            .update(|s| s.spec_reports.push(report));
        Ok(())
    }

    async fn post_suite_did_end(&self, report: &Report) -> Result<(), TransportError> {
        let worker = self.worker;
        let report = report.clone();
        self.ensure_connected()?.update(|s| {
            s.finished.insert(worker);
            s.final_reports.insert(worker, report);
        });
        Ok(())
    }

    async fn post_synchronized_before_suite_succeeded(
        &self,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.ensure_connected()?
            .update(|s| s.before_suite = BeforeSuiteState::Succeeded(data));
        Ok(())
    }

    async fn post_synchronized_before_suite_failed(&self) -> Result<(), TransportError> {
        self.ensure_connected()?
            .update(|s| s.before_suite = BeforeSuiteState::Failed);
        Ok(())
    }

    async fn block_until_synchronized_before_suite_data(&self) -> Result<Vec<u8>, TransportError> {
        let coordinator = self.ensure_connected()?;
        coordinator
            .wait_for(|s| match &s.before_suite {
                BeforeSuiteState::Succeeded(data) => Some(Ok(data.clone())),
                BeforeSuiteState::Failed => Some(Err(TransportError::SynchronizedBeforeSuiteFailed)),
                // Worker 1 finished without publishing anything
                BeforeSuiteState::Pending if s.finished.contains(&1) => {
                    Some(Err(TransportError::SynchronizedBeforeSuiteFailed))
                }
                BeforeSuiteState::Pending => None,
            })
            .await
    }

    async fn block_until_nonprimary_workers_have_finished(&self) -> Result<(), TransportError> {
        let coordinator = self.ensure_connected()?;
        coordinator
            .wait_for(|s| coordinator.nonprimary_finished(s).then_some(()))
            .await;
        Ok(())
    }

    async fn block_until_aggregated_nonprimary_reports(&self) -> Result<Report, TransportError> {
        let coordinator = self.ensure_connected()?;
        let reports = coordinator
            .wait_for(|s| {
                coordinator.nonprimary_finished(s).then(|| {
                    s.final_reports
                        .iter()
                        .filter(|(worker, _)| **worker != 1)
                        .map(|(_, report)| report.clone())
                        .collect::<Vec<_>>()
                })
            })
            .await;

        let mut reports = reports.into_iter();
        let aggregated = match reports.next() {
            Some(first) => reports.fold(first, Report::add),
            None => Report {
                suite_succeeded: true,
                ..Default::default()
            },
        };
        Ok(aggregated)
    }

    async fn fetch_next_counter(&self) -> Result<usize, TransportError> {
        let mut state = self.ensure_connected()?.state.lock();
        let index = state.counter;
        state.counter += 1;
        Ok(index)
    }

    async fn post_abort(&self) -> Result<(), TransportError> {
        debug!("Worker {} aborted the suite", self.worker);
        self.ensure_connected()?.update(|s| s.aborted = true);
        Ok(())
    }

    async fn should_abort(&self) -> bool {
        self.coordinator.is_aborted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn connected(coordinator: &Arc<LocalCoordinator>, worker: usize) -> Arc<LocalClient> {
        let client = coordinator.client(worker).unwrap();
        client.connect().await.unwrap();
        client
    }

    #[test]
    fn test_rejects_out_of_range_worker() {
        let coordinator = LocalCoordinator::new(2);
        assert_eq!(
            coordinator.client(3).err(),
            Some(TransportError::InvalidWorker { worker: 3, total: 2 })
        );
        assert!(coordinator.client(0).is_err());
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail() {
        let coordinator = LocalCoordinator::new(1);
        let client = coordinator.client(1).unwrap();
        assert_eq!(
            client.fetch_next_counter().await,
            Err(TransportError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_before_suite_data_reaches_waiting_workers() {
        let coordinator = LocalCoordinator::new(3);
        let primary = connected(&coordinator, 1).await;
        let second = connected(&coordinator, 2).await;
        let third = connected(&coordinator, 3).await;

        let waiting = tokio::spawn(async move {
            second.block_until_synchronized_before_suite_data().await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        primary
            .post_synchronized_before_suite_succeeded(b"db-url".to_vec())
            .await
            .unwrap();

        assert_eq!(waiting.await.unwrap(), Ok(b"db-url".to_vec()));
        assert_eq!(
            third.block_until_synchronized_before_suite_data().await,
            Ok(b"db-url".to_vec())
        );
    }

    #[tokio::test]
    async fn test_before_suite_failure_is_reported() {
        let coordinator = LocalCoordinator::new(2);
        let primary = connected(&coordinator, 1).await;
        let second = connected(&coordinator, 2).await;

        primary.post_synchronized_before_suite_failed().await.unwrap();
        assert_eq!(
            second.block_until_synchronized_before_suite_data().await,
            Err(TransportError::SynchronizedBeforeSuiteFailed)
        );
    }

    #[tokio::test]
    async fn test_primary_ending_without_data_unblocks_waiters() {
        let coordinator = LocalCoordinator::new(2);
        let primary = connected(&coordinator, 1).await;
        let second = connected(&coordinator, 2).await;

        primary.post_suite_did_end(&Report::default()).await.unwrap();
        assert_eq!(
            second.block_until_synchronized_before_suite_data().await,
            Err(TransportError::SynchronizedBeforeSuiteFailed)
        );
    }

    #[tokio::test]
    async fn test_aggregates_nonprimary_reports() {
        let coordinator = LocalCoordinator::new(3);
        let primary = connected(&coordinator, 1).await;
        let second = connected(&coordinator, 2).await;
        let third = connected(&coordinator, 3).await;

        let aggregate = tokio::spawn({
            let primary = primary.clone();
            async move { primary.block_until_aggregated_nonprimary_reports().await }
        });

        let spec = SpecReport {
            leaf_node_text: "from three".into(),
            ..Default::default()
        };
        third.post_did_run(&spec).await.unwrap();
        third
            .post_suite_did_end(&Report {
                suite_succeeded: false,
                spec_reports: vec![spec],
                ..Default::default()
            })
            .await
            .unwrap();
        second
            .post_suite_did_end(&Report {
                suite_succeeded: true,
                ..Default::default()
            })
            .await
            .unwrap();

        primary
            .block_until_nonprimary_workers_have_finished()
            .await
            .unwrap();
        let report = aggregate.await.unwrap().unwrap();
        assert!(!report.suite_succeeded);
        assert_eq!(report.spec_reports.len(), 1);
        assert_eq!(coordinator.spec_reports().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_flag() {
        let coordinator = LocalCoordinator::new(2);
        let first = connected(&coordinator, 1).await;
        let second = connected(&coordinator, 2).await;

        assert!(!second.should_abort().await);
        first.post_abort().await.unwrap();
        assert!(second.should_abort().await);
        assert!(coordinator.is_aborted());
    }
}
