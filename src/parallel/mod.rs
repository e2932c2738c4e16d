//! Parallel coordination
//!
//! Workers share one coordination service. The orchestrator only decides
//! *when* each call happens; the transport behind [`ParallelClient`] is
//! pluggable. [`LocalCoordinator`] is an in-process implementation.

mod local;

pub use local::{LocalClient, LocalCoordinator};

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::TransportError;
use crate::models::{Report, SpecReport};

/// Client side of the coordination service, one per worker
#[async_trait]
pub trait ParallelClient: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn post_suite_will_begin(&self, report: &Report) -> Result<(), TransportError>;
    async fn post_did_run(&self, report: &SpecReport) -> Result<(), TransportError>;
    async fn post_suite_did_end(&self, report: &Report) -> Result<(), TransportError>;

    /// Worker 1 publishes the data produced by its synchronized before-suite body
    async fn post_synchronized_before_suite_succeeded(
        &self,
        data: Vec<u8>,
    ) -> Result<(), TransportError>;
    async fn post_synchronized_before_suite_failed(&self) -> Result<(), TransportError>;

    /// Wait for worker 1's data; errors when worker 1 failed to produce it
    async fn block_until_synchronized_before_suite_data(&self) -> Result<Vec<u8>, TransportError>;

    async fn block_until_nonprimary_workers_have_finished(&self) -> Result<(), TransportError>;

    /// Wait for every other worker's final report, combined into one
    async fn block_until_aggregated_nonprimary_reports(&self) -> Result<Report, TransportError>;

    /// Next spec index to run, shared by all workers
    async fn fetch_next_counter(&self) -> Result<usize, TransportError>;

    async fn post_abort(&self) -> Result<(), TransportError>;
    async fn should_abort(&self) -> bool;
}

/// Hands out spec indices: a local counter, or the shared one in parallel mode
pub(crate) enum NextIndex {
    Local(usize),
    Remote(Arc<dyn ParallelClient>),
}

impl NextIndex {
    pub(crate) fn new(client: Option<Arc<dyn ParallelClient>>) -> Self {
        match client {
            Some(client) => NextIndex::Remote(client),
            None => NextIndex::Local(0),
        }
    }

    pub(crate) async fn next(&mut self) -> Result<usize, TransportError> {
        match self {
            NextIndex::Local(counter) => {
                let index = *counter;
                *counter += 1;
                Ok(index)
            }
            NextIndex::Remote(client) => client.fetch_next_counter().await,
        }
    }
}
