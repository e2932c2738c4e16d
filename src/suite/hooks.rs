//! Suite-level hooks
//!
//! Before/after-suite hooks, including the synchronized variants that
//! coordinate with the other workers, and ReportAfterSuite.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::runner::{run_body, Runner};
use crate::errors::TransportError;
use crate::models::{Failure, Node, NodeKind, Report, SpecState};

impl Runner<'_> {
    /// Run a before-suite or after-suite node into the current report
    pub(crate) async fn run_suite_node(&mut self, node: &Node, channel: watch::Receiver<bool>) {
        if self.config.dry_run {
            self.current.state = SpecState::Passed;
            return;
        }
        info!("Running {} at {}", node.node_type(), node.location());

        self.writer.truncate();
        self.output_interceptor.start_intercepting_output();
        self.current.start_time = Some(Utc::now());

        let parallel = self.config.is_parallel();
        let primary = self.config.is_primary();
        let mut error: Option<TransportError> = None;

        match node.kind() {
            NodeKind::BeforeSuite(_) | NodeKind::AfterSuite(_) => {
                let (state, failure) = self
                    .run_node(node, run_body(node), Some(channel), "")
                    .await;
                self.current.state = state;
                self.current.failure = failure;
            }
            NodeKind::SynchronizedBeforeSuite {
                primary: produce,
                all: consume,
            } => {
                let data = if primary {
                    let produced = Arc::new(Mutex::new(None));
                    let sink = Arc::clone(&produced);
                    let produce = Arc::clone(produce);
                    let (state, failure) = self
                        .run_node(
                            node,
                            Box::new(move || {
                                let data = produce();
                                *sink.lock() = Some(data);
                            }),
                            Some(channel.clone()),
                            "",
                        )
                        .await;
                    self.current.state = state;
                    self.current.failure = failure;

                    let passed = state == SpecState::Passed;
                    let data = produced.lock().take().unwrap_or_default();
                    if let Some(client) = self.client.clone().filter(|_| parallel) {
                        let posted = if passed {
                            client
                                .post_synchronized_before_suite_succeeded(data.clone())
                                .await
                        } else {
                            client.post_synchronized_before_suite_failed().await
                        };
                        error = posted.err();
                    }
                    (passed && error.is_none()).then_some(data)
                } else {
                    match self.client.clone() {
                        Some(client) => {
                            match client.block_until_synchronized_before_suite_data().await {
                                Ok(data) => Some(data),
                                Err(err) => {
                                    error = Some(err);
                                    None
                                }
                            }
                        }
                        None => {
                            error = Some(TransportError::NotConnected);
                            None
                        }
                    }
                };

                if let Some(data) = data {
                    debug!("Running synchronized before-suite with {} bytes", data.len());
                    let consume = Arc::clone(consume);
                    let (state, failure) = self
                        .run_node(node, Box::new(move || consume(data)), Some(channel), "")
                        .await;
                    self.current.state = state;
                    self.current.failure = failure;
                }
            }
            NodeKind::SynchronizedAfterSuite {
                all,
                primary: primary_body,
            } => {
                let all = Arc::clone(all);
                let (state, failure) = self
                    .run_node(node, Box::new(move || all()), Some(channel.clone()), "")
                    .await;
                self.current.state = state;
                self.current.failure = failure;

                if primary {
                    if parallel {
                        if let Some(client) = self.client.clone() {
                            error = client
                                .block_until_nonprimary_workers_have_finished()
                                .await
                                .err();
                        }
                    }
                    if error.is_none() {
                        let primary_body = Arc::clone(primary_body);
                        let (state, failure) = self
                            .run_node(node, Box::new(move || primary_body()), Some(channel), "")
                            .await;
                        if self.current.state == SpecState::Passed {
                            self.current.state = state;
                            self.current.failure = failure;
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(err) = error {
            if self.current.state.is(&[SpecState::Invalid, SpecState::Passed]) {
                self.current.state = SpecState::Failed;
                self.current.failure = Failure::for_leaf_node_with_error(node, err.to_string());
            }
        }

        self.finish_hook_capture();
    }

    /// Run a ReportAfterSuite node with the suite report, merged with every
    /// other worker's report in parallel mode
    pub(crate) async fn run_report_after_suite_node(&mut self, node: &Node, mut report: Report) {
        if self.config.dry_run {
            self.current.state = SpecState::Passed;
            return;
        }
        let NodeKind::ReportAfterSuite(body) = node.kind() else {
            return;
        };

        self.writer.truncate();
        self.output_interceptor.start_intercepting_output();
        self.current.start_time = Some(Utc::now());

        if self.config.is_parallel() {
            if let Some(client) = self.client.clone() {
                match client.block_until_aggregated_nonprimary_reports().await {
                    Ok(aggregated) => report = report.add(aggregated),
                    Err(err) => {
                        self.current.state = SpecState::Failed;
                        self.current.failure =
                            Failure::for_leaf_node_with_error(node, err.to_string());
                        self.finish_hook_capture();
                        return;
                    }
                }
            }
        }

        let body = Arc::clone(body);
        self.interrupts.set_interrupt_placeholder_message(format!(
            "Received an interrupt while a ReportAfterSuite node is running. The node will \
             not be interrupted so its report stays valid.\n\nThe running ReportAfterSuite \
             node is at:\n{}",
            node.location()
        ));
        let (state, failure) = self
            .run_node(node, Box::new(move || body(&report)), None, "")
            .await;
        self.interrupts.clear_interrupt_placeholder_message();
        self.current.state = state;
        self.current.failure = failure;

        self.finish_hook_capture();
    }

    fn finish_hook_capture(&mut self) {
        self.current.end_time = Some(Utc::now());
        self.stamp_run_time();
        self.current.captured_writer_output =
            String::from_utf8_lossy(&self.writer.bytes()).into_owned();
        self.current.captured_std_out_err =
            self.output_interceptor.stop_intercepting_and_return_output();
    }
}
