//! Spec loop, retries and per-spec report hooks

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::node_runner::Invocation;
use crate::config::SuiteConfig;
use crate::interrupt::InterruptHandler;
use crate::models::{
    Failure, Node, NodeKind, NodeType, Nodes, PreRunStats, Report, Spec, SpecReport, SpecState, Specs,
    SpecsExt,
};
use crate::output::{OutputInterceptor, Reporter, Writer};
use crate::parallel::{NextIndex, ParallelClient};
use crate::suite::RunContext;

const BEFORE_SUITE_FAMILY: &[NodeType] = &[NodeType::BeforeSuite, NodeType::SynchronizedBeforeSuite];
const AFTER_SUITE_FAMILY: &[NodeType] = &[NodeType::AfterSuite, NodeType::SynchronizedAfterSuite];

/// State of one run. Owns the current spec report slot, which is replaced
/// once per spec or hook.
pub(crate) struct Runner<'a> {
    pub(crate) suite_nodes: &'a Nodes,
    pub(crate) reporter: &'a mut dyn Reporter,
    pub(crate) writer: Arc<dyn Writer>,
    pub(crate) output_interceptor: Arc<dyn OutputInterceptor>,
    pub(crate) interrupts: Arc<dyn InterruptHandler>,
    pub(crate) client: Option<Arc<dyn ParallelClient>>,
    pub(crate) config: &'a SuiteConfig,
    pub(crate) current: SpecReport,
    pub(crate) report: Report,
}

impl<'a> Runner<'a> {
    pub(crate) fn new(
        suite_nodes: &'a Nodes,
        reporter: &'a mut dyn Reporter,
        ctx: RunContext,
        client: Option<Arc<dyn ParallelClient>>,
        config: &'a SuiteConfig,
        report: Report,
    ) -> Self {
        Self {
            suite_nodes,
            reporter,
            writer: ctx.writer,
            output_interceptor: ctx.output_interceptor,
            interrupts: ctx.interrupt_handler,
            client,
            config,
            current: SpecReport::default(),
            report,
        }
    }

    /// Run the suite hooks and every spec. Returns whether the suite succeeded.
    pub(crate) async fn run_specs(&mut self, mut specs: Specs) -> bool {
        let suite_nodes = self.suite_nodes;
        let num_specs_that_will_run = specs.count_without_skip();

        self.report.pre_run_stats = PreRunStats {
            total_specs: specs.len(),
            specs_that_will_run: num_specs_that_will_run,
        };
        self.report.start_time = Some(Utc::now());

        self.reporter.suite_will_begin(&self.report);
        if let Some(client) = &self.client {
            if let Err(err) = client.post_suite_will_begin(&self.report).await {
                warn!("Failed to announce suite start: {}", err);
            }
        }
        self.report.suite_succeeded = true;

        let status = self.interrupts.status();
        if let Some(node) = suite_nodes.first_node_with_type(BEFORE_SUITE_FAMILY) {
            if !status.interrupted && num_specs_that_will_run > 0 {
                self.current = self.suite_node_report(node);
                self.reporter.will_run(&self.current);
                self.run_suite_node(node, status.channel).await;
                self.process_spec_report().await;
            }
        }

        let mut suite_aborted = false;
        if self.report.suite_succeeded {
            let mut next_index = NextIndex::new(self.client.clone());

            loop {
                let index = match next_index.next().await {
                    Ok(index) => index,
                    Err(err) => {
                        error!("Failed to fetch the next spec index: {}", err);
                        self.report
                            .special_suite_failure_reasons
                            .push(format!("Failed to iterate over specs:\n{err}"));
                        self.report.suite_succeeded = false;
                        break;
                    }
                };
                let Some(spec) = specs.get_mut(index) else {
                    break;
                };

                self.current = self.spec_report_for(spec);

                if (self.config.fail_fast && !self.report.suite_succeeded)
                    || self.interrupts.status().interrupted
                    || suite_aborted
                {
                    spec.skip = true;
                }
                if spec.skip {
                    self.current.state = if spec.nodes.has_node_marked_pending() {
                        SpecState::Pending
                    } else {
                        SpecState::Skipped
                    };
                }

                self.reporter.will_run(&self.current);
                if !spec.skip {
                    self.run_spec(spec).await;
                }

                self.report_after_each(spec).await;
                self.process_spec_report().await;

                if self.current.state == SpecState::Aborted {
                    suite_aborted = true;
                }
                if suite_aborted || (self.config.fail_fast && !self.report.suite_succeeded) {
                    if let Some(client) = &self.client {
                        if let Err(err) = client.post_abort().await {
                            warn!("Failed to broadcast abort: {}", err);
                        }
                    }
                }
                self.current = SpecReport::default();
            }

            if specs.has_any_specs_marked_pending() && self.config.fail_on_pending {
                self.report
                    .special_suite_failure_reasons
                    .push("Detected pending specs and --fail-on-pending is set".to_string());
                self.report.suite_succeeded = false;
            }
        }

        if let Some(node) = suite_nodes.first_node_with_type(AFTER_SUITE_FAMILY) {
            if num_specs_that_will_run > 0 {
                self.current = self.suite_node_report(node);
                self.reporter.will_run(&self.current);
                let channel = self.interrupts.status().channel;
                self.run_suite_node(node, channel).await;
                self.process_spec_report().await;
            }
        }

        let status = self.interrupts.status();
        if status.interrupted {
            let cause = status
                .cause
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Interrupted".to_string());
            self.report.special_suite_failure_reasons.push(cause);
            self.report.suite_succeeded = false;
        }
        let end_time = Utc::now();
        self.report.end_time = Some(end_time);
        if let Some(start_time) = self.report.start_time {
            self.report.run_time = (end_time - start_time).to_std().unwrap_or_default();
        }

        if self.config.is_primary() {
            for node in suite_nodes.with_type(&[NodeType::ReportAfterSuite]).iter() {
                self.current = self.suite_node_report(node);
                self.current.leaf_node_text = node.text().to_string();
                self.reporter.will_run(&self.current);
                let report = self.report.clone();
                self.run_report_after_suite_node(node, report).await;
                self.process_spec_report().await;
            }
        }

        self.reporter.suite_did_end(&self.report);
        if let Some(client) = &self.client {
            if let Err(err) = client.post_suite_did_end(&self.report).await {
                warn!("Failed to announce suite end: {}", err);
            }
        }

        info!(
            "Suite {} {}",
            self.report.suite_description,
            if self.report.suite_succeeded {
                "succeeded"
            } else {
                "failed"
            }
        );
        self.report.suite_succeeded
    }

    /// Run one spec's setup, leaf and cleanup nodes, retrying until it
    /// passes, the attempts run out or the suite is interrupted
    pub(crate) async fn run_spec(&mut self, spec: &Spec) {
        if self.config.dry_run {
            self.current.state = SpecState::Passed;
            return;
        }

        let max_attempts = if self.config.flake_attempts > 0 {
            self.config.flake_attempts
        } else {
            spec.nodes.flake_attempts().max(1)
        };

        self.writer.truncate();
        self.current.start_time = Some(Utc::now());
        self.current.captured_std_out_err.clear();

        for attempt in 0..max_attempts {
            self.current.num_attempts = attempt + 1;
            self.output_interceptor.start_intercepting_output();

            if attempt > 0 {
                debug!("Retrying {} (attempt {})", self.current.full_text(), attempt + 1);
                self.writer
                    .write_str(&format!("\nAttempt #{attempt} Failed.  Retrying...\n"));
            }

            let mut nodes = spec
                .nodes
                .with_type(&[NodeType::BeforeEach])
                .sorted_by_ascending_nesting_level();
            nodes.extend(
                spec.nodes
                    .with_type(&[NodeType::JustBeforeEach])
                    .sorted_by_ascending_nesting_level(),
            );
            nodes.extend(spec.nodes.with_type(&[NodeType::It]));

            let channel = self.interrupts.status().channel;
            let mut deepest_nesting_level_attained: Option<usize> = None;
            for node in &nodes {
                deepest_nesting_level_attained = Some(
                    deepest_nesting_level_attained
                        .map_or(node.nesting_level(), |d| d.max(node.nesting_level())),
                );
                let (state, failure) = self
                    .run_node(
                        node,
                        run_body(node),
                        Some(channel.clone()),
                        &spec.nodes.best_text_for(node),
                    )
                    .await;
                self.current.state = state;
                self.current.failure = failure;
                self.stamp_run_time();
                if self.current.state != SpecState::Passed {
                    break;
                }
            }

            let mut cleanup = spec
                .nodes
                .with_type(&[NodeType::JustAfterEach])
                .sorted_by_descending_nesting_level();
            cleanup.extend(
                spec.nodes
                    .with_type(&[NodeType::AfterEach])
                    .sorted_by_descending_nesting_level(),
            );
            let cleanup = match deepest_nesting_level_attained {
                Some(level) => cleanup.within_nesting_level(level),
                None => Nodes::new(),
            };
            for node in &cleanup {
                let channel = self.interrupts.status().channel;
                let (state, failure) = self
                    .run_node(
                        node,
                        run_body(node),
                        Some(channel),
                        &spec.nodes.best_text_for(node),
                    )
                    .await;
                self.stamp_run_time();
                self.fold_outcome(state, failure);
            }

            self.current.end_time = Some(Utc::now());
            self.stamp_run_time();
            self.current.captured_writer_output =
                String::from_utf8_lossy(&self.writer.bytes()).into_owned();
            let captured = self.output_interceptor.stop_intercepting_and_return_output();
            self.current.captured_std_out_err.push_str(&captured);

            if self.current.state == SpecState::Passed {
                return;
            }
            if self.interrupts.status().interrupted {
                return;
            }
        }
    }

    /// Run every ReportAfterEach node of the spec, deepest first, with the
    /// spec's report as input
    pub(crate) async fn report_after_each(&mut self, spec: &Spec) {
        let nodes = spec
            .nodes
            .with_type(&[NodeType::ReportAfterEach])
            .sorted_by_descending_nesting_level();

        for node in &nodes {
            let NodeKind::ReportAfterEach(body) = node.kind() else {
                continue;
            };
            self.writer.truncate();
            self.output_interceptor.start_intercepting_output();

            let body = Arc::clone(body);
            let report = self.current.clone();
            self.interrupts.set_interrupt_placeholder_message(format!(
                "Received an interrupt while a ReportAfterEach node is running. The node will \
                 not be interrupted so its report stays valid, but later specs will be \
                 skipped.\n\nThe running ReportAfterEach node is at:\n{}",
                node.location()
            ));
            let (state, failure) = self
                .run_node(
                    node,
                    Box::new(move || body(&report)),
                    None,
                    &spec.nodes.best_text_for(node),
                )
                .await;
            self.interrupts.clear_interrupt_placeholder_message();

            self.fold_outcome(state, failure);
            self.current
                .captured_writer_output
                .push_str(&String::from_utf8_lossy(&self.writer.bytes()));
            let captured = self.output_interceptor.stop_intercepting_and_return_output();
            self.current.captured_std_out_err.push_str(&captured);
        }
    }

    /// Hand the current report to the reporter and, in parallel mode, to
    /// the coordination service
    pub(crate) async fn process_spec_report(&mut self) {
        self.reporter.did_run(&self.current);
        if let Some(client) = &self.client {
            if let Err(err) = client.post_did_run(&self.current).await {
                warn!("Failed to post spec report: {}", err);
            }
        }
        if self.current.state.is_failure() {
            self.report.suite_succeeded = false;
        }
        self.report.spec_reports.push(self.current.clone());
    }

    /// A later outcome replaces the current one only when the current one
    /// passed, or when the later one aborts the suite
    pub(crate) fn fold_outcome(&mut self, state: SpecState, failure: Failure) {
        if self.current.state == SpecState::Passed || state == SpecState::Aborted {
            self.current.state = state;
            self.current.failure = failure;
        }
    }

    pub(crate) fn stamp_run_time(&mut self) {
        if let Some(start_time) = self.current.start_time {
            self.current.run_time = (Utc::now() - start_time).to_std().unwrap_or_default();
        }
    }

    pub(crate) fn suite_node_report(&self, node: &Node) -> SpecReport {
        SpecReport {
            leaf_node_type: node.node_type(),
            leaf_node_location: node.location().clone(),
            parallel_worker: self.config.parallel_worker,
            ..Default::default()
        }
    }

    fn spec_report_for(&self, spec: &Spec) -> SpecReport {
        let containers = spec.nodes.with_type(&[NodeType::Container]);
        let (leaf_node_location, leaf_node_text) = spec
            .leaf()
            .map(|leaf| (leaf.location().clone(), leaf.text().to_string()))
            .unwrap_or_default();
        SpecReport {
            container_hierarchy_texts: containers.texts(),
            container_hierarchy_locations: containers.code_locations(),
            leaf_node_type: NodeType::It,
            leaf_node_location,
            leaf_node_text,
            parallel_worker: self.config.parallel_worker,
            ..Default::default()
        }
    }
}

/// The plain body of a setup, teardown or leaf node
pub(crate) fn run_body(node: &Node) -> Invocation {
    match node.kind().run_body() {
        Some(body) => {
            let body = Arc::clone(body);
            Box::new(move || body())
        }
        None => Box::new(|| {}),
    }
}
