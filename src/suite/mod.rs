//! Suite orchestrator
//!
//! A [`Suite`] moves through three phases. In `BuildTopLevel` nodes are
//! declared and top-level containers are only recorded. [`Suite::build_tree`]
//! enters those containers, which register their children through the
//! `&mut Suite` they receive. [`Suite::run`] flattens the tree, runs every
//! spec and the suite-level hooks, and reports as it goes.

mod hooks;
mod node_runner;
mod runner;
mod tree;


use std::sync::Arc;
use tracing::info;

use crate::config::SuiteConfig;
use crate::errors::SuiteError;
use crate::interrupt::{InterruptController, InterruptHandler};
use crate::models::{Node, Nodes, Report, TreeNode};
use crate::ordering;
use crate::output::{BufferWriter, NoopOutputInterceptor, OutputInterceptor, Reporter, Writer};
use crate::parallel::ParallelClient;

use runner::Runner;

/// Lifecycle phase, strictly monotonic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    BuildTopLevel,
    BuildTree,
    Run,
}

/// Collaborators a run needs besides the reporter
#[derive(Clone)]
pub struct RunContext {
    pub writer: Arc<dyn Writer>,
    pub output_interceptor: Arc<dyn OutputInterceptor>,
    pub interrupt_handler: Arc<dyn InterruptHandler>,
    /// Required when `parallel_total > 1`
    pub client: Option<Arc<dyn ParallelClient>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            writer: Arc::new(BufferWriter::new()),
            output_interceptor: Arc::new(NoopOutputInterceptor),
            interrupt_handler: Arc::new(InterruptController::new()),
            client: None,
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn Writer>) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_output_interceptor(mut self, interceptor: Arc<dyn OutputInterceptor>) -> Self {
        self.output_interceptor = interceptor;
        self
    }

    pub fn with_interrupt_handler(mut self, handler: Arc<dyn InterruptHandler>) -> Self {
        self.interrupt_handler = handler;
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ParallelClient>) -> Self {
        self.client = Some(client);
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`Suite::run`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub succeeded: bool,
    pub has_programmatic_focus: bool,
}

/// The tree-construction and execution engine
#[derive(Default)]
pub struct Suite {
    phase: Phase,
    root: TreeNode,
    /// Containers currently being entered, innermost last
    stack: Vec<TreeNode>,
    top_level_containers: Vec<Node>,
    suite_nodes: Nodes,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Flatten the tree and run every spec. Spec failures are reported
    /// through the reporter and the outcome; errors are reserved for misuse.
    pub async fn run(
        &mut self,
        description: &str,
        suite_path: &str,
        reporter: &mut dyn Reporter,
        ctx: RunContext,
        config: SuiteConfig,
    ) -> Result<RunOutcome, SuiteError> {
        match self.phase {
            Phase::BuildTopLevel => return Err(SuiteError::RunBeforeBuildTree),
            Phase::Run => return Err(SuiteError::AlreadyRan),
            Phase::BuildTree => {}
        }
        config.validate()?;

        let client = if config.is_parallel() {
            match ctx.client.clone() {
                Some(client) => Some(client),
                None => return Err(SuiteError::MissingParallelClient(config.parallel_total)),
            }
        } else {
            None
        };

        let tree = std::mem::take(&mut self.root);
        let (specs, has_programmatic_focus) = ordering::order_specs(tree, description, &config)?;
        self.phase = Phase::Run;

        if let Some(client) = &client {
            client.connect().await?;
        }

        info!(
            "Running suite {} on worker {}/{} with seed {}",
            description, config.parallel_worker, config.parallel_total, config.random_seed
        );

        let report = Report {
            suite_path: suite_path.to_string(),
            suite_description: description.to_string(),
            suite_has_programmatic_focus: has_programmatic_focus,
            suite_config: config.clone(),
            ..Default::default()
        };
        let mut runner = Runner::new(&self.suite_nodes, reporter, ctx, client, &config, report);
        let succeeded = runner.run_specs(specs).await;

        Ok(RunOutcome {
            succeeded,
            has_programmatic_focus,
        })
    }
}
