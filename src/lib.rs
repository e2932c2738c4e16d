//! speckle - execution engine for behaviour-driven spec trees
//!
//! Nodes are declared against a [`Suite`], assembled into a tree, flattened
//! into specs and run with retries, interrupts and suite-level hooks.
//! Several worker processes can share one suite through a [`ParallelClient`].
//!
//! ## Features
//!
//! - Two-pass tree construction with deferred container bodies
//! - Setup and cleanup scoped to the nesting level a spec actually reached
//! - Flaky-spec retries, fail-fast, dry-run, pending and focus policies
//! - Interruptible node bodies (ctrl-c, timeout, peer abort)
//! - Synchronized before/after-suite hooks across parallel workers
//! - Table-driven specs via [`describe_table`] and [`entry!`]
//!
//! ## Usage
//!
//! ```ignore
//! use speckle::{fail, init_logger, Node, RunContext, Suite, SuiteArgs, TracingReporter};
//!
//! let args = SuiteArgs::parse();
//! init_logger(args.log_level());
//!
//! let mut suite = Suite::new();
//! suite.push_node(Node::container("arithmetic", |s| {
//!     s.push_node(Node::it("adds", || {
//!         if 1 + 1 != 2 {
//!             fail("math is broken");
//!         }
//!     }))
//! }))?;
//! suite.build_tree()?;
//!
//! let mut reporter = TracingReporter::new();
//! let outcome = suite
//!     .run("arithmetic", "tests/arithmetic", &mut reporter, RunContext::new(), args.into_config()?)
//!     .await?;
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod failer;
pub mod interrupt;
pub mod models;
pub mod ordering;
pub mod output;
pub mod parallel;
pub mod suite;
pub mod table;
pub mod utils;

pub use cli::SuiteArgs;
pub use config::SuiteConfig;
pub use context::{
    abort_suite, add_report_entry, current_failer, current_spec_report, fail, fail_at, skip,
    spec_writer,
};
pub use errors::{ParameterError, SuiteError, TransportError};
pub use interrupt::{InterruptCause, InterruptController, InterruptHandler};
pub use models::{CodeLocation, Node, NodeType, Report, SpecReport, SpecState};
pub use output::{Reporter, TracingReporter};
pub use parallel::{LocalCoordinator, ParallelClient};
pub use suite::{Phase, RunContext, RunOutcome, Suite};
pub use table::{describe_table, Entry, EntryDescription};
pub use utils::logger::{init_logger, LogLevel};
