//! Data models for spec trees and their results
//!
//! This module contains the node, spec and report structures shared by the
//! orchestrator, the ordering pipeline, reporters and the parallel transport.

mod code_location;
mod node;
mod report;
mod spec;

pub use code_location::CodeLocation;
pub use node::{
    BeforeSuiteAllBody, BeforeSuitePrimaryBody, ContainerBody, Node, NodeKind, NodeType, Nodes,
    ReportAfterEachBody, ReportAfterSuiteBody, RunBody,
};
pub use report::{
    Failure, FailureNodeContext, PreRunStats, Report, ReportEntry, SpecReport, SpecState,
};
pub use spec::{Spec, Specs, SpecsExt, TreeNode};
