//! Error types
//!
//! Build and phase errors abort tree construction, parameter errors are
//! deferred into a failing leaf, transport errors come from the parallel
//! coordination service.

use thiserror::Error;

use crate::models::{CodeLocation, NodeType};

/// Errors raised while building or launching a suite
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("{node_type} at {location} was pushed during the run phase; nodes can only be registered while the tree is being built")]
    PushingNodeInRunPhase {
        node_type: NodeType,
        location: CodeLocation,
    },

    #[error("{node_type} at {location} is nested inside a container; suite-level nodes must be registered at the top level")]
    SuiteNodeInNestedContext {
        node_type: NodeType,
        location: CodeLocation,
    },

    #[error("{node_type} at {location} was pushed during the run phase; suite-level nodes must be registered before the suite runs")]
    SuiteNodeDuringRunPhase {
        node_type: NodeType,
        location: CodeLocation,
    },

    #[error("{node_type} at {location} is a second before-suite node; {earlier_node_type} is already registered at {earlier_location}")]
    MultipleBeforeSuiteNodes {
        node_type: NodeType,
        location: CodeLocation,
        earlier_node_type: NodeType,
        earlier_location: CodeLocation,
    },

    #[error("{node_type} at {location} is a second after-suite node; {earlier_node_type} is already registered at {earlier_location}")]
    MultipleAfterSuiteNodes {
        node_type: NodeType,
        location: CodeLocation,
        earlier_node_type: NodeType,
        earlier_location: CodeLocation,
    },

    #[error("panic while entering the container at {location}: {payload}")]
    CaughtPanicDuringBuildPhase {
        payload: String,
        location: CodeLocation,
    },

    #[error("{node_type} at {location} is marked both focused and pending")]
    InvalidDecorations {
        node_type: NodeType,
        location: CodeLocation,
    },

    #[error("the spec tree has already been built")]
    TreeAlreadyBuilt,

    #[error("cannot run before the spec tree is built; call build_tree() first")]
    RunBeforeBuildTree,

    #[error("the suite has already run")]
    AlreadyRan,

    #[error("report entry at {location} added outside of a running node")]
    ReportEntryOutsideRunPhase { location: CodeLocation },

    #[error("invalid focus/skip pattern: {0}")]
    InvalidFocusPattern(#[from] regex::Error),

    #[error("invalid suite configuration: {0}")]
    InvalidConfig(String),

    #[error("parallel_total is {0} but no parallel client was provided")]
    MissingParallelClient(usize),

    #[error("parallel transport: {0}")]
    Transport(#[from] TransportError),
}

/// Mismatch between a table entry's parameters and its body
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("{kind} at {location} received parameters it cannot accept: {reason}")]
    IncorrectParameters {
        kind: String,
        location: CodeLocation,
        reason: String,
    },
}

impl ParameterError {
    pub fn location(&self) -> &CodeLocation {
        match self {
            ParameterError::IncorrectParameters { location, .. } => location,
        }
    }
}

/// Failures of the parallel coordination service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected to the coordination service")]
    NotConnected,

    #[error("lost connection to the coordination service: {0}")]
    Disconnected(String),

    #[error("SynchronizedBeforeSuite failed on worker 1")]
    SynchronizedBeforeSuiteFailed,

    #[error("another worker aborted the suite")]
    Aborted,

    #[error("worker {worker} is outside 1..={total}")]
    InvalidWorker { worker: usize, total: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_suite_node_message_names_first_location() {
        let err = SuiteError::MultipleBeforeSuiteNodes {
            node_type: NodeType::SynchronizedBeforeSuite,
            location: CodeLocation::new("suite.rs", 20, 1),
            earlier_node_type: NodeType::BeforeSuite,
            earlier_location: CodeLocation::new("suite.rs", 10, 1),
        };
        let message = err.to_string();
        assert!(message.contains("suite.rs:10"));
        assert!(message.contains("BeforeSuite"));
    }

    #[test]
    fn test_transport_error_converts() {
        let err: SuiteError = TransportError::NotConnected.into();
        assert!(matches!(err, SuiteError::Transport(TransportError::NotConnected)));
    }
}
