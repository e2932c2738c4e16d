//! Result records for specs and whole suites
//!
//! A [`SpecReport`] is created fresh for every spec or hook invocation and is
//! only mutated by the orchestrator while that invocation runs. Once handed to
//! a reporter it is read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use super::{CodeLocation, Node, NodeType};
use crate::config::SuiteConfig;

/// Outcome of a spec or hook
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecState {
    #[default]
    Invalid,
    Pending,
    Skipped,
    Passed,
    Failed,
    Aborted,
    Panicked,
    Interrupted,
}

impl SpecState {
    pub fn symbol(&self) -> &'static str {
        match self {
            SpecState::Invalid => "?",
            SpecState::Pending => "P",
            SpecState::Skipped => "S",
            SpecState::Passed => "✓",
            SpecState::Failed => "✗",
            SpecState::Aborted => "A",
            SpecState::Panicked => "!",
            SpecState::Interrupted => "^C",
        }
    }

    /// States that make the suite fail
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SpecState::Failed | SpecState::Aborted | SpecState::Panicked | SpecState::Interrupted
        )
    }

    pub fn is(&self, states: &[SpecState]) -> bool {
        states.contains(self)
    }
}

impl fmt::Display for SpecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecState::Invalid => write!(f, "INVALID"),
            SpecState::Pending => write!(f, "PENDING"),
            SpecState::Skipped => write!(f, "SKIPPED"),
            SpecState::Passed => write!(f, "PASSED"),
            SpecState::Failed => write!(f, "FAILED"),
            SpecState::Aborted => write!(f, "ABORTED"),
            SpecState::Panicked => write!(f, "PANICKED"),
            SpecState::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Where in the spec's ancestry the failing node sits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "context", rename_all = "snake_case")]
pub enum FailureNodeContext {
    #[default]
    Invalid,
    LeafNode,
    TopLevel,
    InContainer { container_index: usize },
}

impl FailureNodeContext {
    /// Classify a node: leaf for `It` and suite-level nodes, top-level for
    /// nesting level 0, otherwise the zero-based index of its container
    pub fn for_node(node: &Node) -> Self {
        let node_type = node.node_type();
        if node_type == NodeType::It || node_type.is_suite_level() {
            FailureNodeContext::LeafNode
        } else if node.nesting_level() == 0 {
            FailureNodeContext::TopLevel
        } else {
            FailureNodeContext::InContainer {
                container_index: node.nesting_level() - 1,
            }
        }
    }
}

/// Why a node did not pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    pub location: CodeLocation,
    /// Text of a trapped panic; `None` for explicit failures
    pub forwarded_panic: Option<String>,
    pub failure_node_context: FailureNodeContext,
    pub failure_node_type: NodeType,
    pub failure_node_location: CodeLocation,
}

impl Failure {
    /// Failure pre-populated with the node context, message left empty
    pub fn for_node(node: &Node) -> Self {
        Self {
            failure_node_context: FailureNodeContext::for_node(node),
            failure_node_type: node.node_type(),
            failure_node_location: node.location().clone(),
            ..Default::default()
        }
    }

    /// Failed leaf-node failure carrying an error message
    pub fn for_leaf_node_with_error(node: &Node, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: node.location().clone(),
            forwarded_panic: None,
            failure_node_context: FailureNodeContext::LeafNode,
            failure_node_type: node.node_type(),
            failure_node_location: node.location().clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.message.is_empty() && self.location.is_zero()
    }
}

/// Named value attached to a spec by its running body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub location: CodeLocation,
    pub time: DateTime<Utc>,
    pub value: serde_json::Value,
}

/// Result of one spec or suite-level hook
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpecReport {
    pub container_hierarchy_texts: Vec<String>,
    pub container_hierarchy_locations: Vec<CodeLocation>,
    pub leaf_node_type: NodeType,
    pub leaf_node_location: CodeLocation,
    pub leaf_node_text: String,

    pub state: SpecState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub run_time: Duration,
    pub parallel_worker: usize,
    pub failure: Failure,
    pub num_attempts: u32,

    pub captured_writer_output: String,
    pub captured_std_out_err: String,
    pub report_entries: Vec<ReportEntry>,
}

impl SpecReport {
    /// Container texts and leaf text, space-joined
    pub fn full_text(&self) -> String {
        let mut texts: Vec<&str> = self
            .container_hierarchy_texts
            .iter()
            .map(String::as_str)
            .collect();
        if !self.leaf_node_text.is_empty() {
            texts.push(&self.leaf_node_text);
        }
        texts.join(" ")
    }

    pub fn failed(&self) -> bool {
        self.state.is_failure()
    }
}

impl fmt::Display for SpecReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.full_text();
        let label = if text.is_empty() {
            self.leaf_node_type.to_string()
        } else {
            text
        };
        write!(
            f,
            "{} [{}] {} [{}ms]",
            self.state.symbol(),
            self.leaf_node_type,
            label,
            self.run_time.as_millis()
        )?;
        if self.num_attempts > 1 {
            write!(f, " ({} attempts)", self.num_attempts)?;
        }
        if self.state.is_failure() && !self.failure.message.is_empty() {
            write!(f, " - {}", self.failure.message)?;
        }
        Ok(())
    }
}

/// Counts known before any spec runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreRunStats {
    pub total_specs: usize,
    pub specs_that_will_run: usize,
}

/// Suite-wide aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Report {
    pub suite_path: String,
    pub suite_description: String,
    pub suite_succeeded: bool,
    pub suite_has_programmatic_focus: bool,
    pub special_suite_failure_reasons: Vec<String>,
    pub pre_run_stats: PreRunStats,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub run_time: Duration,
    pub suite_config: SuiteConfig,
    pub spec_reports: Vec<SpecReport>,
}

impl Report {
    /// Combine with a report from another worker: spec reports are
    /// concatenated, success is ANDed, failure reasons are de-duplicated and
    /// the time window widened to cover both.
    pub fn add(mut self, other: Report) -> Report {
        self.suite_succeeded = self.suite_succeeded && other.suite_succeeded;

        self.start_time = match (self.start_time, other.start_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.end_time = match (self.end_time, other.end_time) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            self.run_time = (end - start).to_std().unwrap_or_default();
        }

        let mut seen = HashSet::new();
        let reasons: Vec<String> = self
            .special_suite_failure_reasons
            .drain(..)
            .chain(other.special_suite_failure_reasons)
            .filter(|reason| seen.insert(reason.clone()))
            .collect();
        self.special_suite_failure_reasons = reasons;

        self.spec_reports.extend(other.spec_reports);
        self
    }

    pub fn count_with_state(&self, state: SpecState) -> usize {
        self.spec_reports
            .iter()
            .filter(|r| r.leaf_node_type == NodeType::It && r.state == state)
            .count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Suite: {}", self.suite_description)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for spec_report in &self.spec_reports {
            writeln!(f, "  {spec_report}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for reason in &self.special_suite_failure_reasons {
            writeln!(f, "  {reason}")?;
        }
        writeln!(
            f,
            "Ran {} of {} | Pass: {} | Fail: {} | Pending: {} | Skip: {}",
            self.pre_run_stats.specs_that_will_run,
            self.pre_run_stats.total_specs,
            self.count_with_state(SpecState::Passed),
            self.count_with_state(SpecState::Failed) + self.count_with_state(SpecState::Panicked),
            self.count_with_state(SpecState::Pending),
            self.count_with_state(SpecState::Skipped),
        )?;
        writeln!(
            f,
            "{} | Duration: {}ms",
            if self.suite_succeeded { "SUCCESS" } else { "FAIL" },
            self.run_time.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec_report(text: &str, state: SpecState) -> SpecReport {
        SpecReport {
            leaf_node_type: NodeType::It,
            leaf_node_text: text.to_string(),
            state,
            ..Default::default()
        }
    }

    #[test]
    fn test_failure_states() {
        assert!(SpecState::Failed.is_failure());
        assert!(SpecState::Panicked.is_failure());
        assert!(SpecState::Interrupted.is_failure());
        assert!(SpecState::Aborted.is_failure());
        assert!(!SpecState::Skipped.is_failure());
        assert!(!SpecState::Pending.is_failure());
        assert!(!SpecState::Passed.is_failure());
    }

    #[test]
    fn test_failure_node_context() {
        let it = Node::it("leaf", || {}).with_nesting_level(3);
        assert_eq!(FailureNodeContext::for_node(&it), FailureNodeContext::LeafNode);

        let top = Node::before_each(|| {});
        assert_eq!(FailureNodeContext::for_node(&top), FailureNodeContext::TopLevel);

        let nested = Node::after_each(|| {}).with_nesting_level(2);
        assert_eq!(
            FailureNodeContext::for_node(&nested),
            FailureNodeContext::InContainer { container_index: 1 }
        );

        let suite = Node::after_suite(|| {});
        assert_eq!(FailureNodeContext::for_node(&suite), FailureNodeContext::LeafNode);
    }

    #[test]
    fn test_report_add() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 5).unwrap();

        let primary = Report {
            suite_succeeded: true,
            special_suite_failure_reasons: vec!["interrupted".into()],
            start_time: Some(late),
            end_time: Some(late),
            spec_reports: vec![spec_report("a", SpecState::Passed)],
            ..Default::default()
        };
        let other = Report {
            suite_succeeded: false,
            special_suite_failure_reasons: vec!["interrupted".into(), "pending".into()],
            start_time: Some(early),
            end_time: Some(late),
            spec_reports: vec![spec_report("b", SpecState::Failed)],
            ..Default::default()
        };

        let combined = primary.add(other);
        assert!(!combined.suite_succeeded);
        assert_eq!(combined.spec_reports.len(), 2);
        assert_eq!(combined.spec_reports[1].leaf_node_text, "b");
        assert_eq!(
            combined.special_suite_failure_reasons,
            vec!["interrupted".to_string(), "pending".to_string()]
        );
        assert_eq!(combined.start_time, Some(early));
        assert_eq!(combined.run_time, Duration::from_secs(5));
    }

    #[test]
    fn test_spec_report_display() {
        let mut report = spec_report("adds", SpecState::Failed);
        report.container_hierarchy_texts = vec!["math".into()];
        report.failure.message = "expected 3".into();
        report.num_attempts = 2;
        let line = report.to_string();
        assert!(line.contains("math adds"));
        assert!(line.contains("(2 attempts)"));
        assert!(line.contains("expected 3"));
    }
}
