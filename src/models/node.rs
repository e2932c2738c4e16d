//! Spec tree nodes
//!
//! A [`Node`] is one declared unit of the tree: a container, a setup or
//! teardown hook, a leaf `It`, a suite-level hook or a report hook. The body a
//! node carries depends on its kind, so [`NodeKind`] is a tagged variant whose
//! arms hold exactly the closures that kind needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{CodeLocation, Report, SpecReport};
use crate::errors::SuiteError;
use crate::suite::Suite;

/// Body of every node that runs during the run phase and takes no input
pub type RunBody = Arc<dyn Fn() + Send + Sync>;

/// Body of a container; children are registered through the suite handed in
pub type ContainerBody = Arc<dyn Fn(&mut Suite) -> Result<(), SuiteError> + Send + Sync>;

/// Runs on worker 1 only and produces the data shared with every worker
pub type BeforeSuitePrimaryBody = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Runs on every worker with the data produced by worker 1
pub type BeforeSuiteAllBody = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

pub type ReportAfterEachBody = Arc<dyn Fn(&SpecReport) + Send + Sync>;

pub type ReportAfterSuiteBody = Arc<dyn Fn(&Report) + Send + Sync>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Node type tag, the part of a node that ends up in reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Invalid,
    Container,
    It,
    BeforeEach,
    JustBeforeEach,
    AfterEach,
    JustAfterEach,
    BeforeSuite,
    AfterSuite,
    SynchronizedBeforeSuite,
    SynchronizedAfterSuite,
    ReportAfterEach,
    ReportAfterSuite,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Invalid => "INVALID NODE TYPE",
            NodeType::Container => "Container",
            NodeType::It => "It",
            NodeType::BeforeEach => "BeforeEach",
            NodeType::JustBeforeEach => "JustBeforeEach",
            NodeType::AfterEach => "AfterEach",
            NodeType::JustAfterEach => "JustAfterEach",
            NodeType::BeforeSuite => "BeforeSuite",
            NodeType::AfterSuite => "AfterSuite",
            NodeType::SynchronizedBeforeSuite => "SynchronizedBeforeSuite",
            NodeType::SynchronizedAfterSuite => "SynchronizedAfterSuite",
            NodeType::ReportAfterEach => "ReportAfterEach",
            NodeType::ReportAfterSuite => "ReportAfterSuite",
        }
    }

    /// Nodes that live outside the tree and run once per suite
    pub fn is_suite_level(&self) -> bool {
        matches!(
            self,
            NodeType::BeforeSuite
                | NodeType::AfterSuite
                | NodeType::SynchronizedBeforeSuite
                | NodeType::SynchronizedAfterSuite
                | NodeType::ReportAfterSuite
        )
    }

    pub fn is_before_suite_family(&self) -> bool {
        matches!(
            self,
            NodeType::BeforeSuite | NodeType::SynchronizedBeforeSuite
        )
    }

    pub fn is_after_suite_family(&self) -> bool {
        matches!(self, NodeType::AfterSuite | NodeType::SynchronizedAfterSuite)
    }

    pub fn is_container_or_it(&self) -> bool {
        matches!(self, NodeType::Container | NodeType::It)
    }

    pub fn is(&self, types: &[NodeType]) -> bool {
        types.contains(self)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The executable part of a node, one variant per node type
#[derive(Clone)]
pub enum NodeKind {
    Container(ContainerBody),
    It(RunBody),
    BeforeEach(RunBody),
    JustBeforeEach(RunBody),
    AfterEach(RunBody),
    JustAfterEach(RunBody),
    BeforeSuite(RunBody),
    AfterSuite(RunBody),
    SynchronizedBeforeSuite {
        primary: BeforeSuitePrimaryBody,
        all: BeforeSuiteAllBody,
    },
    SynchronizedAfterSuite {
        all: RunBody,
        primary: RunBody,
    },
    ReportAfterEach(ReportAfterEachBody),
    ReportAfterSuite(ReportAfterSuiteBody),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Container(_) => NodeType::Container,
            NodeKind::It(_) => NodeType::It,
            NodeKind::BeforeEach(_) => NodeType::BeforeEach,
            NodeKind::JustBeforeEach(_) => NodeType::JustBeforeEach,
            NodeKind::AfterEach(_) => NodeType::AfterEach,
            NodeKind::JustAfterEach(_) => NodeType::JustAfterEach,
            NodeKind::BeforeSuite(_) => NodeType::BeforeSuite,
            NodeKind::AfterSuite(_) => NodeType::AfterSuite,
            NodeKind::SynchronizedBeforeSuite { .. } => NodeType::SynchronizedBeforeSuite,
            NodeKind::SynchronizedAfterSuite { .. } => NodeType::SynchronizedAfterSuite,
            NodeKind::ReportAfterEach(_) => NodeType::ReportAfterEach,
            NodeKind::ReportAfterSuite(_) => NodeType::ReportAfterSuite,
        }
    }

    /// The plain zero-argument body, for kinds that have one
    pub fn run_body(&self) -> Option<&RunBody> {
        match self {
            NodeKind::It(body)
            | NodeKind::BeforeEach(body)
            | NodeKind::JustBeforeEach(body)
            | NodeKind::AfterEach(body)
            | NodeKind::JustAfterEach(body)
            | NodeKind::BeforeSuite(body)
            | NodeKind::AfterSuite(body) => Some(body),
            _ => None,
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKind::{}", self.node_type())
    }
}

/// A declared node. Immutable once pushed onto a suite.
#[derive(Clone, Debug)]
pub struct Node {
    id: u64,
    kind: NodeKind,
    text: String,
    location: CodeLocation,
    nesting_level: usize,
    marked_focus: bool,
    marked_pending: bool,
    flake_attempts: u32,
}

impl Node {
    /// Create a node of the given kind declared at `location`
    pub fn new(kind: NodeKind, text: impl Into<String>, location: CodeLocation) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            text: text.into(),
            location,
            nesting_level: 0,
            marked_focus: false,
            marked_pending: false,
            flake_attempts: 0,
        }
    }

    #[track_caller]
    pub fn container<F>(text: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut Suite) -> Result<(), SuiteError> + Send + Sync + 'static,
    {
        Self::new(
            NodeKind::Container(Arc::new(body)),
            text,
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn it(text: impl Into<String>, body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::It(Arc::new(body)), text, CodeLocation::caller())
    }

    #[track_caller]
    pub fn before_each(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::BeforeEach(Arc::new(body)), "", CodeLocation::caller())
    }

    #[track_caller]
    pub fn just_before_each(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(
            NodeKind::JustBeforeEach(Arc::new(body)),
            "",
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn after_each(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::AfterEach(Arc::new(body)), "", CodeLocation::caller())
    }

    #[track_caller]
    pub fn just_after_each(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(
            NodeKind::JustAfterEach(Arc::new(body)),
            "",
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn before_suite(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::BeforeSuite(Arc::new(body)), "", CodeLocation::caller())
    }

    #[track_caller]
    pub fn after_suite(body: impl Fn() + Send + Sync + 'static) -> Self {
        Self::new(NodeKind::AfterSuite(Arc::new(body)), "", CodeLocation::caller())
    }

    #[track_caller]
    pub fn synchronized_before_suite(
        primary: impl Fn() -> Vec<u8> + Send + Sync + 'static,
        all: impl Fn(Vec<u8>) + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            NodeKind::SynchronizedBeforeSuite {
                primary: Arc::new(primary),
                all: Arc::new(all),
            },
            "",
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn synchronized_after_suite(
        all: impl Fn() + Send + Sync + 'static,
        primary: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            NodeKind::SynchronizedAfterSuite {
                all: Arc::new(all),
                primary: Arc::new(primary),
            },
            "",
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn report_after_each(body: impl Fn(&SpecReport) + Send + Sync + 'static) -> Self {
        Self::new(
            NodeKind::ReportAfterEach(Arc::new(body)),
            "",
            CodeLocation::caller(),
        )
    }

    #[track_caller]
    pub fn report_after_suite(
        text: impl Into<String>,
        body: impl Fn(&Report) + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            NodeKind::ReportAfterSuite(Arc::new(body)),
            text,
            CodeLocation::caller(),
        )
    }

    /// Mark the node as focused
    pub fn focused(mut self) -> Self {
        self.marked_focus = true;
        self
    }

    /// Mark the node as pending
    pub fn pending(mut self) -> Self {
        self.marked_pending = true;
        self
    }

    /// Retry budget for specs this node belongs to
    pub fn with_flake_attempts(mut self, attempts: u32) -> Self {
        self.flake_attempts = attempts;
        self
    }

    /// Override the declaration site
    pub fn at(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    pub fn is_focused(&self) -> bool {
        self.marked_focus
    }

    pub fn is_pending(&self) -> bool {
        self.marked_pending
    }

    pub fn flake_attempts(&self) -> u32 {
        self.flake_attempts
    }

    pub(crate) fn with_nesting_level(mut self, level: usize) -> Self {
        self.nesting_level = level;
        self
    }

    pub(crate) fn set_focus(&mut self, focus: bool) {
        self.marked_focus = focus;
    }
}

/// Ordered collection of nodes with the queries the runner needs
#[derive(Clone, Debug, Default)]
pub struct Nodes(Vec<Node>);

impl Nodes {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    pub fn extend(&mut self, other: Nodes) {
        self.0.extend(other.0);
    }

    pub fn with_type(&self, types: &[NodeType]) -> Nodes {
        self.0
            .iter()
            .filter(|n| n.node_type().is(types))
            .cloned()
            .collect()
    }

    pub fn without_type(&self, types: &[NodeType]) -> Nodes {
        self.0
            .iter()
            .filter(|n| !n.node_type().is(types))
            .cloned()
            .collect()
    }

    pub fn first_node_with_type(&self, types: &[NodeType]) -> Option<&Node> {
        self.0.iter().find(|n| n.node_type().is(types))
    }

    pub fn sorted_by_ascending_nesting_level(mut self) -> Nodes {
        self.0.sort_by_key(|n| n.nesting_level);
        self
    }

    pub fn sorted_by_descending_nesting_level(mut self) -> Nodes {
        self.0
            .sort_by(|a, b| b.nesting_level.cmp(&a.nesting_level));
        self
    }

    /// Nodes whose nesting level is at most `level`
    pub fn within_nesting_level(self, level: usize) -> Nodes {
        self.0
            .into_iter()
            .filter(|n| n.nesting_level <= level)
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.0.iter().map(|n| n.text.clone()).collect()
    }

    pub fn code_locations(&self) -> Vec<CodeLocation> {
        self.0.iter().map(|n| n.location.clone()).collect()
    }

    pub fn has_node_marked_pending(&self) -> bool {
        self.0.iter().any(|n| n.marked_pending)
    }

    pub fn has_node_marked_focus(&self) -> bool {
        self.0.iter().any(|n| n.marked_focus)
    }

    /// Largest flake-attempt decoration among the nodes
    pub fn flake_attempts(&self) -> u32 {
        self.0.iter().map(|n| n.flake_attempts).max().unwrap_or(0)
    }

    /// The node's own text, or the text of the container one level up
    pub fn best_text_for(&self, node: &Node) -> String {
        if !node.text.is_empty() {
            return node.text.clone();
        }
        let Some(parent_level) = node.nesting_level.checked_sub(1) else {
            return String::new();
        };
        self.0
            .iter()
            .find(|n| !n.text.is_empty() && n.nesting_level == parent_level)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    }
}

impl Deref for Nodes {
    type Target = [Node];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Node> for Nodes {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Nodes {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Nodes {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Node>> for Nodes {
    fn from(nodes: Vec<Node>) -> Self {
        Self(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_level(node: Node, level: usize) -> Node {
        node.with_nesting_level(level)
    }

    #[test]
    fn test_node_types() {
        assert!(NodeType::SynchronizedAfterSuite.is_suite_level());
        assert!(NodeType::ReportAfterSuite.is_suite_level());
        assert!(!NodeType::ReportAfterEach.is_suite_level());
        assert!(NodeType::SynchronizedBeforeSuite.is_before_suite_family());
        assert!(NodeType::AfterSuite.is_after_suite_family());
        assert_eq!(NodeType::JustBeforeEach.to_string(), "JustBeforeEach");
    }

    #[test]
    fn test_constructors_capture_location_and_type() {
        let line = line!() + 1;
        let node = Node::it("adds", || {});
        assert_eq!(node.node_type(), NodeType::It);
        assert_eq!(node.text(), "adds");
        assert_eq!(node.location().line_number, line);
        assert!(node.kind().run_body().is_some());

        let sync = Node::synchronized_before_suite(Vec::new, |_| {});
        assert_eq!(sync.node_type(), NodeType::SynchronizedBeforeSuite);
        assert!(sync.kind().run_body().is_none());
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = Node::it("a", || {});
        let b = Node::it("a", || {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_decorations() {
        let node = Node::it("flaky", || {}).focused().with_flake_attempts(3);
        assert!(node.is_focused());
        assert!(!node.is_pending());
        assert_eq!(node.flake_attempts(), 3);
    }

    #[test]
    fn test_sorting_and_filtering() {
        let nodes: Nodes = vec![
            at_level(Node::after_each(|| {}), 1),
            at_level(Node::before_each(|| {}), 2),
            at_level(Node::before_each(|| {}), 0),
            at_level(Node::after_each(|| {}), 3),
        ]
        .into();

        let befores = nodes
            .with_type(&[NodeType::BeforeEach])
            .sorted_by_ascending_nesting_level();
        let levels: Vec<_> = befores.iter().map(|n| n.nesting_level()).collect();
        assert_eq!(levels, vec![0, 2]);

        let afters = nodes
            .with_type(&[NodeType::AfterEach])
            .sorted_by_descending_nesting_level()
            .within_nesting_level(2);
        let levels: Vec<_> = afters.iter().map(|n| n.nesting_level()).collect();
        assert_eq!(levels, vec![1]);
    }

    #[test]
    fn test_best_text_for_falls_back_to_parent_container() {
        let container = at_level(Node::container("a calculator", |_| Ok(())), 0);
        let setup = at_level(Node::before_each(|| {}), 1);
        let it = at_level(Node::it("adds", || {}), 1);
        let nodes: Nodes = vec![container, setup.clone(), it.clone()].into();

        assert_eq!(nodes.best_text_for(&setup), "a calculator");
        assert_eq!(nodes.best_text_for(&it), "adds");

        let top_level = Node::before_each(|| {});
        assert_eq!(nodes.best_text_for(&top_level), "");
    }

    #[test]
    fn test_flake_attempts_is_max() {
        let nodes: Nodes = vec![
            Node::container("c", |_| Ok(())).with_flake_attempts(2),
            Node::it("i", || {}).with_flake_attempts(5),
        ]
        .into();
        assert_eq!(nodes.flake_attempts(), 5);
        assert_eq!(Nodes::new().flake_attempts(), 0);
    }
}
