//! Node registration and tree construction

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

use super::{Phase, Suite};
use crate::errors::SuiteError;
use crate::failer::panic_message;
use crate::models::{ContainerBody, Node, NodeKind, NodeType, TreeNode};

const BEFORE_SUITE_FAMILY: &[NodeType] = &[NodeType::BeforeSuite, NodeType::SynchronizedBeforeSuite];
const AFTER_SUITE_FAMILY: &[NodeType] = &[NodeType::AfterSuite, NodeType::SynchronizedAfterSuite];

impl Suite {
    /// Register a node with the suite.
    ///
    /// Suite-level nodes go to a side list. Containers are recorded while
    /// building the top level and entered while building the tree; every
    /// other node becomes a child of the innermost open container.
    pub fn push_node(&mut self, node: Node) -> Result<(), SuiteError> {
        if node.is_focused() && node.is_pending() {
            return Err(SuiteError::InvalidDecorations {
                node_type: node.node_type(),
                location: node.location().clone(),
            });
        }

        if node.node_type().is_suite_level() {
            return self.push_suite_node(node);
        }

        if self.phase == Phase::Run {
            return Err(SuiteError::PushingNodeInRunPhase {
                node_type: node.node_type(),
                location: node.location().clone(),
            });
        }

        if let NodeKind::Container(body) = node.kind() {
            let body = Arc::clone(body);
            return match self.phase {
                Phase::BuildTopLevel => {
                    self.top_level_containers.push(node);
                    Ok(())
                }
                _ => self.enter_container(node, body),
            };
        }

        let level = self.stack.len();
        self.current_tree()
            .append_child(TreeNode::new(node.with_nesting_level(level)));
        Ok(())
    }

    /// Enter every recorded top-level container, in registration order
    pub fn build_tree(&mut self) -> Result<(), SuiteError> {
        if self.phase != Phase::BuildTopLevel {
            return Err(SuiteError::TreeAlreadyBuilt);
        }
        self.phase = Phase::BuildTree;

        let containers = std::mem::take(&mut self.top_level_containers);
        debug!("Building tree from {} top-level containers", containers.len());
        for container in containers {
            self.push_node(container)?;
        }
        Ok(())
    }

    fn push_suite_node(&mut self, node: Node) -> Result<(), SuiteError> {
        let node_type = node.node_type();
        let location = node.location().clone();

        match self.phase {
            Phase::BuildTree => {
                return Err(SuiteError::SuiteNodeInNestedContext {
                    node_type,
                    location,
                })
            }
            Phase::Run => {
                return Err(SuiteError::SuiteNodeDuringRunPhase {
                    node_type,
                    location,
                })
            }
            Phase::BuildTopLevel => {}
        }

        if node_type.is_before_suite_family() {
            if let Some(earlier) = self.suite_nodes.first_node_with_type(BEFORE_SUITE_FAMILY) {
                return Err(SuiteError::MultipleBeforeSuiteNodes {
                    node_type,
                    location,
                    earlier_node_type: earlier.node_type(),
                    earlier_location: earlier.location().clone(),
                });
            }
        }
        if node_type.is_after_suite_family() {
            if let Some(earlier) = self.suite_nodes.first_node_with_type(AFTER_SUITE_FAMILY) {
                return Err(SuiteError::MultipleAfterSuiteNodes {
                    node_type,
                    location,
                    earlier_node_type: earlier.node_type(),
                    earlier_location: earlier.location().clone(),
                });
            }
        }

        self.suite_nodes.push(node);
        Ok(())
    }

    /// Open a subtree for `node`, run its body, then attach the subtree to
    /// the parent even when the body failed.
    fn enter_container(&mut self, node: Node, body: ContainerBody) -> Result<(), SuiteError> {
        let location = node.location().clone();
        let level = self.stack.len();
        self.stack.push(TreeNode::new(node.with_nesting_level(level)));

        let result = panic::catch_unwind(AssertUnwindSafe(|| body(self)));

        if let Some(subtree) = self.stack.pop() {
            self.current_tree().append_child(subtree);
        }

        match result {
            Ok(result) => result,
            Err(payload) => Err(SuiteError::CaughtPanicDuringBuildPhase {
                payload: panic_message(payload.as_ref()),
                location,
            }),
        }
    }

    fn current_tree(&mut self) -> &mut TreeNode {
        match self.stack.last_mut() {
            Some(tree) => tree,
            None => &mut self.root,
        }
    }
}
