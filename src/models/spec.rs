//! Tree and spec structures
//!
//! The tree only exists while the suite is being built; flattening turns it
//! into [`Specs`], one per leaf `It`.

use super::{Node, NodeType, Nodes};

/// A node plus its children, in registration order
#[derive(Clone, Debug, Default)]
pub struct TreeNode {
    pub node: Option<Node>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// The nodeless root every suite starts from
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(node: Node) -> Self {
        Self {
            node: Some(node),
            children: Vec::new(),
        }
    }

    pub fn append_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }
}

/// One runnable leaf plus its ancestor chain
#[derive(Clone, Debug, Default)]
pub struct Spec {
    pub nodes: Nodes,
    pub skip: bool,
}

impl Spec {
    pub fn new(nodes: Nodes) -> Self {
        Self { nodes, skip: false }
    }

    /// The leaf `It` node
    pub fn leaf(&self) -> Option<&Node> {
        self.nodes.first_node_with_type(&[NodeType::It])
    }

    /// Full text used for focus matching: every node text, space-joined
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .map(|n| n.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub type Specs = Vec<Spec>;

/// Queries over an ordered spec list
pub trait SpecsExt {
    fn count_without_skip(&self) -> usize;
    fn has_any_specs_marked_pending(&self) -> bool;
}

impl SpecsExt for [Spec] {
    fn count_without_skip(&self) -> usize {
        self.iter().filter(|s| !s.skip).count()
    }

    fn has_any_specs_marked_pending(&self) -> bool {
        self.iter().any(|s| s.nodes.has_node_marked_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_leaf_and_text() {
        let spec = Spec::new(
            vec![
                Node::container("math", |_| Ok(())),
                Node::before_each(|| {}),
                Node::it("adds", || {}),
            ]
            .into(),
        );
        assert_eq!(spec.leaf().map(|n| n.text()), Some("adds"));
        assert_eq!(spec.text(), "math adds");
    }

    #[test]
    fn test_specs_queries() {
        let mut skipped = Spec::new(vec![Node::it("a", || {})].into());
        skipped.skip = true;
        let pending = Spec::new(vec![Node::it("b", || {}).pending()].into());
        let specs: Specs = vec![skipped, pending];

        assert_eq!(specs.count_without_skip(), 1);
        assert!(specs.has_any_specs_marked_pending());
    }
}
