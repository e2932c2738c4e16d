//! Spec generation

use crate::models::{Node, NodeType, Nodes, Spec, Specs, TreeNode};

const CONTAINER_AND_IT: &[NodeType] = &[NodeType::Container, NodeType::It];

/// Flatten the tree depth-first into one spec per `It`. Each spec holds its
/// ancestor containers plus the setup and teardown siblings found at every
/// level on the way down.
pub fn generate_specs_from_tree_root(root: &TreeNode) -> Specs {
    let mut specs = Specs::new();
    walk(&root.children, &Nodes::new(), &Nodes::new(), &mut specs);
    specs
}

fn walk(trees: &[TreeNode], left: &Nodes, right: &Nodes, specs: &mut Specs) {
    let nodes: Vec<&Node> = trees.iter().filter_map(|t| t.node.as_ref()).collect();

    for (index, tree) in trees.iter().enumerate() {
        let Some(node) = tree.node.as_ref() else {
            continue;
        };
        if !node.node_type().is(CONTAINER_AND_IT) {
            continue;
        }

        let mut left_nodes = left.clone();
        left_nodes.extend(siblings(&nodes[..index]));
        let mut right_nodes = siblings(&nodes[index + 1..]);
        right_nodes.extend(right.clone());

        left_nodes.push(node.clone());
        if node.node_type() == NodeType::It {
            left_nodes.extend(right_nodes);
            specs.push(Spec::new(left_nodes));
        } else {
            walk(&tree.children, &left_nodes, &right_nodes, specs);
        }
    }
}

fn siblings(nodes: &[&Node]) -> Nodes {
    nodes
        .iter()
        .filter(|n| !n.node_type().is(CONTAINER_AND_IT))
        .map(|n| (*n).clone())
        .collect()
}
