//! Focus handling

use regex::Regex;

use crate::errors::SuiteError;
use crate::models::{Spec, Specs, TreeNode};

/// Drop the focus of any container that has a focused descendant, so the
/// narrower focus wins. Pending subtrees are left alone.
pub fn apply_nested_focus_policy(mut tree: TreeNode) -> TreeNode {
    walk(&mut tree);
    tree
}

fn walk(tree: &mut TreeNode) -> bool {
    if tree.node.as_ref().is_some_and(|n| n.is_pending()) {
        return false;
    }

    let mut has_focused_descendant = false;
    for child in &mut tree.children {
        has_focused_descendant |= walk(child);
    }

    match tree.node.as_mut() {
        Some(node) => {
            let focused = node.is_focused() && !has_focused_descendant;
            node.set_focus(focused);
            focused || has_focused_descendant
        }
        None => has_focused_descendant,
    }
}

/// Mark specs skipped by pending decorations, programmatic focus and the
/// focus/skip patterns. Programmatic focus only applies when no patterns
/// were given.
pub fn apply_focus_to_specs(
    mut specs: Specs,
    description: &str,
    focus_strings: &[String],
    skip_strings: &[String],
) -> Result<(Specs, bool), SuiteError> {
    let focus = compile(focus_strings)?;
    let skip = compile(skip_strings)?;
    let has_cli_filters = focus.is_some() || skip.is_some();

    let has_programmatic_focus = !has_cli_filters
        && specs
            .iter()
            .any(|s| s.nodes.has_node_marked_focus() && !s.nodes.has_node_marked_pending());

    for spec in &mut specs {
        let skipped = spec.nodes.has_node_marked_pending()
            || (has_programmatic_focus && !spec.nodes.has_node_marked_focus())
            || focus
                .as_ref()
                .is_some_and(|re| !re.is_match(&match_text(description, spec)))
            || skip
                .as_ref()
                .is_some_and(|re| re.is_match(&match_text(description, spec)));
        if skipped {
            spec.skip = true;
        }
    }

    Ok((specs, has_programmatic_focus))
}

fn compile(patterns: &[String]) -> Result<Option<Regex>, SuiteError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    Ok(Some(Regex::new(&patterns.join("|"))?))
}

fn match_text(description: &str, spec: &Spec) -> String {
    std::iter::once(description.to_string())
        .chain(spec.nodes.texts())
        .collect::<Vec<_>>()
        .join(" ")
}
