//! Flattening pipeline
//!
//! Turns the built tree into the ordered spec list the runner consumes:
//! nested focus policy, spec generation, seeded shuffle, then focus and skip
//! filtering. Every worker runs the same pipeline with the same seed, so every
//! worker sees the same list.

mod focus;
mod shuffle;
mod specs;

pub use focus::{apply_focus_to_specs, apply_nested_focus_policy};
pub use shuffle::shuffle_specs;
pub use specs::generate_specs_from_tree_root;

use crate::config::SuiteConfig;
use crate::errors::SuiteError;
use crate::models::{Specs, TreeNode};

/// Run the whole pipeline. Returns the specs and whether any programmatic
/// focus is in effect.
pub fn order_specs(
    tree: TreeNode,
    description: &str,
    config: &SuiteConfig,
) -> Result<(Specs, bool), SuiteError> {
    let tree = apply_nested_focus_policy(tree);
    let specs = generate_specs_from_tree_root(&tree);
    let specs = shuffle_specs(specs, config.random_seed, config.randomize_all_specs);
    apply_focus_to_specs(
        specs,
        description,
        &config.focus_strings,
        &config.skip_strings,
    )
}
