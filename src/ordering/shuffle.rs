//! Seeded spec ordering

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::{NodeType, Specs};

/// Permute specs with a generator seeded by `seed`. Specs sharing their
/// first container or `It` stay together in declaration order unless
/// `randomize_all` is set.
pub fn shuffle_specs(specs: Specs, seed: u64, randomize_all: bool) -> Specs {
    let mut rng = StdRng::seed_from_u64(seed);

    if randomize_all {
        let mut specs = specs;
        specs.shuffle(&mut rng);
        return specs;
    }

    let mut groups: Vec<(u64, Specs)> = Vec::new();
    for spec in specs {
        let id = spec
            .nodes
            .first_node_with_type(&[NodeType::Container, NodeType::It])
            .map(|n| n.id())
            .unwrap_or_default();
        match groups.iter_mut().find(|(group_id, _)| *group_id == id) {
            Some((_, group)) => group.push(spec),
            None => groups.push((id, vec![spec])),
        }
    }

    groups.shuffle(&mut rng);
    groups.into_iter().flat_map(|(_, group)| group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, Spec};

    fn specs() -> Specs {
        let mut specs = Specs::new();
        for group in 0..6 {
            let container = Node::container(format!("group {group}"), |_| Ok(()));
            for leaf in 0..3 {
                specs.push(Spec::new(
                    vec![container.clone(), Node::it(format!("{group}.{leaf}"), || {})].into(),
                ));
            }
        }
        specs
    }

    fn texts(specs: &Specs) -> Vec<String> {
        specs.iter().map(|s| s.text()).collect()
    }

    #[test]
    fn test_same_seed_same_order() {
        let input = specs();
        let a = shuffle_specs(input.clone(), 17, false);
        let b = shuffle_specs(input, 17, false);
        assert_eq!(texts(&a), texts(&b));
    }

    #[test]
    fn test_groups_stay_together() {
        let shuffled = shuffle_specs(specs(), 3, false);
        assert_eq!(shuffled.len(), 18);
        for chunk in shuffled.chunks(3) {
            let group = chunk[0].nodes[0].text().to_string();
            assert!(chunk.iter().all(|s| s.nodes[0].text() == group));
            let leaves: Vec<_> = chunk.iter().map(|s| s.nodes[1].text().to_string()).collect();
            let mut sorted = leaves.clone();
            sorted.sort();
            assert_eq!(leaves, sorted);
        }
    }

    #[test]
    fn test_randomize_all_keeps_every_spec() {
        let shuffled = shuffle_specs(specs(), 99, true);
        let mut got = texts(&shuffled);
        let mut want = texts(&specs());
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }
}
