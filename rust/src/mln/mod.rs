//! Minimal lateral network construction.
//!
//! # Steps
//! 1. Count co-occurring gain origins in the primary graph.
//! 2. For every character with several origins, build its weight graph with
//!    the chosen resolution method and keep a minimum spanning tree.
//! 3. Aggregate the MST edges over all characters and add the tree edges as
//!    vertical edges.

pub mod network;
pub mod primary;
pub mod resolution;

pub use network::{EdgeRecord, Mln, NodePair};
pub use primary::PrimaryGraph;
pub use resolution::{minimum_spanning_tree, ResolutionMethod, WeightedPair};

use tracing::{debug, info, instrument};

use crate::error::{PhyboError, Result};
use crate::gls::ScenarioSet;
use crate::tree::Tree;

use resolution::Resolver;

/// Configuration for network construction.
#[derive(Clone, Debug, PartialEq)]
pub struct MlnConfig {
    /// How the origins of one character are connected. Default: majority-rule
    pub method: ResolutionMethod,
    /// Minimum weight of an emitted horizontal edge. Default: 1
    pub threshold: usize,
    /// Weight given to every vertical (tree) edge. Default: 1
    pub vertical_weight: usize,
}

impl Default for MlnConfig {
    fn default() -> Self {
        Self {
            method: ResolutionMethod::MajorityRule,
            threshold: 1,
            vertical_weight: 1,
        }
    }
}

impl MlnConfig {
    pub fn new(method: ResolutionMethod, threshold: usize) -> Self {
        Self {
            method,
            threshold,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vertical_weight == 0 {
            return Err(PhyboError::config("vertical edge weight must be at least 1"));
        }
        Ok(())
    }
}

/// Build the network of `scenarios` with `method`, emitting horizontal edges
/// of weight `threshold` or more.
pub fn build_mln(scenarios: &ScenarioSet, tree: &Tree, method: ResolutionMethod, threshold: usize) -> Result<Mln> {
    build_mln_with(scenarios, tree, &MlnConfig::new(method, threshold))
}

/// Build the network of `scenarios` with a full configuration.
#[instrument(skip_all, fields(label = scenarios.label(), method = %config.method))]
pub fn build_mln_with(scenarios: &ScenarioSet, tree: &Tree, config: &MlnConfig) -> Result<Mln> {
    config.validate()?;

    let primary = PrimaryGraph::from_scenarios(tree, scenarios)?;
    debug!(
        edges = primary.edge_count(),
        max_weight = primary.max_weight(),
        "primary graph built"
    );

    let resolver = Resolver::new(config.method, tree, &primary);
    let mut mln = Mln::new(scenarios.label(), config.method, config.threshold);

    let mut inherited: Vec<Vec<String>> = vec![Vec::new(); tree.n_nodes];
    for (character, scenario) in scenarios.iter() {
        let present = scenario.node_states(tree)?;
        for (parent, child) in tree.edges() {
            if present[parent] && present[child] {
                inherited[child].push(character.to_string());
            }
        }

        let origins = scenario.origins();
        if origins.len() < 2 {
            continue;
        }
        let pairs = resolver.weight_graph(&origins)?;
        let edges = minimum_spanning_tree(&origins, &pairs).map_err(|err| match err {
            PhyboError::Domain { message } => {
                PhyboError::domain(format!("character '{}': {}", character, message))
            }
            other => other,
        })?;
        mln.add_character_edges(character, edges);
    }

    for (parent, child) in tree.edges() {
        mln.add_vertical(
            tree.name(parent),
            tree.name(child),
            EdgeRecord {
                weight: config.vertical_weight,
                characters: std::mem::take(&mut inherited[child]),
            },
        );
    }

    info!(
        horizontal = mln.horizontal_edges().count(),
        retained = mln.retained_edges().count(),
        "minimal lateral network built"
    );
    Ok(mln)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gls::{Event, Scenario};

    fn gains(nodes: &[&str]) -> Scenario {
        Scenario::new(nodes.iter().map(|n| (n.to_string(), Event::Gain)).collect())
    }

    #[test]
    fn test_two_characters_share_edge() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let mut set = ScenarioSet::new("w-1-1");
        set.insert("x", gains(&["A", "B"]));
        set.insert("y", gains(&["A", "B"]));

        for method in ResolutionMethod::ALL {
            let mln = build_mln(&set, &tree, method, 1).unwrap();
            assert_eq!(mln.horizontal_weight("A", "B"), 2, "method {}", method);
            let expected = vec![("A".to_string(), "B".to_string())];
            assert_eq!(mln.character_edges("x").unwrap(), expected.as_slice());
            assert_eq!(mln.character_edges("y").unwrap(), expected.as_slice());
        }
    }

    #[test]
    fn test_vertical_edges_mirror_tree() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let mut set = ScenarioSet::new("w-1-1");
        set.insert("x", gains(&["ab"]));

        let mln = build_mln(&set, &tree, ResolutionMethod::TreeDistance, 1).unwrap();
        assert_eq!(mln.vertical_edges().count(), tree.n_nodes - 1);
        let inherited: Vec<&NodePair> = mln
            .vertical_edges()
            .filter(|(_, record)| !record.characters.is_empty())
            .map(|(pair, _)| pair)
            .collect();
        assert_eq!(
            inherited,
            vec![
                &("ab".to_string(), "A".to_string()),
                &("ab".to_string(), "B".to_string())
            ]
        );
        assert_eq!(mln.horizontal_edges().count(), 0);
    }

    #[test]
    fn test_unknown_origin_is_domain_error() {
        let tree = Tree::from_newick("((A,B),C);").unwrap();
        let mut set = ScenarioSet::new("w-1-1");
        set.insert("x", gains(&["A", "Z"]));
        assert!(matches!(
            build_mln(&set, &tree, ResolutionMethod::MajorityRule, 1),
            Err(PhyboError::Domain { .. })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let tree = Tree::from_newick("((A,B),C);").unwrap();
        let set = ScenarioSet::new("w-1-1");
        let config = MlnConfig {
            vertical_weight: 0,
            ..Default::default()
        };
        assert!(build_mln_with(&set, &tree, &config).is_err());
    }
}
