//! Gain-loss scenario inference.
//!
//! `solve` explains one presence pattern on the reference tree with the
//! cheapest set of gains and losses under a cost model:
//!
//! - weighted and restriction models run the bottom-up dynamic program in
//!   [`weighted`] over the subtree of the LCA of the present taxa;
//! - the top-down model runs the splitting heuristic in [`topdown`].
//!
//! `solve_all` runs one model over every character of a presence matrix,
//! memoising repeated patterns in a [`ScenarioCache`].

pub mod cache;
pub mod model;
pub mod scenario;
mod topdown;
mod weighted;

pub use cache::{CacheStats, ScenarioCache};
pub use model::{CostModel, MissingData, SolverConfig, DEFAULT_GPL};
pub use scenario::{Event, Scenario, ScenarioSet};

use tracing::{debug, info, instrument, warn};

use crate::error::{PhyboError, Result};
use crate::pattern::{Pattern, PresenceMatrix, State};
use crate::tree::Tree;

/// Infer a minimal gain-loss scenario for one pattern.
///
/// # Arguments
/// * `pattern` - Presence pattern aligned to `tree.taxa()`
/// * `tree` - Reference tree
/// * `config` - Cost model, missing-data policy and tie-break
///
/// # Returns
/// The scenario and its number of gains.
pub fn solve(pattern: &Pattern, tree: &Tree, config: &SolverConfig) -> Result<(Scenario, usize)> {
    config.validate()?;
    if pattern.len() != tree.n_tips {
        return Err(PhyboError::domain(format!(
            "pattern has {} entries but the tree has {} taxa",
            pattern.len(),
            tree.n_tips
        )));
    }

    let present: Vec<usize> = pattern
        .present_positions()
        .into_iter()
        .map(|pos| tree.tip_indices[pos])
        .collect();
    let lca = tree
        .lowest_common_ancestor(&present)
        .ok_or_else(|| PhyboError::domain("pattern has no present taxa"))?;

    // Observed states decide the shortcut, before unknowns are resolved
    let absent_below = tree
        .tips(lca)
        .iter()
        .filter_map(|&tip| tree.taxon_position(tip))
        .any(|pos| pattern.get(pos) == State::Absent);
    if !absent_below {
        return Ok((Scenario::single_origin(tree.name(lca)), 1));
    }

    let states: Vec<State> = pattern
        .states()
        .iter()
        .map(|&state| match (state, config.missing_data) {
            (State::Unknown, MissingData::Absent) => State::Absent,
            (state, _) => state,
        })
        .collect();

    let events = match config.model {
        CostModel::Weighted { .. } | CostModel::Restriction { .. } => {
            weighted::solve(tree, lca, &states, &config.model, config.push_gains)?
        }
        CostModel::TopDown { max_depth } => topdown::solve(tree, &states, max_depth, config.push_gains),
    };

    let scenario = Scenario::from_indices(tree, &events);
    let origins = scenario.origin_count();
    Ok((scenario, origins))
}

/// Solve every character of `matrix` with the cache's configuration.
///
/// Characters without a present taxon have no scenario and are skipped.
/// The matrix must be aligned to the tree (see [`PresenceMatrix::align_to`]).
#[instrument(skip_all, fields(model = %cache.config().model, characters = matrix.characters().len()))]
pub fn solve_all(tree: &Tree, matrix: &PresenceMatrix, cache: &mut ScenarioCache) -> Result<ScenarioSet> {
    if matrix.taxa() != tree.taxa() {
        return Err(PhyboError::domain("presence matrix is not aligned to the tree taxa"));
    }

    let solvable: Vec<&Pattern> = matrix
        .characters()
        .iter()
        .filter(|character| character.pattern.count(State::Present) > 0)
        .map(|character| &character.pattern)
        .collect();
    let solved = cache.prefetch(tree, solvable)?;
    debug!(solved, distinct = cache.len(), "patterns solved");

    let mut set = ScenarioSet::new(cache.config().model.label());
    for character in matrix.characters() {
        if character.pattern.count(State::Present) == 0 {
            warn!(character = %character.id, "character has no present taxa, skipped");
            continue;
        }
        let (scenario, _) = cache.get_or_solve(tree, &character.pattern)?;
        set.insert(character.id.clone(), scenario);
    }

    info!(
        scenarios = set.len(),
        origins = set.total_origins(),
        "gain-loss scenarios inferred"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(scenario: &Scenario) -> Vec<(String, Event)> {
        scenario.events().to_vec()
    }

    #[test]
    fn test_single_origin_shortcut() {
        let tree = Tree::from_newick("(((A,B),(C,D)),E);").unwrap();
        let pattern = Pattern::from_codes(&[1, 1, 1, 1, 0]).unwrap();

        for name in ["w-1-1", "r-2", "t-0"] {
            let config = SolverConfig::new(name.parse().unwrap());
            let (scenario, origins) = solve(&pattern, &tree, &config).unwrap();
            assert_eq!(origins, 1, "model {}", name);
            assert_eq!(names(&scenario), vec![("edge_3".to_string(), Event::Gain)]);
        }
    }

    #[test]
    fn test_unknown_taxa_keep_shortcut() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd);").unwrap();
        let pattern = Pattern::from_codes(&[1, -1, 1, 1]).unwrap();

        for name in ["w-1-1", "r-3", "t-2"] {
            for missing_data in [MissingData::Absent, MissingData::Wildcard] {
                let config = SolverConfig::new(name.parse().unwrap()).with_missing_data(missing_data);
                let (scenario, origins) = solve(&pattern, &tree, &config).unwrap();
                assert_eq!(origins, 1, "{} ({:?})", name, missing_data);
                assert_eq!(scenario.to_string(), "root:1", "{} ({:?})", name, missing_data);
            }
        }
    }

    #[test]
    fn test_two_origins() {
        let tree = Tree::from_newick("((A,B),(C,D),E);").unwrap();
        let pattern = Pattern::from_codes(&[1, 0, 0, 1, 0]).unwrap();
        let (scenario, origins) = solve(&pattern, &tree, &SolverConfig::default()).unwrap();

        assert_eq!(origins, 2);
        assert_eq!(scenario.to_string(), "A:1,D:1");
        assert!(scenario.explains(&tree, &pattern).unwrap());
    }

    #[test]
    fn test_missing_data_policies() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let pattern = Pattern::from_codes(&[1, -1, 0, 0, 0]).unwrap();

        let absent = SolverConfig::default();
        let (scenario, _) = solve(&pattern, &tree, &absent).unwrap();
        assert_eq!(scenario.to_string(), "A:1");

        // As a wildcard B can share the gain of A at ab
        let wildcard = SolverConfig::default().with_missing_data(MissingData::Wildcard);
        let pattern = Pattern::from_codes(&[1, -1, 1, 0, 0]).unwrap();
        let (scenario, origins) = solve(&pattern, &tree, &wildcard).unwrap();
        assert_eq!(origins, 2);
        assert!(scenario.explains(&tree, &pattern).unwrap());
    }

    #[test]
    fn test_domain_errors() {
        let tree = Tree::from_newick("((A,B),C);").unwrap();
        let config = SolverConfig::default();

        let empty = Pattern::from_codes(&[0, 0, -1]).unwrap();
        assert!(matches!(solve(&empty, &tree, &config), Err(PhyboError::Domain { .. })));

        let short = Pattern::from_codes(&[1, 0]).unwrap();
        assert!(matches!(solve(&short, &tree, &config), Err(PhyboError::Domain { .. })));
    }

    #[test]
    fn test_invalid_config_fails_first() {
        let tree = Tree::from_newick("((A,B),C);").unwrap();
        let pattern = Pattern::from_codes(&[1, 0, 1]).unwrap();
        let config = SolverConfig::new(CostModel::Restriction { limit: 0, gpl: 1 });
        assert!(matches!(solve(&pattern, &tree, &config), Err(PhyboError::Config { .. })));
    }

    #[test]
    fn test_solve_all_skips_absent_characters() {
        let tree = Tree::from_newick("((A,B),(C,D),E);").unwrap();
        let mut matrix = PresenceMatrix::new(tree.taxa().to_vec());
        matrix.push("hand-1", "hand", Pattern::from_codes(&[1, 0, 0, 1, 0]).unwrap()).unwrap();
        matrix.push("hand-2", "hand", Pattern::from_codes(&[0, 0, 0, 0, 0]).unwrap()).unwrap();
        matrix.push("foot-1", "foot", Pattern::from_codes(&[1, 0, 0, 1, 0]).unwrap()).unwrap();

        let mut cache = ScenarioCache::new(SolverConfig::default());
        let set = solve_all(&tree, &matrix, &mut cache).unwrap();

        assert_eq!(set.label(), "w-1-1");
        assert_eq!(set.len(), 2);
        assert!(set.get("hand-2").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(set.total_origins(), 4);
    }
}
