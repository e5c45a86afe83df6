//! Top-down splitting heuristic.
//!
//! Starting at the root, the PRESENT taxa below a node are covered either by
//! one gain at their LCA plus losses on the absent parts of its subtree, or by
//! recursing into the LCA's children one level deeper. The cheaper option in
//! event count is kept, so raising the depth limit never adds events.

use tracing::trace;

use crate::pattern::State;
use crate::tree::Tree;

use super::scenario::Event;

struct Planner<'a> {
    tree: &'a Tree,
    states: &'a [State],
    max_depth: usize,
    push_gains: bool,
}

impl Planner<'_> {
    fn state(&self, tip: usize) -> State {
        self.tree
            .taxon_position(tip)
            .map(|pos| self.states[pos])
            .unwrap_or(State::Unknown)
    }

    fn present_tips(&self, node: usize) -> Vec<usize> {
        self.tree
            .tips(node)
            .iter()
            .copied()
            .filter(|&tip| self.state(tip) == State::Present)
            .collect()
    }

    fn count_tips(&self, node: usize, state: State) -> usize {
        self.tree.tips(node).iter().filter(|&&tip| self.state(tip) == state).count()
    }

    /// Events covering the PRESENT taxa below `node`, which has at least one.
    fn plan(&self, node: usize, depth: usize) -> Vec<(usize, Event)> {
        let present = self.present_tips(node);
        let lca = match self.tree.lowest_common_ancestor(&present) {
            Some(lca) => lca,
            None => return Vec::new(),
        };

        if self.count_tips(lca, State::Absent) == 0 {
            return vec![(lca, Event::Gain)];
        }

        let mut local = vec![(lca, Event::Gain)];
        self.loss_cover(lca, &mut local);
        if depth >= self.max_depth {
            return local;
        }

        let split: Vec<(usize, Event)> = self
            .tree
            .children(lca)
            .iter()
            .filter(|&&child| self.count_tips(child, State::Present) > 0)
            .flat_map(|&child| self.plan(child, depth + 1))
            .collect();

        trace!(
            node = self.tree.name(lca),
            depth,
            local = local.len(),
            split = split.len(),
            "top-down choice"
        );
        if split.len() < local.len() || (split.len() == local.len() && self.push_gains) {
            split
        } else {
            local
        }
    }

    /// Losses at the maximal subtrees below `node` that hold absent taxa and
    /// no present ones.
    fn loss_cover(&self, node: usize, events: &mut Vec<(usize, Event)>) {
        for &child in self.tree.children(node) {
            if self.count_tips(child, State::Present) > 0 {
                self.loss_cover(child, events);
            } else if self.count_tips(child, State::Absent) > 0 {
                events.push((child, Event::Loss));
            }
        }
    }
}

/// Infer a scenario with the top-down heuristic.
///
/// # Arguments
/// * `tree` - Reference tree
/// * `states` - Per-taxon states after the missing-data policy was applied
/// * `max_depth` - Levels below the root at which splitting may still happen
/// * `push_gains` - Split on equal event counts
pub(crate) fn solve(tree: &Tree, states: &[State], max_depth: usize, push_gains: bool) -> Vec<(usize, Event)> {
    let planner = Planner {
        tree,
        states,
        max_depth,
        push_gains,
    };
    let mut events = planner.plan(tree.root_index, 0);
    events.sort_unstable_by(|a, b| tree.name(a.0).cmp(tree.name(b.0)).then(a.1.cmp(&b.1)));
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(newick: &str, codes: &[i8], max_depth: usize, push_gains: bool) -> Vec<(String, Event)> {
        let tree = Tree::from_newick(newick).unwrap();
        let states: Vec<State> = codes.iter().map(|&c| State::from_code(c).unwrap()).collect();
        solve(&tree, &states, max_depth, push_gains)
            .into_iter()
            .map(|(node, event)| (tree.name(node).to_string(), event))
            .collect()
    }

    fn gain(node: &str) -> (String, Event) {
        (node.to_string(), Event::Gain)
    }

    fn loss(node: &str) -> (String, Event) {
        (node.to_string(), Event::Loss)
    }

    #[test]
    fn test_clade_gets_single_gain() {
        let events = run("(((A,B)ab,(C,D)cd)abcd,E);", &[1, 1, 1, 1, 0], 0, true);
        assert_eq!(events, vec![gain("abcd")]);
    }

    #[test]
    fn test_depth_zero_gains_at_lca() {
        let events = run("((A,B)ab,(C,D)cd,E);", &[1, 0, 0, 1, 0], 0, true);
        assert_eq!(events, vec![loss("B"), loss("C"), loss("E"), gain("root")]);
    }

    #[test]
    fn test_split_reduces_events() {
        let events = run("((A,B)ab,(C,D)cd,E);", &[1, 0, 0, 1, 0], 1, true);
        assert_eq!(events, vec![gain("A"), gain("D")]);
    }

    #[test]
    fn test_push_gains_splits_on_ties() {
        let newick = "((A,B)ab,(C,D)cd,E);";
        let codes = [1, 1, 1, 1, 0];
        assert_eq!(run(newick, &codes, 1, true), vec![gain("ab"), gain("cd")]);
        assert_eq!(run(newick, &codes, 1, false), vec![loss("E"), gain("root")]);
    }

    #[test]
    fn test_unknown_tips_do_not_block_shortcut() {
        let events = run("((A,B,C)abc,D);", &[1, -1, 1, 0], 0, true);
        assert_eq!(events, vec![gain("abc")]);
    }

    #[test]
    fn test_depth_never_adds_events() {
        let newick = "(((A,B)ab,(C,D)cd)abcd,((E,F)ef,(G,H)gh)efgh);";
        let codes = [1, 0, 1, 0, 0, 1, 1, 1];
        let counts: Vec<usize> = (0..5).map(|depth| run(newick, &codes, depth, true).len()).collect();
        for pair in counts.windows(2) {
            assert!(pair[1] <= pair[0], "counts by depth: {:?}", counts);
        }
    }
}
