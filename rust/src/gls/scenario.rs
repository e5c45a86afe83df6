//! Gain-loss scenarios.
//!
//! A scenario is a set of (node, event) pairs. Replaying it from the root
//! downward (a gain switches the character on for the whole subtree until a
//! nested loss switches it off again) yields the state of every node.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{PhyboError, Result};
use crate::pattern::{Pattern, State};
use crate::tree::Tree;

/// A gain or loss of the character on the branch leading to a node.
///
/// Ordered so that, on the same node, GAIN sorts before LOSS.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    Gain,
    Loss,
}

impl Event {
    /// Report encoding: 1 for GAIN, 0 for LOSS.
    pub fn code(self) -> u8 {
        match self {
            Event::Gain => 1,
            Event::Loss => 0,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Event::Gain),
            "0" => Some(Event::Loss),
            _ => None,
        }
    }
}

/// Gain-loss scenario in canonical order (node name, then GAIN before LOSS).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Scenario {
    events: Vec<(String, Event)>,
}

impl Scenario {
    pub fn new(mut events: Vec<(String, Event)>) -> Self {
        events.sort();
        events.dedup();
        Self { events }
    }

    /// Scenario with a single gain at `node`.
    pub fn single_origin(node: impl Into<String>) -> Self {
        Self {
            events: vec![(node.into(), Event::Gain)],
        }
    }

    /// Build from node indices of `tree`.
    pub fn from_indices(tree: &Tree, events: &[(usize, Event)]) -> Self {
        Self::new(
            events
                .iter()
                .map(|&(node, event)| (tree.name(node).to_string(), event))
                .collect(),
        )
    }

    #[inline]
    pub fn events(&self) -> &[(String, Event)] {
        &self.events
    }

    /// Nodes carrying a GAIN, sorted by name.
    pub fn origins(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(_, event)| *event == Event::Gain)
            .map(|(node, _)| node.as_str())
            .collect()
    }

    pub fn origin_count(&self) -> usize {
        self.events.iter().filter(|(_, e)| *e == Event::Gain).count()
    }

    pub fn loss_count(&self) -> usize {
        self.events.len() - self.origin_count()
    }

    /// Replay the events and return the presence of the character at every node.
    pub fn node_states(&self, tree: &Tree) -> Result<Vec<bool>> {
        let mut at_node: HashMap<usize, Event> = HashMap::with_capacity(self.events.len());
        for (name, event) in &self.events {
            let node = tree.index_of(name)?;
            if let Some(previous) = at_node.insert(node, *event) {
                if previous != *event {
                    return Err(PhyboError::domain(format!(
                        "node '{}' carries both a gain and a loss",
                        name
                    )));
                }
            }
        }

        let mut present = vec![false; tree.n_nodes];
        // Reverse post-order visits every parent before its children
        for node in tree.post_order().into_iter().rev() {
            let inherited = tree.parent(node).map(|p| present[p]).unwrap_or(false);
            present[node] = match at_node.get(&node) {
                Some(Event::Gain) => true,
                Some(Event::Loss) => false,
                None => inherited,
            };
        }
        Ok(present)
    }

    /// Replay the events and return the state of every taxon.
    pub fn leaf_states(&self, tree: &Tree) -> Result<Vec<State>> {
        let present = self.node_states(tree)?;
        Ok(tree
            .tip_indices
            .iter()
            .map(|&tip| if present[tip] { State::Present } else { State::Absent })
            .collect())
    }

    /// Whether replaying the scenario reproduces every non-missing leaf of `pattern`.
    pub fn explains(&self, tree: &Tree, pattern: &Pattern) -> Result<bool> {
        if pattern.len() != tree.n_tips {
            return Err(PhyboError::domain(format!(
                "pattern has {} entries for {} taxa",
                pattern.len(),
                tree.n_tips
            )));
        }
        let replayed = self.leaf_states(tree)?;
        Ok(pattern
            .states()
            .iter()
            .zip(replayed)
            .all(|(&observed, inferred)| observed == State::Unknown || observed == inferred))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (node, event)) in self.events.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", node, event.code())?;
        }
        Ok(())
    }
}

/// Scenarios of one run, keyed by character id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScenarioSet {
    label: String,
    scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scenarios: BTreeMap::new(),
        }
    }

    /// Label of the run (model name, or `mixed`).
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn insert(&mut self, character: impl Into<String>, scenario: Scenario) {
        self.scenarios.insert(character.into(), scenario);
    }

    pub fn get(&self, character: &str) -> Option<&Scenario> {
        self.scenarios.get(character)
    }

    /// Characters in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scenario)> {
        self.scenarios.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Total number of gains over all characters.
    pub fn total_origins(&self) -> usize {
        self.scenarios.values().map(Scenario::origin_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(events: &[(&str, Event)]) -> Scenario {
        Scenario::new(events.iter().map(|&(n, e)| (n.to_string(), e)).collect())
    }

    #[test]
    fn test_canonical_order() {
        let s = scenario(&[("D", Event::Gain), ("A", Event::Loss), ("A", Event::Gain), ("D", Event::Gain)]);
        assert_eq!(s.to_string(), "A:1,A:0,D:1");
        assert_eq!(s.origins(), vec!["A", "D"]);
        assert_eq!(s.origin_count(), 2);
        assert_eq!(s.loss_count(), 1);
    }

    #[test]
    fn test_replay_gain_and_nested_loss() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let s = scenario(&[("root", Event::Gain), ("B", Event::Loss), ("cd", Event::Loss)]);

        let leaves = s.leaf_states(&tree).unwrap();
        assert_eq!(
            leaves,
            vec![State::Present, State::Absent, State::Absent, State::Absent, State::Present]
        );
    }

    #[test]
    fn test_regain_below_loss() {
        let tree = Tree::from_newick("(((A,B)ab,C)abc,D);").unwrap();
        let s = scenario(&[("abc", Event::Gain), ("ab", Event::Loss), ("A", Event::Gain)]);

        let states = s.node_states(&tree).unwrap();
        let a = tree.node("A").unwrap();
        let b = tree.node("B").unwrap();
        assert!(states[a]);
        assert!(!states[b]);
    }

    #[test]
    fn test_explains_ignores_unknown() {
        let tree = Tree::from_newick("((A,B),C);").unwrap();
        let s = scenario(&[("A", Event::Gain)]);

        assert!(s.explains(&tree, &Pattern::from_codes(&[1, -1, 0]).unwrap()).unwrap());
        assert!(!s.explains(&tree, &Pattern::from_codes(&[1, 1, 0]).unwrap()).unwrap());
        assert!(s.explains(&tree, &Pattern::from_codes(&[1, 0]).unwrap()).is_err());
    }

    #[test]
    fn test_unknown_node_and_conflict() {
        let tree = Tree::from_newick("(A,B);").unwrap();
        assert!(scenario(&[("Z", Event::Gain)]).node_states(&tree).is_err());
        assert!(scenario(&[("A", Event::Gain), ("A", Event::Loss)]).node_states(&tree).is_err());
    }

    #[test]
    fn test_scenario_set() {
        let mut set = ScenarioSet::new("w-1-1");
        set.insert("b", Scenario::single_origin("A"));
        set.insert("a", scenario(&[("A", Event::Gain), ("B", Event::Gain)]));

        assert_eq!(set.label(), "w-1-1");
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_origins(), 3);
        let ids: Vec<&str> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
