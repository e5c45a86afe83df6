//! Bottom-up parsimony dynamic program for the weighted and restriction models.
//!
//! # Algorithm
//! 1. Every leaf below the LCA of the present taxa starts with one candidate
//!    in its observed state (UNKNOWN leaves as wildcards).
//! 2. Post-order over the LCA subtree: the children's candidates are folded
//!    in one child at a time. Once all children are in, agreeing children pass
//!    their state up; disagreeing children fork into "ancestor present"
//!    (absent children are LOSSes) and "ancestor absent" (present children are
//!    GAINs).
//! 3. After each expansion, partials that break the restriction value, the
//!    model's caps or the gains-per-lineage cap are dropped. The node's beam
//!    keeps one candidate per (state, gains, losses).
//! 4. At the LCA a present candidate receives its GAIN and the cheapest
//!    candidate wins; ties go by gain count (`push_gains`), then by the
//!    smallest event list.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

use crate::error::{PhyboError, Result};
use crate::pattern::State;
use crate::tree::Tree;

use super::model::CostModel;
use super::scenario::Event;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum NodeState {
    Absent,
    Present,
    Wildcard,
}

/// Partial scenario for the subtree below one node.
#[derive(Clone, Debug)]
struct Candidate {
    state: NodeState,
    /// Events inside the subtree, sorted by (node, event).
    events: Vec<(usize, Event)>,
    gains: usize,
    losses: usize,
    /// Most gains on one downward path starting below the node.
    lineage: usize,
}

impl Candidate {
    fn leaf(state: State) -> Self {
        let state = match state {
            State::Present => NodeState::Present,
            State::Absent => NodeState::Absent,
            State::Unknown => NodeState::Wildcard,
        };
        Self {
            state,
            events: Vec::new(),
            gains: 0,
            losses: 0,
            lineage: 0,
        }
    }
}

/// Pruning rules of one pattern: the restriction value plus the model caps.
struct Bounds<'a> {
    model: &'a CostModel,
    restriction: f64,
    gpl: usize,
}

impl<'a> Bounds<'a> {
    /// The restriction value is the score of the cheaper trivially feasible
    /// scenario: a gain at every present leaf, or one gain at the LCA and a
    /// loss at every absent leaf.
    fn new(model: &'a CostModel, n_present: usize, n_absent: usize) -> Self {
        let trivial = [(n_present, 0), (1, n_absent)];
        let restriction = trivial
            .iter()
            .filter(|&&(gains, losses)| model.admits(gains, losses))
            .map(|&(gains, losses)| model.score(gains, losses))
            .fold(f64::INFINITY, f64::min);
        Self {
            model,
            restriction,
            gpl: model.gains_per_lineage(),
        }
    }

    fn admits(&self, candidate: &Candidate) -> bool {
        self.admits_counts(candidate.state, candidate.gains, candidate.losses, candidate.lineage)
    }

    /// Same check on the counts of a candidate that is not built yet.
    fn admits_counts(&self, state: NodeState, gains: usize, losses: usize, lineage: usize) -> bool {
        // A present node still owes its ancestors one gain
        let owed = usize::from(state == NodeState::Present);
        let gains = gains + owed;
        if lineage + owed > self.gpl || !self.model.admits(gains, losses) {
            return false;
        }
        let running = self.model.score(gains, losses);
        running <= self.restriction + score_tolerance(self.restriction)
    }
}

fn score_tolerance(score: f64) -> f64 {
    1e-9 * score.abs().max(1.0)
}

fn compare_scores(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= score_tolerance(a.max(b)) {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Infer the events of an optimal scenario below `lca`.
///
/// # Arguments
/// * `tree` - Reference tree
/// * `lca` - Lowest common ancestor of the present taxa
/// * `states` - Per-taxon states after the missing-data policy was applied
/// * `model` - Weighted or restriction cost model
/// * `push_gains` - Tie-break toward more (true) or fewer (false) gains
pub(crate) fn solve(
    tree: &Tree,
    lca: usize,
    states: &[State],
    model: &CostModel,
    push_gains: bool,
) -> Result<Vec<(usize, Event)>> {
    let leaf_state = |tip: usize| -> State {
        tree.taxon_position(tip).map(|pos| states[pos]).unwrap_or(State::Unknown)
    };

    let tips = tree.tips(lca);
    let n_present = tips.iter().filter(|&&tip| leaf_state(tip) == State::Present).count();
    let n_absent = tips.iter().filter(|&&tip| leaf_state(tip) == State::Absent).count();
    let bounds = Bounds::new(model, n_present, n_absent);

    let mut table: HashMap<usize, Vec<Candidate>> = HashMap::new();
    let mut explored = 0usize;

    for node in tree.post_order_from(lca) {
        let candidates = if tree.is_tip(node) {
            vec![Candidate::leaf(leaf_state(node))]
        } else {
            let children = tree.children(node);
            let child_sets = children
                .iter()
                .map(|child| table.remove(child).unwrap_or_default())
                .collect::<Vec<_>>();
            let (merged, n_combinations) = merge_children(children, &child_sets, &bounds);
            explored += n_combinations;
            merged
        };
        trace!(node = tree.name(node), candidates = candidates.len(), "merged node");
        table.insert(node, candidates);
    }

    let finals = table.remove(&lca).unwrap_or_default();
    trace!(explored, finals = finals.len(), "dynamic program finished");

    let best = finals
        .into_iter()
        .filter_map(|mut candidate| {
            if candidate.state == NodeState::Present {
                candidate.gains += 1;
                candidate.lineage += 1;
                candidate.events.push((lca, Event::Gain));
                candidate.events.sort_unstable();
            }
            let admissible =
                candidate.lineage <= bounds.gpl && model.admits(candidate.gains, candidate.losses);
            admissible.then(|| {
                let score = model.score(candidate.gains, candidate.losses);
                (score, candidate)
            })
        })
        .min_by(|(score_a, a), (score_b, b)| {
            compare_scores(*score_a, *score_b)
                .then_with(|| {
                    if push_gains {
                        b.gains.cmp(&a.gains)
                    } else {
                        a.gains.cmp(&b.gains)
                    }
                })
                .then_with(|| canonical(tree, &a.events).cmp(&canonical(tree, &b.events)))
        });

    best.map(|(_, candidate)| candidate.events).ok_or_else(|| {
        PhyboError::algorithm(format!(
            "no admissible scenario below '{}' under model {}",
            tree.name(lca),
            model
        ))
    })
}

/// Events ordered by node name, then GAIN before LOSS.
fn canonical<'t>(tree: &'t Tree, events: &[(usize, Event)]) -> Vec<(&'t str, Event)> {
    let mut named: Vec<(&str, Event)> = events.iter().map(|&(node, event)| (tree.name(node), event)).collect();
    named.sort_unstable();
    named
}

/// Children folded into a node so far, before the node's own state is fixed.
#[derive(Clone, Debug, Default)]
struct Partial {
    events: Vec<(usize, Event)>,
    gains: usize,
    losses: usize,
    lineage: usize,
    /// Present children; each one gains if the node ends up absent.
    present: Vec<usize>,
    /// Absent children; each one is lost if the node ends up present.
    absent: Vec<usize>,
    /// Lineage once every present child carries its own gain.
    gained_lineage: usize,
}

/// Partials with equal keys have the same continuations.
type PartialKey = (usize, usize, usize, usize, usize, usize);

impl Partial {
    fn key(&self) -> PartialKey {
        (
            self.present.len(),
            self.absent.len(),
            self.gains,
            self.losses,
            self.lineage,
            self.gained_lineage,
        )
    }

    fn extend(&self, child: usize, part: &Candidate) -> Partial {
        let mut next = self.clone();
        next.events.extend(part.events.iter().copied());
        next.events.sort_unstable();
        next.gains += part.gains;
        next.losses += part.losses;
        next.lineage = next.lineage.max(part.lineage);
        match part.state {
            NodeState::Present => {
                next.present.push(child);
                next.gained_lineage = next.gained_lineage.max(part.lineage + 1);
            }
            NodeState::Absent => next.absent.push(child),
            NodeState::Wildcard => {}
        }
        next
    }

    /// (state, gains, losses, lineage) of every way to close the node.
    fn outcomes(&self) -> Vec<(NodeState, usize, usize, usize)> {
        match (self.present.is_empty(), self.absent.is_empty()) {
            (true, true) => vec![(NodeState::Wildcard, self.gains, self.losses, self.lineage)],
            (false, true) => vec![(NodeState::Present, self.gains, self.losses, self.lineage)],
            (true, false) => vec![(NodeState::Absent, self.gains, self.losses, self.lineage)],
            (false, false) => vec![
                // Ancestor present: every absent child lost the character
                (
                    NodeState::Present,
                    self.gains,
                    self.losses + self.absent.len(),
                    self.lineage,
                ),
                // Ancestor absent: every present child gained it
                (
                    NodeState::Absent,
                    self.gains + self.present.len(),
                    self.losses,
                    self.lineage.max(self.gained_lineage),
                ),
            ],
        }
    }

    fn close(self) -> Vec<Candidate> {
        self.outcomes()
            .into_iter()
            .map(|(state, gains, losses, lineage)| {
                let mut events = self.events.clone();
                if !self.present.is_empty() && !self.absent.is_empty() {
                    let (children, event) = match state {
                        NodeState::Present => (&self.absent, Event::Loss),
                        _ => (&self.present, Event::Gain),
                    };
                    events.extend(children.iter().map(|&child| (child, event)));
                    events.sort_unstable();
                }
                Candidate {
                    state,
                    events,
                    gains,
                    losses,
                    lineage,
                }
            })
            .collect()
    }
}

/// Merge the candidate sets of a node's children.
///
/// Children are folded in one at a time. Every step prunes partials that
/// can no longer close within the bounds and keeps one partial per key, so
/// the work grows polynomially with the number of children.
///
/// Returns the reduced candidates and the number of extensions visited.
fn merge_children(
    children: &[usize],
    child_sets: &[Vec<Candidate>],
    bounds: &Bounds<'_>,
) -> (Vec<Candidate>, usize) {
    let mut partials = vec![Partial::default()];
    let mut visited = 0usize;

    for (&child, set) in children.iter().zip(child_sets) {
        let mut front: HashMap<PartialKey, Partial> = HashMap::new();
        for partial in &partials {
            for part in set {
                visited += 1;
                let next = partial.extend(child, part);
                // Closing costs never drop as children are added
                let viable = next
                    .outcomes()
                    .into_iter()
                    .any(|(state, gains, losses, lineage)| bounds.admits_counts(state, gains, losses, lineage));
                if viable {
                    offer_partial(&mut front, next);
                }
            }
        }
        if front.is_empty() {
            return (Vec::new(), visited);
        }
        let mut survivors: Vec<(PartialKey, Partial)> = front.into_iter().collect();
        survivors.sort_by(|a, b| a.0.cmp(&b.0));
        partials = survivors.into_iter().map(|(_, partial)| partial).collect();
    }

    let mut beam: HashMap<(NodeState, usize, usize), Candidate> = HashMap::new();
    for partial in partials {
        for candidate in partial.close() {
            if bounds.admits(&candidate) {
                offer(&mut beam, candidate);
            }
        }
    }
    (drain_beam(beam), visited)
}

fn offer_partial(front: &mut HashMap<PartialKey, Partial>, partial: Partial) {
    let key = partial.key();
    match front.get(&key) {
        Some(current)
            if (&current.events, &current.present, &current.absent)
                <= (&partial.events, &partial.present, &partial.absent) => {}
        _ => {
            front.insert(key, partial);
        }
    }
}

/// Keep one candidate per (state, gains, losses): lowest lineage, then smallest events.
fn offer(beam: &mut HashMap<(NodeState, usize, usize), Candidate>, mut candidate: Candidate) {
    candidate.events.sort_unstable();
    let key = (candidate.state, candidate.gains, candidate.losses);
    match beam.get(&key) {
        Some(current)
            if (current.lineage, &current.events) <= (candidate.lineage, &candidate.events) => {}
        _ => {
            beam.insert(key, candidate);
        }
    }
}

fn drain_beam(beam: HashMap<(NodeState, usize, usize), Candidate>) -> Vec<Candidate> {
    let mut candidates: Vec<((NodeState, usize, usize), Candidate)> = beam.into_iter().collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    candidates.into_iter().map(|(_, c)| c).collect()
}
