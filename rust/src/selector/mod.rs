//! Per-concept choice among several gain-loss runs.
//!
//! A plausible run keeps the number of words per concept at ancestral nodes
//! close to what contemporary languages show. For every concept the run whose
//! ancestral vocabulary sizes best match the contemporary ones is picked, and
//! the picked scenarios are assembled into one `mixed` scenario set.

pub mod stats;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::error::{PhyboError, Result};
use crate::gls::ScenarioSet;
use crate::pattern::{PresenceMatrix, State};
use crate::tree::Tree;

/// Label of the assembled scenario set.
pub const MIXED_LABEL: &str = "mixed";

/// Statistic comparing ancestral and contemporary distributions; larger is better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ComparisonTest {
    /// p-value of the Kruskal-Wallis test.
    #[default]
    KruskalWallis,
    /// Negative absolute difference of the means.
    MeanDifference,
}

impl ComparisonTest {
    pub fn score(self, ancestral: &[f64], contemporary: &[f64]) -> Result<f64> {
        match self {
            ComparisonTest::KruskalWallis => stats::kruskal_wallis(&[ancestral, contemporary]),
            ComparisonTest::MeanDifference => Ok(stats::mean_difference(ancestral, contemporary)),
        }
    }
}

impl fmt::Display for ComparisonTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonTest::KruskalWallis => write!(f, "kruskal-wallis"),
            ComparisonTest::MeanDifference => write!(f, "mean-difference"),
        }
    }
}

impl FromStr for ComparisonTest {
    type Err = PhyboError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "kruskal-wallis" | "kw" => Ok(ComparisonTest::KruskalWallis),
            "mean-difference" | "mean" => Ok(ComparisonTest::MeanDifference),
            _ => Err(PhyboError::config(format!("unknown comparison test '{}'", name))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectorConfig {
    /// Default: Kruskal-Wallis
    pub test: ComparisonTest,
}

/// Run chosen for one concept.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelChoice {
    pub concept: String,
    pub run: String,
    pub score: f64,
}

/// Result of model selection.
#[derive(Clone, Debug)]
pub struct MixedModel {
    pub choices: Vec<ModelChoice>,
    pub scenarios: ScenarioSet,
}

impl MixedModel {
    pub fn choice(&self, concept: &str) -> Option<&ModelChoice> {
        self.choices.iter().find(|c| c.concept == concept)
    }

    /// How many concepts picked each run.
    pub fn run_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for choice in &self.choices {
            *counts.entry(choice.run.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Number of the concept's characters attested in every taxon.
///
/// Taxa where every character of the concept is unknown have no observed
/// vocabulary and are left out.
pub fn contemporary_distribution(matrix: &PresenceMatrix, concept: &str) -> Vec<f64> {
    let n_taxa = matrix.taxa().len();
    let mut counts = vec![0.0; n_taxa];
    let mut observed = vec![false; n_taxa];
    for character in matrix.characters().iter().filter(|c| c.concept == concept) {
        for (pos, &state) in character.pattern.states().iter().enumerate() {
            match state {
                State::Present => {
                    counts[pos] += 1.0;
                    observed[pos] = true;
                }
                State::Absent => observed[pos] = true,
                State::Unknown => {}
            }
        }
    }
    counts
        .into_iter()
        .zip(observed)
        .filter_map(|(count, seen)| seen.then_some(count))
        .collect()
}

/// Number of the concept's characters present at every internal node after
/// replaying `scenarios`, in `tree.internal_nodes()` order.
///
/// Characters without a scenario count as absent everywhere.
pub fn ancestral_distribution(
    tree: &Tree,
    matrix: &PresenceMatrix,
    scenarios: &ScenarioSet,
    concept: &str,
) -> Result<Vec<f64>> {
    let internal = tree.internal_nodes();
    let mut counts = vec![0.0; internal.len()];
    for character in matrix.characters().iter().filter(|c| c.concept == concept) {
        let scenario = match scenarios.get(&character.id) {
            Some(scenario) => scenario,
            None => continue,
        };
        let present = scenario.node_states(tree)?;
        for (slot, &node) in internal.iter().enumerate() {
            if present[node] {
                counts[slot] += 1.0;
            }
        }
    }
    Ok(counts)
}

/// Pick the best run for every concept and assemble the mixed scenario set.
///
/// Ties go to the run listed first.
///
/// # Arguments
/// * `tree` - Reference tree
/// * `matrix` - Presence matrix aligned to the tree
/// * `runs` - Scenario sets of the candidate runs
/// * `config` - Comparison statistic
#[instrument(skip_all, fields(runs = runs.len(), test = %config.test))]
pub fn select_models(
    tree: &Tree,
    matrix: &PresenceMatrix,
    runs: &[ScenarioSet],
    config: &SelectorConfig,
) -> Result<MixedModel> {
    if runs.is_empty() {
        return Err(PhyboError::config("model selection needs at least one run"));
    }
    if matrix.taxa() != tree.taxa() {
        return Err(PhyboError::domain("presence matrix is not aligned to the tree taxa"));
    }

    let concepts = matrix.concepts();
    let choices = concepts
        .par_iter()
        .map(|&concept| {
            let contemporary = contemporary_distribution(matrix, concept);
            let mut best: Option<(usize, f64)> = None;
            for (idx, run) in runs.iter().enumerate() {
                let ancestral = ancestral_distribution(tree, matrix, run, concept)?;
                let score = config.test.score(&ancestral, &contemporary)?;
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((idx, score));
                }
            }
            let (idx, score) = best.unwrap_or((0, f64::NEG_INFINITY));
            debug!(concept, run = runs[idx].label(), score, "concept resolved");
            Ok((concept, idx, score))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut scenarios = ScenarioSet::new(MIXED_LABEL);
    let by_concept: HashMap<&str, usize> = choices.iter().map(|&(concept, idx, _)| (concept, idx)).collect();
    for character in matrix.characters() {
        let idx = by_concept[character.concept.as_str()];
        if let Some(scenario) = runs[idx].get(&character.id) {
            scenarios.insert(character.id.clone(), scenario.clone());
        }
    }

    let mixed = MixedModel {
        choices: choices
            .into_iter()
            .map(|(concept, idx, score)| ModelChoice {
                concept: concept.to_string(),
                run: runs[idx].label().to_string(),
                score,
            })
            .collect(),
        scenarios,
    };
    info!(concepts = mixed.choices.len(), scenarios = mixed.scenarios.len(), "mixed model assembled");
    Ok(mixed)
}
