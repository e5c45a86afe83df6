//! One borrowing analysis: a reference tree, a presence matrix aligned to it,
//! and the runs computed on them.

use tracing::{info, instrument};

use crate::error::Result;
use crate::gls::{self, ScenarioCache, ScenarioSet, SolverConfig};
use crate::mln::{self, Mln, MlnConfig};
use crate::pattern::PresenceMatrix;
use crate::selector::{self, MixedModel, SelectorConfig};
use crate::tree::Tree;

#[derive(Clone, Debug)]
pub struct Analysis {
    tree: Tree,
    matrix: PresenceMatrix,
}

impl Analysis {
    /// Align `matrix` to `tree`; tree taxa missing from the matrix become unknown.
    pub fn new(tree: Tree, matrix: &PresenceMatrix) -> Result<Self> {
        let matrix = matrix.align_to(&tree)?;
        info!(
            taxa = tree.n_tips,
            characters = matrix.characters().len(),
            concepts = matrix.concepts().len(),
            "analysis loaded"
        );
        Ok(Self { tree, matrix })
    }

    #[inline]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    #[inline]
    pub fn matrix(&self) -> &PresenceMatrix {
        &self.matrix
    }

    /// Characters attested in at least two taxa.
    pub fn informative_characters(&self) -> usize {
        self.matrix
            .characters()
            .iter()
            .filter(|c| !c.pattern.is_singleton())
            .count()
    }

    /// Solve every character under one configuration with a fresh cache.
    pub fn run_model(&self, config: &SolverConfig) -> Result<ScenarioSet> {
        config.validate()?;
        let mut cache = ScenarioCache::new(config.clone());
        gls::solve_all(&self.tree, &self.matrix, &mut cache)
    }

    /// Run several configurations, each with its own cache.
    #[instrument(skip_all, fields(models = configs.len()))]
    pub fn run_models(&self, configs: &[SolverConfig]) -> Result<Vec<ScenarioSet>> {
        configs.iter().map(|config| self.run_model(config)).collect()
    }

    pub fn build_network(&self, scenarios: &ScenarioSet, config: &MlnConfig) -> Result<Mln> {
        mln::build_mln_with(scenarios, &self.tree, config)
    }

    pub fn select(&self, runs: &[ScenarioSet], config: &SelectorConfig) -> Result<MixedModel> {
        selector::select_models(&self.tree, &self.matrix, runs, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gls::CostModel;
    use crate::mln::ResolutionMethod;
    use crate::pattern::Pattern;

    fn analysis() -> Analysis {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();
        let taxa: Vec<String> = ["E", "D", "C", "B", "A"].iter().map(|s| s.to_string()).collect();
        let mut matrix = PresenceMatrix::new(taxa);
        // Rows listed E, D, C, B, A
        matrix.push("hand-1", "hand", Pattern::from_codes(&[0, 1, 0, 0, 1]).unwrap()).unwrap();
        matrix.push("hand-2", "hand", Pattern::from_codes(&[1, 0, 1, 1, 0]).unwrap()).unwrap();
        matrix.push("foot-1", "foot", Pattern::from_codes(&[0, 0, 0, 1, 0]).unwrap()).unwrap();
        Analysis::new(tree, &matrix).unwrap()
    }

    #[test]
    fn test_alignment_on_load() {
        let analysis = analysis();
        let hand = analysis.matrix().character("hand-1").unwrap();
        assert_eq!(hand.pattern.codes(), vec![1, 0, 0, 1, 0]);
        assert_eq!(analysis.informative_characters(), 2);
    }

    #[test]
    fn test_run_and_network() {
        let analysis = analysis();
        let run = analysis.run_model(&SolverConfig::default()).unwrap();
        assert_eq!(run.len(), 3);
        assert_eq!(run.get("hand-1").unwrap().to_string(), "A:1,D:1");

        let mln = analysis
            .build_network(&run, &MlnConfig::new(ResolutionMethod::TreeDistance, 1))
            .unwrap();
        assert_eq!(mln.horizontal_weight("A", "D"), 1);
    }

    #[test]
    fn test_select_across_runs() {
        let analysis = analysis();
        let configs = vec![
            SolverConfig::new(CostModel::weighted(1.0, 1.0, 1).unwrap()),
            SolverConfig::new(CostModel::topdown(0).unwrap()),
        ];
        let runs = analysis.run_models(&configs).unwrap();
        assert_eq!(runs[1].label(), "t-0");

        let mixed = analysis.select(&runs, &SelectorConfig::default()).unwrap();
        assert_eq!(mixed.choices.len(), 2);
        assert_eq!(mixed.scenarios.len(), 3);
    }
}
