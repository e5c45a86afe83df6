//! Per-run memo of solved patterns.
//!
//! Characters of one dataset often share a presence pattern. A cache belongs
//! to one solver configuration: the same pattern under another cost model has
//! another scenario, so a cache is never shared between runs.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::pattern::Pattern;
use crate::tree::Tree;

use super::model::SolverConfig;
use super::scenario::Scenario;

/// Lookup counters of a cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Pattern -> (scenario, origin count) for one solver configuration.
#[derive(Clone, Debug)]
pub struct ScenarioCache {
    config: SolverConfig,
    entries: HashMap<Pattern, (Scenario, usize)>,
    stats: CacheStats,
}

impl ScenarioCache {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Configuration every cached entry was solved with.
    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Cached result for `pattern`, counting the lookup.
    pub fn get(&mut self, pattern: &Pattern) -> Option<(Scenario, usize)> {
        match self.entries.get(pattern) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Whether `pattern` is cached, without counting a lookup.
    pub fn contains(&self, pattern: &Pattern) -> bool {
        self.entries.contains_key(pattern)
    }

    pub fn insert(&mut self, pattern: Pattern, scenario: Scenario, origins: usize) {
        self.entries.insert(pattern, (scenario, origins));
    }

    /// Return the cached result or solve the pattern and remember it.
    pub fn get_or_solve(&mut self, tree: &Tree, pattern: &Pattern) -> Result<(Scenario, usize)> {
        if let Some(entry) = self.get(pattern) {
            return Ok(entry);
        }
        let (scenario, origins) = super::solve(pattern, tree, &self.config)?;
        self.insert(pattern.clone(), scenario.clone(), origins);
        Ok((scenario, origins))
    }

    /// Solve every distinct uncached pattern in parallel and store the results.
    ///
    /// Returns the number of patterns that were solved.
    pub fn prefetch<'p, I>(&mut self, tree: &Tree, patterns: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'p Pattern>,
    {
        let mut seen = HashSet::new();
        let pending: Vec<&Pattern> = patterns
            .into_iter()
            .filter(|pattern| !self.entries.contains_key(*pattern) && seen.insert(*pattern))
            .collect();

        let config = &self.config;
        let solved = pending
            .par_iter()
            .map(|&pattern| super::solve(pattern, tree, config).map(|result| (pattern.clone(), result)))
            .collect::<Result<Vec<_>>>()?;

        let n_solved = solved.len();
        for (pattern, (scenario, origins)) in solved {
            self.insert(pattern, scenario, origins);
        }
        debug!(solved = n_solved, cached = self.entries.len(), "prefetched patterns");
        Ok(n_solved)
    }
}
