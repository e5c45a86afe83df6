//! Phylogeny-based detection of borrowing between related languages.
//!
//! Cognate classes are reconciled with a reference tree: every presence
//! pattern is explained by a minimal gain-loss scenario ([`gls`]), characters
//! with several gains are linked into a minimal lateral network ([`mln`]), and
//! the run that best preserves ancestral vocabulary sizes can be chosen per
//! concept ([`selector`]).

pub mod analysis;
pub mod error;
pub mod gls;
pub mod mln;
pub mod pattern;
pub mod report;
pub mod selector;
pub mod tree;

#[cfg(feature = "python")]
mod bindings;

pub use analysis::Analysis;
pub use error::{PhyboError, Result};
pub use gls::{solve, solve_all, CostModel, Event, MissingData, Scenario, ScenarioCache, ScenarioSet, SolverConfig};
pub use mln::{build_mln, build_mln_with, Mln, MlnConfig, ResolutionMethod};
pub use pattern::{Character, Pattern, PresenceMatrix, State};
pub use selector::{select_models, ComparisonTest, MixedModel, SelectorConfig};
pub use tree::Tree;
