//! Python entry points.
//!
//! Trees arrive as parent-index arrays with node names; presence matrices as
//! (n_taxa, n_characters) int8 arrays whose rows follow the tree's taxa.

use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::error::PhyboError;
use crate::gls::{CostModel, MissingData, SolverConfig};
use crate::mln::{MlnConfig, ResolutionMethod};
use crate::pattern::PresenceMatrix;
use crate::report::write_edge_report;
use crate::selector::{ComparisonTest, SelectorConfig};
use crate::tree::Tree;
use crate::Analysis;

fn to_py_err(err: PhyboError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn load(
    parent_indices: PyReadonlyArray1<i32>,
    branch_lengths: PyReadonlyArray1<f64>,
    names: Vec<String>,
    presence_matrix: PyReadonlyArray2<i8>,
    character_ids: Vec<String>,
    concepts: Vec<String>,
) -> Result<Analysis, PhyboError> {
    let tree = Tree::from_structure(
        parent_indices.as_array().to_vec(),
        branch_lengths.as_array().to_vec(),
        names,
    )?;
    let matrix = PresenceMatrix::from_array(
        tree.taxa().to_vec(),
        character_ids,
        concepts,
        presence_matrix.as_array(),
    )?;
    Analysis::new(tree, &matrix)
}

fn solver_config(model: &str, missing_data: &str, push_gains: bool) -> Result<SolverConfig, PhyboError> {
    let missing_data = match missing_data {
        "absent" => MissingData::Absent,
        "wildcard" => MissingData::Wildcard,
        other => {
            return Err(PhyboError::config(format!(
                "missing_data must be 'absent' or 'wildcard', got '{}'",
                other
            )))
        }
    };
    Ok(SolverConfig::new(model.parse::<CostModel>()?)
        .with_missing_data(missing_data)
        .with_push_gains(push_gains))
}

fn threshold(value: i64) -> Result<usize, PhyboError> {
    usize::try_from(value)
        .map_err(|_| PhyboError::config(format!("threshold must not be negative, got {}", value)))
}

/// Infer gain-loss scenarios for every column of a presence matrix.
///
/// # Arguments
/// * `parent_indices` - Parent index for each node (-1 for root)
/// * `branch_lengths` - Branch length for each node
/// * `names` - Unique name for each node
/// * `presence_matrix` - (n_taxa, n_characters) matrix of 1 / 0 / -1
/// * `character_ids` - Id of each column
/// * `model` - Cost model name, e.g. `w-2-1`, `r-3`, `t-2`
///
/// # Returns
/// * (ids, scenarios in report notation, origin counts) for characters with a present taxon
#[pyfunction]
#[pyo3(signature = (parent_indices, branch_lengths, names, presence_matrix, character_ids, model="w-1-1", missing_data="absent", push_gains=true))]
#[allow(clippy::too_many_arguments)]
fn solve_gain_loss<'py>(
    py: Python<'py>,
    parent_indices: PyReadonlyArray1<i32>,
    branch_lengths: PyReadonlyArray1<f64>,
    names: Vec<String>,
    presence_matrix: PyReadonlyArray2<i8>,
    character_ids: Vec<String>,
    model: &str,
    missing_data: &str,
    push_gains: bool,
) -> PyResult<(Vec<String>, Vec<String>, &'py PyArray1<usize>)> {
    let concepts = character_ids.clone();
    let analysis = load(parent_indices, branch_lengths, names, presence_matrix, character_ids, concepts)
        .map_err(to_py_err)?;
    let config = solver_config(model, missing_data, push_gains).map_err(to_py_err)?;

    let run = py
        .allow_threads(|| analysis.run_model(&config))
        .map_err(to_py_err)?;

    let mut ids = Vec::with_capacity(run.len());
    let mut scenarios = Vec::with_capacity(run.len());
    let mut origins = Vec::with_capacity(run.len());
    for (id, scenario) in run.iter() {
        ids.push(id.to_string());
        scenarios.push(scenario.to_string());
        origins.push(scenario.origin_count());
    }
    Ok((ids, scenarios, PyArray1::from_vec(py, origins)))
}

/// Build the minimal lateral network of one model and return its edge report.
#[pyfunction]
#[pyo3(signature = (parent_indices, branch_lengths, names, presence_matrix, character_ids, model="w-1-1", method="majority-rule", threshold=1))]
#[allow(clippy::too_many_arguments)]
fn build_edge_report(
    py: Python<'_>,
    parent_indices: PyReadonlyArray1<i32>,
    branch_lengths: PyReadonlyArray1<f64>,
    names: Vec<String>,
    presence_matrix: PyReadonlyArray2<i8>,
    character_ids: Vec<String>,
    model: &str,
    method: &str,
    threshold: i64,
) -> PyResult<String> {
    let concepts = character_ids.clone();
    let analysis = load(parent_indices, branch_lengths, names, presence_matrix, character_ids, concepts)
        .map_err(to_py_err)?;
    let solver = solver_config(model, "absent", true).map_err(to_py_err)?;
    let network = MlnConfig::new(
        method.parse::<ResolutionMethod>().map_err(to_py_err)?,
        self::threshold(threshold).map_err(to_py_err)?,
    );

    let report = py.allow_threads(|| -> Result<Vec<u8>, PhyboError> {
        let run = analysis.run_model(&solver)?;
        let mln = analysis.build_network(&run, &network)?;
        let mut buffer = Vec::new();
        write_edge_report(&mut buffer, &mln)?;
        Ok(buffer)
    });
    let report = report.map_err(to_py_err)?;
    String::from_utf8(report).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Pick the best model per concept.
///
/// # Returns
/// * List of (concept, model, score)
#[pyfunction]
#[pyo3(signature = (parent_indices, branch_lengths, names, presence_matrix, character_ids, concepts, models, test="kruskal-wallis"))]
#[allow(clippy::too_many_arguments)]
fn select_models(
    py: Python<'_>,
    parent_indices: PyReadonlyArray1<i32>,
    branch_lengths: PyReadonlyArray1<f64>,
    names: Vec<String>,
    presence_matrix: PyReadonlyArray2<i8>,
    character_ids: Vec<String>,
    concepts: Vec<String>,
    models: Vec<String>,
    test: &str,
) -> PyResult<Vec<(String, String, f64)>> {
    let analysis = load(parent_indices, branch_lengths, names, presence_matrix, character_ids, concepts)
        .map_err(to_py_err)?;
    let configs = models
        .iter()
        .map(|name| solver_config(name, "absent", true))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    let selector = SelectorConfig {
        test: test.parse::<ComparisonTest>().map_err(to_py_err)?,
    };

    let mixed = py
        .allow_threads(|| {
            let runs = analysis.run_models(&configs)?;
            analysis.select(&runs, &selector)
        })
        .map_err(to_py_err)?;

    Ok(mixed
        .choices
        .into_iter()
        .map(|choice| (choice.concept, choice.run, choice.score))
        .collect())
}

/// Python module definition
#[pymodule]
fn phybo(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(solve_gain_loss, m)?)?;
    m.add_function(wrap_pyfunction!(build_edge_report, m)?)?;
    m.add_function(wrap_pyfunction!(select_models, m)?)?;
    Ok(())
}
