//! Resolution of multiple origins into a minimal spanning tree.
//!
//! A character with k >= 2 origins gets a complete weight graph over its
//! origins. The cost of each pair comes from the resolution method; Kruskal's
//! algorithm then keeps the k - 1 cheapest connecting edges.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use petgraph::unionfind::UnionFind;

use crate::error::{PhyboError, Result};
use crate::tree::Tree;

use super::primary::PrimaryGraph;

/// How the cost of linking two origins of one character is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ResolutionMethod {
    /// Frequent co-occurrence is cheap; ties go to the shorter tree distance.
    #[default]
    MajorityRule,
    /// Number of tree edges between the origins.
    TreeDistance,
    /// Edges that carry many shortest paths in the primary graph are cheap.
    Betweenness,
    /// Edges touching the primary graph's hub are free.
    CentralNode,
}

impl ResolutionMethod {
    pub const ALL: [ResolutionMethod; 4] = [
        ResolutionMethod::MajorityRule,
        ResolutionMethod::TreeDistance,
        ResolutionMethod::Betweenness,
        ResolutionMethod::CentralNode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResolutionMethod::MajorityRule => "majority-rule",
            ResolutionMethod::TreeDistance => "tree-distance",
            ResolutionMethod::Betweenness => "betweenness",
            ResolutionMethod::CentralNode => "central-node",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResolutionMethod {
    type Err = PhyboError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "majority-rule" | "mr" => Ok(ResolutionMethod::MajorityRule),
            "tree-distance" | "td" => Ok(ResolutionMethod::TreeDistance),
            "betweenness" | "bc" => Ok(ResolutionMethod::Betweenness),
            "central-node" | "cn" => Ok(ResolutionMethod::CentralNode),
            _ => Err(PhyboError::config(format!("unknown resolution method '{}'", name))),
        }
    }
}

/// One candidate edge of a weight graph, names ordered `a < b`.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedPair {
    pub a: String,
    pub b: String,
    pub cost: f64,
}

/// Precomputed state shared by the weight graphs of one network.
pub(crate) struct Resolver<'a> {
    method: ResolutionMethod,
    tree: &'a Tree,
    primary: &'a PrimaryGraph,
    betweenness: HashMap<(String, String), f64>,
    max_betweenness: f64,
    hub: Option<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(method: ResolutionMethod, tree: &'a Tree, primary: &'a PrimaryGraph) -> Self {
        let betweenness = match method {
            ResolutionMethod::Betweenness => primary.edge_betweenness(),
            _ => HashMap::new(),
        };
        let max_betweenness = betweenness.values().copied().fold(0.0, f64::max);
        let hub = match method {
            ResolutionMethod::CentralNode => primary.hub().map(str::to_string),
            _ => None,
        };
        Self {
            method,
            tree,
            primary,
            betweenness,
            max_betweenness,
            hub,
        }
    }

    /// Complete weight graph over `origins` (pairs without a defined cost are left out).
    pub(crate) fn weight_graph(&self, origins: &[&str]) -> Result<Vec<WeightedPair>> {
        let mut pairs = Vec::with_capacity(origins.len() * origins.len().saturating_sub(1) / 2);
        for (i, &a) in origins.iter().enumerate() {
            for &b in &origins[i + 1..] {
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                let distance = self.tree.path_length_by_name(a, b)?;
                pairs.push((a, b, self.primary.weight(a, b), distance));
            }
        }

        let max_w = pairs.iter().map(|p| p.2).max().unwrap_or(0);
        let max_d = pairs.iter().map(|p| p.3).max().unwrap_or(0);

        Ok(pairs
            .into_iter()
            .filter_map(|(a, b, weight, distance)| {
                let cost = match self.method {
                    ResolutionMethod::MajorityRule => {
                        ((max_w + 1 - weight) * (max_d + 1) + distance) as f64
                    }
                    ResolutionMethod::TreeDistance => distance as f64,
                    ResolutionMethod::Betweenness => {
                        let bc = self.betweenness.get(&(a.to_string(), b.to_string()))?;
                        self.max_betweenness - bc
                    }
                    ResolutionMethod::CentralNode => match self.hub.as_deref() {
                        Some(hub) if a == hub || b == hub => 0.0,
                        _ => 1.0,
                    },
                };
                Some(WeightedPair {
                    a: a.to_string(),
                    b: b.to_string(),
                    cost,
                })
            })
            .collect())
    }
}

/// Kruskal's minimum spanning tree over `nodes`.
///
/// Edges are taken by increasing cost, then by name pair, so equal costs
/// resolve the same way on every run.
///
/// # Errors
/// Domain error when the pairs do not connect all nodes.
pub fn minimum_spanning_tree(nodes: &[&str], pairs: &[WeightedPair]) -> Result<Vec<(String, String)>> {
    let position: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, &name)| (name, i)).collect();

    let mut order: Vec<&WeightedPair> = pairs.iter().collect();
    order.sort_by(|x, y| {
        x.cost
            .total_cmp(&y.cost)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });

    let mut components = UnionFind::<usize>::new(nodes.len());
    let mut tree_edges = Vec::with_capacity(nodes.len().saturating_sub(1));
    for pair in order {
        let (a, b) = match (position.get(pair.a.as_str()), position.get(pair.b.as_str())) {
            (Some(&a), Some(&b)) => (a, b),
            _ => continue,
        };
        if components.union(a, b) {
            tree_edges.push((pair.a.clone(), pair.b.clone()));
            if tree_edges.len() + 1 == nodes.len() {
                break;
            }
        }
    }

    match (tree_edges.len() + 1).cmp(&nodes.len()) {
        Ordering::Less if !nodes.is_empty() => Err(PhyboError::domain(format!(
            "weight graph over {} origins is disconnected ({} spanning edges)",
            nodes.len(),
            tree_edges.len()
        ))),
        _ => Ok(tree_edges),
    }
}
