//! Primary graph: co-occurrence of gain origins.
//!
//! Nodes are all nodes of the reference tree. Two nodes are linked with
//! weight `w` when `w` characters have a GAIN at both of them.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::Result;
use crate::gls::ScenarioSet;
use crate::tree::Tree;

#[derive(Clone, Debug)]
pub struct PrimaryGraph {
    graph: UnGraph<String, usize>,
    index: HashMap<String, NodeIndex>,
}

impl PrimaryGraph {
    /// Empty graph over every node of `tree`.
    pub fn new(tree: &Tree) -> Self {
        let mut graph = UnGraph::with_capacity(tree.n_nodes, 0);
        let mut index = HashMap::with_capacity(tree.n_nodes);
        for name in tree.all_node_names() {
            index.insert(name.clone(), graph.add_node(name.clone()));
        }
        Self { graph, index }
    }

    /// Count the origin pairs of every scenario in `scenarios`.
    pub fn from_scenarios(tree: &Tree, scenarios: &ScenarioSet) -> Result<Self> {
        let mut primary = Self::new(tree);
        for (_, scenario) in scenarios.iter() {
            for origin in scenario.origins() {
                tree.index_of(origin)?;
            }
            primary.add_character(&scenario.origins());
        }
        Ok(primary)
    }

    /// Add one to the weight of every unordered pair of `origins`.
    ///
    /// Names that are not tree nodes are ignored.
    pub fn add_character(&mut self, origins: &[&str]) {
        let nodes: Vec<NodeIndex> = origins
            .iter()
            .filter_map(|name| self.index.get(*name).copied())
            .collect();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in &nodes[i + 1..] {
                if a == b {
                    continue;
                }
                match self.graph.find_edge(a, b) {
                    Some(edge) => self.graph[edge] += 1,
                    None => {
                        self.graph.add_edge(a, b, 1);
                    }
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Co-occurrence weight of two nodes; 0 when they are not linked.
    pub fn weight(&self, a: &str, b: &str) -> usize {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&a), Some(&b)) => self
                .graph
                .find_edge(a, b)
                .map(|edge| self.graph[edge])
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Largest edge weight in the graph.
    pub fn max_weight(&self) -> usize {
        self.graph.edge_weights().copied().max().unwrap_or(0)
    }

    /// Sum of the weights of the edges at `node`.
    pub fn weighted_degree(&self, node: &str) -> usize {
        self.index
            .get(node)
            .map(|&idx| self.graph.edges(idx).map(|edge| *edge.weight()).sum())
            .unwrap_or(0)
    }

    /// Node with the highest weighted degree, ties by name; `None` without edges.
    pub fn hub(&self) -> Option<&str> {
        self.graph
            .node_indices()
            .map(|idx| {
                let degree: usize = self.graph.edges(idx).map(|edge| *edge.weight()).sum();
                (degree, self.graph[idx].as_str())
            })
            .filter(|&(degree, _)| degree > 0)
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, name)| name)
    }

    /// Edges as (a, b, weight) with `a < b`, sorted.
    pub fn edges(&self) -> Vec<(&str, &str, usize)> {
        let mut edges: Vec<(&str, &str, usize)> = self
            .graph
            .edge_references()
            .map(|edge| {
                let a = self.graph[edge.source()].as_str();
                let b = self.graph[edge.target()].as_str();
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                (a, b, *edge.weight())
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Edge betweenness over unweighted shortest paths (Brandes).
    ///
    /// Keys are name pairs ordered so that the first is the smaller name.
    /// Each undirected path is counted once.
    pub fn edge_betweenness(&self) -> HashMap<(String, String), f64> {
        let n = self.graph.node_count();
        let mut centrality: HashMap<(NodeIndex, NodeIndex), f64> = self
            .graph
            .edge_references()
            .map(|edge| (ordered(edge.source(), edge.target()), 0.0))
            .collect();

        for source in self.graph.node_indices() {
            if self.graph.edges(source).next().is_none() {
                continue;
            }
            let mut stack = Vec::new();
            let mut pred: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0f64; n];
            let mut dist = vec![-1i64; n];
            let mut delta = vec![0.0f64; n];

            sigma[source.index()] = 1.0;
            dist[source.index()] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(source);

            while let Some(v) = queue.pop_front() {
                stack.push(v);
                let d_v = dist[v.index()];
                for w in self.graph.neighbors(v) {
                    if dist[w.index()] < 0 {
                        dist[w.index()] = d_v + 1;
                        queue.push_back(w);
                    }
                    if dist[w.index()] == d_v + 1 {
                        sigma[w.index()] += sigma[v.index()];
                        pred[w.index()].push(v);
                    }
                }
            }

            while let Some(w) = stack.pop() {
                for &v in &pred[w.index()] {
                    let share = sigma[v.index()] / sigma[w.index()] * (1.0 + delta[w.index()]);
                    if let Some(value) = centrality.get_mut(&ordered(v, w)) {
                        *value += share;
                    }
                    delta[v.index()] += share;
                }
            }
        }

        centrality
            .into_iter()
            .map(|((a, b), value)| {
                let (a, b) = (self.graph[a].clone(), self.graph[b].clone());
                let key = if a <= b { (a, b) } else { (b, a) };
                (key, value / 2.0)
            })
            .collect()
    }
}

fn ordered(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Tree {
        Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap()
    }

    #[test]
    fn test_pair_counts() {
        let mut primary = PrimaryGraph::new(&tree());
        primary.add_character(&["A", "B"]);
        primary.add_character(&["B", "A"]);
        primary.add_character(&["A", "C", "E"]);

        assert_eq!(primary.node_count(), 8);
        assert_eq!(primary.weight("A", "B"), 2);
        assert_eq!(primary.weight("B", "A"), 2);
        assert_eq!(primary.weight("C", "E"), 1);
        assert_eq!(primary.weight("B", "E"), 0);
        assert_eq!(primary.max_weight(), 2);
        assert_eq!(primary.edge_count(), 4);
    }

    #[test]
    fn test_hub_and_degree() {
        let mut primary = PrimaryGraph::new(&tree());
        assert_eq!(primary.hub(), None);

        primary.add_character(&["A", "C"]);
        primary.add_character(&["D", "C"]);
        assert_eq!(primary.weighted_degree("C"), 2);
        assert_eq!(primary.hub(), Some("C"));

        // Equal degrees resolve to the smaller name
        let mut tied = PrimaryGraph::new(&tree());
        tied.add_character(&["D", "E"]);
        assert_eq!(tied.hub(), Some("D"));
    }

    #[test]
    fn test_edge_betweenness_on_path() {
        // Path A - B - C: the two edges carry two of the three shortest paths each
        let mut primary = PrimaryGraph::new(&tree());
        primary.add_character(&["A", "B"]);
        primary.add_character(&["B", "C"]);

        let bc = primary.edge_betweenness();
        assert_eq!(bc.len(), 2);
        assert!((bc[&("A".to_string(), "B".to_string())] - 2.0).abs() < 1e-12);
        assert!((bc[&("B".to_string(), "C".to_string())] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_edges_sorted() {
        let mut primary = PrimaryGraph::new(&tree());
        primary.add_character(&["E", "C", "A"]);
        let edges = primary.edges();
        assert_eq!(edges, vec![("A", "C", 1), ("A", "E", 1), ("C", "E", 1)]);
    }
}
