/// Reference tree for gain-loss inference.
///
/// Represents a rooted, possibly multifurcating tree with unique node names.
/// Nodes are indexed 0..n_nodes; taxa are the childless nodes in index order.

use std::collections::HashMap;

use crate::error::{PhyboError, Result};

#[derive(Debug, Clone)]
pub struct Tree {
    pub n_nodes: usize,
    pub n_tips: usize,
    pub parent_indices: Vec<i32>,
    pub branch_lengths: Vec<f64>,
    pub children: Vec<Vec<usize>>,
    pub tip_indices: Vec<usize>,
    pub root_index: usize,
    names: Vec<String>,
    name_to_idx: HashMap<String, usize>,
    taxa: Vec<String>,
    /// Position of each node in `taxa`, `None` for internal nodes.
    taxon_position: Vec<Option<usize>>,
    depth: Vec<usize>,
    /// Tip node indices below every node, in taxon order.
    tips_below: Vec<Vec<usize>>,
}

impl Tree {
    /// Build tree from structure arrays.
    ///
    /// # Arguments
    /// * `parent_indices` - Parent index for each node (-1 for root)
    /// * `branch_lengths` - Branch length for each node
    /// * `names` - Unique name for each node
    pub fn from_structure(
        parent_indices: Vec<i32>,
        branch_lengths: Vec<f64>,
        names: Vec<String>,
    ) -> Result<Self> {
        let n_nodes = parent_indices.len();

        if branch_lengths.len() != n_nodes || names.len() != n_nodes {
            return Err(PhyboError::invalid_tree(
                "parent_indices, branch_lengths and names must have same length",
            ));
        }
        if n_nodes == 0 {
            return Err(PhyboError::invalid_tree("tree has no nodes"));
        }

        let mut name_to_idx = HashMap::with_capacity(n_nodes);
        for (idx, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(PhyboError::invalid_tree(format!("node {} has an empty name", idx)));
            }
            if name.contains(&crate::report::RESERVED[..]) {
                return Err(PhyboError::invalid_tree(format!(
                    "node name '{}' contains a report separator",
                    name.escape_debug()
                )));
            }
            if name_to_idx.insert(name.clone(), idx).is_some() {
                return Err(PhyboError::invalid_tree(format!("duplicate node name '{}'", name)));
            }
        }

        // Build children lists
        let mut children = vec![Vec::new(); n_nodes];
        let mut roots = Vec::new();
        for (child_idx, &parent_idx) in parent_indices.iter().enumerate() {
            if parent_idx < 0 {
                roots.push(child_idx);
            } else if (parent_idx as usize) < n_nodes {
                children[parent_idx as usize].push(child_idx);
            } else {
                return Err(PhyboError::invalid_tree(format!(
                    "node '{}' points to missing parent {}",
                    names[child_idx], parent_idx
                )));
            }
        }

        let root_index = match roots.as_slice() {
            [root] => *root,
            [] => return Err(PhyboError::invalid_tree("no root node found (no node with parent -1)")),
            _ => return Err(PhyboError::invalid_tree(format!("{} root nodes found", roots.len()))),
        };

        if let Some(unary) = (0..n_nodes).find(|&idx| children[idx].len() == 1) {
            return Err(PhyboError::invalid_tree(format!(
                "node '{}' has a single child",
                names[unary]
            )));
        }

        let tip_indices: Vec<usize> = (0..n_nodes).filter(|&idx| children[idx].is_empty()).collect();
        let mut taxon_position = vec![None; n_nodes];
        for (pos, &tip) in tip_indices.iter().enumerate() {
            taxon_position[tip] = Some(pos);
        }
        let taxa = tip_indices.iter().map(|&tip| names[tip].clone()).collect();

        let mut tree = Tree {
            n_nodes,
            n_tips: tip_indices.len(),
            parent_indices,
            branch_lengths,
            children,
            tip_indices,
            root_index,
            names,
            name_to_idx,
            taxa,
            taxon_position,
            depth: vec![0; n_nodes],
            tips_below: vec![Vec::new(); n_nodes],
        };

        // Every node must hang below the root; anything else is a cycle or a forest
        let order = tree.post_order();
        if order.len() != n_nodes {
            return Err(PhyboError::invalid_tree(format!(
                "{} of {} nodes are not reachable from the root",
                n_nodes - order.len(),
                n_nodes
            )));
        }

        for &node in order.iter().rev() {
            if let Some(parent) = tree.parent(node) {
                tree.depth[node] = tree.depth[parent] + 1;
            }
        }
        for &node in &order {
            let below = if tree.children[node].is_empty() {
                vec![node]
            } else {
                let mut tips: Vec<usize> = tree.children[node]
                    .iter()
                    .flat_map(|&child| tree.tips_below[child].iter().copied())
                    .collect();
                tips.sort_unstable();
                tips
            };
            tree.tips_below[node] = below;
        }

        Ok(tree)
    }

    /// Read a tree from Newick text.
    ///
    /// Unnamed internal nodes become `edge_1`, `edge_2`, ... in the order their
    /// closing parenthesis appears; an unnamed root becomes `root`.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let mut parser = NewickParser::new(newick);
        let root = parser.parse_subtree(-1)?;
        parser.skip_whitespace();
        if parser.peek() != Some(';') {
            return Err(parser.error("expected ';' after the root"));
        }
        debug_assert_eq!(root, 0);

        let names = parser
            .names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| name.ok_or_else(|| PhyboError::parse(1, format!("node {} has no name", idx))))
            .collect::<Result<Vec<_>>>()?;

        Self::from_structure(parser.parents, parser.lengths, names)
    }

    /// Get post-order traversal of nodes (tips to root).
    pub fn post_order(&self) -> Vec<usize> {
        self.post_order_from(self.root_index)
    }

    /// Post-order traversal of the subtree rooted at `start`.
    pub fn post_order_from(&self, start: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.n_nodes];

        fn visit(node: usize, tree: &Tree, visited: &mut Vec<bool>, order: &mut Vec<usize>) {
            if visited[node] {
                return;
            }
            visited[node] = true;

            // Visit children first
            for &child in &tree.children[node] {
                visit(child, tree, visited, order);
            }

            order.push(node);
        }

        visit(start, self, &mut visited, &mut order);
        order
    }

    /// Leaf names in pattern order.
    #[inline]
    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    /// Names of all nodes, indexed by node.
    #[inline]
    pub fn all_node_names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn name(&self, node: usize) -> &str {
        &self.names[node]
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    /// Look up a node by name, failing with a domain error.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.node(name)
            .ok_or_else(|| PhyboError::domain(format!("unknown node '{}'", name)))
    }

    #[inline]
    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    #[inline]
    pub fn parent(&self, node: usize) -> Option<usize> {
        let parent = self.parent_indices[node];
        (parent >= 0).then_some(parent as usize)
    }

    #[inline]
    pub fn is_tip(&self, node: usize) -> bool {
        self.children[node].is_empty()
    }

    /// Tip nodes below `node` (the node itself for a tip), in taxon order.
    #[inline]
    pub fn tips(&self, node: usize) -> &[usize] {
        &self.tips_below[node]
    }

    /// Position of a tip node within `taxa()`.
    #[inline]
    pub fn taxon_position(&self, node: usize) -> Option<usize> {
        self.taxon_position[node]
    }

    /// Number of edges between `node` and the root.
    #[inline]
    pub fn depth(&self, node: usize) -> usize {
        self.depth[node]
    }

    /// Internal (non-tip) nodes, root included.
    pub fn internal_nodes(&self) -> Vec<usize> {
        (0..self.n_nodes).filter(|&node| !self.is_tip(node)).collect()
    }

    /// Tree edges as (parent, child) pairs, in child index order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n_nodes).filter_map(move |child| self.parent(child).map(|parent| (parent, child)))
    }

    /// Lowest common ancestor of a set of nodes; `None` for an empty set.
    pub fn lowest_common_ancestor(&self, nodes: &[usize]) -> Option<usize> {
        let (&first, rest) = nodes.split_first()?;
        let mut lca = first;
        for &node in rest {
            lca = self.pair_lca(lca, node);
        }
        Some(lca)
    }

    /// Lowest common ancestor of named nodes.
    pub fn lowest_common_ancestor_of_names<S: AsRef<str>>(&self, names: &[S]) -> Result<usize> {
        let nodes = names
            .iter()
            .map(|name| self.index_of(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.lowest_common_ancestor(&nodes)
            .ok_or_else(|| PhyboError::domain("lowest common ancestor of an empty node set"))
    }

    fn pair_lca(&self, mut a: usize, mut b: usize) -> usize {
        while self.depth[a] > self.depth[b] {
            a = self.parent_indices[a] as usize;
        }
        while self.depth[b] > self.depth[a] {
            b = self.parent_indices[b] as usize;
        }
        while a != b {
            a = self.parent_indices[a] as usize;
            b = self.parent_indices[b] as usize;
        }
        a
    }

    /// Number of tree edges on the path between two nodes.
    pub fn path_length(&self, a: usize, b: usize) -> usize {
        let lca = self.pair_lca(a, b);
        self.depth[a] + self.depth[b] - 2 * self.depth[lca]
    }

    /// Number of tree edges between two named nodes.
    pub fn path_length_by_name(&self, a: &str, b: &str) -> Result<usize> {
        Ok(self.path_length(self.index_of(a)?, self.index_of(b)?))
    }
}

/// Recursive-descent reader for the Newick subset used by reference trees:
/// nested parentheses, optional labels, optional `:length`, single quotes.
struct NewickParser {
    chars: Vec<char>,
    pos: usize,
    parents: Vec<i32>,
    lengths: Vec<f64>,
    names: Vec<Option<String>>,
    next_edge: usize,
}

impl NewickParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            parents: Vec::new(),
            lengths: Vec::new(),
            names: Vec::new(),
            next_edge: 1,
        }
    }

    fn error(&self, message: &str) -> PhyboError {
        PhyboError::parse(1, format!("{} (at character {})", message, self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn add_node(&mut self, parent: i32) -> usize {
        self.parents.push(parent);
        self.lengths.push(0.0);
        self.names.push(None);
        self.parents.len() - 1
    }

    fn parse_subtree(&mut self, parent: i32) -> Result<usize> {
        self.skip_whitespace();
        let node = self.add_node(parent);

        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                self.parse_subtree(node as i32)?;
                self.skip_whitespace();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
            let name = match self.parse_label()? {
                Some(label) => label,
                None if parent < 0 => "root".to_string(),
                None => {
                    let name = format!("edge_{}", self.next_edge);
                    self.next_edge += 1;
                    name
                }
            };
            self.names[node] = Some(name);
        } else {
            let name = match self.parse_label()? {
                Some(label) => label,
                None => return Err(self.error("leaf without a name")),
            };
            self.names[node] = Some(name);
        }

        self.skip_whitespace();
        if self.peek() == Some(':') {
            self.pos += 1;
            self.lengths[node] = self.parse_length()?;
        }
        Ok(node)
    }

    fn parse_label(&mut self) -> Result<Option<String>> {
        self.skip_whitespace();
        if self.peek() == Some('\'') {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|c| c != '\'') {
                self.pos += 1;
            }
            if self.peek().is_none() {
                return Err(self.error("unterminated quoted label"));
            }
            let label: String = self.chars[start..self.pos].iter().collect();
            self.pos += 1;
            return Ok(Some(label));
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !matches!(c, '(' | ')' | ',' | ':' | ';') && !c.is_whitespace())
        {
            self.pos += 1;
        }
        let label: String = self.chars[start..self.pos].iter().collect();
        Ok((!label.is_empty()).then_some(label))
    }

    fn parse_length(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| self.error(&format!("invalid branch length '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_creation() {
        let tree = Tree::from_newick("((A:1,B:1):1,C:1);").unwrap();

        assert_eq!(tree.n_tips, 3);
        assert_eq!(tree.n_nodes, 5);
        assert_eq!(tree.taxa(), &["A", "B", "C"]);
        assert_eq!(tree.name(tree.root_index), "root");
        assert!(tree.node("edge_1").is_some());
    }

    #[test]
    fn test_post_order() {
        let tree = Tree::from_newick("(A:1,B:1);").unwrap();

        let order = tree.post_order();
        // Root should be last
        assert_eq!(order.last(), Some(&tree.root_index));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_from_structure() {
        let names = ["root", "A", "B", "x", "C", "D"].map(String::from).to_vec();
        let tree = Tree::from_structure(vec![-1, 0, 0, 0, 3, 3], vec![1.0; 6], names).unwrap();

        assert_eq!(tree.taxa(), &["A", "B", "C", "D"]);
        assert_eq!(tree.children(0), &[1, 2, 3]);
        assert_eq!(tree.parent(4), Some(3));
        assert_eq!(tree.parent(0), None);
        assert_eq!(tree.tips(3), &[4, 5]);
    }

    #[test]
    fn test_lowest_common_ancestor() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();

        let lca = tree.lowest_common_ancestor_of_names(&["A", "B"]).unwrap();
        assert_eq!(tree.name(lca), "ab");

        let lca = tree.lowest_common_ancestor_of_names(&["A", "D"]).unwrap();
        assert_eq!(lca, tree.root_index);

        let a = tree.node("A").unwrap();
        assert_eq!(tree.lowest_common_ancestor(&[a]), Some(a));
        assert_eq!(tree.lowest_common_ancestor(&[]), None);
    }

    #[test]
    fn test_path_length() {
        let tree = Tree::from_newick("((A,B)ab,(C,D)cd,E);").unwrap();

        assert_eq!(tree.path_length_by_name("A", "B").unwrap(), 2);
        assert_eq!(tree.path_length_by_name("A", "D").unwrap(), 4);
        assert_eq!(tree.path_length_by_name("A", "E").unwrap(), 3);
        assert_eq!(tree.path_length_by_name("ab", "root").unwrap(), 1);
        assert_eq!(tree.path_length_by_name("E", "E").unwrap(), 0);
        assert!(tree.path_length_by_name("A", "Z").is_err());
    }

    #[test]
    fn test_edge_naming_order() {
        let tree = Tree::from_newick("(((A,B),C),(D,E));").unwrap();

        let ab = tree.lowest_common_ancestor_of_names(&["A", "B"]).unwrap();
        let abc = tree.lowest_common_ancestor_of_names(&["A", "C"]).unwrap();
        let de = tree.lowest_common_ancestor_of_names(&["D", "E"]).unwrap();
        assert_eq!(tree.name(ab), "edge_1");
        assert_eq!(tree.name(abc), "edge_2");
        assert_eq!(tree.name(de), "edge_3");
        assert_eq!(tree.edges().count(), tree.n_nodes - 1);
    }

    #[test]
    fn test_quoted_labels_and_lengths() {
        let tree = Tree::from_newick("('Old Norse':0.5, (Icelandic:1e-1, Faroese:2)West);").unwrap();

        assert_eq!(tree.taxa(), &["Old Norse", "Icelandic", "Faroese"]);
        let icelandic = tree.node("Icelandic").unwrap();
        assert!((tree.branch_lengths[icelandic] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_trees() {
        assert!(matches!(Tree::from_newick("((A,B),A);"), Err(PhyboError::InvalidTree { .. })));
        assert!(matches!(Tree::from_newick("((A),B);"), Err(PhyboError::InvalidTree { .. })));
        assert!(matches!(Tree::from_newick("((A,B),C)"), Err(PhyboError::Parse { .. })));
        assert!(matches!(Tree::from_newick("((A,),C);"), Err(PhyboError::Parse { .. })));

        let names = ["a", "b", "c"].map(String::from).to_vec();
        // Two roots
        assert!(Tree::from_structure(vec![-1, -1, 0], vec![0.0; 3], names.clone()).is_err());
        // Cycle between b and c, unreachable from a
        assert!(Tree::from_structure(vec![-1, 2, 1], vec![0.0; 3], names).is_err());

        // Names must survive the report formats
        let names = ["root", "a,b", "c"].map(String::from).to_vec();
        assert!(matches!(
            Tree::from_structure(vec![-1, 0, 0], vec![0.0; 3], names),
            Err(PhyboError::InvalidTree { .. })
        ));
        assert!(matches!(Tree::from_newick("('a,b',C);"), Err(PhyboError::InvalidTree { .. })));
    }
}
