//! Minimal lateral network: vertical tree edges plus aggregated MST edges.

use std::collections::BTreeMap;

use super::resolution::ResolutionMethod;

/// Unordered node pair, stored with the smaller name first.
pub type NodePair = (String, String);

pub(crate) fn node_pair(a: &str, b: &str) -> NodePair {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Aggregated edge: weight and the characters behind it, in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeRecord {
    pub weight: usize,
    pub characters: Vec<String>,
}

/// Borrowing network of one scenario set.
#[derive(Clone, Debug)]
pub struct Mln {
    label: String,
    method: ResolutionMethod,
    threshold: usize,
    /// (parent, child) tree edges; characters present at both ends.
    vertical: BTreeMap<NodePair, EdgeRecord>,
    horizontal: BTreeMap<NodePair, EdgeRecord>,
    /// MST edges chosen for each character.
    per_character: BTreeMap<String, Vec<NodePair>>,
}

impl Mln {
    pub(crate) fn new(label: impl Into<String>, method: ResolutionMethod, threshold: usize) -> Self {
        Self {
            label: label.into(),
            method,
            threshold,
            vertical: BTreeMap::new(),
            horizontal: BTreeMap::new(),
            per_character: BTreeMap::new(),
        }
    }

    pub(crate) fn add_vertical(&mut self, parent: &str, child: &str, record: EdgeRecord) {
        self.vertical.insert((parent.to_string(), child.to_string()), record);
    }

    /// Record the MST of one character and count its edges.
    pub(crate) fn add_character_edges(&mut self, character: &str, edges: Vec<NodePair>) {
        for (a, b) in &edges {
            let record = self.horizontal.entry(node_pair(a, b)).or_default();
            record.weight += 1;
            record.characters.push(character.to_string());
        }
        self.per_character.insert(character.to_string(), edges);
    }

    /// Label of the scenario set the network was built from.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn method(&self) -> ResolutionMethod {
        self.method
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Same network with another output threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn vertical_edges(&self) -> impl Iterator<Item = (&NodePair, &EdgeRecord)> {
        self.vertical.iter()
    }

    /// Every horizontal edge, including those below the threshold.
    pub fn horizontal_edges(&self) -> impl Iterator<Item = (&NodePair, &EdgeRecord)> {
        self.horizontal.iter()
    }

    /// Horizontal edges whose weight reaches the threshold.
    pub fn retained_edges(&self) -> impl Iterator<Item = (&NodePair, &EdgeRecord)> {
        let threshold = self.threshold;
        self.horizontal
            .iter()
            .filter(move |(_, record)| record.weight >= threshold)
    }

    pub fn horizontal_weight(&self, a: &str, b: &str) -> usize {
        self.horizontal
            .get(&node_pair(a, b))
            .map(|record| record.weight)
            .unwrap_or(0)
    }

    /// MST edges of one character; `None` for characters with a single origin.
    pub fn character_edges(&self, character: &str) -> Option<&[NodePair]> {
        self.per_character.get(character).map(Vec::as_slice)
    }

    /// Characters that needed more than one origin.
    pub fn resolved_characters(&self) -> impl Iterator<Item = &str> {
        self.per_character.keys().map(String::as_str)
    }

    /// Number of retained horizontal edges at every node.
    pub fn transfer_degree(&self) -> BTreeMap<&str, usize> {
        let mut degree = BTreeMap::new();
        for ((a, b), _) in self.retained_edges() {
            *degree.entry(a.as_str()).or_insert(0) += 1;
            *degree.entry(b.as_str()).or_insert(0) += 1;
        }
        degree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> NodePair {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_aggregation_and_threshold() {
        let mut mln = Mln::new("w-1-1", ResolutionMethod::MajorityRule, 2);
        mln.add_character_edges("x", vec![pair("A", "B")]);
        mln.add_character_edges("y", vec![pair("B", "A"), pair("A", "C")]);

        assert_eq!(mln.horizontal_weight("A", "B"), 2);
        assert_eq!(mln.horizontal_weight("C", "A"), 1);
        assert_eq!(mln.horizontal_edges().count(), 2);

        let retained: Vec<_> = mln.retained_edges().collect();
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].0, &pair("A", "B"));
        assert_eq!(retained[0].1.characters, vec!["x".to_string(), "y".to_string()]);

        let open = mln.with_threshold(0);
        assert_eq!(open.retained_edges().count(), 2);
        assert_eq!(open.transfer_degree()["A"], 2);
    }

    #[test]
    fn test_character_edges() {
        let mut mln = Mln::new("t-1", ResolutionMethod::TreeDistance, 1);
        mln.add_character_edges("x", vec![pair("A", "B")]);
        assert_eq!(mln.character_edges("x"), Some(&[pair("A", "B")][..]));
        assert!(mln.character_edges("y").is_none());
        assert_eq!(mln.resolved_characters().collect::<Vec<_>>(), vec!["x"]);
    }
}
