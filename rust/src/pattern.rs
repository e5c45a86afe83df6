//! Presence/absence patterns of cognate classes.
//!
//! A pattern records, per taxon of the reference tree, whether a reflex of a
//! cognate class is attested. The presence matrix groups all characters of a
//! dataset and aligns their patterns to the tree's taxon order.

use std::collections::HashMap;
use std::fmt;

use ndarray::ArrayView2;

use crate::error::{PhyboError, Result};
use crate::tree::Tree;

/// Observed state of a character in one taxon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    Absent,
    Present,
    Unknown,
}

impl State {
    /// Decode the integer convention used by presence matrices: 1 / 0 / -1.
    pub fn from_code(code: i8) -> Result<Self> {
        match code {
            1 => Ok(State::Present),
            0 => Ok(State::Absent),
            -1 => Ok(State::Unknown),
            other => Err(PhyboError::domain(format!("invalid presence code {}", other))),
        }
    }

    pub fn code(self) -> i8 {
        match self {
            State::Present => 1,
            State::Absent => 0,
            State::Unknown => -1,
        }
    }
}

/// Presence/absence pattern aligned to `Tree::taxa()`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern(Vec<State>);

impl Pattern {
    pub fn new(states: Vec<State>) -> Self {
        Self(states)
    }

    /// Build from integer codes (1 present, 0 absent, -1 unknown).
    pub fn from_codes(codes: &[i8]) -> Result<Self> {
        codes
            .iter()
            .map(|&code| State::from_code(code))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    #[inline]
    pub fn states(&self) -> &[State] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> State {
        self.0[position]
    }

    pub fn count(&self, state: State) -> usize {
        self.0.iter().filter(|&&s| s == state).count()
    }

    /// Positions of the taxa where the character is attested.
    pub fn present_positions(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s == State::Present)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Fewer than two attestations: explained by a single gain, no borrowing signal.
    pub fn is_singleton(&self) -> bool {
        self.count(State::Present) < 2
    }

    pub fn codes(&self) -> Vec<i8> {
        self.0.iter().map(|s| s.code()).collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.0 {
            let c = match state {
                State::Present => '1',
                State::Absent => '0',
                State::Unknown => '?',
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// One cognate class: its id, the concept it expresses and its pattern.
#[derive(Clone, Debug)]
pub struct Character {
    pub id: String,
    pub concept: String,
    pub pattern: Pattern,
}

/// All characters of a dataset over a fixed list of taxa.
#[derive(Clone, Debug)]
pub struct PresenceMatrix {
    taxa: Vec<String>,
    characters: Vec<Character>,
}

impl PresenceMatrix {
    /// Create an empty matrix over `taxa`.
    pub fn new(taxa: Vec<String>) -> Self {
        Self {
            taxa,
            characters: Vec::new(),
        }
    }

    /// Load a (n_taxa, n_characters) integer matrix.
    ///
    /// # Arguments
    /// * `taxa` - Row labels
    /// * `ids` - Character id for each column
    /// * `concepts` - Concept for each column
    /// * `codes` - 1 present, 0 absent, -1 unknown
    pub fn from_array(
        taxa: Vec<String>,
        ids: Vec<String>,
        concepts: Vec<String>,
        codes: ArrayView2<i8>,
    ) -> Result<Self> {
        let (n_rows, n_cols) = codes.dim();
        if n_rows != taxa.len() {
            return Err(PhyboError::domain(format!(
                "matrix has {} rows but {} taxa were given",
                n_rows,
                taxa.len()
            )));
        }
        if ids.len() != n_cols || concepts.len() != n_cols {
            return Err(PhyboError::domain(format!(
                "matrix has {} columns but {} ids and {} concepts were given",
                n_cols,
                ids.len(),
                concepts.len()
            )));
        }

        let mut matrix = Self::new(taxa);
        for ((id, concept), column) in ids.into_iter().zip(concepts).zip(codes.columns()) {
            let column: Vec<i8> = column.iter().copied().collect();
            matrix.push(id, concept, Pattern::from_codes(&column)?)?;
        }
        Ok(matrix)
    }

    /// Append a character; its pattern must cover every taxon.
    pub fn push(&mut self, id: impl Into<String>, concept: impl Into<String>, pattern: Pattern) -> Result<()> {
        let id = id.into();
        if pattern.len() != self.taxa.len() {
            return Err(PhyboError::domain(format!(
                "pattern of '{}' has {} entries for {} taxa",
                id,
                pattern.len(),
                self.taxa.len()
            )));
        }
        if id.is_empty() || id.contains(&crate::report::RESERVED[..]) {
            return Err(PhyboError::domain(format!(
                "character id '{}' is empty or contains a report separator",
                id.escape_debug()
            )));
        }
        if self.characters.iter().any(|c| c.id == id) {
            return Err(PhyboError::domain(format!("duplicate character id '{}'", id)));
        }
        self.characters.push(Character {
            id,
            concept: concept.into(),
            pattern,
        });
        Ok(())
    }

    #[inline]
    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    #[inline]
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Reorder every pattern to the taxon order of `tree`.
    ///
    /// Taxa of the tree that are missing from the matrix become `Unknown`;
    /// matrix taxa that are not leaves of the tree are an error.
    pub fn align_to(&self, tree: &Tree) -> Result<PresenceMatrix> {
        let tree_positions: HashMap<&str, usize> = tree
            .taxa()
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.as_str(), pos))
            .collect();

        let mapping = self
            .taxa
            .iter()
            .map(|taxon| {
                tree_positions
                    .get(taxon.as_str())
                    .copied()
                    .ok_or_else(|| PhyboError::domain(format!("taxon '{}' is not a leaf of the tree", taxon)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut aligned = PresenceMatrix::new(tree.taxa().to_vec());
        for character in &self.characters {
            let mut states = vec![State::Unknown; tree.n_tips];
            for (from, &to) in mapping.iter().enumerate() {
                states[to] = character.pattern.get(from);
            }
            aligned.push(character.id.clone(), character.concept.clone(), Pattern::new(states))?;
        }
        Ok(aligned)
    }

    /// Concepts in order of first appearance.
    pub fn concepts(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for character in &self.characters {
            if !seen.contains(&character.concept.as_str()) {
                seen.push(character.concept.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn taxa(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pattern_codes() {
        let pattern = Pattern::from_codes(&[1, 0, -1, 1]).unwrap();
        assert_eq!(pattern.count(State::Present), 2);
        assert_eq!(pattern.present_positions(), vec![0, 3]);
        assert_eq!(pattern.codes(), vec![1, 0, -1, 1]);
        assert_eq!(pattern.to_string(), "10?1");
        assert!(!pattern.is_singleton());

        assert!(Pattern::from_codes(&[1, 2]).is_err());
    }

    #[test]
    fn test_singleton() {
        assert!(Pattern::from_codes(&[0, 1, 0]).unwrap().is_singleton());
        assert!(Pattern::from_codes(&[0, 0, -1]).unwrap().is_singleton());
    }

    #[test]
    fn test_from_array() {
        let codes = array![[1i8, 0], [1, -1], [0, 1]];
        let matrix = PresenceMatrix::from_array(
            taxa(&["A", "B", "C"]),
            taxa(&["hand-1", "hand-2"]),
            taxa(&["hand", "hand"]),
            codes.view(),
        )
        .unwrap();

        assert_eq!(matrix.characters().len(), 2);
        let second = matrix.character("hand-2").unwrap();
        assert_eq!(second.pattern.codes(), vec![0, -1, 1]);
        assert_eq!(matrix.concepts(), vec!["hand"]);
    }

    #[test]
    fn test_from_array_shape_mismatch() {
        let codes = array![[1i8, 0], [1, 1]];
        let result = PresenceMatrix::from_array(
            taxa(&["A", "B", "C"]),
            taxa(&["x", "y"]),
            taxa(&["c", "c"]),
            codes.view(),
        );
        assert!(matches!(result, Err(PhyboError::Domain { .. })));
    }

    #[test]
    fn test_push_rejects_duplicates_and_bad_lengths() {
        let mut matrix = PresenceMatrix::new(taxa(&["A", "B"]));
        matrix.push("x", "c", Pattern::from_codes(&[1, 0]).unwrap()).unwrap();
        assert!(matrix.push("x", "c", Pattern::from_codes(&[1, 1]).unwrap()).is_err());
        assert!(matrix.push("y", "c", Pattern::from_codes(&[1]).unwrap()).is_err());
    }

    #[test]
    fn test_push_rejects_report_separators() {
        let mut matrix = PresenceMatrix::new(taxa(&["A", "B"]));
        for id in ["hand,1", "hand\t1", "hand\n1", ""] {
            let result = matrix.push(id, "hand", Pattern::from_codes(&[1, 0]).unwrap());
            assert!(matches!(result, Err(PhyboError::Domain { .. })), "id {:?}", id);
        }
        assert!(matrix.characters().is_empty());
    }

    #[test]
    fn test_align_to_tree() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let mut matrix = PresenceMatrix::new(taxa(&["C", "A", "B"]));
        matrix.push("x", "c", Pattern::from_codes(&[1, 0, 1]).unwrap()).unwrap();

        let aligned = matrix.align_to(&tree).unwrap();
        assert_eq!(aligned.taxa(), tree.taxa());
        // A, B, C, D
        assert_eq!(aligned.characters()[0].pattern.codes(), vec![0, 1, 1, -1]);

        let stray = PresenceMatrix::new(taxa(&["Z"]));
        assert!(stray.align_to(&tree).is_err());
    }
}
