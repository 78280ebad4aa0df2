use std::ops::Index;
use std::slice;

use super::fragmentation::FragmentationTree;

/// The fragmentation trees built from one source, one per distinct MS2 precursor.
///
/// Trees are independent of one another and share no state.
#[derive(Debug, Clone)]
pub struct FragmentationForest<S> {
    trees: Vec<FragmentationTree<S>>,
}

impl<S> Default for FragmentationForest<S> {
    fn default() -> Self {
        Self { trees: Vec::new() }
    }
}

impl<S> FragmentationForest<S> {
    pub fn new(trees: Vec<FragmentationTree<S>>) -> Self {
        Self { trees }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FragmentationTree<S>> {
        self.trees.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, FragmentationTree<S>> {
        self.trees.iter()
    }

    pub fn trees(&self) -> &[FragmentationTree<S>] {
        &self.trees
    }

    pub fn into_trees(self) -> Vec<FragmentationTree<S>> {
        self.trees
    }

    /// Sort the nodes within every tree, leaving the trees in place
    pub fn sort_trees(&mut self) {
        for tree in self.trees.iter_mut() {
            tree.sort();
        }
    }

    /// Sort every tree, then order the trees by descending root precursor m/z
    pub fn sort(&mut self) {
        self.sort_trees();
        self.trees.sort_by(|a, b| a.precursor_cmp(b));
    }

    /// The first tree whose root precursor matches `mz` under that tree's tolerance
    pub fn tree_for_precursor(&self, mz: f64) -> Option<&FragmentationTree<S>> {
        self.trees
            .iter()
            .find(|t| t.tolerance().matches(t.precursor_mz(), mz))
    }

    /// The number of spectra held across every tree
    pub fn count_spectra(&self) -> usize {
        self.trees.iter().map(|t| t.total_spectra()).sum()
    }

    /// The number of spectra recorded at `ms_level` across every tree
    pub fn count_spectra_at(&self, ms_level: u8) -> usize {
        self.trees.iter().map(|t| t.count_spectra(ms_level)).sum()
    }

    pub fn max_ms_level(&self) -> Option<u8> {
        self.trees.iter().map(|t| t.max_ms_level()).max()
    }
}

impl<S> Index<usize> for FragmentationForest<S> {
    type Output = FragmentationTree<S>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.trees[index]
    }
}

impl<S> FromIterator<FragmentationTree<S>> for FragmentationForest<S> {
    fn from_iter<T: IntoIterator<Item = FragmentationTree<S>>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<S> Extend<FragmentationTree<S>> for FragmentationForest<S> {
    fn extend<T: IntoIterator<Item = FragmentationTree<S>>>(&mut self, iter: T) {
        self.trees.extend(iter)
    }
}

impl<S> IntoIterator for FragmentationForest<S> {
    type Item = FragmentationTree<S>;

    type IntoIter = std::vec::IntoIter<FragmentationTree<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.into_iter()
    }
}

impl<'a, S> IntoIterator for &'a FragmentationForest<S> {
    type Item = &'a FragmentationTree<S>;

    type IntoIter = slice::Iter<'a, FragmentationTree<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.iter()
    }
}
