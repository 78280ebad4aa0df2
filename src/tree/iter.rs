use std::iter::FusedIterator;

use super::fragmentation::FragmentationTree;
use super::node::{NodeId, NodeRef};

/// A pre-order, depth-first walk over a subtree: a node, then each child's
/// whole subtree in child order.
#[derive(Debug)]
pub struct PreorderIter<'a, S> {
    tree: &'a FragmentationTree<S>,
    stack: Vec<NodeId>,
}

impl<'a, S> PreorderIter<'a, S> {
    pub(crate) fn new(tree: &'a FragmentationTree<S>, start: NodeId) -> Self {
        Self {
            tree,
            stack: vec![start],
        }
    }
}

impl<'a, S> Iterator for PreorderIter<'a, S> {
    type Item = NodeRef<'a, S>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.index()];
        self.stack.extend(node.children.iter().rev().copied());
        Some(NodeRef::new(self.tree, id))
    }
}

impl<S> FusedIterator for PreorderIter<'_, S> {}

/// Visits the nodes exactly `depth` edges below a starting node, in the same
/// order [`PreorderIter`] would reach them. Subtrees below `depth` are never entered.
#[derive(Debug)]
pub struct PrecursorLevelIter<'a, S> {
    tree: &'a FragmentationTree<S>,
    stack: Vec<(NodeId, usize)>,
    depth: usize,
}

impl<'a, S> PrecursorLevelIter<'a, S> {
    pub(crate) fn new(tree: &'a FragmentationTree<S>, start: NodeId, depth: usize) -> Self {
        Self {
            tree,
            stack: vec![(start, 0)],
            depth,
        }
    }
}

impl<'a, S> Iterator for PrecursorLevelIter<'a, S> {
    type Item = NodeRef<'a, S>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((id, depth)) = self.stack.pop() {
            if depth == self.depth {
                return Some(NodeRef::new(self.tree, id));
            }
            let node = &self.tree.nodes[id.index()];
            self.stack
                .extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
        }
        None
    }
}

impl<S> FusedIterator for PrecursorLevelIter<'_, S> {}
