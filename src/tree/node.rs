use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ptr;

use super::fragmentation::FragmentationTree;
use super::iter::{PrecursorLevelIter, PreorderIter};

/// The position of a node within its [`FragmentationTree`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Every tree's root is the first node allocated
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descending precursor m/z, with a total order over `NaN`
pub(crate) fn precursor_order(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/**
A precursor ion isolated at `precursor_mz` and the spectra recorded by fragmenting it.

`ms_level` is the MS level of the spectra in `fragment_scans`. Children are the ions
isolated from those spectra and fragmented again, one MS level deeper. The `parent`
link is a plain index into the owning tree and never keeps anything alive.
*/
#[derive(Debug, Clone)]
pub struct FragmentationNode<S> {
    pub(crate) ms_level: u8,
    pub(crate) precursor_mz: f64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) fragment_scans: Vec<S>,
}

impl<S> FragmentationNode<S> {
    pub(crate) fn new(ms_level: u8, precursor_mz: f64, parent: Option<NodeId>) -> Self {
        Self {
            ms_level,
            precursor_mz,
            parent,
            children: Vec::new(),
            fragment_scans: Vec::new(),
        }
    }

    pub fn ms_level(&self) -> u8 {
        self.ms_level
    }

    pub fn precursor_mz(&self) -> f64 {
        self.precursor_mz
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn fragment_scans(&self) -> &[S] {
        &self.fragment_scans
    }
}

/// A borrowed view of one node together with the tree that owns it, through
/// which the tree can be navigated up and down.
pub struct NodeRef<'a, S> {
    tree: &'a FragmentationTree<S>,
    id: NodeId,
}

impl<S> Clone for NodeRef<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for NodeRef<'_, S> {}

impl<S> PartialEq for NodeRef<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl<S> fmt::Debug for NodeRef<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("ms_level", &self.ms_level())
            .field("precursor_mz", &self.precursor_mz())
            .field("children", &self.count_precursors())
            .field("fragment_scans", &self.count_spectra())
            .finish()
    }
}

impl<S> Display for NodeRef<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.count_spectra();
        write!(
            f,
            "MS{} {:.4} ({} scan{})",
            self.ms_level(),
            self.precursor_mz(),
            n,
            if n == 1 { "" } else { "s" }
        )
    }
}

impl<'a, S> NodeRef<'a, S> {
    pub(crate) fn new(tree: &'a FragmentationTree<S>, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a FragmentationTree<S> {
        self.tree
    }

    pub fn node(&self) -> &'a FragmentationNode<S> {
        &self.tree.nodes[self.id.0]
    }

    pub fn ms_level(&self) -> u8 {
        self.node().ms_level
    }

    pub fn precursor_mz(&self) -> f64 {
        self.node().precursor_mz
    }

    pub fn parent(&self) -> Option<NodeRef<'a, S>> {
        self.node().parent.map(|p| NodeRef::new(self.tree, p))
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// The number of edges between this node and its root
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = *self;
        while let Some(parent) = current.parent() {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Follow the parent links up to the root, which may be this node
    pub fn get_root(&self) -> NodeRef<'a, S> {
        let mut current = *self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The direct children of this node, in their current order
    pub fn children(&self) -> impl ExactSizeIterator<Item = NodeRef<'a, S>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |id| NodeRef::new(tree, *id))
    }

    /// The scans recorded by fragmenting this node's precursor
    pub fn fragment_scans(&self) -> &'a [S] {
        &self.node().fragment_scans
    }

    /// Find the first child whose precursor m/z matches `mz` under the owning
    /// tree's tolerance
    pub fn get_child(&self, mz: f64) -> Option<NodeRef<'a, S>> {
        self.tree
            .find_child(self.id, mz)
            .map(|id| NodeRef::new(self.tree, id))
    }

    /// This node followed by every descendant, in pre-order
    pub fn stream_whole_tree(&self) -> PreorderIter<'a, S> {
        PreorderIter::new(self.tree, self.id)
    }

    /// The nodes `level_from_root` edges below this one. Level 0 is this node.
    pub fn stream_precursors(&self, level_from_root: usize) -> PrecursorLevelIter<'a, S> {
        PrecursorLevelIter::new(self.tree, self.id, level_from_root)
    }

    /// The fragment scans of every node `level_from_root` edges below this one
    pub fn get_fragment_scans(&self, level_from_root: usize) -> Vec<&'a S> {
        self.stream_precursors(level_from_root)
            .flat_map(|node| node.fragment_scans().iter())
            .collect()
    }

    /// Every fragment scan in this subtree, grouped level by level starting with
    /// this node's own scans. Within a level, scans follow node visit order.
    pub fn get_all_fragment_scans(&self) -> Vec<&'a S> {
        let mut scans: Vec<&'a S> = self.fragment_scans().iter().collect();
        let mut level = 1;
        loop {
            let mut any_nodes = false;
            for node in self.stream_precursors(level) {
                any_nodes = true;
                scans.extend(node.fragment_scans().iter());
            }
            if !any_nodes {
                break;
            }
            level += 1;
        }
        scans
    }

    /// The number of scans owned directly by this node
    pub fn count_spectra(&self) -> usize {
        self.node().fragment_scans.len()
    }

    /// The number of direct children of this node
    pub fn count_precursors(&self) -> usize {
        self.node().children.len()
    }

    pub fn max_ms_level(&self) -> u8 {
        self.stream_whole_tree()
            .map(|n| n.ms_level())
            .max()
            .unwrap_or_else(|| self.ms_level())
    }

    /// Order nodes by descending precursor m/z
    pub fn precursor_cmp(&self, other: &Self) -> Ordering {
        precursor_order(self.precursor_mz(), other.precursor_mz())
    }
}
