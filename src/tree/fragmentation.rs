use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::spectrum::{IsolationStep, MSnScan};
use crate::tolerance::MZTolerance;

use super::error::PlacementError;
use super::iter::PreorderIter;
use super::node::{precursor_order, FragmentationNode, NodeId, NodeRef};

/**
The fragmentation hierarchy of a single MS2 precursor ion.

All nodes live in one arena owned by the tree. The root is the MS2 precursor at
[`NodeId::ROOT`] and holds the MS2 scans; each child holds the spectra one MS level
deeper, recorded by isolating and fragmenting an ion from its parent's spectra.

Trees only grow: nodes are appended and never removed. After [`FragmentationTree::sort`]
the tree is meant to be shared read-only.
*/
#[derive(Debug, Clone)]
pub struct FragmentationTree<S> {
    pub(crate) nodes: Vec<FragmentationNode<S>>,
    tolerance: MZTolerance,
}

impl<S> FragmentationTree<S> {
    /// Create a tree holding only a root precursor
    pub fn new(ms_level: u8, precursor_mz: f64, tolerance: MZTolerance) -> Self {
        Self {
            nodes: vec![FragmentationNode::new(ms_level, precursor_mz, None)],
            tolerance,
        }
    }

    pub fn tolerance(&self) -> MZTolerance {
        self.tolerance
    }

    pub fn root(&self) -> NodeRef<'_, S> {
        NodeRef::new(self, NodeId::ROOT)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, S>> {
        if id.0 < self.nodes.len() {
            Some(NodeRef::new(self, id))
        } else {
            None
        }
    }

    pub fn precursor_mz(&self) -> f64 {
        self.nodes[NodeId::ROOT.0].precursor_mz
    }

    /// The total number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn find_child(&self, parent: NodeId, mz: f64) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|c| self.tolerance.matches(self.nodes[c.0].precursor_mz, mz))
    }

    fn push_child(&mut self, parent: NodeId, ms_level: u8, precursor_mz: f64) -> NodeId {
        let id = NodeId(self.nodes.len());
        log::trace!("Creating MS{ms_level} node {precursor_mz:.4} below node {parent}");
        self.nodes
            .push(FragmentationNode::new(ms_level, precursor_mz, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append `scan` to the fragment scans of `node`. Does not recurse.
    ///
    /// # Panics
    /// If `node` does not belong to this tree.
    pub fn add_fragment_scan(&mut self, node: NodeId, scan: S) {
        self.nodes[node.0].fragment_scans.push(scan);
    }

    /// Reorder every node's children by descending precursor m/z, recursively.
    ///
    /// The sort is stable, so children whose precursors compare equal keep their
    /// insertion order and sorting again changes nothing.
    pub fn sort(&mut self) {
        self.sort_subtree(NodeId::ROOT);
    }

    /// Sort the children of `id` and of all its descendants
    ///
    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn sort_subtree(&mut self, id: NodeId) {
        let mut children = std::mem::take(&mut self.nodes[id.0].children);
        children.sort_by(|a, b| {
            precursor_order(self.nodes[a.0].precursor_mz, self.nodes[b.0].precursor_mz)
        });
        for child in children.iter() {
            self.sort_subtree(*child);
        }
        self.nodes[id.0].children = children;
    }

    /// Every node in the tree, root first, in pre-order
    pub fn stream(&self) -> PreorderIter<'_, S> {
        self.root().stream_whole_tree()
    }

    pub fn max_ms_level(&self) -> u8 {
        self.root().max_ms_level()
    }

    /// The number of spectra recorded at `ms_level` across the whole tree
    pub fn count_spectra(&self, ms_level: u8) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.ms_level == ms_level)
            .map(|n| n.fragment_scans.len())
            .sum()
    }

    /// The number of distinct precursors that were isolated to produce spectra
    /// at `ms_level`, counted as the children of all nodes one level up
    pub fn count_precursors(&self, ms_level: u8) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.ms_level.checked_add(1) == Some(ms_level))
            .map(|n| n.children.len())
            .sum()
    }

    /// The number of spectra held anywhere in the tree
    pub fn total_spectra(&self) -> usize {
        self.nodes.iter().map(|n| n.fragment_scans.len()).sum()
    }

    /// The nodes of the tree keyed by MS level, each level in pre-order
    pub fn group_by_ms_level(&self) -> BTreeMap<u8, Vec<NodeRef<'_, S>>> {
        let mut groups: BTreeMap<u8, Vec<NodeRef<'_, S>>> = BTreeMap::new();
        for node in self.stream() {
            groups.entry(node.ms_level()).or_default().push(node);
        }
        groups
    }

    /// Order trees by descending root precursor m/z
    pub fn precursor_cmp(&self, other: &Self) -> Ordering {
        precursor_order(self.precursor_mz(), other.precursor_mz())
    }
}

/// Check that `chain[step_index..]` descends one MS level per step from a node at
/// `parent_level` and that every isolation m/z is finite.
pub(crate) fn check_isolation_steps(
    scan_number: u32,
    parent_level: u8,
    chain: &[IsolationStep],
    step_index: usize,
) -> Result<(), PlacementError> {
    if step_index >= chain.len() {
        return Err(PlacementError::StepOutOfRange {
            scan_number,
            step_index,
            chain_length: chain.len(),
        });
    }
    let mut expected = parent_level;
    for (i, step) in chain.iter().enumerate().skip(step_index) {
        expected = expected.saturating_add(1);
        if step.ms_level != expected {
            return Err(PlacementError::LevelMismatch {
                scan_number,
                step_index: i,
                expected,
                found: step.ms_level,
            });
        }
        if !step.isolation_mz.is_finite() {
            return Err(PlacementError::InvalidIsolationMz {
                scan_number,
                step_index: i,
                mz: step.isolation_mz,
            });
        }
    }
    Ok(())
}

impl<S: MSnScan> FragmentationTree<S> {
    /**
    Place `scan` below `node` by walking `chain` from `step_index`, creating any
    missing precursor nodes on the way.

    Each step must target exactly one MS level deeper than the node it is read
    at. The remaining steps are checked before anything is touched, so a rejected
    scan leaves the tree unchanged. The last step names the node that receives
    the scan.

    On success, returns the id of the node the scan was appended to.
    */
    pub fn add_child_fragment_scan(
        &mut self,
        node: NodeId,
        scan: S,
        chain: &[IsolationStep],
        step_index: usize,
    ) -> Result<NodeId, PlacementError> {
        let parent_level = match self.nodes.get(node.0) {
            Some(parent) => parent.ms_level,
            None => {
                return Err(PlacementError::UnknownNode {
                    scan_number: scan.scan_number(),
                    node,
                    tree_size: self.nodes.len(),
                })
            }
        };
        check_isolation_steps(
            scan.scan_number(),
            parent_level,
            chain,
            step_index,
        )?;
        Ok(self.place(node, scan, chain, step_index))
    }

    fn place(&mut self, node: NodeId, scan: S, chain: &[IsolationStep], step_index: usize) -> NodeId {
        let step = chain[step_index];
        let child = match self.find_child(node, step.isolation_mz) {
            Some(child) => child,
            None => self.push_child(node, step.ms_level, step.isolation_mz),
        };
        if step_index + 1 == chain.len() {
            self.add_fragment_scan(child, scan);
            child
        } else {
            self.place(child, scan, chain, step_index + 1)
        }
    }

    /// The distinct collision energies used across every scan in the tree, ascending
    pub fn collision_energies(&self) -> Vec<f32> {
        let mut energies: Vec<f32> = self
            .nodes
            .iter()
            .flat_map(|n| n.fragment_scans.iter())
            .filter_map(|s| s.collision_energy())
            .collect();
        energies.sort_by(|a, b| a.total_cmp(b));
        energies.dedup();
        energies
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::ScanRecord;

    fn ms2(scan_number: u32, mz: f64) -> ScanRecord {
        ScanRecord::from_chain(scan_number, scan_number as f64 * 0.1, [(2, mz)])
    }

    fn add(tree: &mut FragmentationTree<ScanRecord>, scan: ScanRecord) -> Result<NodeId, PlacementError> {
        let chain = scan.isolation_chain.clone();
        tree.add_child_fragment_scan(NodeId::ROOT, scan, &chain, 1)
    }

    fn check_levels(tree: &FragmentationTree<ScanRecord>) {
        for node in tree.stream() {
            for child in node.children() {
                assert_eq!(child.ms_level(), node.ms_level() + 1);
                assert_eq!(child.parent(), Some(node));
            }
            for scan in node.fragment_scans() {
                assert_eq!(scan.ms_level, node.ms_level());
            }
        }
    }

    fn example_tree() -> FragmentationTree<ScanRecord> {
        let mut tree = FragmentationTree::new(2, 500.2, MZTolerance::Da(0.01));
        tree.add_fragment_scan(NodeId::ROOT, ms2(1, 500.2));
        add(&mut tree, ScanRecord::from_chain(2, 0.2, [(2, 500.2), (3, 150.1)])).unwrap();
        add(&mut tree, ScanRecord::from_chain(3, 0.3, [(2, 500.2), (3, 320.4)])).unwrap();
        add(&mut tree, ScanRecord::from_chain(4, 0.4, [(2, 500.2), (3, 150.105)])).unwrap();
        add(&mut tree, ScanRecord::from_chain(5, 0.5, [(2, 500.2), (3, 150.1), (4, 90.05)])).unwrap();
        add(&mut tree, ScanRecord::from_chain(6, 0.6, [(2, 500.2), (3, 320.4), (4, 201.3)])).unwrap();
        tree
    }

    #[test_log::test]
    fn test_recursive_placement() {
        let tree = example_tree();
        check_levels(&tree);
        let root = tree.root();
        assert_eq!(root.count_spectra(), 1);
        assert_eq!(root.count_precursors(), 2);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.count_spectra(3), 3);
        assert_eq!(tree.count_spectra(4), 2);
        assert_eq!(tree.count_precursors(3), 2);
        assert_eq!(tree.count_precursors(4), 2);
        assert_eq!(tree.max_ms_level(), 4);
        assert_eq!(tree.total_spectra(), 6);

        let child = root.get_child(150.1).unwrap();
        assert_eq!(child.count_spectra(), 2);
        assert_eq!(child.get_root(), root);
        assert_eq!(child.depth(), 1);
        let grandchild = child.children().next().unwrap();
        assert_eq!(grandchild.ms_level(), 4);
        assert_eq!(grandchild.get_root(), root);
    }

    #[test]
    fn test_get_child_tolerance() {
        let mut tree = example_tree();
        let first = tree.root().get_child(150.1).unwrap().id();
        let inside = tree.root().get_child(150.108).unwrap().id();
        assert_eq!(first, inside);
        assert!(tree.root().get_child(150.2).is_none());

        let placed = add(&mut tree, ScanRecord::from_chain(7, 0.7, [(2, 500.2), (3, 150.2)])).unwrap();
        assert_ne!(placed, first);
        assert_eq!(tree.root().count_precursors(), 3);
    }

    #[test_log::test]
    fn test_level_mismatch_leaves_tree_untouched() {
        let mut tree = example_tree();
        let before = tree.len();
        let spectra = tree.total_spectra();
        let err = add(&mut tree, ScanRecord::from_chain(8, 0.8, [(2, 500.2), (3, 410.0), (5, 77.0)]))
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::LevelMismatch {
                scan_number: 8,
                step_index: 2,
                expected: 4,
                found: 5
            }
        );
        assert_eq!(tree.len(), before);
        assert_eq!(tree.total_spectra(), spectra);
        assert!(tree.root().get_child(410.0).is_none());

        let scan = ScanRecord::from_chain(9, 0.9, [(2, 500.2)]);
        let err = add(&mut tree, scan).unwrap_err();
        assert!(matches!(err, PlacementError::StepOutOfRange { step_index: 1, .. }));
        let err = add(&mut tree, ScanRecord::from_chain(10, 1.0, [(2, 500.2), (3, f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, PlacementError::InvalidIsolationMz { .. }));
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn test_foreign_node_is_rejected() {
        let mut tree = example_tree();
        let before = tree.len();
        let scan = ScanRecord::from_chain(14, 1.4, [(2, 500.2), (3, 150.1)]);
        let chain = scan.isolation_chain.clone();
        let err = tree
            .add_child_fragment_scan(NodeId(before + 3), scan, &chain, 1)
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::UnknownNode {
                scan_number: 14,
                node: NodeId(before + 3),
                tree_size: before
            }
        );
        assert_eq!(err.scan_number(), 14);
        assert_eq!(tree.len(), before);
        assert!(tree.get(NodeId(before + 3)).is_none());
    }

    #[test]
    fn test_sort_descending_and_idempotent() {
        let mut tree = example_tree();
        add(&mut tree, ScanRecord::from_chain(11, 1.1, [(2, 500.2), (3, 410.0)])).unwrap();
        let order: Vec<f64> = tree.root().children().map(|c| c.precursor_mz()).collect();
        assert_eq!(order, vec![150.1, 320.4, 410.0]);
        tree.sort();
        let once: Vec<NodeId> = tree.stream().map(|n| n.id()).collect();
        let order: Vec<f64> = tree.root().children().map(|c| c.precursor_mz()).collect();
        assert_eq!(order, vec![410.0, 320.4, 150.1]);
        tree.sort();
        let twice: Vec<NodeId> = tree.stream().map(|n| n.id()).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sort_reorders_grandchildren() {
        let mut tree = example_tree();
        add(&mut tree, ScanRecord::from_chain(12, 1.2, [(2, 500.2), (3, 150.1), (4, 95.5)])).unwrap();
        add(&mut tree, ScanRecord::from_chain(13, 1.3, [(2, 500.2), (3, 150.1), (4, 120.7)])).unwrap();
        let grandchildren = |tree: &FragmentationTree<ScanRecord>| -> Vec<f64> {
            tree.root()
                .get_child(150.1)
                .unwrap()
                .children()
                .map(|c| c.precursor_mz())
                .collect()
        };
        assert_eq!(grandchildren(&tree), vec![90.05, 95.5, 120.7]);
        tree.sort();
        assert_eq!(grandchildren(&tree), vec![120.7, 95.5, 90.05]);
        let once: Vec<NodeId> = tree.stream().map(|n| n.id()).collect();
        tree.sort();
        assert_eq!(grandchildren(&tree), vec![120.7, 95.5, 90.05]);
        let twice: Vec<NodeId> = tree.stream().map(|n| n.id()).collect();
        assert_eq!(once, twice);
        check_levels(&tree);
    }

    #[test]
    fn test_stream_restartable_preorder() {
        let tree = example_tree();
        let visit: Vec<(u8, f64)> = tree
            .stream()
            .map(|n| (n.ms_level(), n.precursor_mz()))
            .collect();
        assert_eq!(
            visit,
            vec![(2, 500.2), (3, 150.1), (4, 90.05), (3, 320.4), (4, 201.3)]
        );
        assert_eq!(tree.stream().count(), visit.len());
    }

    #[test]
    fn test_level_queries() {
        let tree = example_tree();
        let root = tree.root();
        assert_eq!(root.stream_precursors(0).collect::<Vec<_>>(), vec![root]);
        let level1: Vec<f64> = root.stream_precursors(1).map(|n| n.precursor_mz()).collect();
        assert_eq!(level1, vec![150.1, 320.4]);
        let level2: Vec<f64> = root.stream_precursors(2).map(|n| n.precursor_mz()).collect();
        assert_eq!(level2, vec![90.05, 201.3]);
        assert_eq!(root.stream_precursors(3).count(), 0);

        let level1_scans: Vec<u32> = root.get_fragment_scans(1).iter().map(|s| s.scan_number).collect();
        assert_eq!(level1_scans, vec![2, 4, 3]);

        let all: Vec<u32> = root.get_all_fragment_scans().iter().map(|s| s.scan_number).collect();
        assert_eq!(all, vec![1, 2, 4, 3, 5, 6]);
        let levels: Vec<u8> = root.get_all_fragment_scans().iter().map(|s| s.ms_level).collect();
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_all_fragment_scans_crosses_empty_levels() {
        let mut tree = FragmentationTree::new(2, 500.2, MZTolerance::Da(0.01));
        add(&mut tree, ScanRecord::from_chain(1, 0.1, [(2, 500.2), (3, 150.1), (4, 90.0)])).unwrap();
        let all: Vec<u32> = tree.root().get_all_fragment_scans().iter().map(|s| s.scan_number).collect();
        assert_eq!(all, vec![1]);
        assert_eq!(tree.count_spectra(3), 0);
        assert_eq!(tree.count_precursors(3), 1);
    }

    #[test]
    fn test_group_by_ms_level_and_display() {
        let tree = example_tree();
        let groups = tree.group_by_ms_level();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(groups[&3].len(), 2);
        assert_eq!(tree.root().to_string(), "MS2 500.2000 (1 scan)");
        assert_eq!(
            tree.root().get_child(150.1).unwrap().to_string(),
            "MS3 150.1000 (2 scans)"
        );
    }

    #[test]
    fn test_collision_energies() {
        let mut tree = FragmentationTree::new(2, 500.2, MZTolerance::Da(0.01));
        tree.add_fragment_scan(NodeId::ROOT, ms2(1, 500.2).with_collision_energy(35.0));
        tree.add_fragment_scan(NodeId::ROOT, ms2(2, 500.2).with_collision_energy(20.0));
        tree.add_fragment_scan(NodeId::ROOT, ms2(3, 500.2).with_collision_energy(35.0));
        tree.add_fragment_scan(NodeId::ROOT, ms2(4, 500.2));
        assert_eq!(tree.collision_energies(), vec![20.0, 35.0]);
    }
}
