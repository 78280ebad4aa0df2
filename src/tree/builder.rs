use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::spectrum::MSnScan;
use crate::tolerance::MZTolerance;

use super::error::PlacementError;
use super::forest::FragmentationForest;
use super::fragmentation::{check_isolation_steps, FragmentationTree};
use super::node::NodeId;

const DEFAULT_MAX_RECORDED_ERRORS: usize = 100;

/// Controls how a [`ForestBuilder`] groups scans into trees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ForestBuilderConfig {
    /// The tolerance used to decide whether two isolation m/z values are the same ion
    pub tolerance: MZTolerance,
    /// Whether an MSn scan (n > 2) may start a new tree when no MS2 precursor
    /// matches its first isolation step. When `false`, such scans are dropped.
    pub create_missing_roots: bool,
    /// Whether to order the finished forest by descending root precursor m/z
    pub sort_forest: bool,
    /// How many placement errors to keep in the [`BuildReport`]. All are counted.
    pub max_recorded_errors: usize,
}

impl Default for ForestBuilderConfig {
    fn default() -> Self {
        Self {
            tolerance: MZTolerance::default(),
            create_missing_roots: true,
            sort_forest: true,
            max_recorded_errors: DEFAULT_MAX_RECORDED_ERRORS,
        }
    }
}

impl ForestBuilderConfig {
    pub fn new(tolerance: MZTolerance) -> Self {
        Self {
            tolerance,
            ..Default::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: MZTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_create_missing_roots(mut self, create_missing_roots: bool) -> Self {
        self.create_missing_roots = create_missing_roots;
        self
    }

    pub fn with_sort_forest(mut self, sort_forest: bool) -> Self {
        self.sort_forest = sort_forest;
        self
    }

    pub fn with_max_recorded_errors(mut self, max_recorded_errors: usize) -> Self {
        self.max_recorded_errors = max_recorded_errors;
        self
    }
}

/// What happened to the scans fed to a [`ForestBuilder`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildReport {
    /// Every scan offered to the builder, including skipped and dropped ones
    pub scans_seen: usize,
    /// Scans that were attached to a tree
    pub placed: usize,
    /// Scans below MS level 2, which never enter a tree
    pub skipped: usize,
    /// MSn scans that could not be placed
    pub dropped: usize,
    /// The first few placement errors, in input order
    pub errors: Vec<PlacementError>,
    /// Whether the build stopped early on request
    pub cancelled: bool,
}

impl BuildReport {
    fn record_error(&mut self, error: PlacementError, max_recorded: usize) {
        self.dropped += 1;
        if self.errors.len() < max_recorded {
            self.errors.push(error);
        }
    }
}

impl Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scans seen, {} placed, {} skipped, {} dropped",
            self.scans_seen, self.placed, self.skipped, self.dropped
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

/**
Builds a [`FragmentationForest`] from one source's scans, in acquisition order.

Each MSn scan is matched to the tree of its MS2 precursor (the first step of its
isolation chain), creating the tree on first sight, and then walked down the chain
to the node of its own precursor. MS1 scans are counted and skipped. A scan that
cannot be placed is logged, counted, and dropped without affecting the others.

```
use mzfragtree::{ForestBuilder, ForestBuilderConfig, MZTolerance, ScanRecord};

let scans = vec![
    ScanRecord::new(1, 1, 0.1),
    ScanRecord::from_chain(2, 0.2, [(2, 500.2)]),
    ScanRecord::from_chain(3, 0.3, [(2, 500.2), (3, 150.1)]),
];
let config = ForestBuilderConfig::new(MZTolerance::Da(0.01));
let (forest, report) = ForestBuilder::build(scans, config);
assert_eq!(forest.len(), 1);
assert_eq!(forest[0].count_spectra(3), 1);
assert_eq!(report.skipped, 1);
```
*/
#[derive(Debug)]
pub struct ForestBuilder<S> {
    config: ForestBuilderConfig,
    trees: Vec<FragmentationTree<S>>,
    /// Root precursor m/z and tree index, ordered by m/z
    root_index: Vec<(f64, usize)>,
    report: BuildReport,
}

impl<S: MSnScan> Default for ForestBuilder<S> {
    fn default() -> Self {
        Self::new(ForestBuilderConfig::default())
    }
}

impl<S: MSnScan> ForestBuilder<S> {
    pub fn new(config: ForestBuilderConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            root_index: Vec::new(),
            report: BuildReport::default(),
        }
    }

    pub fn with_tolerance(tolerance: MZTolerance) -> Self {
        Self::new(ForestBuilderConfig::new(tolerance))
    }

    /// Consume `scans` and return the finished forest with its report
    pub fn build<I: IntoIterator<Item = S>>(
        scans: I,
        config: ForestBuilderConfig,
    ) -> (FragmentationForest<S>, BuildReport) {
        let mut this = Self::new(config);
        this.extend(scans);
        this.finish()
    }

    pub fn config(&self) -> &ForestBuilderConfig {
        &self.config
    }

    /// The number of scans consumed so far
    pub fn scans_seen(&self) -> usize {
        self.report.scans_seen
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// The trees built so far, unsorted
    pub fn trees(&self) -> &[FragmentationTree<S>] {
        &self.trees
    }

    /// Index of the earliest-created tree whose root matches `mz`
    fn find_root(&self, mz: f64) -> Option<usize> {
        let tolerance = self.config.tolerance;
        let (lower, upper) = tolerance.bounds(mz);
        let start = self.root_index.partition_point(|(root_mz, _)| *root_mz < lower);
        self.root_index[start..]
            .iter()
            .take_while(|(root_mz, _)| *root_mz <= upper)
            .filter(|(root_mz, _)| tolerance.matches(*root_mz, mz))
            .map(|(_, tree_index)| *tree_index)
            .min()
    }

    fn push_root(&mut self, mz: f64) -> usize {
        let tree_index = self.trees.len();
        log::trace!("Creating MS2 precursor tree {mz:.4}");
        self.trees
            .push(FragmentationTree::new(2, mz, self.config.tolerance));
        let at = self.root_index.partition_point(|(root_mz, _)| *root_mz < mz);
        self.root_index.insert(at, (mz, tree_index));
        tree_index
    }

    fn place_scan(&mut self, scan: S) -> Result<Option<(usize, NodeId)>, PlacementError> {
        let ms_level = scan.ms_level();
        if ms_level < 2 {
            self.report.skipped += 1;
            return Ok(None);
        }
        let scan_number = scan.scan_number();
        let chain = scan.isolation_chain().into_owned();
        if chain.is_empty() {
            return Err(PlacementError::EmptyIsolationChain {
                scan_number,
                ms_level,
            });
        }
        // The whole chain is checked before any tree is created or touched
        check_isolation_steps(scan_number, 1, &chain, 0)?;
        let chain_level = chain[chain.len() - 1].ms_level;
        if chain_level != ms_level {
            return Err(PlacementError::ChainScanLevelMismatch {
                scan_number,
                chain_level,
                ms_level,
            });
        }

        let root_mz = chain[0].isolation_mz;
        let tree_index = match self.find_root(root_mz) {
            Some(i) => i,
            None if ms_level == 2 || self.config.create_missing_roots => self.push_root(root_mz),
            None => {
                return Err(PlacementError::MissingRootPrecursor {
                    scan_number,
                    mz: root_mz,
                })
            }
        };

        let tree = &mut self.trees[tree_index];
        let node = if chain.len() == 1 {
            tree.add_fragment_scan(NodeId::ROOT, scan);
            NodeId::ROOT
        } else {
            tree.add_child_fragment_scan(NodeId::ROOT, scan, &chain, 1)?
        };
        Ok(Some((tree_index, node)))
    }

    /// Offer one scan to the builder. Returns `true` if it was attached to a tree.
    pub fn add_scan(&mut self, scan: S) -> bool {
        self.report.scans_seen += 1;
        match self.place_scan(scan) {
            Ok(Some(_)) => {
                self.report.placed += 1;
                true
            }
            Ok(None) => false,
            Err(err) => {
                log::warn!("{err}, it was not added to any fragmentation tree");
                self.report
                    .record_error(err, self.config.max_recorded_errors);
                false
            }
        }
    }

    /// Consume `scans` in order
    pub fn extend<I: IntoIterator<Item = S>>(&mut self, scans: I) {
        for scan in scans {
            self.add_scan(scan);
        }
    }

    /// Consume `scans` in order, checking `cancel` before each one.
    ///
    /// Returns `false` if the build was cancelled. The trees built up to that
    /// point remain valid and may still be finished.
    pub fn extend_cancellable<I: IntoIterator<Item = S>>(
        &mut self,
        scans: I,
        cancel: &AtomicBool,
    ) -> bool {
        for scan in scans {
            if cancel.load(Ordering::Relaxed) {
                log::debug!(
                    "Forest build cancelled after {} scans",
                    self.report.scans_seen
                );
                self.report.cancelled = true;
                return false;
            }
            self.add_scan(scan);
        }
        true
    }

    /// Sort every tree and publish the forest.
    ///
    /// The forest is only ever read after this point.
    pub fn finish(self) -> (FragmentationForest<S>, BuildReport) {
        let Self {
            config,
            trees,
            report,
            ..
        } = self;
        let mut forest = FragmentationForest::new(trees);
        if config.sort_forest {
            forest.sort();
        } else {
            forest.sort_trees();
        }
        log::debug!("Built {} fragmentation trees: {report}", forest.len());
        (forest, report)
    }
}

/// Build trees separately for each group of scans, such as all the fragment
/// scans of each feature, then merge them into a single forest ordered by
/// descending root precursor m/z.
///
/// Trees from different groups are never merged, even if their precursors match.
pub fn fragment_trees_for_groups<S, G, I>(
    groups: G,
    config: ForestBuilderConfig,
) -> FragmentationForest<S>
where
    S: MSnScan,
    G: IntoIterator<Item = I>,
    I: IntoIterator<Item = S>,
{
    let mut forest: FragmentationForest<S> = groups
        .into_iter()
        .flat_map(|group| ForestBuilder::build(group, config).0)
        .collect();
    forest.sort();
    forest
}

/// Build one forest per scan source on the rayon thread pool.
///
/// Each source is processed independently, so no state is shared between them.
#[cfg(feature = "parallelism")]
pub fn build_forests_parallel<S, I>(
    sources: Vec<I>,
    config: ForestBuilderConfig,
) -> Vec<(FragmentationForest<S>, BuildReport)>
where
    S: MSnScan + Send,
    I: IntoIterator<Item = S> + Send,
{
    use rayon::prelude::*;

    sources
        .into_par_iter()
        .map(|scans| ForestBuilder::build(scans, config))
        .collect()
}
