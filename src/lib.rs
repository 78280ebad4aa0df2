//! `mzfragtree` organizes the MSn spectra of a mass spectrometry run into
//! precursor ion fragmentation trees.
//!
//! Every MSn scan is placed by its isolation chain below the MS2 precursor it
//! descends from. Consumers such as annotation or export then read the finished
//! [`FragmentationForest`] without further synchronization.
pub mod prelude;
pub mod spectrum;
pub mod tolerance;
pub mod tree;

pub use crate::spectrum::{IsolationChain, IsolationStep, MSnScan, ScanRecord};
pub use crate::tolerance::MZTolerance;
pub use crate::tree::{
    fragment_trees_for_groups, BuildReport, ForestBuilder, ForestBuilderConfig,
    FragmentationForest, FragmentationTree, NodeId, NodeRef, PlacementError,
};

#[cfg(feature = "parallelism")]
pub use crate::tree::build_forests_parallel;
