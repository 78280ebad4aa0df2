//! Precursor ion fragmentation trees.
//!
//! A [`FragmentationTree`] records which ions were isolated and fragmented, at each
//! MS level, starting from one MS2 precursor, and which spectra each fragmentation
//! produced. A [`ForestBuilder`] reconstructs these trees from a flat scan stream.
mod builder;
mod error;
mod forest;
mod fragmentation;
mod iter;
mod node;

#[cfg(feature = "parallelism")]
pub use builder::build_forests_parallel;
pub use builder::{fragment_trees_for_groups, BuildReport, ForestBuilder, ForestBuilderConfig};
pub use error::PlacementError;
pub use forest::FragmentationForest;
pub use fragmentation::FragmentationTree;
pub use iter::{PrecursorLevelIter, PreorderIter};
pub use node::{FragmentationNode, NodeId, NodeRef};
