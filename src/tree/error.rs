use thiserror::Error;

use super::node::NodeId;

/// The reasons a scan could not be placed into a fragmentation tree.
///
/// None of these abort a forest build. The offending scan is dropped and the
/// error is recorded in the [`BuildReport`](crate::tree::BuildReport).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// An MSn scan without any isolation steps
    #[error("Scan #{scan_number} at MS level {ms_level} has no isolation chain")]
    EmptyIsolationChain { scan_number: u32, ms_level: u8 },
    /// An isolation step whose MS level does not follow from its parent's
    #[error("Scan #{scan_number}: isolation step {step_index} targets MS level {found}, expected MS level {expected}")]
    LevelMismatch {
        scan_number: u32,
        step_index: usize,
        expected: u8,
        found: u8,
    },
    /// The last isolation step does not describe the scan's own fragmentation event
    #[error("Scan #{scan_number}: isolation chain ends at MS level {chain_level} but the scan is MS level {ms_level}")]
    ChainScanLevelMismatch {
        scan_number: u32,
        chain_level: u8,
        ms_level: u8,
    },
    #[error("Scan #{scan_number}: isolation step {step_index} is out of range for a chain of {chain_length} steps")]
    StepOutOfRange {
        scan_number: u32,
        step_index: usize,
        chain_length: usize,
    },
    #[error("Scan #{scan_number}: isolation step {step_index} has a non-finite m/z {mz}")]
    InvalidIsolationMz {
        scan_number: u32,
        step_index: usize,
        mz: f64,
    },
    #[error("Scan #{scan_number}: node {node} is not part of this tree of {tree_size} nodes")]
    UnknownNode {
        scan_number: u32,
        node: NodeId,
        tree_size: usize,
    },
    /// Raised only when root creation is disabled and no MS2 tree matches
    #[error("Scan #{scan_number}: cannot find an MS2 precursor for m/z {mz:.4}")]
    MissingRootPrecursor { scan_number: u32, mz: f64 },
}

impl PlacementError {
    pub fn scan_number(&self) -> u32 {
        match self {
            Self::EmptyIsolationChain { scan_number, .. }
            | Self::LevelMismatch { scan_number, .. }
            | Self::ChainScanLevelMismatch { scan_number, .. }
            | Self::StepOutOfRange { scan_number, .. }
            | Self::InvalidIsolationMz { scan_number, .. }
            | Self::UnknownNode { scan_number, .. }
            | Self::MissingRootPrecursor { scan_number, .. } => *scan_number,
        }
    }
}
