pub use crate::spectrum::MSnScan;
