pub mod scan_properties;

pub use crate::spectrum::scan_properties::*;
