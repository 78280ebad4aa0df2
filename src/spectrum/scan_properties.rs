use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

/// One isolation event in the history of an MSn scan.
///
/// `ms_level` is the MS level of the spectrum produced by fragmenting the ions
/// isolated at `isolation_mz`, so the MS2 isolation of a precursor taken from an
/// MS1 survey scan has `ms_level == 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsolationStep {
    pub ms_level: u8,
    pub isolation_mz: f64,
}

impl IsolationStep {
    pub fn new(ms_level: u8, isolation_mz: f64) -> Self {
        Self {
            ms_level,
            isolation_mz,
        }
    }
}

impl From<(u8, f64)> for IsolationStep {
    fn from((ms_level, isolation_mz): (u8, f64)) -> Self {
        Self::new(ms_level, isolation_mz)
    }
}

/// The ordered isolation history of a scan, outermost (MS2) step first.
pub type IsolationChain = Vec<IsolationStep>;

/**
The read-only view of an acquired scan that the fragmentation tree engine consumes.

Implementors are owned by the raw-data layer; the engine never mutates them.
*/
pub trait MSnScan {
    /// The scan number within its source file
    fn scan_number(&self) -> u32;
    /// The number of isolation/fragmentation steps before this scan was recorded
    fn ms_level(&self) -> u8;
    /// The retention time at which this scan was recorded
    fn start_time(&self) -> f64;
    /// The m/z of the precursor ion that was fragmented, for MS level >= 2
    fn precursor_mz(&self) -> Option<f64>;
    /// The precursor charge, if it is known
    fn precursor_charge(&self) -> Option<i32>;

    /// The activation energy used to fragment the precursor, if reported
    fn collision_energy(&self) -> Option<f32> {
        None
    }

    /// The isolation chain of this scan.
    ///
    /// The default derives a single-step chain for MS2 scans from their precursor
    /// m/z, which is all a plain DDA acquisition provides. Sources with nested
    /// MSn isolation metadata must override this.
    fn isolation_chain(&self) -> Cow<'_, [IsolationStep]> {
        derive_isolation_chain(self.ms_level(), self.precursor_mz())
    }
}

fn derive_isolation_chain<'a>(ms_level: u8, precursor_mz: Option<f64>) -> Cow<'a, [IsolationStep]> {
    match (ms_level, precursor_mz) {
        (2, Some(mz)) => Cow::Owned(vec![IsolationStep::new(2, mz)]),
        _ => Cow::Borrowed(&[]),
    }
}

macro_rules! impl_msn_scan_deref {
    ($($wrapper:ty),+) => {
        $(impl<T: MSnScan + ?Sized> MSnScan for $wrapper {
            fn scan_number(&self) -> u32 {
                (**self).scan_number()
            }

            fn ms_level(&self) -> u8 {
                (**self).ms_level()
            }

            fn start_time(&self) -> f64 {
                (**self).start_time()
            }

            fn precursor_mz(&self) -> Option<f64> {
                (**self).precursor_mz()
            }

            fn precursor_charge(&self) -> Option<i32> {
                (**self).precursor_charge()
            }

            fn collision_energy(&self) -> Option<f32> {
                (**self).collision_energy()
            }

            fn isolation_chain(&self) -> Cow<'_, [IsolationStep]> {
                (**self).isolation_chain()
            }
        })+
    };
}

impl_msn_scan_deref!(&T, Box<T>, Rc<T>, Arc<T>);

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// A minimal owned scan description carrying its own isolation chain.
pub struct ScanRecord {
    pub scan_number: u32,
    pub ms_level: u8,
    pub start_time: f64,
    pub precursor_mz: Option<f64>,
    /// The reported precursor charge. May be absent in some source files.
    pub precursor_charge: Option<i32>,
    pub collision_energy: Option<f32>,
    /// Explicit isolation steps. When empty, the chain is derived from
    /// `precursor_mz` for MS2 scans.
    pub isolation_chain: IsolationChain,
}

impl ScanRecord {
    pub fn new(scan_number: u32, ms_level: u8, start_time: f64) -> Self {
        Self {
            scan_number,
            ms_level,
            start_time,
            ..Default::default()
        }
    }

    /// Build an MSn scan whose precursor m/z is the innermost step of `chain`
    pub fn from_chain<I>(scan_number: u32, start_time: f64, chain: I) -> Self
    where
        I: IntoIterator<Item = (u8, f64)>,
    {
        let isolation_chain: IsolationChain = chain.into_iter().map(IsolationStep::from).collect();
        let ms_level = isolation_chain.last().map(|s| s.ms_level).unwrap_or(1);
        let precursor_mz = isolation_chain.last().map(|s| s.isolation_mz);
        Self {
            scan_number,
            ms_level,
            start_time,
            precursor_mz,
            isolation_chain,
            ..Default::default()
        }
    }

    pub fn with_precursor(mut self, mz: f64, charge: Option<i32>) -> Self {
        self.precursor_mz = Some(mz);
        self.precursor_charge = charge;
        self
    }

    pub fn with_isolation_chain(mut self, chain: IsolationChain) -> Self {
        self.isolation_chain = chain;
        self
    }

    pub fn with_collision_energy(mut self, energy: f32) -> Self {
        self.collision_energy = Some(energy);
        self
    }
}

impl MSnScan for ScanRecord {
    fn scan_number(&self) -> u32 {
        self.scan_number
    }

    fn ms_level(&self) -> u8 {
        self.ms_level
    }

    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn precursor_mz(&self) -> Option<f64> {
        self.precursor_mz
    }

    fn precursor_charge(&self) -> Option<i32> {
        self.precursor_charge
    }

    fn collision_energy(&self) -> Option<f32> {
        self.collision_energy
    }

    fn isolation_chain(&self) -> Cow<'_, [IsolationStep]> {
        if self.isolation_chain.is_empty() {
            derive_isolation_chain(self.ms_level, self.precursor_mz)
        } else {
            Cow::Borrowed(&self.isolation_chain)
        }
    }
}
