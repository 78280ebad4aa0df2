use std::fmt::Display;

use mzpeaks::Tolerance;

/// A policy for deciding whether two precursor m/z values describe the same ion.
///
/// Matching is a direct, symmetric distance test:
/// `|a - b| <= max(width(a), width(b))`. Values are never binned or rounded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MZTolerance {
    /// An absolute window in Daltons (Thomson)
    Da(f64),
    /// A relative window in parts-per-million of the m/z being tested
    PPM(f64),
    /// The wider of an absolute and a relative window at each m/z
    Combined { da: f64, ppm: f64 },
}

impl Default for MZTolerance {
    fn default() -> Self {
        Self::Combined {
            da: 0.005,
            ppm: 15.0,
        }
    }
}

impl MZTolerance {
    pub fn new(da: f64, ppm: f64) -> Self {
        Self::Combined { da, ppm }
    }

    /// The half-width of the window centered on `mz`
    pub fn width(&self, mz: f64) -> f64 {
        match *self {
            Self::Da(da) => da.abs(),
            Self::PPM(ppm) => (mz * ppm.abs() / 1e6).abs(),
            Self::Combined { da, ppm } => da.abs().max((mz * ppm.abs() / 1e6).abs()),
        }
    }

    /// Test whether `a` and `b` fall within tolerance of each other.
    ///
    /// This relation is reflexive (including for `NaN`) and symmetric, but not transitive.
    /// A non-finite value only matches itself.
    pub fn matches(&self, a: f64, b: f64) -> bool {
        if a == b || (a.is_nan() && b.is_nan()) {
            return true;
        }
        if !(a.is_finite() && b.is_finite()) {
            return false;
        }
        (a - b).abs() <= self.width(a).max(self.width(b))
    }

    fn relative_part(&self) -> f64 {
        match *self {
            Self::Da(_) => 0.0,
            Self::PPM(ppm) | Self::Combined { ppm, .. } => ppm.abs() / 1e6,
        }
    }

    fn absolute_part(&self) -> f64 {
        match *self {
            Self::Da(da) | Self::Combined { da, .. } => da.abs(),
            Self::PPM(_) => 0.0,
        }
    }

    /// The closed interval containing every value that [`MZTolerance::matches`] `mz`.
    ///
    /// Values nearer to zero than `mz` have a window no wider than `mz`'s own, while
    /// values further from zero may reach back to `mz` with their own, wider, relative
    /// window. The interval is padded by a few ulps so rounding in
    /// [`MZTolerance::matches`] cannot escape it.
    pub fn bounds(&self, mz: f64) -> (f64, f64) {
        let magnitude = mz.abs();
        let slack = magnitude.max(1.0) * f64::EPSILON * 4.0;
        let rel = self.relative_part();
        let far_rel = if rel >= 1.0 {
            f64::INFINITY
        } else {
            magnitude / (1.0 - rel)
        };
        let near = magnitude - self.width(mz) - slack;
        let far = (magnitude + self.absolute_part()).max(far_rel) + slack;
        if mz.is_sign_negative() {
            (-far, -near)
        } else {
            (near, far)
        }
    }
}

impl From<Tolerance> for MZTolerance {
    fn from(value: Tolerance) -> Self {
        match value {
            Tolerance::PPM(ppm) => Self::PPM(ppm),
            Tolerance::Da(da) => Self::Da(da),
        }
    }
}

impl Display for MZTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Da(da) => write!(f, "{da}Da"),
            Self::PPM(ppm) => write!(f, "{ppm}PPM"),
            Self::Combined { da, ppm } => write!(f, "{da}Da or {ppm}PPM"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_absolute_window() {
        let tol = MZTolerance::Da(0.01);
        assert!(tol.matches(500.20, 500.205));
        assert!(tol.matches(500.205, 500.20));
        assert!(!tol.matches(500.20, 500.22));
    }

    #[test]
    fn test_relative_window() {
        let tol = MZTolerance::PPM(10.0);
        // 10 ppm of 1000 is 0.01
        assert!(tol.matches(1000.0, 1000.009));
        assert!(!tol.matches(1000.0, 1000.011));
    }

    #[test]
    fn test_combined_uses_wider() {
        let tol = MZTolerance::new(0.005, 15.0);
        assert!((tol.width(100.0) - 0.005).abs() < 1e-12);
        assert!((tol.width(1000.0) - 0.015).abs() < 1e-12);
        assert!(tol.matches(1000.0, 1000.014));
        assert!(tol.matches(100.0, 100.004));
        assert!(!tol.matches(100.0, 100.006));
    }

    #[test]
    fn test_bin_edge_neighbors_match() {
        // 0.01 wide bins would put these two on opposite sides of 500.205
        let tol = MZTolerance::Da(0.01);
        assert!(tol.matches(500.2049, 500.2051));
        assert!(tol.matches(500.2051, 500.2049));
    }

    #[test]
    fn test_nan_reflexive() {
        let tol = MZTolerance::default();
        assert!(tol.matches(f64::NAN, f64::NAN));
        assert!(!tol.matches(f64::NAN, 500.0));
    }

    #[test]
    fn test_infinity_only_matches_itself() {
        let tol = MZTolerance::PPM(10.0);
        assert!(!tol.matches(f64::INFINITY, 500.0));
        assert!(!tol.matches(500.0, f64::NEG_INFINITY));
        assert!(!tol.matches(f64::INFINITY, f64::NEG_INFINITY));
        assert!(!tol.matches(f64::NAN, f64::INFINITY));
        assert!(tol.matches(f64::INFINITY, f64::INFINITY));
    }

    #[test]
    fn test_bounds_negative_mz() {
        let tol = MZTolerance::PPM(10.0);
        assert!(tol.matches(-1000.0, -999.995));
        let (lo, hi) = tol.bounds(-999.995);
        assert!(lo <= -1000.0 && -1000.0 <= hi);
        let (lo, hi) = tol.bounds(-1000.0);
        assert!(lo <= -999.995 && -999.995 <= hi);

        let (lo, hi) = MZTolerance::Da(0.5).bounds(0.0);
        assert!(lo <= -0.5 && hi >= 0.5);
    }

    #[test]
    fn test_from_mzpeaks() {
        assert_eq!(MZTolerance::from(Tolerance::PPM(5.0)), MZTolerance::PPM(5.0));
        assert_eq!(MZTolerance::from(Tolerance::Da(0.02)), MZTolerance::Da(0.02));
    }

    fn any_tolerance() -> impl Strategy<Value = MZTolerance> {
        prop_oneof![
            (0.0f64..1.0).prop_map(MZTolerance::Da),
            (0.0f64..100.0).prop_map(MZTolerance::PPM),
            (0.0f64..1.0, 0.0f64..100.0).prop_map(|(da, ppm)| MZTolerance::new(da, ppm)),
        ]
    }

    proptest! {
        #[test]
        fn prop_reflexive(tol in any_tolerance(), x in 50.0f64..5000.0) {
            prop_assert!(tol.matches(x, x));
        }

        #[test]
        fn prop_symmetric(tol in any_tolerance(), a in 50.0f64..5000.0, delta in -0.5f64..0.5) {
            let b = a + delta;
            prop_assert_eq!(tol.matches(a, b), tol.matches(b, a));
        }

        #[test]
        fn prop_bounds_cover_matches(tol in any_tolerance(), a in -5000.0f64..5000.0, delta in -0.5f64..0.5) {
            let b = a + delta;
            let (lo, hi) = tol.bounds(a);
            if tol.matches(a, b) {
                prop_assert!(b >= lo && b <= hi);
            }
        }
    }
}
