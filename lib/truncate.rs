//! Truncated singular value decomposition and the bookkeeping of what it
//! throws away.
//!
//! Every time a bond is re-factored, its singular value spectrum is cut
//! according to a [`TruncationPolicy`]. The weight of the removed part,
//!
//! ```text
//! ε = Σ_{discarded} σ² / Σ_{all} σ²,
//! ```
//!
//! is recorded in a [`BondReport`], and reports from a whole run are collected
//! in a [`TruncationReport`]. Kept singular values are rescaled to unit norm so
//! that the state stays normalized.

use nalgebra as na;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use crate::{
    config::{ NumericConfig, TruncationPolicy },
    tensor::{ TensorError, TensorResult },
};

/// Record of a single bond truncation.
///
/// Singular values are stored divided by the norm of the full spectrum, so
/// that `Σ kept² + Σ discarded² = 1`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BondReport {
    /// Bond index, counted from the left: bond `k` joins sites `k` and `k + 1`.
    pub bond: usize,
    /// Kept singular values, descending.
    pub kept: Vec<f64>,
    /// Discarded singular values, descending.
    pub discarded: Vec<f64>,
    /// Σ discarded² / Σ all².
    pub discarded_mass: f64,
}

impl BondReport {
    /// Return the dimension of the bond after truncation.
    pub fn rank(&self) -> usize { self.kept.len() }

    /// Return `true` if nothing was discarded.
    pub fn is_exact(&self) -> bool { self.discarded.is_empty() }
}

/// Accumulated record of every truncation in a run.
///
/// The total only ever grows: it is the sum of the discarded masses of all
/// recorded bonds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TruncationReport {
    total_discarded_mass: f64,
    bonds: Vec<BondReport>,
}

impl TruncationReport {
    pub fn new() -> Self { Self::default() }

    /// Append a bond record.
    pub fn record(&mut self, bond: BondReport) {
        self.total_discarded_mass += bond.discarded_mass;
        self.bonds.push(bond);
    }

    /// Append every record of another report.
    pub fn extend(&mut self, other: TruncationReport) {
        other.bonds.into_iter().for_each(|b| self.record(b));
    }

    /// Return the sum of all discarded masses.
    pub fn total_discarded_mass(&self) -> f64 { self.total_discarded_mass }

    /// Return all records in the order they were made.
    pub fn bonds(&self) -> &[BondReport] { &self.bonds }

    /// Return the number of records.
    pub fn len(&self) -> usize { self.bonds.len() }

    /// Return `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool { self.bonds.is_empty() }

    /// Return the largest discarded mass of any single truncation.
    pub fn max_discarded_mass(&self) -> f64 {
        self.bonds.iter().map(|b| b.discarded_mass).fold(0.0, f64::max)
    }
}

/// Output of [`factorize`].
#[derive(Clone, Debug)]
pub struct Truncation {
    /// `m × r` left factor with orthonormal columns.
    pub u: na::DMatrix<C64>,
    /// `r` kept singular values, descending, with unit norm.
    pub s: na::DVector<f64>,
    /// `r × n` right factor with orthonormal rows.
    pub vt: na::DMatrix<C64>,
    /// Record of the truncation. `bond` is left at zero for the caller to
    /// fill in.
    pub report: BondReport,
}

/// Compute the truncated SVD `mat ≈ ‖mat‖ u · diag(s) · vt`.
///
/// Survivors are the singular values above both the policy threshold and the
/// numerical zero `config.zero_tol × ‖mat‖`. Of those, at most
/// `policy.max_bond_dim` are kept, and never fewer than one.
///
/// Fails if `mat` has non-finite entries or vanishing norm, or if the SVD does
/// not converge.
pub fn factorize(
    mat: na::DMatrix<C64>,
    policy: &TruncationPolicy,
    config: &NumericConfig,
) -> TensorResult<Truncation>
{
    if mat.iter().any(|x| !x.is_finite()) {
        return Err(TensorError::NumericFailure(
            "non-finite entries in matrix to factorize".into()));
    }
    let (m, n) = mat.shape();
    let svd =
        mat.try_svd(true, true, config.svd_eps, config.svd_max_iter)
        .ok_or_else(|| {
            TensorError::NumericFailure(
                format!("SVD of {m}×{n} matrix did not converge"))
        })?;
    let (Some(u), Some(vt)) = (svd.u, svd.v_t) else {
        return Err(TensorError::NumericFailure(
            "SVD did not produce singular vectors".into()));
    };
    let svals = svd.singular_values;

    let mut order: Vec<usize> = (0..svals.len()).collect();
    order.sort_by(|a, b| svals[*b].total_cmp(&svals[*a]));
    let total: f64 = svals.iter().map(|s| s * s).sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(TensorError::NumericFailure(
            "matrix to factorize has vanishing norm".into()));
    }
    let norm = total.sqrt();

    let threshold = policy.threshold(norm);
    let zero = config.zero_tol * norm;
    let survivors =
        order.iter()
        .take_while(|k| svals[**k] > threshold && svals[**k] > zero)
        .count();
    let rank = survivors.min(policy.max_bond_dim).max(1);

    let (keep, drop) = order.split_at(rank);
    let kept: Vec<f64> = keep.iter().map(|k| svals[*k] / norm).collect();
    let discarded: Vec<f64> = drop.iter().map(|k| svals[*k] / norm).collect();
    let kept_sqr: f64 = kept.iter().map(|s| s * s).sum();
    let discarded_mass: f64 =
        (discarded.iter().map(|s| s * s).sum::<f64>()).clamp(0.0, 1.0);

    let u = u.select_columns(keep);
    let vt = vt.select_rows(keep);
    let s = na::DVector::from_iterator(rank, kept.iter().map(|s| s / kept_sqr.sqrt()));
    let report = BondReport { bond: 0, kept, discarded, discarded_mass };
    Ok(Truncation { u, s, vt, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diag(vals: &[f64]) -> na::DMatrix<C64> {
        let n = vals.len();
        na::DMatrix::from_fn(n, n, |i, j| {
            if i == j { C64::from(vals[i]) } else { C64::from(0.0) }
        })
    }

    #[test]
    fn lossless_keeps_all_nonzero() {
        let mat = diag(&[0.0, 3.0, 4.0]);
        let tr =
            factorize(mat, &TruncationPolicy::lossless(), &NumericConfig::default())
            .unwrap();
        assert_eq!(tr.s.len(), 2);
        assert_relative_eq!(tr.s[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(tr.s[1], 0.6, epsilon = 1e-12);
        assert_relative_eq!(tr.report.discarded_mass, 0.0, epsilon = 1e-12);
        assert_eq!(tr.u.shape(), (3, 2));
        assert_eq!(tr.vt.shape(), (2, 3));
    }

    #[test]
    fn max_bond_dim_discards_smallest() {
        let mat = diag(&[3.0, 4.0]);
        let tr =
            factorize(mat, &TruncationPolicy::max_bond(1), &NumericConfig::default())
            .unwrap();
        assert_eq!(tr.s.len(), 1);
        assert_relative_eq!(tr.s[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(tr.report.kept[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(tr.report.discarded[0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(tr.report.discarded_mass, 0.36, epsilon = 1e-12);
    }

    #[test]
    fn cutoff_discards_small_values() {
        let mat = diag(&[1.0, 1e-3, 1e-6]);
        let tr =
            factorize(
                mat,
                &TruncationPolicy::relative_cutoff(1e-4),
                &NumericConfig::default(),
            )
            .unwrap();
        assert_eq!(tr.s.len(), 2);
        assert!(tr.report.discarded_mass > 0.0);
        assert!(tr.report.discarded_mass < 1e-11);
    }

    #[test]
    fn absolute_cutoff_is_not_scaled_by_norm() {
        // ‖σ‖ = √25.25 ≈ 5.02
        let config = NumericConfig::default();
        let absolute = TruncationPolicy::new(usize::MAX, 1.0, false).unwrap();
        let tr = factorize(diag(&[4.0, 3.0, 0.5]), &absolute, &config).unwrap();
        assert_eq!(tr.s.len(), 2);
        assert_relative_eq!(tr.report.discarded_mass, 0.25 / 25.25, epsilon = 1e-12);
        let relative = TruncationPolicy::relative_cutoff(1.0);
        let tr = factorize(diag(&[4.0, 3.0, 0.5]), &relative, &config).unwrap();
        assert_eq!(tr.s.len(), 1);
        assert_relative_eq!(tr.report.discarded_mass, 9.25 / 25.25, epsilon = 1e-12);
    }

    #[test]
    fn always_keeps_one() {
        let mat = diag(&[1.0, 1.0]);
        let tr =
            factorize(
                mat,
                &TruncationPolicy::relative_cutoff(10.0),
                &NumericConfig::default(),
            )
            .unwrap();
        assert_eq!(tr.s.len(), 1);
        assert_relative_eq!(tr.report.discarded_mass, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn bad_input_is_numeric_failure() {
        let zero = na::DMatrix::<C64>::zeros(2, 2);
        let res =
            factorize(zero, &TruncationPolicy::lossless(), &NumericConfig::default());
        assert!(matches!(res, Err(TensorError::NumericFailure(_))));
        let mut nan = diag(&[1.0, 1.0]);
        nan[(0, 1)] = C64::new(f64::NAN, 0.0);
        let res =
            factorize(nan, &TruncationPolicy::lossless(), &NumericConfig::default());
        assert!(matches!(res, Err(TensorError::NumericFailure(_))));
    }

    #[test]
    fn report_accumulates() {
        let mut report = TruncationReport::new();
        report.record(BondReport { bond: 0, discarded_mass: 0.1, ..Default::default() });
        report.record(BondReport { bond: 2, discarded_mass: 0.0, ..Default::default() });
        report.record(BondReport { bond: 1, discarded_mass: 0.25, ..Default::default() });
        assert_eq!(report.len(), 3);
        assert_relative_eq!(report.total_discarded_mass(), 0.35);
        assert_relative_eq!(report.max_discarded_mass(), 0.25);
        assert_eq!(report.bonds()[1].bond, 2);
    }
}
