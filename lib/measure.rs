//! Expectation values and projective measurements on an [`MPS`].
//!
//! Non-destructive quantities are computed from the reduced density matrix of
//! a contiguous block of sites. The block is contracted with environments
//! built from the rest of the chain; because of the mixed canonical form, only
//! the sites between the block and the orthogonality center contribute
//! anything but an identity.
//!
//! ```text
//!         .-- θ[S] --.
//!         |          |
//! ρ[S, S'] =  E          F
//!         |          |
//!         '-- θ*[S'] '
//! ```
//!
//! Destructive measurements move the center to the measured site, sample from
//! its local distribution, and project.

use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::Rng;
use tracing::debug;
use crate::{
    mps::{ Leg, MPS, MPSError, MPSResult },
    tensor::Idx,
};

/// The outcome of a measurement.
#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementResult {
    /// A non-destructive expectation value `⟨ψ∣O∣ψ⟩` over some sites.
    Expectation {
        sites: Vec<usize>,
        value: C64,
    },
    /// A sampled projective measurement of a single site.
    ///
    /// `outcome` is the index of the basis state the site was projected onto:
    /// a computational basis state, or the `outcome`-th eigenvector (by
    /// ascending eigenvalue) when measuring an observable, in which case
    /// `eigenvalue` holds its eigenvalue.
    Sample {
        site: usize,
        outcome: usize,
        probability: f64,
        eigenvalue: Option<f64>,
    },
}

impl MeasurementResult {
    /// Return `true` if `self` is `Expectation`.
    pub fn is_expectation(&self) -> bool { matches!(self, Self::Expectation { .. }) }

    /// Return `true` if `self` is `Sample`.
    pub fn is_sample(&self) -> bool { matches!(self, Self::Sample { .. }) }

    /// Return the sampled outcome, if `self` is `Sample`.
    pub fn outcome(&self) -> Option<usize> {
        match self {
            Self::Sample { outcome, .. } => Some(*outcome),
            Self::Expectation { .. } => None,
        }
    }

    /// Return the expectation value, if `self` is `Expectation`.
    pub fn value(&self) -> Option<C64> {
        match self {
            Self::Expectation { value, .. } => Some(*value),
            Self::Sample { .. } => None,
        }
    }
}

// sites must be an ascending run of neighbors inside the chain
fn check_block(state: &MPS, sites: &[usize]) -> MPSResult<(usize, usize)> {
    if let Some(bad) = sites.iter().find(|k| **k >= state.n()) {
        return Err(MPSError::InvalidSite(*bad));
    }
    let (Some(a), Some(b)) = (sites.first(), sites.last()) else {
        return Err(MPSError::NonContiguousSites(Vec::new()));
    };
    if sites.iter().enumerate().any(|(j, k)| *k != a + j) {
        return Err(MPSError::NonContiguousSites(sites.to_vec()));
    }
    Ok((*a, *b))
}

/// Compute the reduced density matrix of a contiguous block of sites, indexed
/// big-endian over the block.
///
/// Fails with `InvalidSite` if any site is out of bounds, or
/// `NonContiguousSites` if the sites are not an ascending run of neighbors.
pub fn reduced_density(state: &MPS, sites: &[usize])
    -> MPSResult<na::DMatrix<C64>>
{
    let (a, b) = check_block(state, sites)?;
    let theta = state.merge_range(a, b)?;
    let lbond = theta.indices()[0];
    let rbond = theta.indices()[theta.rank() - 1];
    // [L, R, Phys(b), ..., Phys(a)]: each L × R block is one basis state
    let order: Vec<Leg> =
        [lbond, rbond].into_iter()
        .chain((a..=b).rev().map(|k| Leg::Phys(k, state.dims()[k])))
        .collect();
    let theta = theta.permute_to(&order)?;
    let (l, r) = (lbond.dim(), rbond.dim());
    let env_l = state.left_env(a);
    let env_r = state.right_env(b);
    let blocks: Vec<na::DMatrix<C64>> =
        theta.data().as_slice()
        .chunks_exact(l * r)
        .map(|chunk| na::DMatrix::from_column_slice(l, r, chunk))
        .collect();
    let sandwiched: Vec<na::DMatrix<C64>> =
        blocks.iter()
        .map(|th| &env_l * th * &env_r)
        .collect();
    let dim = blocks.len();
    Ok(na::DMatrix::from_fn(dim, dim, |i, j| blocks[j].dotc(&sandwiched[i])))
}

/// Compute `⟨ψ∣O∣ψ⟩` for an observable on a contiguous block of sites. The
/// state is not modified.
///
/// Fails with `InvalidSite` if any site is out of bounds, `NonContiguousSites`
/// if the sites are not an ascending run of neighbors, or `DimensionMismatch`
/// if the observable's shape doesn't match the block.
pub fn expectation_value(state: &MPS, observable: &na::DMatrix<C64>, sites: &[usize])
    -> MPSResult<C64>
{
    check_block(state, sites)?;
    let dim: usize = sites.iter().map(|k| state.dims()[*k]).product();
    if observable.shape() != (dim, dim) {
        return Err(MPSError::DimensionMismatch {
            sites: sites.to_vec(),
            reason: format!(
                "expected a {dim}×{dim} observable, got {}×{}",
                observable.nrows(), observable.ncols(),
            ),
        });
    }
    let rho = reduced_density(state, sites)?;
    Ok((rho * observable).trace())
}

/// Return the probabilities of each basis state of a single site without
/// modifying the state.
pub fn probabilities(state: &MPS, site: usize) -> MPSResult<Vec<f64>> {
    let rho = reduced_density(state, &[site])?;
    Ok(rho.diagonal().iter().map(|p| p.re.max(0.0)).collect())
}

// draw from a discrete distribution: the first index whose cumulative
// probability exceeds `r`, falling back to the last possible outcome if
// rounding leaves `r` above the total
fn draw(probs: &[f64], r: f64) -> Option<usize> {
    probs.iter()
        .scan(0.0, |cu, p| { *cu += p; Some(*cu) })
        .position(|cu| r < cu)
        .or_else(|| probs.iter().rposition(|p| *p > 0.0))
}

/// Perform a projective measurement of a single site in the computational
/// basis.
///
/// The center is moved to the site, an outcome is drawn from the local
/// distribution using one uniform sample from `rng`, and the site is projected
/// onto it and renormalized. The state stays in canonical form with the center
/// at the measured site.
///
/// Fails with `InvalidSite` if the site is out of bounds.
pub fn sample_outcome<R>(state: &mut MPS, site: usize, rng: &mut R)
    -> MPSResult<MeasurementResult>
where R: Rng + ?Sized
{
    let (outcome, probability) = sample_site(state, site, rng)?;
    Ok(MeasurementResult::Sample { site, outcome, probability, eigenvalue: None })
}

fn sample_site<R>(state: &mut MPS, site: usize, rng: &mut R)
    -> MPSResult<(usize, f64)>
where R: Rng + ?Sized
{
    let probs = state.probs(site)?;
    let r: f64 = rng.gen();
    let outcome = draw(&probs, r).ok_or(MPSError::VanishingNorm)?;
    let probability = state.project(site, outcome)?;
    debug!(site, outcome, probability, "sampled measurement");
    Ok((outcome, probability))
}

/// Perform a projective measurement of a single site in the eigenbasis of a
/// Hermitian observable.
///
/// Outcomes index eigenvectors in order of ascending eigenvalue. The site is
/// left in the measured eigenvector.
///
/// Fails with `InvalidSite` if the site is out of bounds, `DimensionMismatch`
/// if the observable has the wrong shape, or `NonHermitian` if it is not
/// Hermitian.
pub fn sample_outcome_in<R>(
    state: &mut MPS,
    site: usize,
    observable: &na::DMatrix<C64>,
    rng: &mut R,
) -> MPSResult<MeasurementResult>
where R: Rng + ?Sized
{
    check_block(state, &[site])?;
    let d = state.dims()[site];
    if observable.shape() != (d, d) {
        return Err(MPSError::DimensionMismatch {
            sites: vec![site],
            reason: format!(
                "expected a {d}×{d} observable, got {}×{}",
                observable.nrows(), observable.ncols(),
            ),
        });
    }
    let config = *state.config();
    if (observable - observable.adjoint()).norm() > config.norm_tol {
        return Err(MPSError::NonHermitian(site));
    }
    let eigen =
        na::SymmetricEigen::try_new(
            observable.clone(), config.svd_eps, config.svd_max_iter)
        .ok_or_else(|| {
            crate::tensor::TensorError::NumericFailure(
                "eigendecomposition did not converge".into())
        })?;
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|i, j| eigen.eigenvalues[*i].total_cmp(&eigen.eigenvalues[*j]));
    let basis = eigen.eigenvectors.select_columns(&order);

    // rotate into the eigenbasis, measure there, and rotate back
    state.apply_op1(site, &basis.adjoint())?;
    let (outcome, probability) = sample_site(state, site, rng)?;
    state.apply_op1(site, &basis)?;
    let eigenvalue = Some(eigen.eigenvalues[order[outcome]]);
    Ok(MeasurementResult::Sample { site, outcome, probability, eigenvalue })
}

/// Draw `shots` full bitstrings from the state without modifying it.
///
/// Each shot measures every site from left to right on a copy of the state.
pub fn sample_shots<R>(state: &MPS, shots: usize, rng: &mut R)
    -> MPSResult<Vec<Vec<usize>>>
where R: Rng + ?Sized
{
    let mut base = state.clone();
    base.move_center(0)?;
    (0..shots)
        .map(|_| {
            let mut copy = base.clone();
            (0..copy.n())
                .map(|k| sample_site(&mut copy, k, rng).map(|(outcome, _)| outcome))
                .collect::<MPSResult<Vec<usize>>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{ SeedableRng, rngs::{ StdRng, mock::StepRng } };
    use crate::{
        config::TruncationPolicy,
        gate::{ CXMAT, HMAT, XMAT, ZMAT, make_xrot },
    };

    fn ghz(n: usize) -> MPS {
        let mut mps = MPS::new(vec![2; n], TruncationPolicy::lossless()).unwrap();
        mps.apply_op1(0, &HMAT).unwrap();
        for k in 0..n - 1 { mps.apply_op2(k, &CXMAT).unwrap(); }
        mps
    }

    #[test]
    fn single_site_expectations() {
        let mut mps = MPS::new([2; 3], TruncationPolicy::lossless()).unwrap();
        mps.apply_op1(1, &XMAT).unwrap();
        let z0 = expectation_value(&mps, &ZMAT, &[0]).unwrap();
        let z1 = expectation_value(&mps, &ZMAT, &[1]).unwrap();
        assert_relative_eq!(z0.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(z1.re, -1.0, epsilon = 1e-12);
        mps.apply_op1(2, &make_xrot(std::f64::consts::FRAC_PI_2)).unwrap();
        let z2 = expectation_value(&mps, &ZMAT, &[2]).unwrap();
        assert_relative_eq!(z2.re, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn correlations_in_ghz_state() {
        let mps = ghz(4);
        let zz = ZMAT.kronecker(&*ZMAT);
        let xx = XMAT.kronecker(&*XMAT);
        // the center sits at the right end; measure away from it too
        for a in 0..3 {
            let v = expectation_value(&mps, &zz, &[a, a + 1]).unwrap();
            assert_relative_eq!(v.re, 1.0, epsilon = 1e-10);
            let v = expectation_value(&mps, &xx, &[a, a + 1]).unwrap();
            assert_relative_eq!(v.re, 0.0, epsilon = 1e-10);
            let v = expectation_value(&mps, &ZMAT, &[a]).unwrap();
            assert_relative_eq!(v.norm(), 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn reduced_density_is_a_density() {
        let mut mps = ghz(3);
        mps.move_center(1).unwrap();
        for sites in [vec![0], vec![1, 2], vec![0, 1, 2]] {
            let rho = reduced_density(&mps, &sites).unwrap();
            assert_relative_eq!(rho.trace().re, 1.0, epsilon = 1e-10);
            assert!((&rho - rho.adjoint()).norm() < 1e-10);
        }
        let full = reduced_density(&mps, &[0, 1, 2]).unwrap();
        assert_relative_eq!(full[(0, 0)].re, 0.5, epsilon = 1e-10);
        assert_relative_eq!(full[(7, 7)].re, 0.5, epsilon = 1e-10);
        assert_relative_eq!(full[(0, 7)].re, 0.5, epsilon = 1e-10);
    }

    #[test]
    fn block_validation() {
        let mps = ghz(3);
        assert!(matches!(
            expectation_value(&mps, &ZMAT, &[3]),
            Err(MPSError::InvalidSite(3)),
        ));
        assert!(matches!(
            expectation_value(&mps, &CXMAT, &[0, 2]),
            Err(MPSError::NonContiguousSites(_)),
        ));
        assert!(matches!(
            expectation_value(&mps, &CXMAT, &[1, 0]),
            Err(MPSError::NonContiguousSites(_)),
        ));
        assert!(matches!(
            expectation_value(&mps, &ZMAT, &[0, 1]),
            Err(MPSError::DimensionMismatch { .. }),
        ));
        assert!(matches!(
            expectation_value(&mps, &ZMAT, &[]),
            Err(MPSError::NonContiguousSites(_)),
        ));
    }

    #[test]
    fn draw_picks_first_outcome_at_zero() {
        assert_eq!(draw(&[0.5, 0.5], 0.0), Some(0));
        assert_eq!(draw(&[0.0, 1.0], 0.0), Some(1));
        assert_eq!(draw(&[0.25, 0.75], 0.3), Some(1));
        // rounding past the total
        assert_eq!(draw(&[0.5, 0.5 - 1e-17, 0.0], 1.0), Some(1));
        assert_eq!(draw(&[0.0, 0.0], 0.5), None);
    }

    #[test]
    fn measurement_collapses_partner() {
        let mut mps = ghz(3);
        let mut rng = StepRng::new(0, 0);
        let res = sample_outcome(&mut mps, 0, &mut rng).unwrap();
        assert_eq!(res.outcome(), Some(0));
        let MeasurementResult::Sample { probability, .. } = res else { panic!() };
        assert_relative_eq!(probability, 0.5, epsilon = 1e-12);
        assert_eq!(mps.center(), 0);
        for k in 1..3 {
            let p = probabilities(&mps, k).unwrap();
            assert_relative_eq!(p[0], 1.0, epsilon = 1e-10);
        }
        assert!(matches!(
            sample_outcome(&mut mps, 5, &mut rng),
            Err(MPSError::InvalidSite(5)),
        ));
    }

    #[test]
    fn measurement_in_x_basis() {
        let mut mps = MPS::new([2], TruncationPolicy::lossless()).unwrap();
        mps.apply_op1(0, &HMAT).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let res = sample_outcome_in(&mut mps, 0, &XMAT, &mut rng).unwrap();
        let MeasurementResult::Sample { outcome, probability, eigenvalue, .. } = res
        else { panic!() };
        // ∣+⟩ is the eigenvector of X with eigenvalue +1, the larger one
        assert_eq!(outcome, 1);
        assert_relative_eq!(probability, 1.0, epsilon = 1e-10);
        assert_relative_eq!(eigenvalue.unwrap(), 1.0, epsilon = 1e-10);
        let x = expectation_value(&mps, &XMAT, &[0]).unwrap();
        assert_relative_eq!(x.re, 1.0, epsilon = 1e-10);
        let not_hermitian = &*XMAT * C64::i() + &*ZMAT;
        assert!(matches!(
            sample_outcome_in(&mut mps, 0, &not_hermitian, &mut rng),
            Err(MPSError::NonHermitian(0)),
        ));
    }

    #[test]
    fn shots_are_correlated_and_nondestructive() {
        let mps = ghz(4);
        let before = mps.clone().into_vector().unwrap();
        let mut rng = StdRng::seed_from_u64(10546);
        let shots = sample_shots(&mps, 64, &mut rng).unwrap();
        assert_eq!(shots.len(), 64);
        assert!(shots.iter().all(|s| s == &vec![0; 4] || s == &vec![1; 4]));
        assert!(shots.iter().any(|s| s[0] == 0));
        assert!(shots.iter().any(|s| s[0] == 1));
        let after = mps.into_vector().unwrap();
        assert!((before - after).norm() < 1e-14);
    }
}
