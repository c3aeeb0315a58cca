//! Matrix product states kept in mixed canonical form.
//!
//! An *N*-site state is factored into a chain of rank-3 tensors, one per site,
//! joined by "bond" legs. Each site tensor carries a "physical" leg for the
//! local degree of freedom and two bond legs; the bonds at either end of the
//! chain have dimension 1.
//!
//! ```text
//!        bond 0      bond 1            bond n-2
//!          |           |                   |
//!          V           V                   V
//! A[0] -------- A[1] -------- ... -------- A[n-1]
//!  |             |                          |
//!  | <- phys 0   | <- phys 1                | <- phys n-1
//! ```
//!
//! One site is the *orthogonality center*. Every site to its left is
//! left-orthonormal and every site to its right is right-orthonormal,
//!
//! ```text
//! Σ_s A[k]_s† A[k]_s = 1   (k < center)
//! Σ_s A[k]_s A[k]_s† = 1   (k > center)
//! ```
//!
//! so that the norm of the whole state is the norm of the center tensor and
//! any local quantity can be computed by touching only the sites between the
//! center and the region of interest. The center is tracked, moved with QR
//! decompositions when needed, and re-established by every mutating method
//! before it returns.
//!
//! Multi-site matrices (two-site gates, observables, full state vectors) are
//! indexed big-endian over the sites they act on: for sites `(a, b)` the basis
//! index is `s_a * d_b + s_b`.
//!
//! # Example
//!
//! ```
//! use mps_circuit::{
//!     config::TruncationPolicy,
//!     gate::{ CXMAT, HMAT },
//!     mps::MPS,
//! };
//!
//! let mut mps = MPS::new([2; 4], TruncationPolicy::lossless()).unwrap();
//! mps.apply_op1(0, &HMAT).unwrap();
//! let report = mps.apply_op2(0, &CXMAT).unwrap();
//! assert_eq!(report.rank(), 2);
//! assert_eq!(mps.bond_dims(), vec![2, 1, 1]);
//! assert!((mps.entropy_vn(0).unwrap() - std::f64::consts::LN_2).abs() < 1e-10);
//! ```

use std::fmt;
use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use thiserror::Error;
use tracing::{ debug, warn };
use crate::{
    config::{ ConfigError, NumericConfig, TruncationPolicy },
    tensor::{ Factors, Idx, Tensor, TensorError },
    truncate::{ self, BondReport, Truncation, TruncationReport },
};

/// Discarded masses above this are logged as warnings.
pub const DISCARD_WARN: f64 = 1e-8;

// tolerance for the debug-mode canonical form check
const CANONICAL_TOL: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum MPSError {
    /// Returned when attempting to create a new MPS for a state of less than 1
    /// particle.
    #[error("error in MPS creation: cannot create for an empty system")]
    EmptySystem,

    /// Returned when attempting to create a new MPS for a state with a
    /// zero-dimensional physical leg.
    #[error("error in MPS creation: unphysical zero-dimensional physical leg")]
    UnphysicalIndex,

    /// Returned when a basis state is out of range for its site.
    #[error("invalid quantum number {qnum} for site {site} of dimension {dim}")]
    InvalidQuantumNumber { site: usize, qnum: usize, dim: usize },

    /// Returned when attempting to create a new MPS from data with a length
    /// that doesn't match the physical dimensions.
    #[error("error in MPS creation: state length {0} doesn't match dimensions (expected {1})")]
    StateIncompatibleShape(usize, usize),

    /// Returned when a site index is out of bounds for the chain.
    #[error("invalid site {0}")]
    InvalidSite(usize),

    /// Returned when a multi-site operation is given sites that are not an
    /// ascending run of neighbors.
    #[error("sites {0:?} are not contiguous and ascending")]
    NonContiguousSites(Vec<usize>),

    /// Returned when an operator's shape or contents don't match the sites it
    /// acts on.
    #[error("operator incompatible with sites {sites:?}: {reason}")]
    DimensionMismatch { sites: Vec<usize>, reason: String },

    /// Returned when a measurement basis is given by a non-Hermitian
    /// observable.
    #[error("measurement observable on site {0} is not Hermitian")]
    NonHermitian(usize),

    /// Returned when an operation leaves the state with zero norm, e.g. a
    /// projection onto an outcome of zero probability.
    #[error("state norm vanished")]
    VanishingNorm,

    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
use MPSError::*;
pub type MPSResult<T> = Result<T, MPSError>;

/// Coarse classification of [`MPSError`]s.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operand shapes disagree.
    DimensionMismatch,
    /// Element counts or leg structures are malformed.
    ShapeError,
    /// A site index is out of bounds.
    InvalidSite,
    /// A decomposition failed or a norm vanished.
    NumericFailure,
    /// A configuration or policy was rejected.
    InvalidConfig,
}

impl MPSError {
    /// Return the [kind][ErrorKind] of `self`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmptySystem
            | UnphysicalIndex
            | StateIncompatibleShape(..) => ErrorKind::ShapeError,
            InvalidQuantumNumber { .. }
            | DimensionMismatch { .. }
            | NonHermitian(..) => ErrorKind::DimensionMismatch,
            InvalidSite(..)
            | NonContiguousSites(..) => ErrorKind::InvalidSite,
            VanishingNorm => ErrorKind::NumericFailure,
            MPSError::Tensor(err) => match err {
                TensorError::DimensionMismatch(..) => ErrorKind::DimensionMismatch,
                TensorError::NumericFailure(..) => ErrorKind::NumericFailure,
                _ => ErrorKind::ShapeError,
            },
            Config(..) => ErrorKind::InvalidConfig,
        }
    }
}

/// A leg of a site tensor.
///
/// Every leg carries its dimension. `Bond(k, _)` joins sites `k - 1` and `k`,
/// so that site `k` has legs `[Bond(k), Phys(k), Bond(k + 1)]` and the chain
/// ends are `Bond(0)` and `Bond(n)`, both of dimension 1. `Out(k, _)` is the
/// output leg of an operator acting on `Phys(k)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Leg {
    Bond(usize, usize),
    Phys(usize, usize),
    Out(usize, usize),
}

impl Idx for Leg {
    fn dim(&self) -> usize {
        match *self {
            Self::Bond(_, d) | Self::Phys(_, d) | Self::Out(_, d) => d,
        }
    }

    fn label(&self) -> String {
        match *self {
            Self::Bond(k, _) => format!("b{k}"),
            Self::Phys(k, _) => format!("p{k}"),
            Self::Out(k, _) => format!("p{k}'"),
        }
    }
}

impl Leg {
    /// Return `true` if `self` is `Bond`.
    pub fn is_bond(&self) -> bool { matches!(self, Self::Bond(..)) }

    /// Return `true` if `self` is `Phys`.
    pub fn is_phys(&self) -> bool { matches!(self, Self::Phys(..)) }

    // operator output legs become the new physical legs
    fn into_phys(self) -> Self {
        match self {
            Self::Out(k, d) => Self::Phys(k, d),
            leg => leg,
        }
    }
}

/// A matrix product state.
///
/// See the [module-level documentation][self] for the conventions used.
#[derive(Clone, Debug)]
pub struct MPS {
    n: usize,
    dims: Vec<usize>,
    data: Vec<Tensor<Leg, C64>>, // length n
    center: usize,
    policy: TruncationPolicy,
    config: NumericConfig,
}

fn is_identity(mat: &na::DMatrix<C64>, tol: f64) -> bool {
    let n = mat.nrows();
    mat.ncols() == n && (mat - na::DMatrix::<C64>::identity(n, n)).norm() < tol
}

pub(crate) fn is_unitary(op: &na::DMatrix<C64>, tol: f64) -> bool {
    is_identity(&(op.adjoint() * op), tol)
}

impl MPS {
    /// Initialize to `∣0...0⟩` with the given local dimensions.
    ///
    /// Fails if no dimensions are provided, any dimension is zero, or the
    /// policy is invalid.
    pub fn new<I>(dims: I, policy: TruncationPolicy) -> MPSResult<Self>
    where I: IntoIterator<Item = usize>
    {
        Self::new_qnums(dims.into_iter().map(|d| (d, 0)), policy)
    }

    /// Initialize to a product of basis states, given as `(dimension, quantum
    /// number)` pairs.
    ///
    /// Fails if no sites are provided, any dimension is zero, any quantum
    /// number is out of range, or the policy is invalid.
    pub fn new_qnums<I>(sites: I, policy: TruncationPolicy) -> MPSResult<Self>
    where I: IntoIterator<Item = (usize, usize)>
    {
        let sites: Vec<(usize, usize)> = sites.into_iter().collect();
        if sites.iter().any(|(d, _)| *d == 0) { return Err(UnphysicalIndex); }
        if let Some((site, (dim, qnum))) =
            sites.iter().copied().enumerate().find(|(_, (d, q))| q >= d)
        {
            return Err(InvalidQuantumNumber { site, qnum, dim });
        }
        Self::from_product(
            sites.into_iter()
                .map(|(d, q)| {
                    (0..d).map(move |j| {
                        if j == q { C64::from(1.0) } else { C64::from(0.0) }
                    })
                }),
            policy,
        )
    }

    /// Initialize to a product state with arbitrary amplitudes on each site.
    /// Each site's amplitudes are normalized.
    ///
    /// Fails if no sites are provided, any site has no amplitudes or only
    /// zeros, or the policy is invalid.
    pub fn from_product<I, J>(amps: I, policy: TruncationPolicy)
        -> MPSResult<Self>
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = C64>,
    {
        policy.validate()?;
        let config = NumericConfig::global();
        let data: Vec<Tensor<Leg, C64>> =
            amps.into_iter().enumerate()
            .map(|(k, site)| {
                let mut v = na::DVector::from_vec(site.into_iter().collect());
                let d = v.len();
                if d == 0 { return Err(UnphysicalIndex); }
                let norm = v.norm();
                if !norm.is_finite() || norm <= config.zero_tol {
                    return Err(VanishingNorm);
                }
                v.unscale_mut(norm);
                Tensor::from_elems(
                    [Leg::Bond(k, 1), Leg::Phys(k, d), Leg::Bond(k + 1, 1)],
                    v,
                )
                .map_err(MPSError::from)
            })
            .collect::<MPSResult<_>>()?;
        if data.is_empty() { return Err(EmptySystem); }
        let n = data.len();
        let dims: Vec<usize> = data.iter().map(|t| t.shape()[1]).collect();
        let mps = Self { n, dims, data, center: 0, policy, config };
        mps.debug_check();
        Ok(mps)
    }

    /// Initialize by factoring a dense state vector, indexed big-endian over
    /// the sites. The vector is normalized first.
    ///
    /// The state is split one site at a time from the left, truncating each
    /// new bond under `policy`; the center ends on the last site.
    ///
    /// Fails if no dimensions are provided, any dimension is zero, the length
    /// of `state` does not match, or `state` is zero.
    pub fn from_vector<I, J>(dims: I, state: J, policy: TruncationPolicy)
        -> MPSResult<Self>
    where
        I: IntoIterator<Item = usize>,
        J: IntoIterator<Item = C64>,
    {
        policy.validate()?;
        let config = NumericConfig::global();
        let dims: Vec<usize> = dims.into_iter().collect();
        if dims.is_empty() { return Err(EmptySystem); }
        if dims.iter().any(|d| *d == 0) { return Err(UnphysicalIndex); }
        let n = dims.len();
        let statelen: usize = dims.iter().product();
        let state: Vec<C64> = state.into_iter().collect();
        if state.len() != statelen {
            return Err(StateIncompatibleShape(state.len(), statelen));
        }
        let mut psi = na::DVector::from_vec(state);
        let norm = psi.norm();
        if !norm.is_finite() || norm <= config.zero_tol {
            return Err(VanishingNorm);
        }
        psi.unscale_mut(norm);

        // big-endian means the last site varies fastest
        let phys_rev: Vec<Leg> =
            (0..n).rev().map(|k| Leg::Phys(k, dims[k])).collect();
        let phys: Vec<Leg> =
            (0..n).map(|k| Leg::Phys(k, dims[k])).collect();
        let legs: Vec<Leg> =
            std::iter::once(Leg::Bond(0, 1))
            .chain(phys.iter().copied())
            .chain(std::iter::once(Leg::Bond(n, 1)))
            .collect();
        let mut rest: Tensor<Leg, C64> =
            Tensor::from_elems(phys_rev, psi)?
            .permute_to(&phys)?
            .reshape(legs)?;

        let mut data: Vec<Tensor<Leg, C64>> = Vec::with_capacity(n);
        let mut report = TruncationReport::new();
        for (k, dim) in dims.iter().copied().enumerate().take(n - 1) {
            let lbond = rest.indices()[0];
            let Factors { left, svals, mut right, report: mut bond } =
                rest.factorize(
                    &[lbond, Leg::Phys(k, dim)],
                    |r| Leg::Bond(k + 1, r),
                    &policy,
                    &config,
                )?;
            let weights: Vec<C64> = svals.iter().copied().map(C64::from).collect();
            right.scale_axis(0, &weights)?;
            bond.bond = k;
            report.record(bond);
            data.push(left);
            rest = right;
        }
        data.push(rest);
        debug!(
            sites = n,
            discarded_mass = report.total_discarded_mass(),
            "factored state vector",
        );
        if report.total_discarded_mass() > DISCARD_WARN {
            warn!(
                discarded_mass = report.total_discarded_mass(),
                "state vector factorization discarded weight",
            );
        }
        let mps = Self { n, dims, data, center: n - 1, policy, config };
        mps.debug_check();
        Ok(mps)
    }

    /// Contract the entire chain into a dense state vector, indexed big-endian
    /// over the sites.
    pub fn into_vector(self) -> MPSResult<na::DVector<C64>> {
        let n = self.n;
        let full = self.merge_range(0, n - 1)?;
        let order: Vec<Leg> =
            [Leg::Bond(0, 1), Leg::Bond(n, 1)].into_iter()
            .chain((0..n).rev().map(|k| Leg::Phys(k, self.dims[k])))
            .collect();
        let (_, data) = full.permute_to(&order)?.into_flat();
        Ok(data)
    }

    /// Return the number of sites.
    pub fn n(&self) -> usize { self.n }

    /// Return the local dimension of every site.
    pub fn dims(&self) -> &[usize] { &self.dims }

    /// Return the position of the orthogonality center.
    pub fn center(&self) -> usize { self.center }

    /// Return the stored truncation policy.
    pub fn policy(&self) -> &TruncationPolicy { &self.policy }

    /// Replace the stored truncation policy.
    pub fn set_policy(&mut self, policy: TruncationPolicy) -> MPSResult<()> {
        policy.validate()?;
        self.policy = policy;
        Ok(())
    }

    /// Return the numeric configuration copied at construction.
    pub fn config(&self) -> &NumericConfig { &self.config }

    /// Return a reference to the `k`-th site tensor.
    pub fn site(&self, k: usize) -> Option<&Tensor<Leg, C64>> { self.data.get(k) }

    /// Return the dimension of bond `b`, which joins sites `b` and `b + 1`.
    pub fn bond_dim(&self, b: usize) -> Option<usize> {
        (b < self.n - 1).then(|| self.site_shape(b).2)
    }

    /// Return the dimensions of all `n - 1` bonds.
    pub fn bond_dims(&self) -> Vec<usize> {
        (0..self.n - 1).map(|b| self.site_shape(b).2).collect()
    }

    /// Return the largest bond dimension, or 1 for a single site.
    pub fn max_bond_dim(&self) -> usize {
        self.bond_dims().into_iter().max().unwrap_or(1)
    }

    pub(crate) fn check_site(&self, k: usize) -> MPSResult<()> {
        if k < self.n { Ok(()) } else { Err(InvalidSite(k)) }
    }

    // (left bond, physical, right bond) dimensions; assumes `k` is in bounds
    pub(crate) fn site_shape(&self, k: usize) -> (usize, usize, usize) {
        let sh = self.data[k].shape();
        (sh[0], sh[1], sh[2])
    }

    // site `k` viewed as a (L d) × R matrix; rows s*L .. (s+1)*L are the
    // bond matrix for physical state s
    pub(crate) fn lmat(&self, k: usize) -> na::DMatrix<C64> {
        self.data[k].matricize(2)
    }

    // site `k` viewed as a L × (d R) matrix
    fn rmat(&self, k: usize) -> na::DMatrix<C64> {
        self.data[k].matricize(1)
    }

    /// Check the mixed canonical form to within `tol`: bond legs agree between
    /// neighbors, sites left of the center are left-orthonormal, sites right
    /// of it are right-orthonormal, and the center has unit norm.
    pub fn is_canonical(&self, tol: f64) -> bool {
        let bonds_ok =
            self.data.iter().tuple_windows()
            .all(|(a, b)| a.indices()[2] == b.indices()[0]);
        let left_ok =
            (0..self.center).all(|k| {
                let m = self.lmat(k);
                is_identity(&(m.adjoint() * &m), tol)
            });
        let right_ok =
            (self.center + 1..self.n).all(|k| {
                let m = self.rmat(k);
                is_identity(&(&m * m.adjoint()), tol)
            });
        let norm_ok = (self.data[self.center].norm_sqr() - 1.0).abs() < tol;
        bonds_ok && left_ok && right_ok && norm_ok
    }

    fn debug_check(&self) {
        debug_assert!(
            self.is_canonical(CANONICAL_TOL),
            "MPS left mixed canonical form",
        );
    }

    // move the center from `k` to `k + 1`
    fn shift_right(&mut self, k: usize) -> MPSResult<()> {
        let (l, d, _) = self.site_shape(k);
        let (_, d1, r1) = self.site_shape(k + 1);
        let qr = self.lmat(k).qr();
        let (q, r) = (qr.q(), qr.r());
        let rank = q.ncols();
        self.data[k] =
            Tensor::from_matrix(
                [Leg::Bond(k, l), Leg::Phys(k, d), Leg::Bond(k + 1, rank)], q)?;
        self.data[k + 1] =
            Tensor::from_matrix(
                [Leg::Bond(k + 1, rank), Leg::Phys(k + 1, d1), Leg::Bond(k + 2, r1)],
                r * self.rmat(k + 1),
            )?;
        self.center = k + 1;
        Ok(())
    }

    // move the center from `k` to `k - 1`
    fn shift_left(&mut self, k: usize) -> MPSResult<()> {
        let (_, d, r) = self.site_shape(k);
        let (l0, d0, _) = self.site_shape(k - 1);
        // A = R† Q† from the QR of A†
        let qr = self.rmat(k).adjoint().qr();
        let (q, rr) = (qr.q(), qr.r());
        let rank = q.ncols();
        self.data[k] =
            Tensor::from_matrix(
                [Leg::Bond(k, rank), Leg::Phys(k, d), Leg::Bond(k + 1, r)],
                q.adjoint(),
            )?;
        self.data[k - 1] =
            Tensor::from_matrix(
                [Leg::Bond(k - 1, l0), Leg::Phys(k - 1, d0), Leg::Bond(k, rank)],
                self.lmat(k - 1) * rr.adjoint(),
            )?;
        self.center = k - 1;
        Ok(())
    }

    /// Move the orthogonality center to site `target`.
    ///
    /// This costs one QR decomposition per site moved.
    pub fn move_center(&mut self, target: usize) -> MPSResult<()> {
        self.check_site(target)?;
        while self.center < target { self.shift_right(self.center)?; }
        while self.center > target { self.shift_left(self.center)?; }
        self.debug_check();
        Ok(())
    }

    fn check_operator(&self, sites: &[usize], op: &na::DMatrix<C64>)
        -> MPSResult<()>
    {
        let dim: usize = sites.iter().map(|k| self.dims[*k]).product();
        if op.shape() != (dim, dim) {
            return Err(DimensionMismatch {
                sites: sites.to_vec(),
                reason: format!(
                    "expected a {dim}×{dim} matrix, got {}×{}",
                    op.nrows(), op.ncols(),
                ),
            });
        }
        if op.iter().any(|x| !x.is_finite()) {
            return Err(DimensionMismatch {
                sites: sites.to_vec(),
                reason: "non-finite matrix elements".into(),
            });
        }
        Ok(())
    }

    fn renormalize_center(&mut self) -> MPSResult<f64> {
        let norm = self.data[self.center].norm_sqr().sqrt();
        if !norm.is_finite() || norm <= self.config.zero_tol {
            return Err(VanishingNorm);
        }
        self.data[self.center].scale(C64::from(norm.recip()));
        Ok(norm)
    }

    /// Apply a one-site operator to site `k`.
    ///
    /// Unitaries are contracted directly into the site and leave the center
    /// where it is. Any other operator moves the center to `k` first, after
    /// which the state is renormalized.
    ///
    /// Fails if `k` is out of bounds, the operator has the wrong shape, or the
    /// operator annihilates the state.
    pub fn apply_op1(&mut self, k: usize, op: &na::DMatrix<C64>)
        -> MPSResult<()>
    {
        self.check_site(k)?;
        self.check_operator(&[k], op)?;
        let unitary = is_unitary(op, self.config.norm_tol);
        if !unitary {
            warn!(site = k, "applying non-unitary one-site operator");
            self.move_center(k)?;
        }
        let d = self.dims[k];
        let legs: Vec<Leg> = self.data[k].indices().to_vec();
        let gate = Tensor::from_matrix([Leg::Out(k, d), Leg::Phys(k, d)], op.clone())?;
        let mut new =
            self.data[k].contract_axes(&gate, &[(1, 1)])?
            .map_indices(Leg::into_phys)?
            .permute_to(&legs)?;
        if !unitary {
            let norm = new.norm_sqr().sqrt();
            if !norm.is_finite() || norm <= self.config.zero_tol {
                return Err(VanishingNorm);
            }
            new.scale(C64::from(norm.recip()));
        }
        self.data[k] = new;
        self.debug_check();
        Ok(())
    }

    /// Apply a two-site operator to sites `k` and `k + 1` using the stored
    /// truncation policy.
    ///
    /// See [`apply_op2_with`][Self::apply_op2_with].
    pub fn apply_op2(&mut self, k: usize, op: &na::DMatrix<C64>)
        -> MPSResult<BondReport>
    {
        let policy = self.policy;
        self.apply_op2_with(k, op, &policy)
    }

    /// Apply a two-site operator to sites `k` and `k + 1`, truncating the
    /// shared bond under `policy`.
    ///
    /// The center is first moved onto the pair, the two sites are merged and
    /// contracted with the operator, and the result is split again by a
    /// truncated SVD. The singular values are absorbed into site `k + 1`,
    /// which becomes the new center. The returned report describes bond `k`.
    ///
    /// Fails if `k + 1` is out of bounds, the operator has the wrong shape,
    /// the policy is invalid, or the decomposition fails.
    pub fn apply_op2_with(
        &mut self,
        k: usize,
        op: &na::DMatrix<C64>,
        policy: &TruncationPolicy,
    ) -> MPSResult<BondReport>
    {
        policy.validate()?;
        self.check_site(k)?;
        self.check_site(k + 1)?;
        self.check_operator(&[k, k + 1], op)?;
        if !is_unitary(op, self.config.norm_tol) {
            warn!(bond = k, "applying non-unitary two-site operator");
        }
        if self.center < k {
            self.move_center(k)?;
        } else if self.center > k + 1 {
            self.move_center(k + 1)?;
        }
        let (d0, d1) = (self.dims[k], self.dims[k + 1]);
        let lbond = self.data[k].indices()[0];
        let rbond = self.data[k + 1].indices()[2];

        // theta: [Bond(k), Phys(k), Phys(k+1), Bond(k+2)]
        let theta = self.data[k].contract_axes(&self.data[k + 1], &[(2, 0)])?;
        let gate =
            Tensor::from_matrix(
                [
                    Leg::Out(k + 1, d1),
                    Leg::Out(k, d0),
                    Leg::Phys(k + 1, d1),
                    Leg::Phys(k, d0),
                ],
                op.clone(),
            )?;
        // -> [Bond(k), Bond(k+2), Phys(k+1), Phys(k)]
        let theta =
            theta.contract_axes(&gate, &[(1, 3), (2, 2)])?
            .map_indices(Leg::into_phys)?;
        let Factors { left, svals, right, mut report } =
            theta.factorize(
                &[lbond, Leg::Phys(k, d0)],
                |r| Leg::Bond(k + 1, r),
                policy,
                &self.config,
            )?;
        let mut right =
            right.permute_to(
                &[Leg::Bond(k + 1, svals.len()), Leg::Phys(k + 1, d1), rbond])?;
        let weights: Vec<C64> = svals.iter().copied().map(C64::from).collect();
        right.scale_axis(0, &weights)?;
        self.data[k] = left;
        self.data[k + 1] = right;
        self.center = k + 1;
        report.bond = k;
        debug!(
            bond = k,
            rank = report.rank(),
            discarded_mass = report.discarded_mass,
            "factorized bond",
        );
        if report.discarded_mass > DISCARD_WARN {
            warn!(
                bond = k,
                discarded_mass = report.discarded_mass,
                "truncation discarded weight",
            );
        }
        self.debug_check();
        Ok(report)
    }

    /// Re-truncate every bond under `policy` with a single left-to-right
    /// sweep, leaving the center on the last site.
    pub fn compress(&mut self, policy: &TruncationPolicy)
        -> MPSResult<TruncationReport>
    {
        policy.validate()?;
        self.move_center(0)?;
        let mut report = TruncationReport::new();
        for k in 0..self.n - 1 {
            let (l, d, _) = self.site_shape(k);
            let (_, d1, r1) = self.site_shape(k + 1);
            let Truncation { u, s, vt, report: mut bond } =
                truncate::factorize(self.lmat(k), policy, &self.config)?;
            let rank = s.len();
            let next = na::DMatrix::from_diagonal(&s.map(C64::from)) * vt * self.rmat(k + 1);
            self.data[k] =
                Tensor::from_matrix(
                    [Leg::Bond(k, l), Leg::Phys(k, d), Leg::Bond(k + 1, rank)], u)?;
            self.data[k + 1] =
                Tensor::from_matrix(
                    [Leg::Bond(k + 1, rank), Leg::Phys(k + 1, d1), Leg::Bond(k + 2, r1)],
                    next,
                )?;
            self.center = k + 1;
            bond.bond = k;
            report.record(bond);
        }
        debug!(
            discarded_mass = report.total_discarded_mass(),
            max_bond_dim = self.max_bond_dim(),
            "compressed state",
        );
        self.debug_check();
        Ok(report)
    }

    /// Return the Schmidt values across bond `b`, in descending order.
    ///
    /// The center is moved to site `b`.
    pub fn schmidt_values(&mut self, b: usize) -> MPSResult<Vec<f64>> {
        if b >= self.n - 1 { return Err(InvalidSite(b)); }
        self.move_center(b)?;
        let svd =
            self.lmat(b)
            .try_svd(false, false, self.config.svd_eps, self.config.svd_max_iter)
            .ok_or_else(|| {
                TensorError::NumericFailure("SVD did not converge".into())
            })?;
        let mut s: Vec<f64> = svd.singular_values.iter().copied().collect();
        s.sort_by(|a, b| b.total_cmp(a));
        let norm = s.iter().map(|x| x * x).sum::<f64>().sqrt();
        if !norm.is_finite() || norm <= self.config.zero_tol {
            return Err(VanishingNorm);
        }
        let zero = self.config.zero_tol;
        Ok(s.into_iter().map(|x| x / norm).filter(|x| *x > zero).collect())
    }

    /// Return the Von Neumann entropy across bond `b`, in nats.
    ///
    /// The center is moved to site `b`.
    pub fn entropy_vn(&mut self, b: usize) -> MPSResult<f64> {
        let s = self.schmidt_values(b)?;
        Ok(
            s.into_iter()
            .map(|x| x * x)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.ln())
            .sum()
        )
    }

    /// Return the probabilities of each basis state of site `k`.
    ///
    /// The center is moved to site `k`.
    pub fn probs(&mut self, k: usize) -> MPSResult<Vec<f64>> {
        self.move_center(k)?;
        let (l, d, _) = self.site_shape(k);
        let m = self.lmat(k);
        let probs: Vec<f64> =
            (0..d).map(|s| m.rows(s * l, l).norm_squared()).collect();
        let total: f64 = probs.iter().sum();
        if !total.is_finite() || total <= 0.0 { return Err(VanishingNorm); }
        Ok(probs.into_iter().map(|p| p / total).collect())
    }

    /// Project site `k` onto its basis state `p` and renormalize, returning
    /// the probability of the outcome.
    ///
    /// The center is moved to site `k`. Fails if `p` is out of range or has
    /// zero probability.
    pub fn project(&mut self, k: usize, p: usize) -> MPSResult<f64> {
        self.check_site(k)?;
        let dim = self.dims[k];
        if p >= dim {
            return Err(InvalidQuantumNumber { site: k, qnum: p, dim });
        }
        let prob = self.probs(k)?[p];
        if prob <= self.config.zero_tol { return Err(VanishingNorm); }
        let weights: Vec<C64> =
            (0..dim)
            .map(|j| C64::from(if j == p { prob.sqrt().recip() } else { 0.0 }))
            .collect();
        self.data[k].scale_axis(1, &weights)?;
        self.renormalize_center()?;
        self.debug_check();
        Ok(prob)
    }

    /// Return the overlap `⟨self∣other⟩`.
    ///
    /// Fails if the two states don't have the same local dimensions.
    pub fn overlap(&self, other: &Self) -> MPSResult<C64> {
        self.check_same_dims(other)?;
        Ok(transfer(self, other, None))
    }

    /// Return the matrix element `⟨self∣O_0 ⊗ ... ⊗ O_{n-1}∣other⟩`, where
    /// `ops[k]` acts on site `k`.
    ///
    /// Fails if the two states don't have the same local dimensions, or if
    /// `ops` doesn't hold exactly one `d_k × d_k` matrix per site.
    pub fn overlap_with(&self, other: &Self, ops: &[na::DMatrix<C64>])
        -> MPSResult<C64>
    {
        self.check_same_dims(other)?;
        if ops.len() != self.n {
            return Err(DimensionMismatch {
                sites: (0..self.n).collect(),
                reason: format!("expected {} operators, got {}", self.n, ops.len()),
            });
        }
        ops.iter().enumerate()
            .try_for_each(|(k, op)| self.check_operator(&[k], op))?;
        Ok(transfer(self, other, Some(ops)))
    }

    fn check_same_dims(&self, other: &Self) -> MPSResult<()> {
        if self.dims != other.dims {
            return Err(DimensionMismatch {
                sites: (0..self.n.max(other.n)).collect(),
                reason: "states have different local dimensions".into(),
            });
        }
        Ok(())
    }

    /// Return the norm of the state, computed by contracting the whole chain
    /// against its conjugate.
    pub fn norm(&self) -> f64 { transfer(self, self, None).re.max(0.0).sqrt() }

    // contract sites `a..=b` into one tensor with legs
    // [Bond(a), Phys(a), ..., Phys(b), Bond(b + 1)]
    pub(crate) fn merge_range(&self, a: usize, b: usize)
        -> MPSResult<Tensor<Leg, C64>>
    {
        self.check_site(b)?;
        if a > b { return Err(NonContiguousSites(vec![a, b])); }
        (a + 1..=b).try_fold(self.data[a].clone(), |acc, j| {
            let last = acc.rank() - 1;
            acc.contract_axes(&self.data[j], &[(last, 0)]).map_err(MPSError::from)
        })
    }

    // contraction of sites 0..a against their conjugates, as a
    // (bra bond) × (ket bond) matrix on Bond(a)
    pub(crate) fn left_env(&self, a: usize) -> na::DMatrix<C64> {
        let start = a.min(self.center);
        let l = self.site_shape(start).0;
        (start..a).fold(na::DMatrix::<C64>::identity(l, l), |env, k| {
            let (l, d, r) = self.site_shape(k);
            let m = self.lmat(k);
            (0..d).fold(na::DMatrix::<C64>::zeros(r, r), |acc, s| {
                let a_s = m.rows(s * l, l);
                acc + a_s.adjoint() * &env * a_s
            })
        })
    }

    // contraction of sites b+1..n against their conjugates, as a
    // (ket bond) × (bra bond) matrix on Bond(b + 1)
    pub(crate) fn right_env(&self, b: usize) -> na::DMatrix<C64> {
        let start = b.max(self.center);
        let r = self.site_shape(start).2;
        (b + 1..=start).rev().fold(na::DMatrix::<C64>::identity(r, r), |env, k| {
            let (l, d, _) = self.site_shape(k);
            let m = self.lmat(k);
            (0..d).fold(na::DMatrix::<C64>::zeros(l, l), |acc, s| {
                let a_s = m.rows(s * l, l);
                acc + a_s * &env * a_s.adjoint()
            })
        })
    }
}

// ⟨bra∣ket⟩ for states of equal dimensions, with `ops[k]` inserted at site `k`
// if given
fn transfer(bra: &MPS, ket: &MPS, ops: Option<&[na::DMatrix<C64>]>) -> C64 {
    let env =
        (0..bra.n).fold(na::DMatrix::from_element(1, 1, C64::from(1.0)), |env, k| {
            let (la, d, ra) = bra.site_shape(k);
            let (lb, _, rb) = ket.site_shape(k);
            let (mbra, mket) = (bra.lmat(k), ket.lmat(k));
            let left: Vec<na::DMatrix<C64>> =
                (0..d).map(|s| &env * mket.rows(s * lb, lb)).collect();
            (0..d).fold(na::DMatrix::<C64>::zeros(ra, rb), |acc, t| {
                let op_left = match ops {
                    Some(ops) => {
                        (0..d).fold(na::DMatrix::<C64>::zeros(la, rb), |m, s| {
                            m + &left[s] * ops[k][(t, s)]
                        })
                    },
                    None => left[t].clone(),
                };
                acc + mbra.rows(t * la, la).adjoint() * op_left
            })
        });
    env[(0, 0)]
}

impl fmt::Display for MPS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MPS {{ n: {}, center: {}, bonds: [", self.n, self.center)?;
        for (b, dim) in self.bond_dims().into_iter().enumerate() {
            if b > 0 { write!(f, ", ")?; }
            write!(f, "{dim}")?;
        }
        write!(f, "] }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::gate::{ CXMAT, HMAT, SWAPMAT, XMAT, ZMAT, make_xrot };

    fn lossless(n: usize) -> MPS {
        MPS::new(vec![2; n], TruncationPolicy::lossless()).unwrap()
    }

    fn assert_vec_close(a: &na::DVector<C64>, b: &na::DVector<C64>) {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter())
            .for_each(|(x, y)| { assert!((x - y).norm() < 1e-10, "{a} != {b}"); });
    }

    fn basis(n: usize, j: usize) -> na::DVector<C64> {
        let mut v = na::DVector::zeros(n);
        v[j] = C64::from(1.0);
        v
    }

    #[test]
    fn creation_errors() {
        let policy = TruncationPolicy::lossless();
        assert!(matches!(MPS::new(Vec::new(), policy), Err(EmptySystem)));
        assert!(matches!(MPS::new([2, 0], policy), Err(UnphysicalIndex)));
        assert!(matches!(
            MPS::new_qnums([(2, 0), (2, 2)], policy),
            Err(InvalidQuantumNumber { site: 1, qnum: 2, dim: 2 }),
        ));
        assert!(matches!(
            MPS::from_vector([2, 2], vec![C64::from(1.0); 3], policy),
            Err(StateIncompatibleShape(3, 4)),
        ));
        assert!(matches!(
            MPS::new([2], TruncationPolicy { max_bond_dim: 0, ..policy }),
            Err(Config(_)),
        ));
    }

    #[test]
    fn qnums_is_big_endian() {
        let mps =
            MPS::new_qnums([(2, 1), (3, 2), (2, 0)], TruncationPolicy::lossless())
            .unwrap();
        let psi = mps.into_vector().unwrap();
        // 1 * 6 + 2 * 2 + 0
        assert_vec_close(&psi, &basis(12, 10));
    }

    #[test]
    fn from_product_normalizes() {
        let mps =
            MPS::from_product(
                [vec![C64::from(3.0), C64::from(4.0)], vec![C64::from(0.0), C64::from(2.0)]],
                TruncationPolicy::lossless(),
            )
            .unwrap();
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-12);
        let psi = mps.into_vector().unwrap();
        let expected = na::DVector::from_vec(vec![
            C64::from(0.0), C64::from(0.6), C64::from(0.0), C64::from(0.8),
        ]);
        assert_vec_close(&psi, &expected);
    }

    #[test]
    fn vector_round_trip() {
        let state: Vec<C64> =
            (0..8).map(|j| C64::new(j as f64 + 1.0, (j as f64).sin())).collect();
        let norm = state.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
        let mps =
            MPS::from_vector([2, 2, 2], state.clone(), TruncationPolicy::lossless())
            .unwrap();
        assert_eq!(mps.center(), 2);
        assert!(mps.is_canonical(1e-10));
        let psi = mps.into_vector().unwrap();
        let expected = na::DVector::from_vec(state).unscale(norm);
        assert_vec_close(&psi, &expected);
    }

    #[test]
    fn move_center_keeps_state() {
        let state: Vec<C64> =
            (0..16).map(|j| C64::new((j as f64).cos(), (2.0 * j as f64).sin())).collect();
        let mut mps =
            MPS::from_vector([2; 4], state, TruncationPolicy::lossless()).unwrap();
        let before = mps.clone().into_vector().unwrap();
        for target in [0, 3, 1, 2] {
            mps.move_center(target).unwrap();
            assert_eq!(mps.center(), target);
            assert!(mps.is_canonical(1e-10));
            assert_vec_close(&mps.clone().into_vector().unwrap(), &before);
        }
        assert!(matches!(mps.move_center(4), Err(InvalidSite(4))));
    }

    #[test]
    fn bell_pair() {
        let mut mps = lossless(2);
        mps.apply_op1(0, &HMAT).unwrap();
        let report = mps.apply_op2(0, &CXMAT).unwrap();
        assert_eq!(report.bond, 0);
        assert_eq!(report.rank(), 2);
        assert_relative_eq!(report.discarded_mass, 0.0, epsilon = 1e-12);
        assert_eq!(mps.center(), 1);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let expected = na::DVector::from_vec(vec![
            C64::from(h), C64::from(0.0), C64::from(0.0), C64::from(h),
        ]);
        assert_vec_close(&mps.clone().into_vector().unwrap(), &expected);
        let s = mps.schmidt_values(0).unwrap();
        assert_eq!(s.len(), 2);
        assert_relative_eq!(s[0], h, epsilon = 1e-10);
        assert_relative_eq!(mps.entropy_vn(0).unwrap(), std::f64::consts::LN_2, epsilon = 1e-10);
    }

    #[test]
    fn bond_queries_out_of_range() {
        let mut mps = lossless(3);
        assert_eq!(mps.bond_dim(1), Some(1));
        assert_eq!(mps.bond_dim(2), None);
        assert_eq!(mps.bond_dim(usize::MAX), None);
        assert!(matches!(mps.schmidt_values(2), Err(InvalidSite(2))));
        assert!(matches!(mps.schmidt_values(usize::MAX), Err(InvalidSite(usize::MAX))));
        assert!(matches!(mps.entropy_vn(usize::MAX), Err(InvalidSite(_))));
        let mut single = lossless(1);
        assert_eq!(single.bond_dim(0), None);
        assert!(single.schmidt_values(0).is_err());
    }

    #[test]
    fn op2_on_far_pair_moves_center() {
        let mut mps = lossless(5);
        mps.apply_op1(4, &XMAT).unwrap();
        mps.apply_op2(3, &SWAPMAT).unwrap();
        mps.apply_op2(0, &SWAPMAT).unwrap();
        assert_eq!(mps.center(), 1);
        assert_eq!(mps.bond_dims(), vec![1, 1, 1, 1]);
        assert_vec_close(&mps.into_vector().unwrap(), &basis(32, 0b00010));
    }

    #[test]
    fn max_bond_dim_truncates() {
        let mut mps = lossless(2);
        mps.apply_op1(0, &make_xrot(1.0)).unwrap();
        let report =
            mps.apply_op2_with(0, &CXMAT, &TruncationPolicy::max_bond(1)).unwrap();
        assert_eq!(report.rank(), 1);
        assert!(report.discarded_mass > 0.0);
        assert_eq!(mps.bond_dim(0), Some(1));
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn absolute_cutoff_on_unnormalized_operator() {
        // 10·CX on cos(0.1)∣00⟩ - i sin(0.1)∣10⟩ gives singular values
        // ≈ 9.95 and ≈ 1.0
        let cx10 = CXMAT.scale(10.0);
        let mut mps = lossless(2);
        mps.apply_op1(0, &make_xrot(0.2)).unwrap();
        let absolute = TruncationPolicy::new(8, 0.5, false).unwrap();
        let report = mps.clone().apply_op2_with(0, &cx10, &absolute).unwrap();
        assert_eq!(report.rank(), 2);
        assert_relative_eq!(report.discarded_mass, 0.0, epsilon = 1e-12);
        let relative = TruncationPolicy::new(8, 0.5, true).unwrap();
        let report = mps.apply_op2_with(0, &cx10, &relative).unwrap();
        assert_eq!(report.rank(), 1);
        assert_relative_eq!(report.discarded_mass, 0.1_f64.sin().powi(2), epsilon = 1e-10);
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn non_unitary_two_site_operator_renormalizes() {
        let mut mps = lossless(3);
        mps.apply_op1(1, &HMAT).unwrap();
        mps.apply_op1(2, &HMAT).unwrap();
        // ∣11⟩⟨11∣ on qubits 1 and 2
        let proj11 = na::DMatrix::from_fn(4, 4, |i, j| {
            if i == 3 && j == 3 { C64::from(1.0) } else { C64::from(0.0) }
        });
        let report = mps.apply_op2(1, &proj11).unwrap();
        assert_eq!(report.rank(), 1);
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-12);
        assert_vec_close(&mps.clone().into_vector().unwrap(), &basis(8, 0b011));
        let proj00 = na::DMatrix::from_fn(4, 4, |i, j| {
            if i == 0 && j == 0 { C64::from(1.0) } else { C64::from(0.0) }
        });
        let err = mps.apply_op2(1, &proj00).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NumericFailure);
    }

    #[test]
    fn operator_validation() {
        let mut mps = lossless(3);
        assert!(matches!(mps.apply_op1(3, &HMAT), Err(InvalidSite(3))));
        assert!(matches!(
            mps.apply_op1(0, &CXMAT),
            Err(DimensionMismatch { .. }),
        ));
        assert!(matches!(mps.apply_op2(2, &CXMAT), Err(InvalidSite(3))));
        assert!(matches!(
            mps.apply_op2(0, &HMAT),
            Err(DimensionMismatch { .. }),
        ));
        let mut nan = HMAT.clone();
        nan[(0, 0)] = C64::new(f64::NAN, 0.0);
        let err = mps.apply_op1(0, &nan).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn non_unitary_renormalizes() {
        let mut mps = lossless(3);
        mps.apply_op1(2, &HMAT).unwrap();
        let proj1 = na::DMatrix::from_diagonal(
            &na::DVector::from_vec(vec![C64::from(0.0), C64::from(1.0)]));
        mps.apply_op1(2, &proj1).unwrap();
        assert_eq!(mps.center(), 2);
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-12);
        assert_vec_close(&mps.clone().into_vector().unwrap(), &basis(8, 1));
        let proj0 = na::DMatrix::from_diagonal(
            &na::DVector::from_vec(vec![C64::from(1.0), C64::from(0.0)]));
        assert!(matches!(mps.apply_op1(2, &proj0), Err(VanishingNorm)));
    }

    #[test]
    fn project_and_probs() {
        let mut mps = lossless(2);
        mps.apply_op1(0, &HMAT).unwrap();
        mps.apply_op2(0, &CXMAT).unwrap();
        let probs = mps.probs(1).unwrap();
        assert_relative_eq!(probs[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(probs[1], 0.5, epsilon = 1e-12);
        let p = mps.project(0, 1).unwrap();
        assert_relative_eq!(p, 0.5, epsilon = 1e-12);
        assert_vec_close(&mps.clone().into_vector().unwrap(), &basis(4, 3));
        assert!(matches!(mps.project(0, 0), Err(VanishingNorm)));
        assert!(matches!(mps.project(0, 2), Err(InvalidQuantumNumber { .. })));
    }

    #[test]
    fn overlap_of_orthogonal_states() {
        let a = lossless(3);
        let mut b = lossless(3);
        assert_relative_eq!(a.overlap(&b).unwrap().re, 1.0, epsilon = 1e-12);
        b.apply_op1(1, &XMAT).unwrap();
        assert_relative_eq!(a.overlap(&b).unwrap().norm(), 0.0, epsilon = 1e-12);
        let c = lossless(2);
        assert!(a.overlap(&c).is_err());
    }

    #[test]
    fn overlap_with_site_operators() {
        let eye = na::DMatrix::<C64>::identity(2, 2);
        let mut bell = lossless(2);
        bell.apply_op1(0, &HMAT).unwrap();
        bell.apply_op2(0, &CXMAT).unwrap();
        let zz = [ZMAT.clone(), ZMAT.clone()];
        assert_relative_eq!(bell.overlap_with(&bell, &zz).unwrap().re, 1.0, epsilon = 1e-10);
        let zi = [ZMAT.clone(), eye.clone()];
        assert_relative_eq!(bell.overlap_with(&bell, &zi).unwrap().norm(), 0.0, epsilon = 1e-10);
        let ii = [eye.clone(), eye.clone()];
        assert_relative_eq!(
            bell.overlap_with(&bell, &ii).unwrap().re,
            bell.overlap(&bell).unwrap().re,
            epsilon = 1e-12,
        );

        // ⟨10∣X ⊗ I∣00⟩
        let zero = lossless(2);
        let mut one_zero = lossless(2);
        one_zero.apply_op1(0, &XMAT).unwrap();
        let xi = [XMAT.clone(), eye.clone()];
        assert_relative_eq!(one_zero.overlap_with(&zero, &xi).unwrap().re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(one_zero.overlap(&zero).unwrap().norm(), 0.0, epsilon = 1e-12);

        assert!(matches!(
            zero.overlap_with(&zero, &[eye.clone()]),
            Err(DimensionMismatch { .. }),
        ));
        assert!(matches!(
            zero.overlap_with(&zero, &[eye, CXMAT.clone()]),
            Err(DimensionMismatch { .. }),
        ));
    }

    #[test]
    fn compress_truncates_every_bond() {
        let mut mps = lossless(4);
        for k in 0..4 { mps.apply_op1(k, &make_xrot(0.3 + k as f64)).unwrap(); }
        for k in 0..3 { mps.apply_op2(k, &CXMAT).unwrap(); }
        mps.apply_op2(1, &CXMAT).unwrap();
        let report = mps.compress(&TruncationPolicy::max_bond(1)).unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(mps.bond_dims(), vec![1, 1, 1]);
        assert_eq!(mps.center(), 3);
        assert_relative_eq!(mps.norm(), 1.0, epsilon = 1e-10);
        let exact = mps.compress(&TruncationPolicy::lossless()).unwrap();
        assert_relative_eq!(exact.total_discarded_mass(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn environments_are_identity_at_center() {
        let mut mps = lossless(4);
        mps.apply_op1(0, &HMAT).unwrap();
        for k in 0..3 { mps.apply_op2(k, &CXMAT).unwrap(); }
        mps.move_center(1).unwrap();
        let e = mps.left_env(1);
        let f = mps.right_env(1);
        assert!(is_identity(&e, 1e-10));
        assert!(is_identity(&f, 1e-10));
        // full transfer from the left end gives the norm
        let full = mps.left_env(3);
        let (_, d, _) = mps.site_shape(3);
        let m = mps.lmat(3);
        let l = full.nrows();
        let norm: C64 =
            (0..d).map(|s| {
                let a_s = m.rows(s * l, l);
                (a_s.adjoint() * &full * a_s)[(0, 0)]
            })
            .sum();
        assert_relative_eq!(norm.re, 1.0, epsilon = 1e-10);
    }
}
