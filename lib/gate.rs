//! Definitions of common one- and two-qubit gates, and the validated operator
//! type accepted by [`CircuitRunner`][crate::circuit::CircuitRunner].
//!
//! All matrices here act on qubits. Two-qubit matrices are indexed big-endian,
//! `∣s_a s_b⟩ → 2 s_a + s_b`, where `a` is the first listed qubit.

use std::f64::consts::FRAC_1_SQRT_2;
use nalgebra as na;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;
use rand::{ Rng, distributions::Distribution };
use statrs::distribution::Normal;
use crate::mps::{ MPSError, MPSResult };

/// A gate in a quantum circuit.
///
/// Two-qubit gates may act on any pair of distinct qubits; the first qubit is
/// the control where that applies.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Gate {
    /// Identity.
    I(usize),
    /// Hadamard.
    H(usize),
    /// π rotation about X.
    X(usize),
    /// π rotation about Y.
    Y(usize),
    /// π rotation about Z.
    Z(usize),
    /// π/2 rotation about Z.
    S(usize),
    /// –π/2 rotation about Z.
    SInv(usize),
    /// π/4 rotation about Z.
    T(usize),
    /// –π/4 rotation about Z.
    TInv(usize),
    /// An arbitrary rotation about X.
    XRot(usize, f64),
    /// An arbitrary rotation about Y.
    YRot(usize, f64),
    /// An arbitrary rotation about Z.
    ZRot(usize, f64),
    /// A gate formed from an Euler angle decomposition.
    U(usize, f64, f64, f64),
    /// Projector onto `∣0⟩`. Not unitary.
    Proj0(usize),
    /// Projector onto `∣1⟩`. Not unitary.
    Proj1(usize),
    /// Z-controlled π rotation about X, `CX(control, target)`.
    CX(usize, usize),
    /// Z-controlled π rotation about Y, `CY(control, target)`.
    CY(usize, usize),
    /// Z-controlled π rotation about Z.
    CZ(usize, usize),
    /// Exchange of two qubits.
    Swap(usize, usize),
}

impl Gate {
    /// Return the qubits `self` acts on, in matrix order.
    pub fn sites(&self) -> Vec<usize> {
        match *self {
            Self::I(k)
            | Self::H(k)
            | Self::X(k)
            | Self::Y(k)
            | Self::Z(k)
            | Self::S(k)
            | Self::SInv(k)
            | Self::T(k)
            | Self::TInv(k)
            | Self::XRot(k, _)
            | Self::YRot(k, _)
            | Self::ZRot(k, _)
            | Self::U(k, ..)
            | Self::Proj0(k)
            | Self::Proj1(k) => vec![k],
            Self::CX(a, b)
            | Self::CY(a, b)
            | Self::CZ(a, b)
            | Self::Swap(a, b) => vec![a, b],
        }
    }

    /// Return the matrix of `self`.
    pub fn matrix(&self) -> na::DMatrix<C64> {
        match *self {
            Self::I(_) => Lazy::force(&IMAT).clone(),
            Self::H(_) => Lazy::force(&HMAT).clone(),
            Self::X(_) => Lazy::force(&XMAT).clone(),
            Self::Y(_) => Lazy::force(&YMAT).clone(),
            Self::Z(_) => Lazy::force(&ZMAT).clone(),
            Self::S(_) => Lazy::force(&SMAT).clone(),
            Self::SInv(_) => Lazy::force(&SINVMAT).clone(),
            Self::T(_) => Lazy::force(&TMAT).clone(),
            Self::TInv(_) => Lazy::force(&TINVMAT).clone(),
            Self::XRot(_, ang) => make_xrot(ang),
            Self::YRot(_, ang) => make_yrot(ang),
            Self::ZRot(_, ang) => make_zrot(ang),
            Self::U(_, alpha, beta, gamma) => make_u(alpha, beta, gamma),
            Self::Proj0(_) => Lazy::force(&PROJ0MAT).clone(),
            Self::Proj1(_) => Lazy::force(&PROJ1MAT).clone(),
            Self::CX(..) => Lazy::force(&CXMAT).clone(),
            Self::CY(..) => Lazy::force(&CYMAT).clone(),
            Self::CZ(..) => Lazy::force(&CZMAT).clone(),
            Self::Swap(..) => Lazy::force(&SWAPMAT).clone(),
        }
    }

    /// Return the inverse of `self`.
    ///
    /// Projectors are idempotent and are returned unchanged.
    pub fn inverse(&self) -> Self {
        match *self {
            Self::S(k) => Self::SInv(k),
            Self::SInv(k) => Self::S(k),
            Self::T(k) => Self::TInv(k),
            Self::TInv(k) => Self::T(k),
            Self::XRot(k, ang) => Self::XRot(k, -ang),
            Self::YRot(k, ang) => Self::YRot(k, -ang),
            Self::ZRot(k, ang) => Self::ZRot(k, -ang),
            Self::U(k, alpha, beta, gamma) => Self::U(k, -gamma, -beta, -alpha),
            g => g,
        }
    }
}

/// A dense operator together with the sites it acts on.
///
/// This is the boundary type for operators supplied from outside: the matrix
/// must be square, finite, and act on one or two distinct sites. Whether its
/// dimension matches the sites is checked against the state when it is
/// applied.
#[derive(Clone, Debug, PartialEq)]
pub struct GateOperation {
    sites: Vec<usize>,
    matrix: na::DMatrix<C64>,
}

impl GateOperation {
    /// Create a new operation.
    ///
    /// Fails with `DimensionMismatch` if the matrix is not square or has
    /// non-finite elements, or if the sites are not one or two distinct
    /// indices.
    pub fn new<I>(sites: I, matrix: na::DMatrix<C64>) -> MPSResult<Self>
    where I: IntoIterator<Item = usize>
    {
        let sites: Vec<usize> = sites.into_iter().collect();
        let reject = |reason: &str| {
            Err(MPSError::DimensionMismatch {
                sites: sites.clone(),
                reason: reason.to_string(),
            })
        };
        if sites.is_empty() || sites.len() > 2 {
            return reject("operators act on one or two sites");
        }
        if sites.len() == 2 && sites[0] == sites[1] {
            return reject("two-site operators need distinct sites");
        }
        if !matrix.is_square() {
            return reject("operator matrix is not square");
        }
        if matrix.iter().any(|x| !x.is_finite()) {
            return reject("non-finite matrix elements");
        }
        Ok(Self { sites, matrix })
    }

    /// Return the sites acted on, in matrix order.
    pub fn sites(&self) -> &[usize] { &self.sites }

    /// Return the operator matrix.
    pub fn matrix(&self) -> &na::DMatrix<C64> { &self.matrix }

    /// Return `true` if `self` acts on a single site.
    pub fn is_q1(&self) -> bool { self.sites.len() == 1 }

    /// Return `true` if `self` acts on two sites.
    pub fn is_q2(&self) -> bool { self.sites.len() == 2 }

    /// Return the inverse operation, if the matrix is invertible.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.clone().try_inverse()
            .map(|matrix| Self { sites: self.sites.clone(), matrix })
    }
}

impl From<Gate> for GateOperation {
    fn from(gate: Gate) -> Self {
        Self { sites: gate.sites(), matrix: gate.matrix() }
    }
}

impl From<&Gate> for GateOperation {
    fn from(gate: &Gate) -> Self { (*gate).into() }
}

/// Rearrange a two-site matrix on sites `(a, b)` with dimensions `(da, db)` to
/// act on `(b, a)` instead.
pub fn reorder2(mat: &na::DMatrix<C64>, da: usize, db: usize) -> na::DMatrix<C64> {
    // ∣s_b s_a⟩ -> ∣s_a s_b⟩
    let swap = |j: usize| (j % da) * db + j / da;
    na::DMatrix::from_fn(da * db, da * db, |i, j| mat[(swap(i), swap(j))])
}

/// Make an Euler-angle gate, equal to `e^{iβ/2} Z(α) X(β) Z(γ)` where `Z` and
/// `X` are the rotations of [`make_zrot`] and [`make_xrot`] up to phase.
pub fn make_u(alpha: f64, beta: f64, gamma: f64) -> na::DMatrix<C64> {
    let b2 = beta / 2.0;
    let prefactor = C64::cis(b2);
    let ondiag0 = C64::from(b2.cos());
    let ondiag1 = C64::cis(alpha + gamma) * ondiag0;
    let offdiag = C64::from(b2.sin());
    let offdiag0 = -C64::i() * C64::cis(gamma) * offdiag;
    let offdiag1 = -C64::i() * C64::cis(alpha) * offdiag;
    na::dmatrix!(
        prefactor * ondiag0,  prefactor * offdiag0;
        prefactor * offdiag1, prefactor * ondiag1;
    )
}

pub fn make_i() -> na::DMatrix<C64> { na::DMatrix::identity(2, 2) }

pub static IMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_i);

pub fn make_h() -> na::DMatrix<C64> {
    let h = C64::from(FRAC_1_SQRT_2);
    na::dmatrix!(
        h,  h;
        h, -h;
    )
}

pub static HMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_h);

pub fn make_x() -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
        o, l;
        l, o;
    )
}

pub static XMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_x);

pub fn make_y() -> na::DMatrix<C64> {
    let (o, i) = (C64::from(0.0), C64::i());
    na::dmatrix!(
        o, -i;
        i,  o;
    )
}

pub static YMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_y);

pub fn make_z() -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
        l,  o;
        o, -l;
    )
}

pub static ZMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_z);

fn make_phase(ph: C64) -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
        l, o;
        o, ph;
    )
}

pub fn make_s() -> na::DMatrix<C64> { make_phase(C64::i()) }

pub static SMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_s);

pub fn make_sinv() -> na::DMatrix<C64> { make_phase(-C64::i()) }

pub static SINVMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_sinv);

pub fn make_t() -> na::DMatrix<C64> {
    make_phase(C64::cis(std::f64::consts::FRAC_PI_4))
}

pub static TMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_t);

pub fn make_tinv() -> na::DMatrix<C64> {
    make_phase(C64::cis(-std::f64::consts::FRAC_PI_4))
}

pub static TINVMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_tinv);

/// Make a rotation about X by `angle`, with a global phase making the matrix
/// periodic in 2π.
pub fn make_xrot(angle: f64) -> na::DMatrix<C64> {
    let ang2 = angle / 2.0;
    let prefactor = C64::cis(ang2);
    let ondiag = C64::from(ang2.cos());
    let offdiag = -C64::i() * ang2.sin();
    na::dmatrix!(
        prefactor * ondiag,  prefactor * offdiag;
        prefactor * offdiag, prefactor * ondiag;
    )
}

/// Make a rotation about Y by `angle`, with the same phase convention as
/// [`make_xrot`].
pub fn make_yrot(angle: f64) -> na::DMatrix<C64> {
    let ang2 = angle / 2.0;
    let prefactor = C64::cis(ang2);
    let c = C64::from(ang2.cos());
    let s = C64::from(ang2.sin());
    na::dmatrix!(
        prefactor * c, -prefactor * s;
        prefactor * s,  prefactor * c;
    )
}

/// Make a rotation about Z by `angle`, as a relative phase on `∣1⟩`.
pub fn make_zrot(angle: f64) -> na::DMatrix<C64> { make_phase(C64::cis(angle)) }

pub fn make_proj0() -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
        l, o;
        o, o;
    )
}

pub static PROJ0MAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_proj0);

pub fn make_proj1() -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
        o, o;
        o, l;
    )
}

pub static PROJ1MAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_proj1);

// controlled-`u` with the first qubit as control
fn make_controlled(u: &na::DMatrix<C64>) -> na::DMatrix<C64> {
    let mut mat: na::DMatrix<C64> = na::DMatrix::identity(4, 4);
    mat.view_mut((2, 2), (2, 2)).copy_from(u);
    mat
}

pub fn make_cx() -> na::DMatrix<C64> { make_controlled(&make_x()) }

pub static CXMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_cx);

pub fn make_cy() -> na::DMatrix<C64> { make_controlled(&make_y()) }

pub static CYMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_cy);

pub fn make_cz() -> na::DMatrix<C64> { make_controlled(&make_z()) }

pub static CZMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_cz);

pub fn make_swap() -> na::DMatrix<C64> {
    let (o, l) = (C64::from(0.0), C64::from(1.0));
    na::dmatrix!(
     // ∣00⟩ ∣01⟩ ∣10⟩ ∣11⟩
        l,   o,   o,   o; // ∣00⟩
        o,   o,   l,   o; // ∣01⟩
        o,   l,   o,   o; // ∣10⟩
        o,   o,   o,   l; // ∣11⟩
    )
}

pub static SWAPMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_swap);

/// Sample a Haar-random `n`-qubit unitary.
///
/// A matrix of complex standard normal entries is orthonormalized by QR, and
/// the phases of the diagonal of the triangular factor are divided out of the
/// columns.
///
/// Returns `None` if a `2^n × 2^n` matrix cannot be addressed.
pub fn haar<R>(n: usize, rng: &mut R) -> Option<na::DMatrix<C64>>
where R: Rng + ?Sized
{
    let dim =
        u32::try_from(n).ok()
        .and_then(|n| 1_usize.checked_shl(n))
        .filter(|dim| dim.checked_mul(*dim).is_some())?;
    let normal = Normal::standard();
    let z: na::DMatrix<C64> =
        na::DMatrix::from_fn(dim, dim, |_, _| {
            C64::new(normal.sample(rng), normal.sample(rng))
        });
    let qr = z.qr();
    let (mut q, r) = (qr.q(), qr.r());
    q.column_iter_mut()
        .zip(r.diagonal().iter())
        .for_each(|(mut q_j, rjj)| {
            let norm = rjj.norm();
            if norm > 0.0 { q_j *= *rjj / norm; }
        });
    Some(q)
}
