//! An N-dimensional array of complex data with shape determined by a set of
//! labeled legs.
//!
//! A [`Tensor`] is a multi-linear algebraic object generalizing vectors and
//! matrices to any number of indices ("legs"). The basic operation between two
//! tensors is the contraction over a subset of their legs, where the result is
//! computed by summing over the values of the paired legs and leaving all
//! others untouched.
//!
//! <blockquote>
//!   <p style="font-size:20px">
//!     <i>C</i><sub>
//!       <i>a</i><sub>1</sub>,...,<i>a</i><sub><i>N</i></sub>,
//!       <i>b</i><sub>1</sub>,...,<i>b</i><sub><i>M</i></sub>
//!     </sub>
//!       = Σ<sub><i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub></sub> [
//!         <i>A</i><sub>
//!           <i>a</i><sub>1</sub>,...,<i>a</i><sub><i>N</i></sub>,
//!           <i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub>
//!         </sub>
//!         × <i>B</i><sub>
//!           <i>α</i><sub>1</sub>,...,<i>α</i><sub><i>D</i></sub>,
//!           <i>b</i><sub>1</sub>,...,<i>b</i><sub><i>M</i></sub>
//!         </sub>
//!       ]
//!   </p>
//! </blockquote>
//!
//! Elements are held in a single contiguous buffer in column-major order with
//! respect to the legs, i.e. the first leg varies fastest. This makes it cheap
//! to view a tensor as a matrix by splitting its legs into a leading (row)
//! group and a trailing (column) group, which is how contractions and
//! factorizations are handed off to `nalgebra`.
//!
//! ```
//! use mps_circuit::tensor::{ DynIdx, Tensor };
//! use num_complex::Complex64 as C64;
//!
//! let a = DynIdx::from(("a", 3));
//! let b = DynIdx::from(("b", 4));
//! let c = DynIdx::from(("c", 5));
//!
//! let x: Tensor<DynIdx, C64> =
//!     Tensor::new([a.clone(), b.clone()], |_| C64::from(1.0)).unwrap();
//! let y: Tensor<DynIdx, C64> =
//!     Tensor::new([b.clone(), c.clone()], |_| C64::from(2.0)).unwrap();
//!
//! // Z_{a,c} = X_{a,b} Y_{b,c}
//! let z = x.contract(&y, &[(b.clone(), b)]).unwrap();
//! assert_eq!(z.shape(), vec![3, 5]);
//! assert_eq!(z.get(&[0, 0]), Some(&C64::from(8.0)));
//! ```

use std::fmt;
use nalgebra::{ self as na, ComplexField };
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use thiserror::Error;
use crate::{
    config::{ NumericConfig, TruncationPolicy },
    truncate::{ self, BondReport, Truncation },
};

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when two legs paired for contraction have different
    /// dimensions, or when an operand's shape disagrees with what an operation
    /// requires.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Returned when a reshape or permutation does not preserve the number of
    /// elements or is otherwise malformed.
    #[error("shape error: {0}")]
    ShapeError(String),

    /// Returned when attempting to create a tensor with duplicate legs.
    #[error("error in tensor creation: duplicate legs")]
    DuplicateIndices,

    /// Returned when attempting to create a tensor with at least one leg that
    /// has zero dimension.
    #[error("error in tensor creation: encountered a zero-dimensional leg")]
    ZeroDimIndex,

    /// Returned when a leg referred to by label or position isn't present.
    #[error("missing leg: {0}")]
    MissingIndex(String),

    /// Returned when a decomposition fails to converge or is handed
    /// non-finite data.
    #[error("numeric failure: {0}")]
    NumericFailure(String),
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

/// Describes a tensor leg.
///
/// Legs are compared by equality when contracting by label, so two legs that
/// should be summed over must compare equal. There are two ways to implement
/// this trait. The first is a "static" representation where every available
/// leg is encoded in the structure of the type:
/// ```ignore
/// #[derive(Clone, Debug, PartialEq, Eq)]
/// enum Index { A, B, C, /* ... */ }
///
/// impl Idx for Index {
///     fn dim(&self) -> usize {
///         match self {
///             Self::A => /* dimension for A */,
///             Self::B => /* dimension for B */,
///             Self::C => /* dimension for C */,
///             // ...
///         }
///     }
/// }
/// ```
/// The second is a "dynamic" representation, where the dimension is carried
/// as data (see [`DynIdx`] and [`Leg`][crate::mps::Leg]). Matrix product
/// states need the latter, since bond dimensions change as the state evolves.
pub trait Idx: Clone + PartialEq + fmt::Debug {
    /// Return the number of values the leg can take.
    ///
    /// This value must never be zero.
    fn dim(&self) -> usize;

    /// Return an identifying label for the leg. This method is used only for
    /// printing purposes.
    ///
    /// The default implementation renders `self` using `Debug`.
    fn label(&self) -> String { format!("{self:?}") }
}

/// A dynamically dimensioned tensor leg type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DynIdx(
    /// Identifier label.
    pub std::sync::Arc<str>,
    /// Leg dimension.
    pub usize,
);

impl Idx for DynIdx {
    fn dim(&self) -> usize { self.1 }

    fn label(&self) -> String { self.0.to_string() }
}

impl<T> From<(T, usize)> for DynIdx
where std::sync::Arc<str>: From<T>
{
    fn from(x: (T, usize)) -> Self {
        let (label, dim) = x;
        Self(label.into(), dim)
    }
}

fn is_unique<'a, I, T>(elems: I) -> bool
where
    I: IntoIterator<Item = &'a T> + Copy,
    T: PartialEq + 'a,
{
    elems.into_iter().enumerate()
        .all(|(k, e0)| elems.into_iter().skip(k + 1).all(|e1| e0 != e1))
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    order.len() == n
        && order.iter().all(|a| *a < n)
        && is_unique(order)
}

// increment a column-major multi-index; returns `false` on wrap-around
fn ndinc(idx: &mut [usize], shape: &[usize]) -> bool {
    for (i, d) in idx.iter_mut().zip(shape) {
        *i += 1;
        if *i < *d { return true; }
        *i = 0;
    }
    false
}

// column-major strides
fn strides(shape: &[usize]) -> Vec<usize> {
    shape.iter()
        .scan(1, |acc, d| { let s = *acc; *acc *= d; Some(s) })
        .collect()
}

/// A dense tensor with labeled legs.
///
/// A `Tensor<T, A>` owns a buffer of `Π_k dim(leg_k)` elements of type `A` and
/// a list of *unique* legs of type `T`. A rank-0 tensor holds exactly one
/// element.
///
/// Equality between `Tensor`s requires equal legs *in the same order* and
/// element-wise equality of the buffers.
#[derive(Clone, Debug)]
pub struct Tensor<T, A> {
    idxs: Vec<T>,
    data: na::DVector<A>,
}

impl<T, A> PartialEq for Tensor<T, A>
where
    T: PartialEq,
    A: na::Scalar + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.idxs == other.idxs && self.data == other.data
    }
}

impl<T, A> Tensor<T, A>
where
    T: Idx,
    A: ComplexField,
{
    /// Create a new tensor using a function over leg values.
    ///
    /// Fails if any legs are duplicated or have zero dimension.
    pub fn new<I, F>(indices: I, mut elems: F) -> TensorResult<Self>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&[usize]) -> A,
    {
        let idxs: Vec<T> = indices.into_iter().collect();
        Self::check_legs(&idxs)?;
        let shape: Vec<usize> = idxs.iter().map(|idx| idx.dim()).collect();
        let len: usize = shape.iter().product();
        let mut pos: Vec<usize> = vec![0; shape.len()];
        let mut buf: Vec<A> = Vec::with_capacity(len);
        for _ in 0..len {
            buf.push(elems(&pos));
            ndinc(&mut pos, &shape);
        }
        Ok(Self { idxs, data: na::DVector::from_vec(buf) })
    }

    /// Create a new tensor with all elements equal to zero.
    pub fn zeros<I>(indices: I) -> TensorResult<Self>
    where I: IntoIterator<Item = T>
    {
        Self::new(indices, |_| A::zero())
    }

    /// Create a new rank-0 tensor.
    pub fn new_scalar(val: A) -> Self {
        Self { idxs: Vec::new(), data: na::DVector::from_element(1, val) }
    }

    /// Create a new tensor from a pre-existing buffer in column-major order.
    ///
    /// Fails if any legs are duplicated or have zero dimension, or if the
    /// number of elements doesn't match the legs.
    pub fn from_elems<I>(indices: I, elems: na::DVector<A>) -> TensorResult<Self>
    where I: IntoIterator<Item = T>
    {
        let idxs: Vec<T> = indices.into_iter().collect();
        Self::check_legs(&idxs)?;
        let len: usize = idxs.iter().map(|idx| idx.dim()).product();
        if len != elems.len() {
            return Err(ShapeError(format!(
                "{} elements given for legs of total dimension {}",
                elems.len(), len,
            )));
        }
        Ok(Self { idxs, data: elems })
    }

    /// Create a new tensor from a matrix whose rows run over a leading group
    /// of legs and whose columns run over the rest.
    ///
    /// This is the inverse of [`matricize`][Self::matricize].
    pub fn from_matrix<I>(indices: I, mat: na::DMatrix<A>) -> TensorResult<Self>
    where I: IntoIterator<Item = T>
    {
        let elems = na::DVector::from_iterator(mat.len(), mat.iter().cloned());
        Self::from_elems(indices, elems)
    }

    fn check_legs(idxs: &[T]) -> TensorResult<()> {
        if !is_unique(idxs) { return Err(DuplicateIndices); }
        if idxs.iter().any(|idx| idx.dim() == 0) { return Err(ZeroDimIndex); }
        Ok(())
    }

    /// Return the number of legs.
    pub fn rank(&self) -> usize { self.idxs.len() }

    /// Return the total number of elements.
    pub fn len(&self) -> usize { self.data.len() }

    /// Return `true` if `self` has no elements. Since zero-dimensional legs
    /// are forbidden, this is always `false`.
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Return the dimension of every leg, in order.
    pub fn shape(&self) -> Vec<usize> {
        self.idxs.iter().map(|idx| idx.dim()).collect()
    }

    /// Return a reference to all legs, in order.
    pub fn indices(&self) -> &[T] { &self.idxs }

    /// Return a reference to the `k`-th leg.
    pub fn leg(&self, k: usize) -> Option<&T> { self.idxs.get(k) }

    /// Return the position of a leg.
    pub fn position(&self, idx: &T) -> Option<usize> {
        self.idxs.iter().position(|i| i == idx)
    }

    /// Return `true` if `self` has the leg `idx`.
    pub fn has_index(&self, idx: &T) -> bool { self.idxs.contains(idx) }

    /// Return a reference to the underlying column-major buffer.
    pub fn data(&self) -> &na::DVector<A> { &self.data }

    /// Return a mutable reference to the underlying column-major buffer.
    pub fn data_mut(&mut self) -> &mut [A] { self.data.as_mut_slice() }

    /// Unwrap `self` into its legs and column-major buffer.
    pub fn into_flat(self) -> (Vec<T>, na::DVector<A>) { (self.idxs, self.data) }

    /// Return a reference to a single element.
    ///
    /// Returns `None` if the number of leg values is wrong or any is out of
    /// bounds.
    pub fn get(&self, pos: &[usize]) -> Option<&A> {
        if pos.len() != self.rank() { return None; }
        let mut lin: usize = 0;
        let mut stride: usize = 1;
        for (p, idx) in pos.iter().zip(&self.idxs) {
            if *p >= idx.dim() { return None; }
            lin += p * stride;
            stride *= idx.dim();
        }
        self.data.get(lin)
    }

    /// View `self` as a matrix, with the first `split` legs fused into the row
    /// index and the rest into the column index.
    ///
    /// *Panics if `split` exceeds the rank.*
    pub fn matricize(&self, split: usize) -> na::DMatrix<A> {
        let m: usize = self.idxs[..split].iter().map(|idx| idx.dim()).product();
        let n = self.len() / m;
        na::DMatrix::from_column_slice(m, n, self.data.as_slice())
    }

    /// Reorder legs so that the `k`-th leg of the result is the `order[k]`-th
    /// leg of `self`.
    ///
    /// Fails if `order` is not a permutation of `0..rank`.
    pub fn permute(self, order: &[usize]) -> TensorResult<Self> {
        let r = self.rank();
        if !is_permutation(order, r) {
            return Err(ShapeError(format!(
                "{order:?} is not a permutation of {r} legs")));
        }
        if order.iter().enumerate().all(|(k, a)| k == *a) { return Ok(self); }
        let old_strides = strides(&self.shape());
        let idxs: Vec<T> = order.iter().map(|a| self.idxs[*a].clone()).collect();
        let shape: Vec<usize> = idxs.iter().map(|idx| idx.dim()).collect();
        let perm_strides: Vec<usize> =
            order.iter().map(|a| old_strides[*a]).collect();
        let mut pos: Vec<usize> = vec![0; r];
        let mut buf: Vec<A> = Vec::with_capacity(self.len());
        for _ in 0..self.len() {
            let lin: usize =
                pos.iter().zip(&perm_strides).map(|(p, s)| p * s).sum();
            buf.push(self.data[lin].clone());
            ndinc(&mut pos, &shape);
        }
        Ok(Self { idxs, data: na::DVector::from_vec(buf) })
    }

    /// Reorder legs to match `target`, which must hold exactly the legs of
    /// `self`.
    pub fn permute_to(self, target: &[T]) -> TensorResult<Self> {
        let order: Vec<usize> =
            target.iter()
            .map(|idx| {
                self.position(idx)
                    .ok_or_else(|| MissingIndex(idx.label()))
            })
            .collect::<TensorResult<_>>()?;
        self.permute(&order)
    }

    /// Replace the legs of `self`, keeping the column-major buffer as-is.
    ///
    /// This merges or splits legs: any new list of legs whose dimensions
    /// multiply to the current number of elements is accepted, and the
    /// relative ordering of the elements is preserved.
    ///
    /// Fails if the element count doesn't match or the new legs are invalid.
    pub fn reshape<I, U>(self, indices: I) -> TensorResult<Tensor<U, A>>
    where
        I: IntoIterator<Item = U>,
        U: Idx,
    {
        let idxs: Vec<U> = indices.into_iter().collect();
        let len: usize = idxs.iter().map(|idx| idx.dim()).product();
        if len != self.len() {
            return Err(ShapeError(format!(
                "cannot reshape {} elements into legs of total dimension {}",
                self.len(), len,
            )));
        }
        Tensor::from_elems(idxs, self.data)
    }

    /// Relabel every leg with a mapping function.
    ///
    /// Fails if the mapping changes the dimension of any leg or makes two legs
    /// equal.
    pub fn map_indices<F, U>(self, mut f: F) -> TensorResult<Tensor<U, A>>
    where
        F: FnMut(T) -> U,
        U: Idx,
    {
        let Self { idxs, data } = self;
        let mut new: Vec<U> = Vec::with_capacity(idxs.len());
        for idx in idxs.into_iter() {
            let dim = idx.dim();
            let new_idx = f(idx);
            if new_idx.dim() != dim {
                return Err(ShapeError(format!(
                    "relabeling changed a leg dimension from {} to {}",
                    dim, new_idx.dim(),
                )));
            }
            new.push(new_idx);
        }
        Tensor::from_elems(new, data)
    }

    /// Contract `self` with `other` over pairs of leg positions.
    ///
    /// The result carries the remaining legs of `self` (in order) followed by
    /// the remaining legs of `other` (in order). If no pairs are given, this is
    /// the ordinary tensor product.
    ///
    /// Fails if a position is out of bounds or repeated, if paired legs have
    /// different dimensions, or if the result would have duplicate legs.
    pub fn contract_axes(&self, other: &Self, pairs: &[(usize, usize)])
        -> TensorResult<Self>
    {
        let (ax_a, ax_b): (Vec<usize>, Vec<usize>) =
            pairs.iter().copied().unzip();
        if ax_a.iter().any(|a| *a >= self.rank())
            || ax_b.iter().any(|b| *b >= other.rank())
        {
            return Err(MissingIndex(format!(
                "contraction pairs {pairs:?} out of bounds for ranks {} and {}",
                self.rank(), other.rank(),
            )));
        }
        if !is_unique(&ax_a) || !is_unique(&ax_b) {
            return Err(ShapeError(format!(
                "contraction pairs {pairs:?} repeat a leg")));
        }
        for (a, b) in pairs.iter() {
            let (da, db) = (self.idxs[*a].dim(), other.idxs[*b].dim());
            if da != db {
                return Err(DimensionMismatch(format!(
                    "cannot contract {} (dim {}) with {} (dim {})",
                    self.idxs[*a].label(), da, other.idxs[*b].label(), db,
                )));
            }
        }
        let free_a: Vec<usize> =
            (0..self.rank()).filter(|a| !ax_a.contains(a)).collect();
        let free_b: Vec<usize> =
            (0..other.rank()).filter(|b| !ax_b.contains(b)).collect();
        let idxs: Vec<T> =
            free_a.iter().map(|a| self.idxs[*a].clone())
            .chain(free_b.iter().map(|b| other.idxs[*b].clone()))
            .collect();
        if !is_unique(&idxs) { return Err(DuplicateIndices); }

        // A -> [free..., paired...] and B -> [paired..., free...] so that the
        // contraction is a single matrix product
        let order_a: Vec<usize> =
            free_a.iter().chain(ax_a.iter()).copied().collect();
        let order_b: Vec<usize> =
            ax_b.iter().chain(free_b.iter()).copied().collect();
        let a = self.clone().permute(&order_a)?;
        let b = other.clone().permute(&order_b)?;
        let c = a.matricize(free_a.len()) * b.matricize(ax_b.len());
        Tensor::from_matrix(idxs, c)
    }

    /// Contract `self` with `other` over pairs of legs given by label.
    ///
    /// See [`contract_axes`][Self::contract_axes].
    pub fn contract(&self, other: &Self, leg_pairs: &[(T, T)])
        -> TensorResult<Self>
    {
        let pairs: Vec<(usize, usize)> =
            leg_pairs.iter()
            .map(|(a, b)| {
                let pa = self.position(a).ok_or_else(|| MissingIndex(a.label()))?;
                let pb = other.position(b).ok_or_else(|| MissingIndex(b.label()))?;
                Ok((pa, pb))
            })
            .collect::<TensorResult<_>>()?;
        self.contract_axes(other, &pairs)
    }

    /// Multiply every slice of `self` along a leg by a weight.
    ///
    /// Fails if the number of weights doesn't match the leg dimension.
    pub fn scale_axis(&mut self, axis: usize, weights: &[A]) -> TensorResult<()> {
        let shape = self.shape();
        let dim = *shape.get(axis)
            .ok_or_else(|| MissingIndex(format!("axis {axis}")))?;
        if weights.len() != dim {
            return Err(DimensionMismatch(format!(
                "{} weights for a leg of dimension {}", weights.len(), dim)));
        }
        let inner: usize = shape[..axis].iter().product();
        self.data.as_mut_slice()
            .chunks_mut(inner)
            .enumerate()
            .for_each(|(k, chunk)| {
                let w = weights[k % dim].clone();
                chunk.iter_mut().for_each(|x| { *x *= w.clone(); });
            });
        Ok(())
    }

    /// Multiply every element by a scalar.
    pub fn scale(&mut self, a: A) {
        self.data.iter_mut().for_each(|x| { *x *= a.clone(); });
    }

    /// Return the squared Frobenius norm.
    pub fn norm_sqr(&self) -> A::RealField {
        self.data.iter()
            .map(|x| x.clone().modulus_squared())
            .fold(A::RealField::zero(), |acc, x| acc + x)
    }

    /// Compute Σ conj(self) × other over all legs, which must be equal and in
    /// the same order.
    pub fn inner(&self, other: &Self) -> TensorResult<A> {
        if self.idxs != other.idxs {
            return Err(DimensionMismatch(
                "inner product requires identical legs".into()));
        }
        Ok(self.data.dotc(&other.data))
    }

    /// Return a new tensor containing the element-wise complex conjugation of
    /// `self`.
    pub fn conj(&self) -> Self {
        Self { idxs: self.idxs.clone(), data: self.data.conjugate() }
    }

    /// Conjugate `self` element-wise in place.
    pub fn conj_mut(&mut self) { self.data.conjugate_mut(); }

    /// Return the single element of a rank-0 tensor.
    pub fn into_scalar(self) -> Option<A> {
        (self.rank() == 0).then(|| self.data[0].clone())
    }

    /// Return `true` if every element is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.clone().is_finite())
    }
}

impl<T, A> Tensor<T, A>
where
    T: Idx,
    A: ComplexField + One,
{
    /// Create an identity-like tensor pairing every leg in `a` with the
    /// corresponding leg in `b`.
    pub fn identity(a: &[T], b: &[T]) -> TensorResult<Self> {
        if a.len() != b.len()
            || a.iter().zip(b).any(|(ai, bi)| ai.dim() != bi.dim())
        {
            return Err(DimensionMismatch(
                "identity requires pairwise equal dimensions".into()));
        }
        let n = a.len();
        Self::new(
            a.iter().chain(b).cloned(),
            |pos| {
                if pos[..n] == pos[n..] { A::one() } else { A::zero() }
            },
        )
    }
}

/// Output of [`Tensor::factorize`].
#[derive(Clone, Debug)]
pub struct Factors<T> {
    /// Left tensor, with legs `[left..., bond]`. Its columns over `bond` are
    /// orthonormal.
    pub left: Tensor<T, C64>,
    /// Kept singular values, in descending order and normalized to unit norm.
    pub svals: Vec<f64>,
    /// Right tensor, with legs `[bond, rest...]`. Its rows over `bond` are
    /// orthonormal.
    pub right: Tensor<T, C64>,
    /// Truncation record for the new bond.
    pub report: BondReport,
}

impl<T> Tensor<T, C64>
where T: Idx
{
    /// Split `self` across the partition of its legs into `left` and the rest
    /// by a truncated singular value decomposition.
    ///
    /// The new bond leg is created by `bond` from the kept rank. Legs not in
    /// `left` keep their relative order on the right tensor.
    ///
    /// Fails if a leg in `left` isn't present, `bond` returns a leg of the
    /// wrong dimension, or the decomposition fails (see
    /// [`truncate::factorize`]).
    pub fn factorize<F>(
        self,
        left: &[T],
        bond: F,
        policy: &TruncationPolicy,
        config: &NumericConfig,
    ) -> TensorResult<Factors<T>>
    where F: FnOnce(usize) -> T
    {
        let ax_left: Vec<usize> =
            left.iter()
            .map(|idx| self.position(idx).ok_or_else(|| MissingIndex(idx.label())))
            .collect::<TensorResult<_>>()?;
        if !is_unique(&ax_left) { return Err(DuplicateIndices); }
        let rest: Vec<usize> =
            (0..self.rank()).filter(|a| !ax_left.contains(a)).collect();
        let order: Vec<usize> =
            ax_left.iter().chain(rest.iter()).copied().collect();
        let split = ax_left.len();
        let t = self.permute(&order)?;
        let Truncation { u, s, vt, report } =
            truncate::factorize(t.matricize(split), policy, config)?;
        let bond_idx = bond(s.len());
        if bond_idx.dim() != s.len() {
            return Err(ShapeError(format!(
                "bond leg has dimension {} but {} singular values were kept",
                bond_idx.dim(), s.len(),
            )));
        }
        let (idxs, _) = t.into_flat();
        let left_idxs: Vec<T> =
            idxs[..split].iter().cloned()
            .chain(std::iter::once(bond_idx.clone()))
            .collect();
        let right_idxs: Vec<T> =
            std::iter::once(bond_idx)
            .chain(idxs[split..].iter().cloned())
            .collect();
        let left = Tensor::from_matrix(left_idxs, u)?;
        let right = Tensor::from_matrix(right_idxs, vt)?;
        Ok(Factors { left, svals: s.iter().copied().collect(), right, report })
    }
}

impl<T, A> fmt::Display for Tensor<T, A>
where
    T: Idx,
    A: na::Scalar + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (k, idx) in self.idxs.iter().enumerate() {
            if k > 0 { write!(f, ", ")?; }
            write!(f, "{}: {}", idx.label(), idx.dim())?;
        }
        write!(f, " }} [")?;
        for (k, x) in self.data.iter().enumerate() {
            if k > 0 { write!(f, ", ")?; }
            match f.precision() {
                Some(prec) => write!(f, "{:.1$}", x, prec)?,
                None => write!(f, "{}", x)?,
            }
        }
        write!(f, "]")
    }
}
