//! Simulation of quantum circuits on chains of qudits using matrix product
//! states.
//!
//! A state of `n` sites is held as an [`MPS`][mps::MPS] in mixed canonical
//! form. One-site operators are contracted directly into a site; two-site
//! operators are applied to nearest neighbors by merging the pair, contracting
//! with the operator, and splitting the result with a truncated singular value
//! decomposition governed by a [`TruncationPolicy`][config::TruncationPolicy].
//! Every truncation is recorded, so the total weight thrown away over a run is
//! always known.
//!
//! ```
//! use mps_circuit::{
//!     circuit::{ self, Operation },
//!     config::TruncationPolicy,
//!     gate::{ Gate, ZMAT },
//!     mps::MPS,
//! };
//! use rand::{ rngs::StdRng, SeedableRng };
//!
//! let ops: Vec<Operation> = vec![
//!     Gate::H(0).into(),
//!     Gate::CX(0, 1).into(),
//!     Operation::Expect { sites: vec![1], observable: ZMAT.clone() },
//! ];
//! let state = MPS::new([2; 2], TruncationPolicy::lossless()).unwrap();
//! let out =
//!     circuit::run(state, &ops, TruncationPolicy::max_bond(8), StdRng::seed_from_u64(0))
//!     .unwrap();
//! assert!(out.results[0].value().unwrap().norm() < 1e-10);
//! assert_eq!(out.state.bond_dims(), vec![2]);
//! ```
//!
//! Numeric settings shared by every state are fixed once per process through
//! [`NumericConfig::init`][config::NumericConfig::init]. Independent circuits
//! can be run in parallel with a [`CircuitPool`][pool::CircuitPool].

pub mod config;
pub mod tensor;
pub mod truncate;
pub mod mps;
pub mod gate;
pub mod measure;
pub mod circuit;
pub mod pool;

pub use config::{ NumericConfig, SimConfig, TruncationPolicy };
pub use mps::{ ErrorKind, MPS, MPSError, MPSResult };
pub use truncate::{ BondReport, TruncationReport };
pub use circuit::{ CircuitRunner, Operation, RunFailure, RunOutput, RunState };
pub use measure::MeasurementResult;
