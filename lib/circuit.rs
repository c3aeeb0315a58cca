//! Driving a sequence of gates and measurements over an [`MPS`].
//!
//! A [`CircuitRunner`] owns a state and walks an ordered list of
//! [`Operation`]s, accumulating a [`TruncationReport`] and the results of any
//! measurements. Two-qubit gates may name any pair of distinct qubits: pairs
//! that are not nearest neighbors in left-to-right order are routed through
//! adjacent SWAPs, whose truncations are recorded like any other.
//!
//! The first failing operation halts the run. Everything accumulated up to
//! that point is handed back in a [`RunFailure`].
//!
//! ```
//! use mps_circuit::{
//!     circuit::{ self, Operation },
//!     config::TruncationPolicy,
//!     gate::Gate,
//!     mps::MPS,
//! };
//! use rand::{ rngs::StdRng, SeedableRng };
//!
//! let ops: Vec<Operation> =
//!     vec![Gate::H(0).into(), Gate::CX(0, 2).into(), Operation::measure(2)];
//! let state = MPS::new([2; 3], TruncationPolicy::lossless()).unwrap();
//! let out =
//!     circuit::run(state, &ops, TruncationPolicy::lossless(), StdRng::seed_from_u64(10546))
//!     .unwrap();
//! assert_eq!(out.results.len(), 1);
//! assert_eq!(out.report.total_discarded_mass(), 0.0);
//! ```

use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng };
use thiserror::Error;
use tracing::{ debug, error, info };
use crate::{
    config::TruncationPolicy,
    gate::{ self, Gate, GateOperation },
    measure::{ self, MeasurementResult },
    mps::{ ErrorKind, MPS, MPSError, MPSResult },
    truncate::TruncationReport,
};

/// A single step of a circuit.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Apply an operator to one or two qubits.
    Gate(GateOperation),
    /// Projectively measure a single qubit, in the computational basis or, if
    /// `basis` is given, in the eigenbasis of that Hermitian observable.
    Measure {
        site: usize,
        basis: Option<na::DMatrix<C64>>,
    },
    /// Compute an expectation value over a contiguous block of qubits without
    /// disturbing the state.
    Expect {
        sites: Vec<usize>,
        observable: na::DMatrix<C64>,
    },
}

impl Operation {
    /// Computational-basis measurement of `site`.
    pub fn measure(site: usize) -> Self { Self::Measure { site, basis: None } }

    /// Return the sites touched by `self`.
    pub fn sites(&self) -> Vec<usize> {
        match self {
            Self::Gate(op) => op.sites().to_vec(),
            Self::Measure { site, .. } => vec![*site],
            Self::Expect { sites, .. } => sites.clone(),
        }
    }

    /// Return `true` if `self` is `Gate`.
    pub fn is_gate(&self) -> bool { matches!(self, Self::Gate(..)) }
}

impl From<GateOperation> for Operation {
    fn from(op: GateOperation) -> Self { Self::Gate(op) }
}

impl From<Gate> for Operation {
    fn from(gate: Gate) -> Self { Self::Gate(gate.into()) }
}

/// Lifecycle of a [`CircuitRunner`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// No operation has been submitted yet.
    Initializing,
    /// At least one operation has succeeded and none have failed.
    Running,
    /// A full sequence was exhausted without error.
    Completed,
    /// An operation failed; nothing further is applied.
    Failed,
}

/// Everything produced by a successful run.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// The final state.
    pub state: MPS,
    /// Every bond truncation performed, in order.
    pub report: TruncationReport,
    /// Measurement and expectation results, in operation order.
    pub results: Vec<MeasurementResult>,
}

/// A halted run.
///
/// `state` and `report` are as they were just before the failing operation.
/// A routed two-site gate that fails partway is rolled back as a whole, so its
/// SWAPs appear in neither.
#[derive(Debug, Error)]
#[error("circuit failed at operation {op_index} on sites {sites:?}: {source}")]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub source: MPSError,
    pub op_index: usize,
    pub sites: Vec<usize>,
    pub report: TruncationReport,
    pub results: Vec<MeasurementResult>,
    pub state: Box<MPS>,
}

#[derive(Debug)]
struct Halt {
    op_index: usize,
    sites: Vec<usize>,
    source: MPSError,
}

/// Applies operations to an owned [`MPS`] one at a time.
///
/// Two-qubit gates are truncated under the runner's policy rather than the
/// state's own.
#[derive(Debug)]
pub struct CircuitRunner<R = StdRng> {
    state: MPS,
    rng: R,
    policy: TruncationPolicy,
    report: TruncationReport,
    results: Vec<MeasurementResult>,
    status: RunState,
    step: usize,
    halt: Option<Halt>,
}

impl<R> CircuitRunner<R>
where R: Rng
{
    /// Create a new runner. `rng` is the source of randomness for
    /// measurements.
    pub fn new(state: MPS, policy: TruncationPolicy, rng: R) -> Self {
        Self {
            state,
            rng,
            policy,
            report: TruncationReport::new(),
            results: Vec::new(),
            status: RunState::Initializing,
            step: 0,
            halt: None,
        }
    }

    /// Return the current state.
    pub fn state(&self) -> &MPS { &self.state }

    /// Return the truncation policy for two-qubit gates.
    pub fn policy(&self) -> &TruncationPolicy { &self.policy }

    /// Return the truncations recorded so far.
    pub fn report(&self) -> &TruncationReport { &self.report }

    /// Return the measurement results collected so far.
    pub fn results(&self) -> &[MeasurementResult] { &self.results }

    /// Return the current lifecycle state.
    pub fn status(&self) -> RunState { self.status }

    /// Return the number of operations applied successfully.
    pub fn steps(&self) -> usize { self.step }

    /// Apply a single operation.
    ///
    /// Once an operation has failed, the runner is [`Failed`][RunState::Failed]
    /// and every later call returns the original error without doing
    /// anything.
    pub fn step(&mut self, op: &Operation) -> Result<(), &MPSError> {
        if self.halt.is_none() {
            self.status = RunState::Running;
            debug!(step = self.step, sites = ?op.sites(), "applying operation");
            match self.apply(op) {
                Ok(()) => { self.step += 1; },
                Err(source) => {
                    error!(
                        step = self.step,
                        sites = ?op.sites(),
                        discarded_mass = self.report.total_discarded_mass(),
                        "operation failed: {source}",
                    );
                    self.status = RunState::Failed;
                    self.halt = Some(
                        Halt { op_index: self.step, sites: op.sites(), source });
                },
            }
        }
        self.halt.as_ref().map_or(Ok(()), |h| Err(&h.source))
    }

    /// Apply a sequence of operations in order, stopping at the first failure.
    ///
    /// The runner is [`Completed`][RunState::Completed] if the sequence is
    /// exhausted without error.
    pub fn run<'a, I>(&mut self, ops: I) -> Result<(), &MPSError>
    where I: IntoIterator<Item = &'a Operation>
    {
        info!(
            n = self.state.n(),
            max_bond_dim = self.policy.max_bond_dim,
            "starting circuit",
        );
        for op in ops.into_iter() {
            if self.step(op).is_err() { break; }
        }
        if self.halt.is_none() {
            self.status = RunState::Completed;
            info!(
                steps = self.step,
                discarded_mass = self.report.total_discarded_mass(),
                max_bond_dim = self.state.max_bond_dim(),
                "circuit completed",
            );
        }
        self.halt.as_ref().map_or(Ok(()), |h| Err(&h.source))
    }

    /// Consume `self`, returning either the output of the run or the failure
    /// that halted it.
    pub fn finish(self) -> Result<RunOutput, RunFailure> {
        let Self { state, report, results, halt, .. } = self;
        match halt {
            None => Ok(RunOutput { state, report, results }),
            Some(Halt { op_index, sites, source }) => {
                Err(RunFailure {
                    kind: source.kind(),
                    source,
                    op_index,
                    sites,
                    report,
                    results,
                    state: Box::new(state),
                })
            },
        }
    }

    fn apply(&mut self, op: &Operation) -> MPSResult<()> {
        match op {
            Operation::Gate(gate) => self.apply_gate(gate),
            Operation::Measure { site, basis: None } => {
                let res = measure::sample_outcome(&mut self.state, *site, &mut self.rng)?;
                self.results.push(res);
                Ok(())
            },
            Operation::Measure { site, basis: Some(obs) } => {
                let res =
                    measure::sample_outcome_in(&mut self.state, *site, obs, &mut self.rng)?;
                self.results.push(res);
                Ok(())
            },
            Operation::Expect { sites, observable } => {
                let value = measure::expectation_value(&self.state, observable, sites)?;
                self.results.push(
                    MeasurementResult::Expectation { sites: sites.clone(), value });
                Ok(())
            },
        }
    }

    fn apply_gate(&mut self, op: &GateOperation) -> MPSResult<()> {
        let sites = op.sites();
        if op.is_q1() {
            self.state.apply_op1(sites[0], op.matrix())
        } else if op.is_q2() {
            self.apply_routed(sites[0], sites[1], op.matrix())
        } else {
            Err(MPSError::DimensionMismatch {
                sites: sites.to_vec(),
                reason: "operators act on one or two sites".into(),
            })
        }
    }

    // bring `b` next to `a` with adjacent swaps, apply, and swap back
    fn apply_routed(&mut self, a: usize, b: usize, mat: &na::DMatrix<C64>)
        -> MPSResult<()>
    {
        let n = self.state.n();
        if let Some(bad) = [a, b].into_iter().find(|k| *k >= n) {
            return Err(MPSError::InvalidSite(bad));
        }
        if a == b {
            return Err(MPSError::DimensionMismatch {
                sites: vec![a, b],
                reason: "two-site operators need distinct sites".into(),
            });
        }
        let dims = self.state.dims();
        let (da, db) = (dims[a], dims[b]);
        if mat.shape() != (da * db, da * db) {
            return Err(MPSError::DimensionMismatch {
                sites: vec![a, b],
                reason: format!(
                    "expected a {0}×{0} operator, got {1}×{2}",
                    da * db, mat.nrows(), mat.ncols(),
                ),
            });
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let dh = dims[hi];
        if dims[lo + 1..hi].iter().any(|d| *d != dh) {
            return Err(MPSError::DimensionMismatch {
                sites: vec![a, b],
                reason: "routing requires equal dimensions between the sites".into(),
            });
        }
        let mat = if a < b { mat.clone() } else { gate::reorder2(mat, da, db) };
        if hi == lo + 1 {
            let bond = self.state.apply_op2_with(lo, &mat, &self.policy)?;
            self.report.record(bond);
            return Ok(());
        }
        debug!(a, b, swaps = hi - lo - 1, "routing two-site operator");
        // work on a copy so that a failure midway leaves the qubits in place
        let mut state = self.state.clone();
        let mut report = TruncationReport::new();
        let swap = make_swap(dh);
        let route = (lo + 1..hi).rev().map(|j| (j, &swap))
            .chain(std::iter::once((lo, &mat)))
            .chain((lo + 1..hi).map(|j| (j, &swap)));
        for (j, op) in route {
            report.record(state.apply_op2_with(j, op, &self.policy)?);
        }
        self.state = state;
        self.report.extend(report);
        Ok(())
    }
}

// SWAP between two sites of dimension `d`
fn make_swap(d: usize) -> na::DMatrix<C64> {
    na::DMatrix::from_fn(d * d, d * d, |i, j| {
        if i == (j % d) * d + j / d { C64::from(1.0) } else { C64::from(0.0) }
    })
}

/// Run `ops` from `initial` to completion.
///
/// This is shorthand for [`CircuitRunner::new`], [`CircuitRunner::run`], and
/// [`CircuitRunner::finish`].
pub fn run<'a, I, R>(initial: MPS, ops: I, policy: TruncationPolicy, rng: R)
    -> Result<RunOutput, RunFailure>
where
    I: IntoIterator<Item = &'a Operation>,
    R: Rng,
{
    let mut runner = CircuitRunner::new(initial, policy, rng);
    // the error is kept by the runner and returned by `finish`
    runner.run(ops).ok();
    runner.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{ rngs::mock::StepRng, SeedableRng };
    use crate::gate::{ SWAPMAT, ZMAT };

    fn qubits(n: usize) -> MPS {
        MPS::new(vec![2; n], TruncationPolicy::lossless()).unwrap()
    }

    #[test]
    fn generic_swap_matches_qubit_swap() {
        assert_eq!(make_swap(2), *SWAPMAT);
        let swap3 = make_swap(3);
        assert_eq!(&swap3 * &swap3, na::DMatrix::identity(9, 9));
    }

    #[test]
    fn routed_gate_acts_on_distant_qubits() {
        let ops: Vec<Operation> = vec![Gate::H(0).into(), Gate::CX(0, 2).into()];
        let out =
            run(qubits(3), &ops, TruncationPolicy::lossless(), StdRng::seed_from_u64(0))
            .unwrap();
        // two swaps and the gate itself
        assert_eq!(out.report.len(), 3);
        assert_relative_eq!(out.report.total_discarded_mass(), 0.0, epsilon = 1e-12);
        let psi = out.state.into_vector().unwrap();
        let amp = std::f64::consts::FRAC_1_SQRT_2;
        for (j, a) in psi.iter().enumerate() {
            // ∣000⟩ and ∣101⟩
            let expected = if j == 0 || j == 5 { amp } else { 0.0 };
            assert_relative_eq!(a.re, expected, epsilon = 1e-10);
            assert_relative_eq!(a.im, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn reversed_gate_is_reordered() {
        let ops: Vec<Operation> = vec![Gate::X(1).into(), Gate::CX(1, 0).into()];
        let out =
            run(qubits(2), &ops, TruncationPolicy::lossless(), StdRng::seed_from_u64(0))
            .unwrap();
        let psi = out.state.into_vector().unwrap();
        assert_relative_eq!(psi[3].norm(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn results_are_in_operation_order() {
        let ops: Vec<Operation> = vec![
            Gate::H(0).into(),
            Operation::Expect { sites: vec![0], observable: ZMAT.clone() },
            Operation::measure(0),
            Operation::Expect { sites: vec![0], observable: ZMAT.clone() },
        ];
        let mut runner = CircuitRunner::new(qubits(2), TruncationPolicy::lossless(), StepRng::new(0, 0));
        assert_eq!(runner.status(), RunState::Initializing);
        assert!(runner.run(&ops).is_ok());
        assert_eq!(runner.status(), RunState::Completed);
        assert_eq!(runner.steps(), 4);
        let out = runner.finish().unwrap();
        assert_eq!(out.results.len(), 3);
        assert_relative_eq!(out.results[0].value().unwrap().re, 0.0, epsilon = 1e-10);
        assert_eq!(out.results[1].outcome(), Some(0));
        assert_relative_eq!(out.results[2].value().unwrap().re, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn failure_halts_and_keeps_progress() {
        let ops: Vec<Operation> = vec![
            Gate::H(0).into(),
            Gate::CX(0, 1).into(),
            Operation::measure(1),
            Gate::H(5).into(),
            Gate::H(1).into(),
        ];
        let mut runner = CircuitRunner::new(qubits(3), TruncationPolicy::lossless(), StepRng::new(0, 0));
        assert!(matches!(runner.run(&ops), Err(MPSError::InvalidSite(5))));
        assert_eq!(runner.status(), RunState::Failed);
        assert_eq!(runner.steps(), 3);
        // later steps are refused
        assert!(runner.step(&Gate::H(0).into()).is_err());
        assert_eq!(runner.steps(), 3);
        let failure = runner.finish().unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidSite);
        assert_eq!(failure.op_index, 3);
        assert_eq!(failure.sites, vec![5]);
        assert_eq!(failure.report.len(), 1);
        assert_eq!(failure.results.len(), 1);
        assert_eq!(failure.state.n(), 3);
        assert_relative_eq!(failure.state.norm(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn failed_routed_gate_leaves_qubits_in_place() {
        // ∣11⟩⟨11∣ annihilates ∣010⟩ on qubits 0 and 2
        let proj11 =
            na::DMatrix::from_fn(4, 4, |i, j| {
                if i == 3 && j == 3 { C64::from(1.0) } else { C64::from(0.0) }
            });
        let ops: Vec<Operation> = vec![
            Gate::X(1).into(),
            GateOperation::new([0, 2], proj11).unwrap().into(),
        ];
        let failure =
            run(qubits(3), &ops, TruncationPolicy::lossless(), StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NumericFailure);
        assert_eq!(failure.op_index, 1);
        assert!(failure.report.is_empty());
        let psi = failure.state.into_vector().unwrap();
        assert_relative_eq!(psi[2].norm(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(psi[1].norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn bad_operator_shape_is_dimension_mismatch() {
        let op = GateOperation::new([0, 2], na::DMatrix::identity(2, 2)).unwrap();
        let ops = vec![Operation::Gate(op)];
        let failure =
            run(qubits(3), &ops, TruncationPolicy::lossless(), StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::DimensionMismatch);
        assert!(failure.report.is_empty());
    }

    #[test]
    fn runner_policy_truncates() {
        let ops: Vec<Operation> = vec![Gate::H(0).into(), Gate::CX(0, 1).into()];
        let out =
            run(qubits(2), &ops, TruncationPolicy::max_bond(1), StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(out.state.bond_dims(), vec![1]);
        assert_relative_eq!(out.report.total_discarded_mass(), 0.5, epsilon = 1e-10);
    }
}
