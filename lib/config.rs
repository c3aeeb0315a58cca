//! Numerical backend settings and bond truncation policies.
//!
//! Two kinds of configuration exist. [`NumericConfig`] describes the behavior
//! of the dense linear algebra underneath every tensor operation (SVD
//! convergence, what counts as a numerical zero, worker thread count) and is
//! process-wide: it is set at most once with [`NumericConfig::init`], before
//! any [`MPS`][crate::mps::MPS] is constructed, and is afterward read-only.
//! Every `MPS` copies the handle when it is created and passes it down to the
//! factorizations it performs.
//!
//! [`TruncationPolicy`] describes how bonds are truncated after a two-site
//! update. It is read-only during a run, and can be attached to a state or
//! passed per call.
//!
//! Both can be read from JSON via [`SimConfig`].

use once_cell::sync::OnceCell;
use serde::{ Deserialize, Serialize };
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when [`NumericConfig::init`] is called after the global
    /// configuration has already been fixed.
    #[error("numeric configuration has already been initialized")]
    AlreadyInitialized,

    /// Returned when a truncation policy allows a bond dimension of zero.
    #[error("invalid truncation policy: max bond dimension must be at least 1")]
    InvalidMaxBondDim,

    /// Returned when a truncation policy has a negative or non-finite cutoff.
    #[error("invalid truncation policy: cutoff must be finite and non-negative, got {0}")]
    InvalidCutoff(f64),

    /// Returned when a numeric configuration has a negative or non-finite
    /// tolerance.
    #[error("invalid numeric configuration: {0} must be finite and non-negative")]
    InvalidTolerance(&'static str),

    /// Returned when a configuration document can't be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
use ConfigError::*;
pub type ConfigResult<T> = Result<T, ConfigError>;

static NUMERIC: OnceCell<NumericConfig> = OnceCell::new();

/// Settings for the dense linear algebra backend.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericConfig {
    /// Convergence threshold passed to the SVD.
    pub svd_eps: f64,
    /// Maximum number of SVD iterations; zero means no limit.
    pub svd_max_iter: usize,
    /// Singular values at or below `zero_tol` times the spectrum norm are
    /// always discarded as numerical zeros.
    pub zero_tol: f64,
    /// Tolerance used for unitarity and canonical-form checks.
    pub norm_tol: f64,
    /// Number of worker threads for batch execution. `None` uses the number
    /// of logical CPUs.
    pub threads: Option<usize>,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            svd_eps: f64::EPSILON,
            svd_max_iter: 0,
            zero_tol: 1e-14,
            norm_tol: 1e-8,
            threads: None,
        }
    }
}

impl NumericConfig {
    /// Fix the process-wide configuration.
    ///
    /// Fails if the configuration has already been fixed, either by an earlier
    /// call to this function or by a call to [`global`][Self::global].
    pub fn init(config: Self) -> ConfigResult<()> {
        config.validate()?;
        NUMERIC.set(config).map_err(|_| AlreadyInitialized)?;
        tracing::info!(?config, "numeric configuration initialized");
        Ok(())
    }

    /// Return the process-wide configuration.
    ///
    /// If [`init`][Self::init] has not been called, the default configuration
    /// is fixed and returned.
    pub fn global() -> Self { *NUMERIC.get_or_init(Self::default) }

    /// Check that all tolerances are finite and non-negative.
    pub fn validate(&self) -> ConfigResult<()> {
        let check = |x: f64, name: &'static str| {
            (x.is_finite() && x >= 0.0).then_some(()).ok_or(InvalidTolerance(name))
        };
        check(self.svd_eps, "svd_eps")?;
        check(self.zero_tol, "zero_tol")?;
        check(self.norm_tol, "norm_tol")?;
        Ok(())
    }

    /// Return the number of worker threads to use.
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Specify how singular values are discarded when a bond is re-factored.
///
/// A singular value σ survives if it exceeds the cutoff, which is taken
/// relative to the norm of the full spectrum when `relative` is set. At most
/// `max_bond_dim` of the survivors are kept, and at least one value is always
/// kept.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationPolicy {
    /// Upper bound on any bond dimension. Must be at least 1.
    pub max_bond_dim: usize,
    /// Threshold on singular values. Must be non-negative.
    pub cutoff: f64,
    /// Whether `cutoff` is relative to the norm of the singular values.
    pub relative: bool,
}

impl Default for TruncationPolicy {
    fn default() -> Self { Self::lossless() }
}

impl TruncationPolicy {
    /// Create a new policy, checking its parameters.
    pub fn new(max_bond_dim: usize, cutoff: f64, relative: bool)
        -> ConfigResult<Self>
    {
        let policy = Self { max_bond_dim, cutoff, relative };
        policy.validate()?;
        Ok(policy)
    }

    /// A policy that only drops numerical zeros.
    pub fn lossless() -> Self {
        Self { max_bond_dim: usize::MAX, cutoff: 0.0, relative: true }
    }

    /// A policy that caps the bond dimension but imposes no cutoff.
    pub fn max_bond(max_bond_dim: usize) -> Self {
        Self { max_bond_dim, ..Self::lossless() }
    }

    /// A policy with a relative cutoff and no cap on the bond dimension.
    pub fn relative_cutoff(cutoff: f64) -> Self {
        Self { cutoff, ..Self::lossless() }
    }

    /// Check `max_bond_dim ≥ 1` and `cutoff ≥ 0`.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_bond_dim == 0 { return Err(InvalidMaxBondDim); }
        if !self.cutoff.is_finite() || self.cutoff < 0.0 {
            return Err(InvalidCutoff(self.cutoff));
        }
        Ok(())
    }

    /// Return the threshold a singular value must exceed to survive, given
    /// the norm of the spectrum it belongs to.
    pub fn threshold(&self, norm: f64) -> f64 {
        if self.relative { self.cutoff * norm } else { self.cutoff }
    }
}

/// Top-level configuration document.
///
/// ```
/// use mps_circuit::config::SimConfig;
///
/// let config = SimConfig::from_json_str(r#"
///     { "truncation": { "max_bond_dim": 16, "cutoff": 1e-10 } }
/// "#).unwrap();
/// assert_eq!(config.truncation.max_bond_dim, 16);
/// assert!(config.truncation.relative);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub numeric: NumericConfig,
    pub truncation: TruncationPolicy,
}

impl SimConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.numeric.validate()?;
        config.truncation.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_validation() {
        assert!(TruncationPolicy::new(0, 0.0, true).is_err());
        assert!(TruncationPolicy::new(4, -1.0, true).is_err());
        assert!(TruncationPolicy::new(4, f64::NAN, false).is_err());
        assert!(TruncationPolicy::new(1, 0.0, false).is_ok());
    }

    #[test]
    fn policy_threshold() {
        let rel = TruncationPolicy::relative_cutoff(0.1);
        assert_eq!(rel.threshold(2.0), 0.2);
        let abs = TruncationPolicy { relative: false, ..rel };
        assert_eq!(abs.threshold(2.0), 0.1);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = SimConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimConfig::default());
        let config =
            SimConfig::from_json_str(r#"{ "numeric": { "threads": 3 } }"#)
            .unwrap();
        assert_eq!(config.numeric.threads(), 3);
        assert_eq!(config.numeric.zero_tol, NumericConfig::default().zero_tol);
    }

    #[test]
    fn config_rejects_bad_policy() {
        let res = SimConfig::from_json_str(
            r#"{ "truncation": { "max_bond_dim": 0 } }"#);
        assert!(matches!(res, Err(InvalidMaxBondDim)));
        let res = SimConfig::from_json_str("{ not json");
        assert!(matches!(res, Err(Parse(_))));
    }
}
