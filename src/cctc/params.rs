//!
//! Parameters of the cctc computation
//!
use crate::backend::Backend;
use serde::{Deserialize, Serialize};

/// Default number of propagation iterations used to approximate the
/// stationary distribution of the HMM.
pub const DEFAULT_INITIAL_PROB_ITERS: usize = 20;

///
/// Parameters of `CctcHmm` construction and `NegativeComputation`
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CctcParams {
    ///
    /// number of HMM propagation iterations from the uniform distribution
    /// before taking the initial probabilities
    pub n_initial_prob_iters: usize,
    ///
    /// executor of the per-frame work
    pub backend: Backend,
}

impl CctcParams {
    pub fn new(n_initial_prob_iters: usize, backend: Backend) -> CctcParams {
        CctcParams {
            n_initial_prob_iters,
            backend,
        }
    }
    /// default parameters with rayon parallel execution
    pub fn parallel() -> CctcParams {
        CctcParams::new(DEFAULT_INITIAL_PROB_ITERS, Backend::Parallel)
    }
    /// default parameters with sequential execution
    pub fn sequential() -> CctcParams {
        CctcParams::new(DEFAULT_INITIAL_PROB_ITERS, Backend::Sequential)
    }
    ///
    /// Parse from json, e.g. `{"n_initial_prob_iters": 10, "backend": "parallel"}`.
    /// Missing fields take the default value.
    pub fn from_json(s: &str) -> serde_json::Result<CctcParams> {
        serde_json::from_str(s)
    }
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("CctcParams is always serializable")
    }
}

impl Default for CctcParams {
    fn default() -> Self {
        CctcParams::sequential()
    }
}

impl std::fmt::Display for CctcParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "n_initial_prob_iters: {}", self.n_initial_prob_iters)?;
        writeln!(f, "backend: {}", self.backend)
    }
}
