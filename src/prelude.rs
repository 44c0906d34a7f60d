//!
//! globally-available parts
//!
pub use crate::backend::{Backend, Executor};
pub use crate::cctc::computation::{forward, NegativeComputation};
pub use crate::cctc::hmm::CctcHmm;
pub use crate::cctc::params::CctcParams;
pub use crate::error::{CctcError, Result};
pub use crate::model::{DenseTransitionModel, GraphLabel, TransitionModel};
pub use ndarray::{Array2, ArrayView2};
