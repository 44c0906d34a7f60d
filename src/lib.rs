//!
//! CTC-style denominator computation over a compact HMM
//!
//! Forward/backward (alpha/beta) recursions run jointly over a batch of
//! independent sequences, on a compact HMM whose states are history states and
//! whose transitions are labelled by phones or blank.
//!
//! * `tensor`: strided 3-D copy and the (sequence-major) <-> (time-major)
//!   rearrangement of network outputs
//! * `cctc::hmm`: flattened transition table and initial probabilities
//! * `cctc::forward` / `cctc::backward`: rescaled recursions and gradients
//! * `backend`: sequential or rayon-parallel execution of per-frame cells
//!
pub mod backend;
pub mod cctc;
pub mod error;
pub mod model;
pub mod prob;
pub mod tensor;

pub mod prelude;

#[cfg(test)]
#[macro_use]
extern crate approx;
