//!
//! Error types of the cctc computation
//!
//! Only precondition violations detected at the entry of a computation are
//! reported as `CctcError`. Broken internal invariants (NaN in the forward
//! sums, a transition table of the wrong size) are fatal and panic.
//!
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CctcError {
    /// a row count is not a multiple of the number of sequences
    #[error("{what}: {rows} rows is not divisible by {num_sequences} sequences")]
    NotDivisible {
        what: &'static str,
        rows: usize,
        num_sequences: usize,
    },

    /// a matrix dimension differs from what the transition model requires
    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// an output matrix is not contiguous in row-major order
    #[error("{what}: expected a matrix in standard layout")]
    NotStandardLayout { what: &'static str },

    /// no sequence in the batch
    #[error("empty batch")]
    EmptyBatch,

    /// the transition model refers to a state or an output that does not exist
    #[error("invalid transition model: {0}")]
    InvalidModel(String),

    /// `backward` was called on a computation whose `forward` has not run
    #[error("backward called before forward")]
    ForwardNotRun,
}

pub type Result<T> = std::result::Result<T, CctcError>;
