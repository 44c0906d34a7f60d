//!
//! `NegativeComputation`: the per-batch state of the denominator computation
//!
//! Lifecycle: `new` rearranges the inputs, `forward` fills the alpha table and
//! returns the total log-likelihood, `backward` consumes the alpha table and
//! returns the gradients. The object is then discarded.
//!
use super::hmm::CctcHmm;
use super::params::CctcParams;
use crate::backend::Backend;
use crate::error::{CctcError, Result};
use crate::model::TransitionModel;
use crate::tensor::rearrange_nnet_output;
use log::debug;
use ndarray::{Array2, ArrayView2};

///
/// Denominator (negative) part of the CTC objective for a batch of
/// `num_sequences` sequences of `num_time_steps` frames each.
///
/// Tables are time-major: row t, column `h * num_sequences + s`.
///
#[derive(Debug, Clone)]
pub struct NegativeComputation<'a> {
    pub(super) hmm: &'a CctcHmm,
    pub(super) backend: Backend,
    pub(super) num_sequences: usize,
    pub(super) num_time_steps: usize,
    /// number of network outputs consumed by transitions
    pub(super) numerator_dim: usize,
    pub(super) num_hmm_states: usize,
    /// number of columns of the (exp'd) network output
    pub(super) nnet_output_dim: usize,
    /// `(T, numerator_dim * S)`
    pub(super) numerators_rearranged: Array2<f32>,
    /// `(T, H * S)`
    pub(super) denominators_rearranged: Array2<f32>,
    /// `(T + 1, H * S)`, rescaled alphas
    pub(super) alpha: Array2<f32>,
    /// `(2, H * S)`, betas of frame t are in row `t % 2`
    pub(super) beta: Array2<f32>,
    /// `\sum_h alpha[T][h, s]` for each sequence, set by `forward`
    pub(super) tot_prob: Option<Vec<f32>>,
    /// corrected log-likelihood of each sequence, set by `forward`
    pub(super) tot_log_probs: Vec<f64>,
}

impl<'a> NegativeComputation<'a> {
    ///
    /// Set up the computation for a batch.
    ///
    /// * `exp_nnet_output`: `(S * T, nnet_output_dim)` exp'd network output,
    ///   sequence-major. Only the first `trans_model.n_numerator_outputs()`
    ///   columns are used.
    /// * `denominators`: `(S * T, n_history_states)`
    ///
    pub fn new<M: TransitionModel>(
        trans_model: &M,
        hmm: &'a CctcHmm,
        exp_nnet_output: ArrayView2<f32>,
        denominators: ArrayView2<f32>,
        num_sequences: usize,
        params: &CctcParams,
    ) -> Result<Self> {
        let n_rows = exp_nnet_output.nrows();
        if num_sequences == 0 {
            return Err(CctcError::EmptyBatch);
        }
        if n_rows % num_sequences != 0 {
            return Err(CctcError::NotDivisible {
                what: "exp_nnet_output",
                rows: n_rows,
                num_sequences,
            });
        }
        if denominators.nrows() != n_rows {
            return Err(CctcError::ShapeMismatch {
                what: "denominators rows",
                expected: n_rows,
                actual: denominators.nrows(),
            });
        }
        let num_hmm_states = trans_model.n_history_states();
        if hmm.n_hmm_states() != num_hmm_states {
            return Err(CctcError::ShapeMismatch {
                what: "hmm states",
                expected: num_hmm_states,
                actual: hmm.n_hmm_states(),
            });
        }
        if denominators.ncols() != num_hmm_states {
            return Err(CctcError::ShapeMismatch {
                what: "denominators columns",
                expected: num_hmm_states,
                actual: denominators.ncols(),
            });
        }
        let numerator_dim = trans_model.n_numerator_outputs();
        if exp_nnet_output.ncols() < numerator_dim {
            return Err(CctcError::ShapeMismatch {
                what: "exp_nnet_output columns (at least)",
                expected: numerator_dim,
                actual: exp_nnet_output.ncols(),
            });
        }
        if let Some(t) = hmm.transitions().iter().find(|t| t.num_index >= numerator_dim) {
            return Err(CctcError::InvalidModel(format!(
                "transition uses output {} but the model has {} numerator outputs",
                t.num_index, numerator_dim
            )));
        }

        let num_time_steps = n_rows / num_sequences;
        let backend = params.backend;
        // zero frames: nothing to rearrange, the log-likelihood is log \sum_h init[h]
        let (numerators_rearranged, denominators_rearranged) = if num_time_steps == 0 {
            (
                Array2::zeros((0, numerator_dim * num_sequences)),
                Array2::zeros((0, num_hmm_states * num_sequences)),
            )
        } else {
            (
                rearrange_nnet_output(&backend, exp_nnet_output, 0..numerator_dim, num_time_steps),
                rearrange_nnet_output(&backend, denominators, 0..num_hmm_states, num_time_steps),
            )
        };
        debug!(
            "cctc batch: S={} T={} H={} numerator_dim={} backend={}",
            num_sequences, num_time_steps, num_hmm_states, numerator_dim, backend
        );

        Ok(NegativeComputation {
            hmm,
            backend,
            num_sequences,
            num_time_steps,
            numerator_dim,
            num_hmm_states,
            nnet_output_dim: exp_nnet_output.ncols(),
            numerators_rearranged,
            denominators_rearranged,
            alpha: Array2::zeros((num_time_steps + 1, num_hmm_states * num_sequences)),
            beta: Array2::zeros((2, num_hmm_states * num_sequences)),
            tot_prob: None,
            tot_log_probs: Vec::new(),
        })
    }
    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }
    pub fn num_time_steps(&self) -> usize {
        self.num_time_steps
    }
    pub fn backend(&self) -> Backend {
        self.backend
    }
    ///
    /// Log-likelihood of each sequence, available after `forward`.
    /// Their sum is the value returned by `forward`.
    ///
    pub fn tot_log_probs(&self) -> &[f64] {
        &self.tot_log_probs
    }
    ///
    /// Rescaled alpha of state `h` of sequence `s` at frame `t` (`0 <= t <= T`)
    ///
    pub fn alpha(&self, t: usize, h: usize, s: usize) -> f32 {
        self.alpha[[t, h * self.num_sequences + s]]
    }
}

///
/// Set up the computation and run its forward pass.
///
/// Returns the computation (to be used for `backward`) and the total
/// log-likelihood summed over the sequences.
///
pub fn forward<'a, M: TransitionModel>(
    trans_model: &M,
    hmm: &'a CctcHmm,
    exp_nnet_output: ArrayView2<f32>,
    denominators: ArrayView2<f32>,
    num_sequences: usize,
    params: &CctcParams,
) -> Result<(NegativeComputation<'a>, f64)> {
    let mut computation = NegativeComputation::new(
        trans_model,
        hmm,
        exp_nnet_output,
        denominators,
        num_sequences,
        params,
    )?;
    let tot_log_prob = computation.forward();
    Ok((computation, tot_log_prob))
}

//
// row access of standard layout tables
//

/// Row `t` of a table as a slice
pub(super) fn row(table: &Array2<f32>, t: usize) -> &[f32] {
    let n = table.ncols();
    let data = table.as_slice().expect("table is in standard layout");
    &data[t * n..(t + 1) * n]
}

/// Row `t` of a table as a mutable slice
pub(super) fn row_mut(table: &mut Array2<f32>, t: usize) -> &mut [f32] {
    let n = table.ncols();
    let data = table.as_slice_mut().expect("table is in standard layout");
    &mut data[t * n..(t + 1) * n]
}

/// Row `src` for reading and row `dst` for writing, `src != dst`
pub(super) fn row_pair_mut(table: &mut Array2<f32>, src: usize, dst: usize) -> (&[f32], &mut [f32]) {
    assert_ne!(src, dst);
    let n = table.ncols();
    let data = table.as_slice_mut().expect("table is in standard layout");
    if src < dst {
        let (head, tail) = data.split_at_mut(dst * n);
        (&head[src * n..(src + 1) * n], &mut tail[..n])
    } else {
        let (head, tail) = data.split_at_mut(src * n);
        (&tail[..n], &mut head[dst * n..(dst + 1) * n])
    }
}
