//!
//! Backward (beta) pass and gradients of the denominator computation
//!
//! Betas here carry a `1 / (total prob)` factor and the same rescaling as the
//! alphas, so that `alpha * (term) * beta` is directly an occupation
//! probability.
//!
use super::computation::{row, row_mut, row_pair_mut, NegativeComputation};
use crate::backend::Executor;
use crate::error::{CctcError, Result};
use crate::tensor::rearrange_nnet_output_reverse;
use log::debug;
use ndarray::{s, Array2};
use std::time::Instant;

///
/// Per-cell scratch of `beta_general_frame`.
///
/// One chunk of `n_childs + 2` values per `(h, s)` cell, in the order
/// `h * num_sequences + s`:
///
/// ```text
/// [ occupation of childs(h)[0] | ... | occupation of childs(h)[n_childs-1] | beta | den_deriv ]
/// ```
///
struct BetaScratch {
    n_childs: usize,
    data: Vec<f32>,
}

impl BetaScratch {
    fn new(n_cells: usize, n_childs: usize) -> Self {
        BetaScratch {
            n_childs,
            data: vec![0.0; n_cells * (n_childs + 2)],
        }
    }
    fn cell_size(&self) -> usize {
        self.n_childs + 2
    }
    fn cell(&self, i: usize) -> &[f32] {
        let n = self.cell_size();
        &self.data[i * n..(i + 1) * n]
    }
}

impl<'a> NegativeComputation<'a> {
    ///
    /// Run the backward algorithm and return
    /// `(nnet_output_deriv, denominators_deriv)`, shaped like the
    /// `exp_nnet_output` and `denominators` given to `new`.
    ///
    /// * `nnet_output_deriv[:, i]` = d(log P) / d(log num[i]) for numerator
    ///   columns, zero for the other columns
    /// * `denominators_deriv[:, h]` = d(log P) / d(den[h])
    ///
    pub fn backward(&mut self) -> Result<(Array2<f32>, Array2<f32>)> {
        let n_rows = self.num_sequences * self.num_time_steps;
        let mut nnet_output_deriv = Array2::zeros((n_rows, self.nnet_output_dim));
        let mut denominators_deriv = Array2::zeros((n_rows, self.num_hmm_states));
        self.backward_into(&mut nnet_output_deriv, &mut denominators_deriv)?;
        Ok((nnet_output_deriv, denominators_deriv))
    }
    ///
    /// `backward` writing into caller-provided matrices, which must be in
    /// standard (row-major, contiguous) layout.
    /// Every element of both matrices is overwritten.
    ///
    pub fn backward_into(
        &mut self,
        nnet_output_deriv: &mut Array2<f32>,
        denominators_deriv: &mut Array2<f32>,
    ) -> Result<()> {
        let tot_prob = self.tot_prob.clone().ok_or(CctcError::ForwardNotRun)?;
        let n_rows = self.num_sequences * self.num_time_steps;
        if nnet_output_deriv.dim() != (n_rows, self.nnet_output_dim) {
            return Err(CctcError::ShapeMismatch {
                what: "nnet_output_deriv elements",
                expected: n_rows * self.nnet_output_dim,
                actual: nnet_output_deriv.len(),
            });
        }
        if denominators_deriv.dim() != (n_rows, self.num_hmm_states) {
            return Err(CctcError::ShapeMismatch {
                what: "denominators_deriv elements",
                expected: n_rows * self.num_hmm_states,
                actual: denominators_deriv.len(),
            });
        }
        if !nnet_output_deriv.is_standard_layout() {
            return Err(CctcError::NotStandardLayout {
                what: "nnet_output_deriv",
            });
        }
        if !denominators_deriv.is_standard_layout() {
            return Err(CctcError::NotStandardLayout {
                what: "denominators_deriv",
            });
        }
        if self.num_time_steps == 0 {
            return Ok(());
        }
        let start = Instant::now();

        // accumulated over transitions, so it must start from zero
        let mut log_numerator_derivs =
            Array2::zeros((self.num_time_steps, self.numerator_dim * self.num_sequences));
        // every element is set by beta_general_frame
        let mut denominator_derivs =
            Array2::zeros((self.num_time_steps, self.num_hmm_states * self.num_sequences));
        let mut scratch = BetaScratch::new(
            self.num_hmm_states * self.num_sequences,
            self.hmm.n_phones() + 1,
        );

        self.beta_last_frame(&tot_prob);
        for t in (0..self.num_time_steps).rev() {
            self.beta_general_frame(
                t,
                &mut scratch,
                &mut log_numerator_derivs,
                &mut denominator_derivs,
            );
        }

        let backend = self.backend;
        rearrange_nnet_output_reverse(
            &backend,
            log_numerator_derivs.view(),
            nnet_output_deriv,
            0..self.numerator_dim,
        );
        // no gradient flows to the outputs not consumed by transitions
        nnet_output_deriv
            .slice_mut(s![.., self.numerator_dim..])
            .fill(0.0);
        rearrange_nnet_output_reverse(
            &backend,
            denominator_derivs.view(),
            denominators_deriv,
            0..self.num_hmm_states,
        );
        debug!(
            "cctc backward: {}us ({})",
            start.elapsed().as_micros(),
            backend
        );
        Ok(())
    }
    ///
    /// `beta[T][h, s] = 1 / tot_prob[s]` for every state: there is no final
    /// probability, every state ends the sequence with probability one.
    ///
    fn beta_last_frame(&mut self, tot_prob: &[f32]) {
        let num_sequences = self.num_sequences;
        let last_frame_beta = row_mut(&mut self.beta, self.num_time_steps % 2);
        self.backend
            .fill(last_frame_beta, |i| 1.0 / tot_prob[i % num_sequences]);
    }
    ///
    /// beta and gradients of frame `t` (`0 <= t < T`) from the beta of
    /// frame `t + 1`.
    ///
    /// ```text
    /// common[h]     = 1 / (den[h, t] alpha[t][sp])
    /// occupation[h] = common[h] alpha[t][h]
    /// var[h -> g]   = p(h -> g) beta[t+1][g] num[i(h -> g), t]
    ///
    /// log_num_deriv[i(h -> g), t] += var[h -> g] occupation[h]
    /// den_deriv[h, t]              = -\sum_g var[h -> g] occupation[h] / den[h, t]
    /// beta[t][h]                   =  \sum_g var[h -> g] common[h]
    /// ```
    ///
    /// Every `(h, s)` cell is computed independently into `scratch`. Several
    /// transitions can share an output index, so the occupations are then
    /// added into `log_num_deriv` in a fixed order (cell, then transition),
    /// the same for every executor.
    ///
    fn beta_general_frame(
        &mut self,
        t: usize,
        scratch: &mut BetaScratch,
        log_numerator_derivs: &mut Array2<f32>,
        denominator_derivs: &mut Array2<f32>,
    ) {
        assert!(t < self.num_time_steps);
        let hmm = self.hmm;
        let num_sequences = self.num_sequences;
        let n_cells = self.num_hmm_states * num_sequences;
        let n_childs = scratch.n_childs;
        let special_hmm_state = hmm.special_hmm_state();
        let this_alpha = row(&self.alpha, t);
        let num_probs = row(&self.numerators_rearranged, t);
        let den_probs = row(&self.denominators_rearranged, t);
        let (next_beta, this_beta) = row_pair_mut(&mut self.beta, (t + 1) % 2, t % 2);

        let cell_size = scratch.cell_size();
        self.backend
            .for_each_chunk(&mut scratch.data, cell_size, n_cells, |i, cell| {
                let h = i / num_sequences;
                let s = i % num_sequences;
                let inv_arbitrary_scale = this_alpha[special_hmm_state * num_sequences + s];
                let this_den_prob = den_probs[i];
                let common_factor = 1.0 / (this_den_prob * inv_arbitrary_scale);
                let occupation_factor = common_factor * this_alpha[i];
                let mut tot_variable_factor = 0.0f64;
                for (k, trans) in hmm.childs(h).iter().enumerate() {
                    let variable_factor = trans.transition_prob
                        * next_beta[trans.hmm_state * num_sequences + s]
                        * num_probs[trans.num_index * num_sequences + s];
                    tot_variable_factor += variable_factor as f64;
                    cell[k] = variable_factor * occupation_factor;
                }
                cell[n_childs] = (tot_variable_factor * common_factor as f64) as f32;
                cell[n_childs + 1] = (-tot_variable_factor * occupation_factor as f64
                    / this_den_prob as f64) as f32;
            });

        let log_num_deriv = row_mut(log_numerator_derivs, t);
        let den_deriv = row_mut(denominator_derivs, t);
        for i in 0..n_cells {
            let h = i / num_sequences;
            let s = i % num_sequences;
            let cell = scratch.cell(i);
            for (trans, &occupation) in hmm.childs(h).iter().zip(cell.iter()) {
                log_num_deriv[trans.num_index * num_sequences + s] += occupation;
            }
            this_beta[i] = cell[n_childs];
            den_deriv[i] = cell[n_childs + 1];
        }
    }
}
