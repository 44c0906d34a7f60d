//!
//! Forward (alpha) pass of the denominator computation
//!
use super::computation::{row, row_mut, row_pair_mut, NegativeComputation};
use crate::backend::Executor;
use log::{debug, warn};
use std::time::Instant;

impl<'a> NegativeComputation<'a> {
    ///
    /// Run the forward algorithm over all frames and return the total
    /// log-likelihood of the batch (sum over sequences).
    ///
    /// Panics if a NaN or infinity appears in the alpha sums.
    ///
    pub fn forward(&mut self) -> f64 {
        let start = Instant::now();
        self.alpha_first_frame();
        for t in 1..=self.num_time_steps {
            self.alpha_general_frame(t);
        }
        let tot_log_prob = self.compute_tot_log_like();
        debug!(
            "cctc forward: tot_log_prob={} ({}us, {})",
            tot_log_prob,
            start.elapsed().as_micros(),
            self.backend
        );
        tot_log_prob
    }
    ///
    /// `alpha[0][h, s] = init[h]` for every sequence
    ///
    fn alpha_first_frame(&mut self) {
        let init = self.hmm.initial_probs();
        let num_sequences = self.num_sequences;
        let first_frame_alpha = row_mut(&mut self.alpha, 0);
        self.backend
            .fill(first_frame_alpha, |i| init[i / num_sequences]);
    }
    ///
    /// alpha of frame `t` (`0 < t <= T`) from frame `t - 1`, using the
    /// network outputs of frame `t - 1`.
    ///
    /// ```text
    /// alpha[t][h, s] = (1 / alpha[t-1][sp, s])
    ///     \sum_{g -> h} alpha[t-1][g, s] p(g -> h) num[i(g -> h), t-1, s] / den[g, t-1, s]
    /// ```
    ///
    fn alpha_general_frame(&mut self, t: usize) {
        assert!(t > 0 && t <= self.num_time_steps);
        let hmm = self.hmm;
        let num_sequences = self.num_sequences;
        let special_hmm_state = hmm.special_hmm_state();
        let num_probs = row(&self.numerators_rearranged, t - 1);
        let den_probs = row(&self.denominators_rearranged, t - 1);
        let (prev_alpha, this_alpha) = row_pair_mut(&mut self.alpha, t - 1, t);

        self.backend.fill(this_alpha, |i| {
            let h = i / num_sequences;
            let s = i % num_sequences;
            let mut this_tot_alpha = 0.0f64;
            for trans in hmm.parents(h) {
                let prev_hmm_state = trans.hmm_state;
                let den = den_probs[prev_hmm_state * num_sequences + s] as f64;
                let num = num_probs[trans.num_index * num_sequences + s] as f64;
                let this_prev_alpha = prev_alpha[prev_hmm_state * num_sequences + s] as f64;
                this_tot_alpha += this_prev_alpha * trans.transition_prob as f64 * num / den;
            }
            // the same factor is applied to every state of this sequence and
            // frame, so it cancels in the posteriors; the log-likelihood is
            // corrected in compute_tot_log_like.
            let arbitrary_scale = 1.0 / prev_alpha[special_hmm_state * num_sequences + s] as f64;
            let scaled = (this_tot_alpha * arbitrary_scale) as f32;
            // also catches a finite f64 sum outside the f32 range
            assert!(
                this_tot_alpha - this_tot_alpha == 0.0 && scaled - scaled == 0.0,
                "non-finite alpha at frame {} (state {}, sequence {}): sum={} scale={}",
                t,
                h,
                s,
                this_tot_alpha,
                arbitrary_scale
            );
            scaled
        });
    }
    ///
    /// Total log-likelihood, corrected for the rescaling:
    ///
    /// ```text
    /// log P(s) = log \sum_h alpha[T][h, s] + \sum_{t=0}^{T-1} log alpha[t][sp, s]
    /// ```
    ///
    /// `alpha[t][sp, s]` is the inverse of the scale applied when computing
    /// frame `t + 1`.
    ///
    fn compute_tot_log_like(&mut self) -> f64 {
        let num_sequences = self.num_sequences;
        let num_hmm_states = self.num_hmm_states;
        let special_hmm_state = self.hmm.special_hmm_state();

        let last_alpha = row(&self.alpha, self.num_time_steps);
        let tot_prob: Vec<f32> = (0..num_sequences)
            .map(|s| {
                (0..num_hmm_states)
                    .map(|h| last_alpha[h * num_sequences + s] as f64)
                    .sum::<f64>() as f32
            })
            .collect();
        for (s, &p) in tot_prob.iter().enumerate() {
            assert!(
                p.is_finite(),
                "non-finite total probability of sequence {}: {}",
                s,
                p
            );
        }

        let tot_log_probs: Vec<f64> = tot_prob
            .iter()
            .enumerate()
            .map(|(s, &p)| {
                if !(p > 0.0) {
                    warn!("sequence {} has total probability {}", s, p);
                }
                let log_inv_arbitrary_scales: f64 = (0..self.num_time_steps)
                    .map(|t| (self.alpha[[t, special_hmm_state * num_sequences + s]] as f64).ln())
                    .sum();
                (p as f64).ln() + log_inv_arbitrary_scales
            })
            .collect();

        self.tot_prob = Some(tot_prob);
        self.tot_log_probs = tot_log_probs;
        self.tot_log_probs.iter().sum()
    }
}
