//!
//! Unscaled forward recursion in log space
//!
//! Straightforward definition of the log-likelihood, without the rescaling
//! and without the time-major rearrangement. Slow; used to check
//! `NegativeComputation::forward`.
//!
use super::hmm::CctcHmm;
use crate::prob::{p, Prob};
use ndarray::ArrayView2;

///
/// Log-likelihood of each sequence of a sequence-major batch.
///
/// ```text
/// F[0][h] = init[h]
/// F[t][h] = \sum_{g -> h} F[t-1][g] p(g -> h) num[i(g -> h), t-1] / den[g, t-1]
/// log P = log \sum_h F[T][h]
/// ```
///
pub fn log_likelihood(
    hmm: &CctcHmm,
    exp_nnet_output: ArrayView2<f32>,
    denominators: ArrayView2<f32>,
    num_sequences: usize,
) -> Vec<f64> {
    assert!(num_sequences > 0);
    assert_eq!(exp_nnet_output.nrows() % num_sequences, 0);
    assert_eq!(exp_nnet_output.nrows(), denominators.nrows());
    let num_time_steps = exp_nnet_output.nrows() / num_sequences;
    let n = hmm.n_hmm_states();

    (0..num_sequences)
        .map(|s| {
            let mut f: Vec<Prob> = hmm.initial_probs().iter().map(|&x| p(x as f64)).collect();
            for t in 0..num_time_steps {
                let r = s * num_time_steps + t;
                f = (0..n)
                    .map(|h| {
                        hmm.parents(h)
                            .iter()
                            .map(|trans| {
                                let g = trans.hmm_state;
                                f[g] * p(trans.transition_prob as f64)
                                    * p(exp_nnet_output[[r, trans.num_index]] as f64)
                                    / p(denominators[[r, g]] as f64)
                            })
                            .sum::<Prob>()
                    })
                    .collect();
            }
            f.into_iter().sum::<Prob>().to_log_value()
        })
        .collect()
}
