//!
//! Mock transition models and network outputs for testing
//!
//! In all mocks phone 0 is blank. Blank keeps the history state and consumes
//! the blank output of that state; phone transitions consume one of the tree
//! outputs.
//!
use crate::model::{DenseTransitionModel, GraphLabel, TransitionModel};
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

///
/// One history state and one phone. Both the phone (output 0) and blank
/// (output 1) loop back to the state with the same `lm_prob`.
///
pub fn mock_single_state_model(lm_prob: f32) -> DenseTransitionModel {
    DenseTransitionModel::from_fn(1, 1, 1, 1, |_, p| {
        if p == 0 {
            GraphLabel::new(lm_prob, 1, 0)
        } else {
            GraphLabel::new(lm_prob, 0, 0)
        }
    })
    .unwrap()
}

///
/// Two history states ("after blank" = 0, "after phone" = 1) and one phone.
///
/// ```text
/// state 0: blank -> 0 (p=0.3, output 1), phone -> 1 (p=0.7, output 0)
/// state 1: blank -> 1 (p=0.6, output 2), phone -> 1 (p=0.4, output 0)
/// ```
///
pub fn mock_two_state_model() -> DenseTransitionModel {
    DenseTransitionModel::new(
        2,
        1,
        1,
        2,
        vec![
            GraphLabel::new(0.3, 1, 0),
            GraphLabel::new(0.7, 0, 1),
            GraphLabel::new(0.6, 2, 1),
            GraphLabel::new(0.4, 0, 1),
        ],
    )
    .unwrap()
}

///
/// Random transition model
///
/// * each phone has two tree outputs, picked at random per (state, phone)
/// * each state has its own blank output
/// * phone transitions go to a random state
/// * lm probs of a state are random and sum to one
///
pub fn mock_random_model(n_states: usize, n_phones: usize, seed: u64) -> DenseTransitionModel {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let n_tree_indexes = 2 * n_phones;
    let mut labels = Vec::with_capacity(n_states * (n_phones + 1));
    for h in 0..n_states {
        let weights: Vec<f32> = (0..=n_phones).map(|_| rng.gen_range(0.1..1.0)).collect();
        let total: f32 = weights.iter().sum();
        for (p, w) in weights.iter().enumerate() {
            let label = if p == 0 {
                GraphLabel::new(w / total, n_tree_indexes + h, h)
            } else {
                GraphLabel::new(
                    w / total,
                    2 * (p - 1) + rng.gen_range(0..2),
                    rng.gen_range(0..n_states),
                )
            };
            labels.push(label);
        }
    }
    DenseTransitionModel::new(n_states, n_phones, n_tree_indexes, n_states, labels).unwrap()
}

///
/// Random positive matrix with entries in `[0.1, 1.0)`
///
pub fn mock_probs(n_rows: usize, n_cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, n_cols), |_| rng.gen_range(0.1..1.0))
}

///
/// Random (exp'd network output, denominators) of a batch of sequences.
///
/// The network output has the numerator columns followed by
/// `n_blank_indexes` extra columns that are not consumed by transitions.
///
pub fn mock_batch<M: TransitionModel>(
    trans_model: &M,
    num_sequences: usize,
    num_time_steps: usize,
    seed: u64,
) -> (Array2<f32>, Array2<f32>) {
    let n_rows = num_sequences * num_time_steps;
    let nnet_output_dim = trans_model.n_numerator_outputs() + trans_model.n_blank_indexes();
    let exp_nnet_output = mock_probs(n_rows, nnet_output_dim, seed);
    let denominators = mock_probs(n_rows, trans_model.n_history_states(), seed + 1);
    (exp_nnet_output, denominators)
}

///
/// Stack `k` copies of a single-sequence input into a sequence-major batch.
///
pub fn repeat_sequence(single: &Array2<f32>, k: usize) -> Array2<f32> {
    let n = single.nrows();
    Array2::from_shape_fn((n * k, single.ncols()), |(i, j)| single[[i % n, j]])
}
