//!
//! test of the whole forward/backward computation
//!
#[macro_use]
extern crate approx;

use cctc::cctc::mocks::{
    mock_batch, mock_random_model, mock_single_state_model, mock_two_state_model,
    repeat_sequence,
};
use cctc::cctc::reference;
use cctc::prelude::*;
use itertools::izip;
use rayon::prelude::*;
use test_case::test_case;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn log_likelihood<M: TransitionModel>(
    m: &M,
    hmm: &CctcHmm,
    x: &Array2<f32>,
    d: &Array2<f32>,
    num_sequences: usize,
) -> f64 {
    let (_, ll) = forward(m, hmm, x.view(), d.view(), num_sequences, &CctcParams::default()).unwrap();
    ll
}

///
/// Compare the gradients with central differences of the log-likelihood.
/// Numerators are perturbed in log space, denominators linearly by a step
/// proportional to their value.
///
fn check_gradients<M: TransitionModel>(m: &M, num_sequences: usize, num_time_steps: usize, seed: u64) {
    let hmm = CctcHmm::new(m);
    let (x, d) = mock_batch(m, num_sequences, num_time_steps, seed);
    let (mut c, _) = forward(m, &hmm, x.view(), d.view(), num_sequences, &CctcParams::default()).unwrap();
    let (gx, gd) = c.backward().unwrap();
    let eps = 1e-2;

    for r in 0..x.nrows() {
        for i in 0..m.n_numerator_outputs() {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[[r, i]] *= (eps as f32).exp();
            xm[[r, i]] *= (-eps as f32).exp();
            let diff = (log_likelihood(m, &hmm, &xp, &d, num_sequences)
                - log_likelihood(m, &hmm, &xm, &d, num_sequences))
                / (2.0 * eps);
            assert_abs_diff_eq!(gx[[r, i]] as f64, diff, epsilon = 2e-3);
        }
        for h in 0..m.n_history_states() {
            let step = eps as f32 * d[[r, h]];
            let mut dp = d.clone();
            let mut dm = d.clone();
            dp[[r, h]] += step;
            dm[[r, h]] -= step;
            let diff = (log_likelihood(m, &hmm, &x, &dp, num_sequences)
                - log_likelihood(m, &hmm, &x, &dm, num_sequences))
                / (dp[[r, h]] - dm[[r, h]]) as f64;
            assert_abs_diff_eq!(gd[[r, h]] as f64, diff, epsilon = 5e-3 * (1.0 + diff.abs()));
        }
    }
}

#[test]
fn finite_differences_two_states() {
    init_logger();
    check_gradients(&mock_two_state_model(), 1, 3, 0);
}

#[test_case(3, 2, 2, 4, 1)]
#[test_case(4, 1, 3, 5, 2)]
fn finite_differences_random(
    n_states: usize,
    n_phones: usize,
    num_sequences: usize,
    num_time_steps: usize,
    seed: u64,
) {
    init_logger();
    check_gradients(&mock_random_model(n_states, n_phones, seed), num_sequences, num_time_steps, seed);
}

#[test]
fn concrete_single_state_scenario() {
    init_logger();
    for (lm_prob, expected) in vec![(0.5f32, 0.0), (1.0f32, 2.0 * 2f64.ln())] {
        let m = mock_single_state_model(lm_prob);
        let hmm = CctcHmm::new(&m);
        let x = Array2::from_elem((2, 2), 1.0f32);
        let d = Array2::from_elem((2, 1), 1.0f32);
        let (mut c, ll) = forward(&m, &hmm, x.view(), d.view(), 1, &CctcParams::default()).unwrap();
        assert_abs_diff_eq!(ll, expected, epsilon = 1e-6);
        let (gx, gd) = c.backward().unwrap();
        assert!(gx.iter().all(|v| v.is_finite()));
        assert!(gd.iter().all(|v| v.is_finite()));
        for t in 0..2 {
            assert_abs_diff_eq!(gx[[t, 0]] + gx[[t, 1]], 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(gd[[t, 0]], -1.0, epsilon = 1e-6);
        }
    }
}

#[test_case(Backend::Sequential)]
#[test_case(Backend::Parallel)]
fn batch_independence(backend: Backend) {
    init_logger();
    let m = mock_random_model(5, 2, 7);
    let hmm = CctcHmm::new(&m);
    let params = CctcParams::new(20, backend);
    let (x1, d1) = mock_batch(&m, 1, 12, 7);
    let (mut c1, ll1) = forward(&m, &hmm, x1.view(), d1.view(), 1, &params).unwrap();
    let (gx1, gd1) = c1.backward().unwrap();

    let k = 4;
    let xk = repeat_sequence(&x1, k);
    let dk = repeat_sequence(&d1, k);
    let (mut ck, llk) = forward(&m, &hmm, xk.view(), dk.view(), k, &params).unwrap();
    let (gxk, gdk) = ck.backward().unwrap();

    assert_eq!(ck.tot_log_probs().len(), k);
    for &ll in ck.tot_log_probs() {
        assert_eq!(ll, ll1);
    }
    assert_abs_diff_eq!(llk, k as f64 * ll1, epsilon = 1e-9);
    for s in 0..k {
        let n = x1.nrows();
        for (a, b) in izip!(gxk.rows().into_iter().skip(s * n).take(n), gx1.rows()) {
            assert_eq!(a, b);
        }
        for (a, b) in izip!(gdk.rows().into_iter().skip(s * n).take(n), gd1.rows()) {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn rescaled_matches_unscaled_reference() {
    init_logger();
    let m = mock_two_state_model();
    let hmm = CctcHmm::new(&m);
    let (x, d) = mock_batch(&m, 3, 40, 11);
    let (c, ll) = forward(&m, &hmm, x.view(), d.view(), 3, &CctcParams::parallel()).unwrap();
    let expected = reference::log_likelihood(&hmm, x.view(), d.view(), 3);
    for (a, b) in izip!(c.tot_log_probs(), expected.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
    }
    assert_abs_diff_eq!(ll, expected.iter().sum::<f64>(), epsilon = 3e-3);
}

#[test]
fn frame_scaling_shifts_log_likelihood() {
    // every path consumes one numerator and one denominator per frame
    init_logger();
    let m = mock_random_model(4, 2, 21);
    let hmm = CctcHmm::new(&m);
    let (x, d) = mock_batch(&m, 1, 6, 21);
    let (mut c, ll) = forward(&m, &hmm, x.view(), d.view(), 1, &CctcParams::default()).unwrap();
    let (gx, _) = c.backward().unwrap();

    let mut x2 = x.clone();
    x2.row_mut(2).mapv_inplace(|v| v * 4.0);
    let mut d2 = d.clone();
    d2.row_mut(4).mapv_inplace(|v| v * 2.0);
    let (mut c2, ll2) = forward(&m, &hmm, x2.view(), d2.view(), 1, &CctcParams::default()).unwrap();
    let (gx2, _) = c2.backward().unwrap();
    assert_abs_diff_eq!(ll2, ll + 4f64.ln() - 2f64.ln(), epsilon = 1e-4);
    for (a, b) in izip!(gx.iter(), gx2.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
    }
}

#[test]
fn shared_hmm_across_threads() {
    init_logger();
    let m = mock_random_model(6, 3, 31);
    let hmm = CctcHmm::new(&m);
    let batches: Vec<_> = (0..4).map(|seed| mock_batch(&m, 2, 15, seed)).collect();
    let expected: Vec<f64> = batches
        .iter()
        .map(|(x, d)| log_likelihood(&m, &hmm, x, d, 2))
        .collect();

    let results: Vec<f64> = batches
        .par_iter()
        .map(|(x, d)| {
            let (mut c, ll) =
                forward(&m, &hmm, x.view(), d.view(), 2, &CctcParams::parallel()).unwrap();
            c.backward().unwrap();
            ll
        })
        .collect();
    assert_eq!(results, expected);
}

#[test]
fn params_from_json_select_backend() {
    let params = CctcParams::from_json(r#"{"backend": "parallel"}"#).unwrap();
    assert_eq!(params.backend, Backend::Parallel);
    let m = mock_two_state_model();
    let hmm = CctcHmm::with_params(&m, &params);
    let (x, d) = mock_batch(&m, 2, 5, 3);
    let (c, _) = forward(&m, &hmm, x.view(), d.view(), 2, &params).unwrap();
    assert!(c.backend().is_parallel());
}
