//!
//! Compact HMM built from a transition model
//!
//! Every history state has exactly `n_phones + 1` outgoing transitions (one per
//! phone and blank). The transitions are stored in one flat vector:
//!
//! ```text
//! [ out(0) | out(1) | ... | out(H-1) | in(0) | in(1) | ... | in(H-1) ]
//! ```
//!
//! `out(h)` is the list of transitions leaving `h` (`hmm_state` is the
//! destination), `in(h)` is the list of transitions entering `h` (`hmm_state`
//! is the origin). `forward_transitions[h]` and `backward_transitions[h]` are
//! the ranges of `out(h)` and `in(h)` in the flat vector.
//!
use super::params::CctcParams;
use crate::model::TransitionModel;
use derive_new::new;
use log::debug;
use std::ops::Range;

///
/// A transition of the compact HMM
///
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct CctcHmmTransition {
    /// language-model probability of the transition
    pub transition_prob: f32,
    /// index of the network output consumed by the transition
    pub num_index: usize,
    /// destination (in `out(h)`) or origin (in `in(h)`)
    pub hmm_state: usize,
}

///
/// Transition table and initial probabilities of the compact HMM.
///
/// Immutable after construction; shared by reference among any number of
/// concurrent `NegativeComputation`s.
///
#[derive(Debug, Clone)]
pub struct CctcHmm {
    n_phones: usize,
    transitions: Vec<CctcHmmTransition>,
    forward_transitions: Vec<Range<usize>>,
    backward_transitions: Vec<Range<usize>>,
    initial_probs: Vec<f32>,
    special_hmm_state: usize,
}

impl CctcHmm {
    ///
    /// Build from the transition model with the default parameters
    ///
    pub fn new<M: TransitionModel>(trans_model: &M) -> CctcHmm {
        CctcHmm::with_params(trans_model, &CctcParams::default())
    }
    ///
    /// Build from the transition model, with `params.n_initial_prob_iters`
    /// iterations of HMM propagation for the initial probabilities.
    ///
    pub fn with_params<M: TransitionModel>(trans_model: &M, params: &CctcParams) -> CctcHmm {
        assert!(
            trans_model.n_history_states() > 0,
            "transition model has no history state"
        );
        let (transitions, forward_transitions, backward_transitions) =
            build_transitions(trans_model);
        let mut hmm = CctcHmm {
            n_phones: trans_model.n_phones(),
            transitions,
            forward_transitions,
            backward_transitions,
            initial_probs: Vec::new(),
            special_hmm_state: 0,
        };
        let (initial_probs, special_hmm_state) =
            hmm.propagate_initial_probs(params.n_initial_prob_iters);
        hmm.initial_probs = initial_probs;
        hmm.special_hmm_state = special_hmm_state;
        debug!(
            "cctc hmm: n_states={} n_phones={} n_transitions={} special_state={} (p={})",
            hmm.n_hmm_states(),
            hmm.n_phones,
            hmm.n_transitions(),
            special_hmm_state,
            hmm.initial_probs[special_hmm_state],
        );
        hmm
    }
    ///
    /// Approximate the stationary distribution of the HMM: start from the
    /// uniform distribution and propagate it `n_iters` times through the
    /// transitions, renormalizing after every step (the transition probs of a
    /// state need not sum to one).
    ///
    /// Returns the probabilities and the index of the most probable state.
    ///
    fn propagate_initial_probs(&self, n_iters: usize) -> (Vec<f32>, usize) {
        let n = self.n_hmm_states();
        let mut cur_prob = vec![1.0 / n as f64; n];
        let mut next_prob = vec![0.0f64; n];
        for _ in 0..n_iters {
            for (h, &prob) in cur_prob.iter().enumerate() {
                for t in self.childs(h) {
                    next_prob[t.hmm_state] += prob * t.transition_prob as f64;
                }
            }
            std::mem::swap(&mut cur_prob, &mut next_prob);
            next_prob.iter_mut().for_each(|x| *x = 0.0);
            let total: f64 = cur_prob.iter().sum();
            assert!(total > 0.0, "all transition probs of the hmm are zero");
            cur_prob.iter_mut().for_each(|x| *x /= total);
        }
        let probs: Vec<f32> = cur_prob.iter().map(|&x| x as f32).collect();
        // first state with the maximum probability
        let special = (1..n).fold(0, |best, h| if probs[h] > probs[best] { h } else { best });
        (probs, special)
    }
}

///
/// Collect the outgoing transitions of every state in the order the model
/// yields them, mirror each into the incoming list of its destination, and
/// flatten `out(0..H)` followed by `in(0..H)`.
///
fn build_transitions<M: TransitionModel>(
    trans_model: &M,
) -> (Vec<CctcHmmTransition>, Vec<Range<usize>>, Vec<Range<usize>>) {
    let n_hmm_states = trans_model.n_history_states();
    let n_phones = trans_model.n_phones();
    let mut transitions_out: Vec<Vec<CctcHmmTransition>> = Vec::with_capacity(n_hmm_states);
    let mut transitions_in: Vec<Vec<CctcHmmTransition>> =
        vec![Vec::with_capacity(n_phones + 1); n_hmm_states];

    for h in 0..n_hmm_states {
        let out: Vec<CctcHmmTransition> = (0..=n_phones)
            .map(|p| {
                let label = trans_model.graph_label(h, p);
                CctcHmmTransition::new(
                    trans_model.graph_label_to_lm_prob(label),
                    trans_model.graph_label_to_output_index(label),
                    trans_model.graph_label_to_next_history_state(label),
                )
            })
            .collect();
        for t in out.iter() {
            transitions_in[t.hmm_state].push(CctcHmmTransition::new(
                t.transition_prob,
                t.num_index,
                h,
            ));
        }
        transitions_out.push(out);
    }

    let expected = 2 * n_hmm_states * (n_phones + 1);
    let mut transitions = Vec::with_capacity(expected);
    let mut forward_transitions = Vec::with_capacity(n_hmm_states);
    let mut backward_transitions = Vec::with_capacity(n_hmm_states);
    for out in transitions_out {
        let start = transitions.len();
        transitions.extend(out);
        forward_transitions.push(start..transitions.len());
    }
    for inc in transitions_in {
        let start = transitions.len();
        transitions.extend(inc);
        backward_transitions.push(start..transitions.len());
    }
    assert_eq!(transitions.len(), expected);
    (transitions, forward_transitions, backward_transitions)
}

/// Accessors
impl CctcHmm {
    pub fn n_hmm_states(&self) -> usize {
        self.forward_transitions.len()
    }
    pub fn n_phones(&self) -> usize {
        self.n_phones
    }
    /// total number of stored transitions (outgoing and incoming)
    pub fn n_transitions(&self) -> usize {
        self.transitions.len()
    }
    /// the flat transition vector
    pub fn transitions(&self) -> &[CctcHmmTransition] {
        &self.transitions
    }
    /// range of `out(h)` in `transitions()` for each state h
    pub fn forward_transitions(&self) -> &[Range<usize>] {
        &self.forward_transitions
    }
    /// range of `in(h)` in `transitions()` for each state h
    pub fn backward_transitions(&self) -> &[Range<usize>] {
        &self.backward_transitions
    }
    ///
    /// Outgoing transitions of `h`. `hmm_state` of each item is the destination.
    ///
    pub fn childs(&self, h: usize) -> &[CctcHmmTransition] {
        &self.transitions[self.forward_transitions[h].clone()]
    }
    ///
    /// Incoming transitions of `h`. `hmm_state` of each item is the origin.
    ///
    pub fn parents(&self, h: usize) -> &[CctcHmmTransition] {
        &self.transitions[self.backward_transitions[h].clone()]
    }
    pub fn initial_probs(&self) -> &[f32] {
        &self.initial_probs
    }
    ///
    /// The state used as the reference of the per-frame rescaling
    /// (most probable state under the initial probabilities)
    ///
    pub fn special_hmm_state(&self) -> usize {
        self.special_hmm_state
    }
}
