//!
//! Transition model interface
//!
//! A transition model maps every (history-state, phone-or-blank) pair to a
//! *graph label*, which in turn resolves to
//!
//! * the language-model (transition) probability,
//! * the index of the network output ("numerator") consumed by the transition,
//! * the history state reached.
//!
//! Phones are numbered `0..=n_phones`. Which of them stands for blank is the
//! convention of the model; the HMM keeps whatever order the model yields.
//!
use crate::error::{CctcError, Result};
use derive_new::new;

///
/// Queries that the HMM construction needs from a transition model.
///
pub trait TransitionModel {
    /// Number of history states (= HMM states)
    fn n_history_states(&self) -> usize;
    /// Number of phones, not counting blank
    fn n_phones(&self) -> usize;
    /// Number of network outputs used by phone transitions
    fn n_tree_indexes(&self) -> usize;
    /// Number of network outputs used by blank transitions
    fn n_blank_indexes(&self) -> usize;
    /// Graph label of the transition from `history_state` with `phone`
    /// (`0 <= phone <= n_phones`)
    fn graph_label(&self, history_state: usize, phone: usize) -> usize;
    fn graph_label_to_lm_prob(&self, graph_label: usize) -> f32;
    fn graph_label_to_output_index(&self, graph_label: usize) -> usize;
    fn graph_label_to_next_history_state(&self, graph_label: usize) -> usize;
    ///
    /// Number of network outputs consumed by transitions, i.e. the width of
    /// the numerator part of the network output.
    fn n_numerator_outputs(&self) -> usize {
        self.n_tree_indexes() + self.n_blank_indexes()
    }
}

///
/// What a graph label resolves to
///
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct GraphLabel {
    pub lm_prob: f32,
    pub output_index: usize,
    pub next_history_state: usize,
}

///
/// Transition model backed by a dense table of graph labels.
///
/// The graph label of `(history_state, phone)` is
/// `history_state * (n_phones + 1) + phone`.
///
#[derive(Debug, Clone)]
pub struct DenseTransitionModel {
    n_history_states: usize,
    n_phones: usize,
    n_tree_indexes: usize,
    n_blank_indexes: usize,
    labels: Vec<GraphLabel>,
}

impl DenseTransitionModel {
    ///
    /// Create from the graph labels of all (history-state, phone) pairs,
    /// ordered by history state and then by phone.
    ///
    pub fn new(
        n_history_states: usize,
        n_phones: usize,
        n_tree_indexes: usize,
        n_blank_indexes: usize,
        labels: Vec<GraphLabel>,
    ) -> Result<Self> {
        let expected = n_history_states * (n_phones + 1);
        if labels.len() != expected {
            return Err(CctcError::InvalidModel(format!(
                "{} graph labels for {} states x {} phones+blank",
                labels.len(),
                n_history_states,
                n_phones + 1
            )));
        }
        let n_outputs = n_tree_indexes + n_blank_indexes;
        for (i, label) in labels.iter().enumerate() {
            if label.output_index >= n_outputs {
                return Err(CctcError::InvalidModel(format!(
                    "graph label {} uses output {} (n_outputs={})",
                    i, label.output_index, n_outputs
                )));
            }
            if label.next_history_state >= n_history_states {
                return Err(CctcError::InvalidModel(format!(
                    "graph label {} goes to history state {} (n_history_states={})",
                    i, label.next_history_state, n_history_states
                )));
            }
            if !(label.lm_prob >= 0.0 && label.lm_prob.is_finite()) {
                return Err(CctcError::InvalidModel(format!(
                    "graph label {} has lm prob {}",
                    i, label.lm_prob
                )));
            }
        }
        Ok(DenseTransitionModel {
            n_history_states,
            n_phones,
            n_tree_indexes,
            n_blank_indexes,
            labels,
        })
    }
    ///
    /// Create by evaluating `f(history_state, phone)` for every pair.
    ///
    pub fn from_fn<F>(
        n_history_states: usize,
        n_phones: usize,
        n_tree_indexes: usize,
        n_blank_indexes: usize,
        mut f: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) -> GraphLabel,
    {
        let mut labels = Vec::with_capacity(n_history_states * (n_phones + 1));
        for h in 0..n_history_states {
            for p in 0..=n_phones {
                labels.push(f(h, p));
            }
        }
        Self::new(
            n_history_states,
            n_phones,
            n_tree_indexes,
            n_blank_indexes,
            labels,
        )
    }
    /// Get the graph label content by its id
    pub fn label(&self, graph_label: usize) -> &GraphLabel {
        &self.labels[graph_label]
    }
}

impl TransitionModel for DenseTransitionModel {
    fn n_history_states(&self) -> usize {
        self.n_history_states
    }
    fn n_phones(&self) -> usize {
        self.n_phones
    }
    fn n_tree_indexes(&self) -> usize {
        self.n_tree_indexes
    }
    fn n_blank_indexes(&self) -> usize {
        self.n_blank_indexes
    }
    fn graph_label(&self, history_state: usize, phone: usize) -> usize {
        assert!(history_state < self.n_history_states);
        assert!(phone <= self.n_phones);
        history_state * (self.n_phones + 1) + phone
    }
    fn graph_label_to_lm_prob(&self, graph_label: usize) -> f32 {
        self.labels[graph_label].lm_prob
    }
    fn graph_label_to_output_index(&self, graph_label: usize) -> usize {
        self.labels[graph_label].output_index
    }
    fn graph_label_to_next_history_state(&self, graph_label: usize) -> usize {
        self.labels[graph_label].next_history_state
    }
}
