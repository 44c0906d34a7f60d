//!
//! CTC denominator ("negative") computation over a compact HMM
//!
//! # Overview of calculation
//!
//! T : number of frames, S : number of sequences, H : number of HMM states.
//! num[i, t, s] / den[h, t, s] : exponentiated network outputs.
//!
//! Forward (alpha), `0 < t <= T`
//! ```text
//! alpha[0][h, s] = init[h]
//! alpha[t][h, s] = (1 / alpha[t-1][sp, s])
//!     \sum_{g -> h} alpha[t-1][g, s] p(g -> h) num[i(g -> h), t-1, s] / den[g, t-1, s]
//! ```
//! where `sp` is the special HMM state. The factor `1 / alpha[t-1][sp, s]` keeps
//! the alphas in a good floating point range, and is compensated in the
//! total log-likelihood:
//! ```text
//! log P(s) = log \sum_h alpha[T][h, s] + \sum_{t < T} log alpha[t][sp, s]
//! ```
//!
//! Backward (beta), `0 <= t < T`
//! ```text
//! beta[T][h, s] = 1 / \sum_h alpha[T][h, s]
//! beta[t][h, s] = 1 / (den[h, t, s] alpha[t][sp, s])
//!     \sum_{h -> g} p(h -> g) num[i(h -> g), t, s] beta[t+1][g, s]
//! ```
//!
//! Occupation probability of a transition `h -> g` at frame t
//! ```text
//! alpha[t][h, s] p(h -> g) num[i(h -> g), t, s] beta[t+1][g, s] / (den[h, t, s] alpha[t][sp, s])
//! ```
//! Summed over the transitions consuming output `i`, this is
//! d(log P) / d(log num[i, t, s]). The occupation of state h summed over its
//! transitions, divided by `-den[h, t, s]`, is d(log P) / d(den[h, t, s]).
//!
pub mod backward;
pub mod computation;
pub mod forward;
pub mod hmm;
pub mod mocks;
pub mod params;
pub mod reference;
