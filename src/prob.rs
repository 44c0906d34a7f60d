//!
//! log-space probability for the unscaled reference recursion
//!
//! A product of a few thousand per-frame factors underflows f64, so the values
//! are kept as `ln p`.
//!
use approx::AbsDiffEq;
use std::ops::{Add, Div, Mul};

/// `ln p` of a non-negative value `p`
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Prob(f64);

/// `Prob` of a linear-space value
pub fn p(value: f64) -> Prob {
    Prob(value.ln())
}

/// `Prob` of a log-space value
pub fn lp(log_value: f64) -> Prob {
    Prob(log_value)
}

impl Prob {
    pub fn zero() -> Prob {
        Prob(f64::NEG_INFINITY)
    }
    pub fn to_value(self) -> f64 {
        self.0.exp()
    }
    pub fn to_log_value(self) -> f64 {
        self.0
    }
}

/// log-sum-exp of two values
impl Add for Prob {
    type Output = Prob;
    fn add(self, other: Prob) -> Prob {
        let hi = self.0.max(other.0);
        let lo = self.0.min(other.0);
        if lo == f64::NEG_INFINITY {
            Prob(hi)
        } else {
            Prob(hi + (lo - hi).exp().ln_1p())
        }
    }
}

impl Mul for Prob {
    type Output = Prob;
    fn mul(self, other: Prob) -> Prob {
        Prob(self.0 + other.0)
    }
}

impl Div for Prob {
    type Output = Prob;
    fn div(self, other: Prob) -> Prob {
        Prob(self.0 - other.0)
    }
}

impl std::iter::Sum for Prob {
    fn sum<I: Iterator<Item = Prob>>(iter: I) -> Prob {
        iter.fold(Prob::zero(), Add::add)
    }
}

/// compares the log values
impl AbsDiffEq for Prob {
    type Epsilon = f64;
    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }
    fn abs_diff_eq(&self, other: &Prob, epsilon: f64) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}
