//! Dirichlet priors over the states of a categorical variable.
//!
//! Structure scoring treats the states of a variable, within one configuration
//! of its parents, as draws from a categorical distribution:
//! - Prior: `p = (p_1..p_K) ~ Dirichlet(α_1..α_K)`
//! - Data: an ordered sample with `n_k` draws of state `k`, `N = Σ_k n_k`
//!
//! The evidence of an ordered sample integrates `p` out:
//!
//! ```text
//! P(sample | α) = B(α + n) / B(α)
//! ```
//!
//! With the uniform prior `α_k = 1` this is the K2 family term
//! `(K-1)! / (N+K-1)! · Π_k n_k!`.

use serde::{Deserialize, Serialize};

use super::stable::log_gamma;

/// Parameters for a Dirichlet distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirichletParams {
    /// Concentration parameters (all must be > 0)
    pub alpha: Vec<f64>,
}

impl DirichletParams {
    /// Create new Dirichlet parameters with validation.
    ///
    /// Returns None if any parameter is non-positive, NaN, or if the vector is empty.
    pub fn new(alpha: Vec<f64>) -> Option<Self> {
        if alpha.is_empty() {
            return None;
        }
        for &a in &alpha {
            if a.is_nan() || a <= 0.0 {
                return None;
            }
        }
        Some(Self { alpha })
    }

    /// Create a symmetric Dirichlet with all α_i = value.
    pub fn symmetric(k: usize, value: f64) -> Option<Self> {
        if k == 0 || value.is_nan() || value <= 0.0 {
            return None;
        }
        Some(Self {
            alpha: vec![value; k],
        })
    }

    /// Create a uniform Dirichlet prior with all α_i = 1 (the K2 prior).
    pub fn uniform(k: usize) -> Option<Self> {
        Self::symmetric(k, 1.0)
    }

    /// Number of categories K.
    pub fn k(&self) -> usize {
        self.alpha.len()
    }
}

/// Compute log of the multivariate beta function.
///
/// log B(α) = Σ_i lgamma(α_i) - lgamma(Σ_i α_i)
pub fn log_multivariate_beta(alpha: &[f64]) -> f64 {
    if alpha.is_empty() {
        return f64::NAN;
    }
    for &a in alpha {
        if a.is_nan() || a <= 0.0 {
            return f64::NAN;
        }
    }

    let sum: f64 = alpha.iter().sum();
    let log_sum_gamma: f64 = alpha.iter().map(|&a| log_gamma(a)).sum();

    log_sum_gamma - log_gamma(sum)
}

/// Log evidence of an ordered categorical sample under a Dirichlet prior.
///
/// log P = log B(α + n) - log B(α)
///
/// Unlike a multinomial likelihood there is no `N! / Π n_i!` coefficient: the
/// sample is a sequence of rows, not an unordered count vector.
///
/// # Returns
/// Log marginal likelihood, or NAN for invalid inputs.
pub fn log_sequence_evidence(prior: &DirichletParams, counts: &[f64]) -> f64 {
    if counts.len() != prior.k() {
        return f64::NAN;
    }
    for &c in counts {
        if c.is_nan() || c < 0.0 {
            return f64::NAN;
        }
    }

    let post_alpha: Vec<f64> = prior
        .alpha
        .iter()
        .zip(counts.iter())
        .map(|(&a, &n)| a + n)
        .collect();

    log_multivariate_beta(&post_alpha) - log_multivariate_beta(&prior.alpha)
}
