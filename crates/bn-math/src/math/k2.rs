//! K2 family score (Cooper & Herskovits) in log space.
//!
//! For a variable with `r` states and a parent set with `q` joint
//! configurations, let `N_jk` be the number of rows in configuration `j` where
//! the variable takes state `k`, and `N_j = Σ_k N_jk`. Then
//!
//! ```text
//! score = Π_{j=1..q} (r-1)! / (N_j + r - 1)! · Π_{k=1..r} N_jk!
//! ```
//!
//! The raw product under/overflows f64 after a few hundred rows, so every
//! factor is accumulated as a log factorial and compared in log space. The log
//! is monotone, so the greedy search picks the same parents either way.

use super::stable::{log_factorial, log_sum_exp};

/// Log of one configuration's factor: `ln (r-1)! - ln (N_j+r-1)! + Σ_k ln N_jk!`.
///
/// Returns NaN when `counts` is empty (a variable needs at least one state).
pub fn log_k2_family_term(counts: &[u64]) -> f64 {
    let r = counts.len() as u64;
    if r == 0 {
        return f64::NAN;
    }
    let n_j: u64 = counts.iter().sum();
    let numerator: f64 = counts.iter().map(|&n| log_factorial(n)).sum();
    log_factorial(r - 1) - log_factorial(n_j + r - 1) + numerator
}

/// Log K2 score for a `q × r` count table (one row per parent configuration).
///
/// Every row must hold exactly `r` counts; ragged tables, `r == 0` or `q == 0`
/// yield NaN.
pub fn log_k2_score(r: usize, counts: &[Vec<u64>]) -> f64 {
    if r == 0 || counts.is_empty() {
        return f64::NAN;
    }
    let mut total = 0.0;
    for row in counts {
        if row.len() != r {
            return f64::NAN;
        }
        total += log_k2_family_term(row);
    }
    total
}

/// Linear K2 score, `exp(log_k2_score)`. Underflows to 0 for large tables.
pub fn k2_score(r: usize, counts: &[Vec<u64>]) -> f64 {
    log_k2_score(r, counts).exp()
}

/// Normalized weight of `log_scores[index]` among all candidates,
/// `exp(s_i - logsumexp(s))`.
///
/// Returns NaN for an out-of-range index or NaN scores.
pub fn relative_weight(log_scores: &[f64], index: usize) -> f64 {
    let Some(&chosen) = log_scores.get(index) else {
        return f64::NAN;
    };
    let norm = log_sum_exp(log_scores);
    if norm.is_nan() || chosen.is_nan() {
        return f64::NAN;
    }
    if norm == f64::NEG_INFINITY {
        return 0.0;
    }
    (chosen - norm).exp()
}
