//! The statistical stopping rule.

/// The number of probes required to declare a hop stable.
///
/// Returns the smallest `n` such that `(k / (k + 1))^n <= bound` for `k`
/// observed interfaces.  Assuming a hypothetical `(k + 1)`-th undiscovered
/// branch exists, with the load balancer splitting uniformly across it and
/// the `k` already-seen branches, `n` is the number of independent probes
/// after which the probability of never having hit the unseen branch falls
/// at or below the confidence bound.
///
/// Non-decreasing in `k` for a fixed bound and non-increasing in the bound
/// for a fixed `k`.  For `k = 0` (the hop has not been reached yet) a single
/// probe suffices.
#[must_use]
pub fn required_probes(bound: f64, observed: usize) -> usize {
    if observed == 0 {
        return 1;
    }
    let k = observed as f64;
    let ratio = k / (k + 1.0);
    // Closed form, with an integer walk to guard against rounding at the
    // boundary.
    let mut n = (bound.ln() / ratio.ln()).ceil().max(1.0) as usize;
    while ratio.powi(n as i32) > bound {
        n += 1;
    }
    while n > 1 && ratio.powi(n as i32 - 1) <= bound {
        n -= 1;
    }
    n
}
