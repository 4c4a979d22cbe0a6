//! Bracketed 1-D root finding (C6), used to seed a single pair's arbitrage
//! trade size before the joint least-squares refine in `crate::leastsq`.

use crate::cancel::{CancellationToken, NeverCancel};
use crate::error::{PoolError, PoolResult};
use roots::{find_root_brent, SimpleConvergency};
use tracing::warn;

/// Find `x` in `[lo, hi]` with `f(x) == 0`, assuming `f` is monotone and
/// `f(lo) * f(hi) <= 0`. Returns [`PoolError::RootBracketInvalid`] if that
/// precondition fails or Brent's method can't converge within `max_iter`.
pub fn find_root(
    lo: f64,
    hi: f64,
    f: impl FnMut(f64) -> f64,
    max_iter: usize,
) -> PoolResult<f64> {
    find_root_cancellable(lo, hi, f, max_iter, &NeverCancel)
}

/// As [`find_root`], but checked against `cancel` before the (single,
/// opaque) call into Brent's method — the bracket search itself is not
/// iterated under this crate's control, so cancellation granularity here
/// is per-call rather than per-iteration.
pub fn find_root_cancellable(
    lo: f64,
    hi: f64,
    mut f: impl FnMut(f64) -> f64,
    max_iter: usize,
    cancel: &dyn CancellationToken,
) -> PoolResult<f64> {
    if cancel.is_cancelled() {
        return Err(PoolError::Cancelled);
    }

    let f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo * f_hi > 0.0 {
        warn!(lo, hi, f_lo, f_hi, "root bracket has no sign change");
        return Err(PoolError::RootBracketInvalid);
    }
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }

    let mut convergency = SimpleConvergency {
        eps: 1.0,
        max_iter,
    };

    find_root_brent(lo, hi, &mut f, &mut convergency).map_err(|e| {
        warn!(lo, hi, error = ?e, "brent's method failed to converge");
        PoolError::RootBracketInvalid
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_of_linear_function() {
        let root = find_root(-10.0, 10.0, |x| x - 3.0, 100).unwrap();
        assert!((root - 3.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_bracket_with_no_sign_change() {
        let result = find_root(1.0, 2.0, |x| x * x + 1.0, 100);
        assert!(matches!(result, Err(PoolError::RootBracketInvalid)));
    }
}
