//! Stableswap invariant solver (C3): `D(xp)`, `y(i, j, x, xp)`, `y_D(A, i, xp, D)`.
//!
//! Each is a Newton iteration in exact `BigInt` arithmetic, terminating on
//! `|delta| <= 1` rather than a tighter tolerance — reference on-chain
//! semantics are defined by that termination rule, not by float-style
//! convergence. All operands are non-negative by construction, so the
//! floor-division helper in `crate::bigint` and `num_bigint`'s native `/`
//! agree throughout this module.
use super::Pool;
use crate::config::MAX_NEWTON_ITERATIONS;
use crate::error::{PoolError, PoolResult};
use num_bigint::BigInt;
use num_traits::{One, Zero};
use tracing::trace;

impl Pool {
    /// `D()` using the pool's own amplification coefficient and current balances.
    pub fn d(&self) -> PoolResult<BigInt> {
        Pool::get_d(&self.xp(), self.amp)
    }

    /// `D` over arbitrary rate-normalized balances `xp`, using `amp` rather
    /// than `self.amp` (callers such as `calc_token_amount` need `D` at a
    /// hypothetical balance vector under the pool's live `amp`, but the
    /// underlying solver is a pure function of `(xp, amp)`).
    pub fn get_d(xp: &[BigInt], amp: u64) -> PoolResult<BigInt> {
        let n = xp.len();
        let n_big = BigInt::from(n as u64);
        let s: BigInt = xp.iter().sum();
        if s.is_zero() {
            return Ok(BigInt::zero());
        }
        let ann = BigInt::from(amp) * &n_big;

        let mut d = s.clone();
        let mut d_prev: BigInt;
        let one = BigInt::one();

        for iteration in 0..MAX_NEWTON_ITERATIONS {
            let mut d_p = d.clone();
            for xi in xp {
                d_p = &d_p * &d / (&n_big * xi);
            }
            d_prev = d.clone();
            let numerator = (&ann * &s + &d_p * &n_big) * &d;
            let denominator = (&ann - &one) * &d + (&n_big + &one) * &d_p;
            d = numerator / denominator;

            let delta = if d > d_prev { &d - &d_prev } else { &d_prev - &d };
            if delta <= one {
                trace!(iterations = iteration + 1, d = %d, "get_d converged");
                return Ok(d);
            }
        }

        Err(PoolError::NumericNotConverged)
    }

    /// `y[j]` if coin `i`'s rate-normalized balance were set to `x`, holding
    /// the invariant `D` computed fresh from `xp`.
    pub fn get_y(&self, i: usize, j: usize, x: &BigInt, xp: &[BigInt]) -> PoolResult<BigInt> {
        self.check_distinct(i, j)?;
        let d = Pool::get_d(xp, self.amp)?;
        let n = self.n;
        let n_big = BigInt::from(n as u64);
        let ann = BigInt::from(self.amp) * &n_big;

        let mut xx = xp.to_vec();
        xx[i] = x.clone();
        let xx: Vec<BigInt> = xx
            .into_iter()
            .enumerate()
            .filter(|(k, _)| *k != j)
            .map(|(_, v)| v)
            .collect();

        let mut c = d.clone();
        for y in &xx {
            c = &c * &d / (y * &n_big);
        }
        c = &c * &d / (&n_big * &ann);

        let s: BigInt = xx.iter().sum();
        let b = &s + &d / &ann - &d;

        newton_solve_y(&d, &c, &b)
    }

    /// `y[i]` that achieves the supplied (already-reduced) invariant `D`,
    /// rather than the `D` implied by `xp`. Used by single-coin withdraw.
    pub fn get_y_d(amp: u64, i: usize, xp: &[BigInt], d: &BigInt) -> PoolResult<BigInt> {
        let n = xp.len();
        let n_big = BigInt::from(n as u64);
        let ann = BigInt::from(amp) * &n_big;

        let xx: Vec<BigInt> = xp
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != i)
            .map(|(_, v)| v.clone())
            .collect();

        let mut c = d.clone();
        for y in &xx {
            c = &c * d / (y * &n_big);
        }
        c = &c * d / (&n_big * &ann);

        let s: BigInt = xx.iter().sum();
        let b = &s + d / &ann - d;

        newton_solve_y(d, &c, &b)
    }
}

/// Shared Newton loop for `get_y`/`get_y_d`: `y := (y^2 + c) / (2y + b)`,
/// terminating on `|y - y_prev| <= 1`.
fn newton_solve_y(d: &BigInt, c: &BigInt, b: &BigInt) -> PoolResult<BigInt> {
    let mut y = d.clone();
    let mut y_prev: BigInt;
    let one = BigInt::one();
    let two = BigInt::from(2);

    for iteration in 0..MAX_NEWTON_ITERATIONS {
        y_prev = y.clone();
        y = (&y * &y + c) / (&two * &y + b);

        let delta = if y > y_prev { &y - &y_prev } else { &y_prev - &y };
        if delta <= one {
            trace!(iterations = iteration + 1, y = %y, "get_y converged");
            return Ok(y);
        }
    }

    Err(PoolError::NumericNotConverged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolInit, PoolOpts};

    #[test]
    fn get_d_matches_scenario_one() {
        let xp = vec![
            BigInt::from(1_000_000u128) * BigInt::from(1_000_000_000_000_000_000u128),
            BigInt::from(1_000_000u128) * BigInt::from(1_000_000_000_000_000_000u128),
        ];
        let d = Pool::get_d(&xp, 250).unwrap();
        let expected = BigInt::from(2_000_000u128) * BigInt::from(1_000_000_000_000_000_000u128);
        assert_eq!(d, expected);
    }

    #[test]
    fn get_y_inverts_within_rounding() {
        let opts = PoolOpts {
            init: PoolInit::Balances(vec![1_000_000, 1_000_000]),
            ..PoolOpts::virtual_total(250, 2, 2_000_000)
        };
        let pool = Pool::new(opts).unwrap();
        let xp = pool.xp();

        let y = pool.get_y(0, 1, &xp[0], &xp).unwrap();
        let mut xp_swapped = xp.clone();
        xp_swapped[1] = y.clone();
        let x_back = pool.get_y(1, 0, &xp[1], &xp_swapped).unwrap();

        let delta = if x_back > xp[0] { &x_back - &xp[0] } else { &xp[0] - &x_back };
        assert!(delta <= BigInt::from(1));
    }
}
