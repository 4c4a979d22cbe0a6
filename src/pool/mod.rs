//! Stableswap pool state (C2) and its public constructor.
//!
//! The numeric operations that make this more than a data bag live in
//! sibling modules: [`invariant`] solves `D`/`y`/`y_D` (C3), [`ops`]
//! implements the public trade/liquidity/pricing surface (C4), and
//! [`snapshot`] provides the scoped rollback guard (C5).
mod invariant;
mod ops;
mod snapshot;

pub use snapshot::SnapshotGuard;

use crate::bigint::floor_div;
use crate::config::{DEFAULT_ADMIN_FEE, DEFAULT_FEE, PRECISION};
use crate::error::{PoolError, PoolResult};
use num_bigint::BigInt;
use num_traits::Zero;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A stableswap pool. Mutated only through [`ops`]'s methods, all of which
/// take `&mut self` — the invocation order on a single pool is therefore
/// totally ordered by construction, matching the single-threaded
/// cooperative scheduling model this crate assumes (see the crate-level
/// docs in `lib.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pool {
    pub(crate) n: usize,
    /// Amplification coefficient, `A * n^(n-1)` in whitepaper notation.
    /// Named `amp` rather than `A` to avoid colliding with the generic
    /// type parameters used by the trust-region solver in `crate::leastsq`.
    pub(crate) amp: u64,
    pub(crate) p: Vec<BigInt>,
    pub(crate) x: Vec<BigInt>,
    pub(crate) tokens: BigInt,
    pub(crate) fee: u64,
    pub(crate) admin_fee: u64,
    pub(crate) fee_mul: Option<u64>,
    pub(crate) admin_balances: Vec<BigInt>,
}

/// How a pool's initial native balances are derived at construction time.
#[derive(Debug, Clone)]
pub enum PoolInit {
    /// Explicit per-coin native balances.
    Balances(Vec<u128>),
    /// A virtual total `D`, split equally across coins and adjusted by `p`.
    VirtualTotal(u128),
}

/// Constructor options for [`Pool::new`]. Mirrors the reference contract's
/// constructor argument list (§6 of the spec this crate implements).
#[derive(Debug, Clone)]
pub struct PoolOpts {
    pub amp: u64,
    pub n: usize,
    pub init: PoolInit,
    pub p: Option<Vec<u128>>,
    pub tokens: Option<u128>,
    pub fee: u64,
    pub fee_mul: Option<u64>,
    pub admin_fee: u64,
}

impl PoolOpts {
    /// Convenience constructor matching the spec's end-to-end scenarios:
    /// `n` coins, a virtual total `D`, default rates, default fee, and
    /// `admin_fee = 0`.
    pub fn virtual_total(amp: u64, n: usize, d: u128) -> Self {
        Self {
            amp,
            n,
            init: PoolInit::VirtualTotal(d),
            p: None,
            tokens: None,
            fee: DEFAULT_FEE,
            fee_mul: None,
            admin_fee: DEFAULT_ADMIN_FEE,
        }
    }
}

impl Pool {
    /// Construct a new pool from `opts`.
    ///
    /// `InvalidInputs` is returned for `n < 2`, a `p`/balances vector whose
    /// length doesn't match `n`, a zero rate multiplier, or (for
    /// `PoolInit::Balances`) a non-positive initial balance.
    pub fn new(opts: PoolOpts) -> PoolResult<Pool> {
        if opts.n < 2 {
            return Err(PoolError::InvalidInputs(format!(
                "n must be >= 2, got {}",
                opts.n
            )));
        }
        let n = opts.n;

        let p: Vec<BigInt> = match opts.p {
            Some(p) => {
                if p.len() != n {
                    return Err(PoolError::InvalidInputs(format!(
                        "p has length {} but n = {}",
                        p.len(),
                        n
                    )));
                }
                if p.iter().any(|&v| v == 0) {
                    return Err(PoolError::InvalidInputs(
                        "rate multiplier p[i] must be >= 1".into(),
                    ));
                }
                p.into_iter().map(BigInt::from).collect()
            }
            None => vec![BigInt::from(PRECISION); n],
        };

        let x: Vec<BigInt> = match opts.init {
            PoolInit::Balances(balances) => {
                if balances.len() != n {
                    return Err(PoolError::InvalidInputs(format!(
                        "balances has length {} but n = {}",
                        balances.len(),
                        n
                    )));
                }
                if balances.iter().any(|&v| v == 0) {
                    return Err(PoolError::InvalidInputs(
                        "initial balances must be positive".into(),
                    ));
                }
                balances.into_iter().map(BigInt::from).collect()
            }
            PoolInit::VirtualTotal(d) => {
                let precision = BigInt::from(PRECISION);
                let d = BigInt::from(d);
                let n_big = BigInt::from(n as u64);
                p.iter()
                    .map(|pi| floor_div(&floor_div(&(&d * &precision), &n_big), pi))
                    .collect()
            }
        };

        let mut pool = Pool {
            n,
            amp: opts.amp,
            p,
            x,
            tokens: BigInt::zero(),
            fee: opts.fee,
            admin_fee: opts.admin_fee,
            fee_mul: opts.fee_mul,
            admin_balances: vec![BigInt::zero(); n],
        };

        pool.tokens = match opts.tokens {
            Some(t) => BigInt::from(t),
            None => pool.d()?,
        };

        Ok(pool)
    }

    /// Number of coins in the pool.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Amplification coefficient (`A * n^(n-1)` in whitepaper notation).
    pub fn amp(&self) -> u64 {
        self.amp
    }

    /// Current native-unit balances.
    pub fn balances(&self) -> &[BigInt] {
        &self.x
    }

    /// Current admin balances (accrued, not subtracted from `balances()`).
    pub fn admin_balances(&self) -> &[BigInt] {
        &self.admin_balances
    }

    /// Total LP token supply.
    pub fn tokens(&self) -> &BigInt {
        &self.tokens
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn admin_fee(&self) -> u64 {
        self.admin_fee
    }

    pub fn fee_mul(&self) -> Option<u64> {
        self.fee_mul
    }

    /// Rate-normalized balances: `xp[i] = x[i] * p[i] / PRECISION`.
    pub fn xp(&self) -> Vec<BigInt> {
        let precision = BigInt::from(PRECISION);
        self.x
            .iter()
            .zip(self.p.iter())
            .map(|(xi, pi)| floor_div(&(xi * pi), &precision))
            .collect()
    }

    fn check_index(&self, i: usize) -> PoolResult<()> {
        if i >= self.n {
            Err(PoolError::InvalidInputs(format!(
                "coin index {} out of range for n = {}",
                i, self.n
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_distinct(&self, i: usize, j: usize) -> PoolResult<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Err(PoolError::InvalidInputs(
                "coin indices i and j must differ".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn check_liquid(&self) -> PoolResult<()> {
        if self.tokens.is_zero() {
            return Err(PoolError::InvalidInputs(
                "pool has no liquidity (tokens == 0)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_total_splits_equally() {
        let pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        assert_eq!(pool.balances()[0], pool.balances()[1]);
    }

    #[test]
    fn rejects_n_below_two() {
        let err = Pool::new(PoolOpts::virtual_total(250, 1, 1_000_000)).unwrap_err();
        assert_eq!(err, PoolError::InvalidInputs("n must be >= 2, got 1".into()));
    }

    #[test]
    fn rejects_mismatched_rate_vector() {
        let mut opts = PoolOpts::virtual_total(250, 2, 1_000_000);
        opts.p = Some(vec![PRECISION]);
        assert!(Pool::new(opts).is_err());
    }
}
