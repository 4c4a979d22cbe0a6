//! Scoped pool-state snapshots with guaranteed rollback (C5).

use super::Pool;
use num_bigint::BigInt;

/// The mutable triple a snapshot captures. Everything else on [`Pool`]
/// (`amp`, `p`, `n`, `fee*`) is immutable for the snapshot's lifetime and
/// is never copied.
#[derive(Clone)]
pub struct SnapshotGuard {
    x: Vec<BigInt>,
    admin_balances: Vec<BigInt>,
    tokens: BigInt,
}

impl SnapshotGuard {
    fn capture(pool: &Pool) -> Self {
        SnapshotGuard {
            x: pool.x.clone(),
            admin_balances: pool.admin_balances.clone(),
            tokens: pool.tokens.clone(),
        }
    }

    fn restore(self, pool: &mut Pool) {
        pool.x = self.x;
        pool.admin_balances = self.admin_balances;
        pool.tokens = self.tokens;
    }
}

impl Pool {
    /// Run `f` against this pool, then restore `(x, admin_balances, tokens)`
    /// to their pre-call values unconditionally — on `Ok`, on `Err`, or
    /// simply on return, whichever `f` does. Nested calls form a LIFO stack
    /// of independent restore points.
    pub fn with_snapshot<T>(&mut self, f: impl FnOnce(&mut Pool) -> T) -> T {
        let entry = SnapshotGuard::capture(self);
        let result = f(self);
        entry.restore(self);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolOpts;

    #[test]
    fn snapshot_restores_after_mutation() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let before = pool.balances().to_vec();

        pool.with_snapshot(|p| {
            p.exchange(0, 1, &BigInt::from(1_000_000_000_000_000_000_000u128))
                .unwrap();
        });

        assert_eq!(pool.balances(), before.as_slice());
    }

    #[test]
    fn snapshot_restores_on_error() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let before = pool.balances().to_vec();

        let result = pool.with_snapshot(|p| p.exchange(0, 0, &BigInt::from(1)));

        assert!(result.is_err());
        assert_eq!(pool.balances(), before.as_slice());
    }

    #[test]
    fn nested_snapshots_restore_independently() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let before = pool.balances().to_vec();

        pool.with_snapshot(|p| {
            p.exchange(0, 1, &BigInt::from(1_000_000_000_000_000_000_000u128))
                .unwrap();
            let mid = p.balances().to_vec();
            p.with_snapshot(|p2| {
                p2.exchange(1, 0, &BigInt::from(1_000_000_000_000_000_000_000u128))
                    .unwrap();
            });
            assert_eq!(p.balances(), mid.as_slice());
        });

        assert_eq!(pool.balances(), before.as_slice());
    }
}
