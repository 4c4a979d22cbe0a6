//! Volume-limited multi-pair arbitrage driver (C8), the opaque feed
//! interface (C12), and the single-tick simulation entry point (C13).

use crate::config::PRECISION;
use crate::error::{PoolError, PoolResult};
use crate::leastsq::{Residual, SolveReport};
use crate::pool::Pool;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::{error, warn};

/// One coin pair's candidate trade before volume-cap clamping and sorting.
#[derive(Debug, Clone, Copy)]
pub struct TradeSeed {
    pub size: f64,
    pub pair: (usize, usize),
    pub target: f64,
}

/// All `n*(n-1)/2` unordered coin pairs `(i, j)` with `i < j`, ascending.
/// Position in this list is the index into a `PriceFeed`'s price vector.
pub fn pair_index(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Opaque external source of per-tick market prices and volume caps.
/// No concrete adapter (CSV, HTTP, database) is provided by this crate.
pub trait PriceFeed {
    /// Prices and volume limits at tick `t`, one entry per pair in
    /// `pair_index(pool.n())` order, or `None` once the feed is exhausted.
    fn at(&self, t: u64) -> Option<(Vec<f64>, Vec<f64>)>;
}

/// Per-trade outcome bundled into a [`TickReport`].
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub pair: (usize, usize),
    pub dx: BigInt,
    pub dy: BigInt,
    pub fee: BigInt,
}

/// Result of one [`run_tick`] call.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub trades: Vec<TradeOutcome>,
    pub errors: Vec<f64>,
    pub report: SolveReport,
}

/// Seed a candidate trade per coin pair by moving the pool's spot price
/// toward `prices[k]` (`k` = the pair's position in `pair_index(pool.n())`).
pub fn get_arb_trades(pool: &mut Pool, prices: &[f64]) -> Vec<TradeSeed> {
    let pairs = pair_index(pool.n());
    let mut seeds = Vec::with_capacity(pairs.len());

    for (k, &(i, j)) in pairs.iter().enumerate() {
        let p_target = prices[k];
        let seed = seed_one_pair(pool, i, j, p_target);
        seeds.push(seed);
    }

    seeds
}

fn seed_one_pair(pool: &mut Pool, i: usize, j: usize, p_target: f64) -> TradeSeed {
    let price_ij = match pool.price(i, j, false) {
        Ok(p) => p,
        Err(e) => {
            warn!(i, j, error = %e, "could not read pool price, skipping pair");
            return TradeSeed { size: 0.0, pair: (i, j), target: p_target };
        }
    };
    let price_ji = match pool.price(j, i, false) {
        Ok(p) => p,
        Err(e) => {
            warn!(i, j, error = %e, "could not read pool price, skipping pair");
            return TradeSeed { size: 0.0, pair: (i, j), target: p_target };
        }
    };

    let (in_idx, out_idx, target) = if price_ij - p_target > 0.0 {
        (i, j, p_target)
    } else if price_ji - 1.0 / p_target > 0.0 {
        (j, i, 1.0 / p_target)
    } else {
        return TradeSeed { size: 0.0, pair: (i, j), target: p_target };
    };

    let hi = match pool.get_in_amount(in_idx, out_idx, crate::config::ARB_BRACKET_DRAIN_FRACTION) {
        Ok(v) => bigint_to_f64_lossy(&v),
        Err(e) => {
            warn!(in_idx, out_idx, error = %e, "get_in_amount failed, skipping pair");
            return TradeSeed { size: 0.0, pair: (i, j), target: p_target };
        }
    };
    if hi <= 0.0 {
        return TradeSeed { size: 0.0, pair: (i, j), target: p_target };
    }

    let root = pool.with_snapshot(|p| {
        crate::rootfind::find_root(
            0.0,
            hi,
            |dx| trial_price_error(p, in_idx, out_idx, dx, target),
            100,
        )
    });

    let size = match root {
        Ok(r) => r.floor().max(0.0),
        Err(_) => {
            warn!(in_idx, out_idx, "no arbitrage bracket for pair, emitting zero trade");
            0.0
        }
    };

    TradeSeed { size, pair: (in_idx, out_idx), target }
}

fn trial_price_error(pool: &mut Pool, in_idx: usize, out_idx: usize, dx: f64, target: f64) -> f64 {
    pool.with_snapshot(|p| {
        if dx > 0.0 {
            let dx_big = BigInt::from(dx.floor() as i128);
            if p.exchange(in_idx, out_idx, &dx_big).is_err() {
                return f64::NAN;
            }
        }
        match p.price(in_idx, out_idx, true) {
            Ok(price) => price - target,
            Err(_) => f64::NAN,
        }
    })
}

/// Joint refine of the per-pair seed sizes against their volume caps,
/// driving every pair's post-trade price toward its target simultaneously.
///
/// `SolverDiverged` is recovered locally (empty trades, residuals at the
/// all-zero-trade point); this never returns `Err` in practice since it
/// runs the solver with a token that can't fire, but keeps the signature
/// the spec's external interface documents.
pub fn multipair_optimal_arbitrage(
    pool: &mut Pool,
    prices: &[f64],
    limits: &[f64],
) -> (Vec<(usize, usize, BigInt)>, Vec<f64>, SolveReport) {
    multipair_optimal_arbitrage_cancellable(pool, prices, limits, &crate::cancel::NeverCancel)
        .expect("NeverCancel never cancels")
}

/// As [`multipair_optimal_arbitrage`], but cooperatively cancellable: the
/// least-squares refine polls `cancel` once per iteration and surfaces
/// [`PoolError::Cancelled`] rather than swallowing it, since cancellation
/// (unlike solver divergence) is not a condition the arbitrage driver
/// should silently recover from.
pub fn multipair_optimal_arbitrage_cancellable(
    pool: &mut Pool,
    prices: &[f64],
    limits: &[f64],
    cancel: &dyn crate::cancel::CancellationToken,
) -> PoolResult<(Vec<(usize, usize, BigInt)>, Vec<f64>, SolveReport)> {
    let seeds = get_arb_trades(pool, prices);

    let mut entries: Vec<(TradeSeed, f64)> = seeds
        .into_iter()
        .zip(limits)
        .map(|(seed, &limit)| {
            let cap = (limit * PRECISION as f64).floor();
            (TradeSeed { size: seed.size.min(cap), ..seed }, cap)
        })
        .collect();

    entries.sort_by(|a, b| b.0.size.partial_cmp(&a.0.size).unwrap_or(std::cmp::Ordering::Equal));

    let sizes: Vec<f64> = entries.iter().map(|(s, _)| s.size).collect();
    let pairs: Vec<(usize, usize)> = entries.iter().map(|(s, _)| s.pair).collect();
    let targets: Vec<f64> = entries.iter().map(|(s, _)| s.target).collect();
    let lo: Vec<f64> = vec![0.0; entries.len()];
    let hi: Vec<f64> = entries.iter().map(|(_, cap)| cap + 1.0).collect();

    let mut residual = JointResidual { pool, pairs: &pairs, targets: &targets };

    match crate::leastsq::solve_bounded_cancellable(
        &mut residual,
        &sizes,
        &lo,
        &hi,
        crate::config::MAX_SOLVER_ITERATIONS,
        crate::config::SOLVER_TOLERANCE,
        cancel,
    ) {
        Ok((x_star, report)) => {
            let errors = residual.evaluate(&x_star);
            let trades = pairs
                .iter()
                .zip(&x_star)
                .filter_map(|(&(i, j), &dx)| {
                    if dx > 0.0 && !dx.is_nan() {
                        Some((i, j, BigInt::from(dx.floor() as i128)))
                    } else {
                        None
                    }
                })
                .collect();
            Ok((trades, errors, report))
        }
        Err(PoolError::SolverDiverged) => {
            error!("joint arbitrage solve failed to converge, returning no trades");
            let zeros = vec![0.0; sizes.len()];
            let errors = residual.evaluate(&zeros);
            Ok((vec![], errors, SolveReport { iterations: crate::config::MAX_SOLVER_ITERATIONS, converged: false }))
        }
        Err(e) => Err(e),
    }
}

/// Residual object (C7) over a single pool snapshot: executes every
/// non-zero, non-NaN trade in sorted order, then reports post-trade
/// price error for every pair, including zero-size ones.
struct JointResidual<'a> {
    pool: &'a mut Pool,
    pairs: &'a [(usize, usize)],
    targets: &'a [f64],
}

impl<'a> Residual for JointResidual<'a> {
    fn evaluate(&mut self, x: &[f64]) -> Vec<f64> {
        let pairs = self.pairs;
        let targets = self.targets;
        self.pool.with_snapshot(|p| {
            for (&(i, j), &dx) in pairs.iter().zip(x) {
                if dx.is_nan() || dx <= 0.0 {
                    continue;
                }
                let dx_big = BigInt::from(dx.floor() as i128);
                let _ = p.exchange(i, j, &dx_big);
            }

            pairs
                .iter()
                .zip(targets)
                .map(|(&(i, j), &target)| match p.price(i, j, true) {
                    Ok(price) => price - target,
                    Err(_) => f64::NAN,
                })
                .collect()
        })
    }
}

/// Compose the arbitrage driver with live application of the winning
/// trades. The single entry point an embedding host's tick loop calls once
/// per external timestep.
pub fn run_tick(pool: &mut Pool, prices: &[f64], limits: &[f64]) -> PoolResult<TickReport> {
    run_tick_cancellable(pool, prices, limits, &crate::cancel::NeverCancel)
}

/// As [`run_tick`], cooperatively cancellable. `PoolError::Cancelled`
/// propagates to the caller with the live pool untouched, since the
/// optimizer's own solve runs on a snapshot and only winning trades are
/// applied to `pool` afterward.
pub fn run_tick_cancellable(
    pool: &mut Pool,
    prices: &[f64],
    limits: &[f64],
    cancel: &dyn crate::cancel::CancellationToken,
) -> PoolResult<TickReport> {
    let (trades, errors, report) =
        multipair_optimal_arbitrage_cancellable(pool, prices, limits, cancel)?;

    let mut outcomes = Vec::with_capacity(trades.len());
    for (i, j, dx) in trades {
        let (dy, fee) = pool.exchange(i, j, &dx)?;
        outcomes.push(TradeOutcome { pair: (i, j), dx, dy, fee });
    }

    Ok(TickReport { trades: outcomes, errors, report })
}

fn bigint_to_f64_lossy(v: &BigInt) -> f64 {
    v.to_f64().unwrap_or(f64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolOpts;

    #[test]
    fn pair_index_enumerates_ascending_pairs() {
        assert_eq!(pair_index(3), vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn balanced_pool_at_market_price_has_zero_seed() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let seeds = get_arb_trades(&mut pool, &[1.0]);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].size, 0.0);
    }

    #[test]
    fn arb_with_headroom_finds_nonzero_trade() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let (trades, errors, report) = multipair_optimal_arbitrage(&mut pool, &[1.01], &[1_000_000.0]);
        assert!(report.converged);
        assert_eq!(trades.len(), 1);
        assert!(errors[0].abs() < 1e-6);
    }

    #[test]
    fn arb_blocked_by_volume_respects_cap() {
        let mut pool = Pool::new(PoolOpts::virtual_total(250, 2, 2_000_000)).unwrap();
        let (trades, _errors, _report) = multipair_optimal_arbitrage(&mut pool, &[1.01], &[0.00001]);
        if let Some((_, _, dx)) = trades.first() {
            assert!(*dx <= BigInt::from(10_000_000_000_000u128));
        }
    }
}
