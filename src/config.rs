//! Numeric configuration for the invariant solver and the arbitrage optimizer.
//!
//! Unlike the bot this crate grew out of, there is no environment or TOML
//! file to load here — the pool's behavior is fully determined by
//! [`crate::pool::PoolOpts`] at construction time, and the tolerances below
//! are fixed constants matching the reference on-chain contract this
//! simulator must reproduce bit-for-bit.
/// Fixed-point unit denoting "no rate adjustment" for a coin's `p` multiplier.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Denominator for `fee` and `admin_fee`, expressed in parts per `10^10`.
pub const FEE_DENOMINATOR: u64 = 10_000_000_000;

/// Default trade fee: 0.04%.
pub const DEFAULT_FEE: u64 = 4_000_000;

/// Default admin fee. The reference contract's own default is `5 * 10^9`
/// (50% of `fee`); this crate keeps `0` as the constructor default for
/// parity with the originating simulator's test suite, but exposes the
/// field so hosts wanting on-chain parity can set it explicitly.
pub const DEFAULT_ADMIN_FEE: u64 = 0;

/// On-chain parity admin fee (50% of `fee`), for hosts that want it.
pub const ON_CHAIN_ADMIN_FEE: u64 = 5_000_000_000;

/// Iteration cap for the `D`/`y`/`y_D` Newton loops (C3). Exceeding this
/// without satisfying the delta-1 termination is
/// [`crate::error::PoolError::NumericNotConverged`].
pub const MAX_NEWTON_ITERATIONS: u32 = 255;

/// Iteration cap for the bounded least-squares solver (C7).
pub const MAX_SOLVER_ITERATIONS: usize = 200;

/// Gradient-norm / step-norm convergence tolerance for the least-squares solver (C7).
pub const SOLVER_TOLERANCE: f64 = 1e-15;

/// Fraction of a coin's rate-normalized balance used as the arbitrage
/// search bracket's upper bound (`get_in_amount`'s drain target).
pub const ARB_BRACKET_DRAIN_FRACTION: f64 = 0.01;
