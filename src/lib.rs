//! Stableswap AMM invariant solver and volume-limited multi-pair arbitrage
//! optimizer.
//!
//! [`pool`] is the numeric core: a stableswap pool (`D`/`y`/`y_D` Newton
//! solvers, trade/liquidity/pricing operations, and a scoped snapshot
//! guard). [`arb`] drives simultaneous trades across every coin pair toward
//! external market prices, seeded per pair by [`rootfind`] and jointly
//! refined by the bounded least-squares solver in [`leastsq`].
//!
//! This crate has no async runtime and no network or file I/O: a host
//! supplies prices and volume limits per tick (via [`arb::PriceFeed`]) and
//! calls [`arb::run_tick`] once per timestep.

pub mod arb;
pub mod bigint;
pub mod cancel;
pub mod config;
pub mod error;
pub mod leastsq;
pub mod pool;
pub mod rootfind;

pub use arb::{
    get_arb_trades, multipair_optimal_arbitrage, multipair_optimal_arbitrage_cancellable, run_tick,
    run_tick_cancellable, PriceFeed, TickReport, TradeSeed,
};
pub use cancel::CancellationToken;
pub use error::{PoolError, PoolResult};
pub use pool::{Pool, PoolInit, PoolOpts, SnapshotGuard};
