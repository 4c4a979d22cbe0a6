//! Typed error taxonomy for the pool and solver core.
use thiserror::Error;

/// Errors surfaced by pool operations and the numeric solvers underneath them.
///
/// Pool operations never mutate state before returning an `Err`. The
/// arbitrage driver (`crate::arb`) catches [`PoolError::RootBracketInvalid`]
/// and [`PoolError::SolverDiverged`] locally and converts them into
/// no-trade outputs; every other variant propagates to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Newton iteration did not converge within the iteration cap")]
    NumericNotConverged,

    #[error("invalid input: {0}")]
    InvalidInputs(String),

    #[error("trade would drive a pool balance below zero")]
    InsufficientLiquidity,

    #[error("no sign change between root-finder bracket endpoints")]
    RootBracketInvalid,

    #[error("least-squares solver failed to converge within the iteration cap")]
    SolverDiverged,

    #[error("operation cancelled")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;
