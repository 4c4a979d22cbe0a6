//! Arbitrary-precision integer helpers (C1).
//!
//! All `D`/`y`/`y_D` arithmetic runs in [`num_bigint::BigInt`], since
//! intermediate products such as `D_P * D` and `D^(n+1)` overflow 256 bits
//! for realistic pool balances. `num_bigint` supplies `+`, `-`, `*`,
//! ordering, `abs`, and `pow` with the semantics the invariant math needs
//! directly; the one gap is division, whose `Div` impl truncates toward
//! zero for mixed-sign operands rather than flooring. [`floor_div`] closes
//! that gap.
use num_bigint::BigInt;
use num_traits::Zero;

/// Mathematical floor division: `floor_div(-1, 2) == -1`, matching Python's
/// `//` operator, as opposed to Rust/`num_bigint`'s truncate-toward-zero
/// `/` (`BigInt::from(-1) / BigInt::from(2) == 0`).
///
/// Every Newton loop in `crate::pool::invariant` only ever divides
/// non-negative operands, where floor and truncating division coincide;
/// this helper exists for the boundary cases in `crate::pool::ops` where a
/// fee delta is computed before its sign is known.
pub fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let (q, r) = (a / b, a % b);
    if !r.is_zero() && (r.sign() != b.sign()) {
        q - BigInt::from(1)
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_div_matches_python_semantics() {
        assert_eq!(floor_div(&BigInt::from(-1), &BigInt::from(2)), BigInt::from(-1));
        assert_eq!(floor_div(&BigInt::from(1), &BigInt::from(2)), BigInt::from(0));
        assert_eq!(floor_div(&BigInt::from(-7), &BigInt::from(2)), BigInt::from(-4));
        assert_eq!(floor_div(&BigInt::from(7), &BigInt::from(-2)), BigInt::from(-4));
        assert_eq!(floor_div(&BigInt::from(-7), &BigInt::from(-2)), BigInt::from(3));
        assert_eq!(floor_div(&BigInt::from(6), &BigInt::from(3)), BigInt::from(2));
    }
}
