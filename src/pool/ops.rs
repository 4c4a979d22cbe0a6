//! Trade, liquidity, and pricing surface over the invariant solver (C4).
//!
//! Grounded on `pool.py`'s `exchange`/`add_liquidity`/`remove_liquidity_one_coin`/
//! `calc_token_amount`/`calc_withdraw_one_coin`/`dydx`/`dynamic_fee`, translated
//! into exclusive `&mut self` methods over `BigInt` state.

use super::Pool;
use crate::bigint::floor_div;
use crate::config::{FEE_DENOMINATOR, PRECISION};
use crate::error::{PoolError, PoolResult};
use num_bigint::BigInt;
use num_traits::{One, Zero};
use tracing::{debug, warn};

impl Pool {
    /// Swap `dx` of coin `i` for coin `j`. Returns `(dy, fee_taken)`, both in
    /// native units of coin `j`. Leaves the pool untouched on error.
    pub fn exchange(&mut self, i: usize, j: usize, dx: &BigInt) -> PoolResult<(BigInt, BigInt)> {
        self.check_distinct(i, j)?;
        self.check_liquid()?;
        if dx < &BigInt::zero() {
            return Err(PoolError::InvalidInputs("dx must be non-negative".into()));
        }

        let precision = BigInt::from(PRECISION);
        let xp = self.xp();
        let x_new_i = &xp[i] + floor_div(&(dx * &self.p[i]), &precision);

        let y = self.get_y(i, j, &x_new_i, &xp)?;
        let dy_gross = &xp[j] - &y - BigInt::one();

        let fee_denom = BigInt::from(FEE_DENOMINATOR);
        let fee = match self.fee_mul {
            None => floor_div(&(&dy_gross * BigInt::from(self.fee)), &fee_denom),
            Some(_) => {
                let xpi_avg = (&xp[i] + &x_new_i) / BigInt::from(2);
                let xpj_avg = (&xp[j] + &y) / BigInt::from(2);
                let dyn_fee = self.dynamic_fee(&xpi_avg, &xpj_avg);
                floor_div(&(&dy_gross * dyn_fee), &fee_denom)
            }
        };
        let admin_take = floor_div(&(&fee * BigInt::from(self.admin_fee)), &fee_denom);

        let pj = &self.p[j];
        let dy_net = floor_div(&((&dy_gross - &fee) * &precision), pj);
        let fee_native = floor_div(&(&fee * &precision), pj);
        let admin_take_native = floor_div(&(&admin_take * &precision), pj);

        if dy_net < BigInt::zero() {
            return Err(PoolError::InsufficientLiquidity);
        }

        self.x[i] += dx;
        self.x[j] -= &dy_net + &admin_take_native;
        self.admin_balances[j] += &admin_take_native;

        debug!(i, j, %dx, dy = %dy_net, fee = %fee_native, "exchange");
        Ok((dy_net, fee_native))
    }

    /// Fee applied when `fee_mul` is set: rises as the trade imbalances the
    /// pool further from `xpi == xpj`.
    pub fn dynamic_fee(&self, xpi: &BigInt, xpj: &BigInt) -> BigInt {
        let fee_mul = BigInt::from(self.fee_mul.expect("dynamic_fee requires fee_mul"));
        let fee_denom = BigInt::from(FEE_DENOMINATOR);
        let fee = BigInt::from(self.fee);

        let sum = xpi + xpj;
        let numerator = &fee_mul * &fee;
        let denom_term = floor_div(
            &(&(&fee_mul - &fee_denom) * BigInt::from(4) * xpi * xpj),
            &(&sum * &sum),
        );
        floor_div(&numerator, &(denom_term + &fee_denom))
    }

    /// Mint LP tokens for a proportional or imbalanced deposit of `amounts`
    /// (native units, one per coin). Returns the tokens minted.
    pub fn add_liquidity(&mut self, amounts: &[BigInt]) -> PoolResult<BigInt> {
        if amounts.len() != self.n {
            return Err(PoolError::InvalidInputs(format!(
                "amounts has length {} but n = {}",
                amounts.len(),
                self.n
            )));
        }
        let (mint, fees) = self.calc_token_amount(amounts, true)?;

        let fee_denom = BigInt::from(FEE_DENOMINATOR);
        let admin_fee = BigInt::from(self.admin_fee);
        for i in 0..self.n {
            let admin_share = floor_div(&(&fees[i] * &admin_fee), &fee_denom);
            self.x[i] += &amounts[i] - &admin_share;
            self.admin_balances[i] += admin_share;
        }
        self.tokens += &mint;

        debug!(mint = %mint, "add_liquidity");
        Ok(mint)
    }

    /// Tokens that would be minted (or the proportional value, for
    /// preview purposes) for a deposit of `amounts`, along with the
    /// per-coin fee charged when `use_fee` is set.
    pub fn calc_token_amount(
        &self,
        amounts: &[BigInt],
        use_fee: bool,
    ) -> PoolResult<(BigInt, Vec<BigInt>)> {
        if amounts.len() != self.n {
            return Err(PoolError::InvalidInputs(format!(
                "amounts has length {} but n = {}",
                amounts.len(),
                self.n
            )));
        }
        // Fees are computed in native balance units, matching the reference
        // contract's `calc_token_amount` exactly: only the final D
        // evaluations rate-normalize (via `xp_of`), not the fee/difference
        // arithmetic itself. This matters whenever `p[i] != 10^18`.
        let old_balances = &self.x;
        let d0 = Pool::get_d(&self.xp_of(old_balances), self.amp)?;

        let new_balances: Vec<BigInt> = old_balances.iter().zip(amounts).map(|(xi, ai)| xi + ai).collect();
        let d1 = Pool::get_d(&self.xp_of(&new_balances), self.amp)?;

        if !use_fee {
            if self.tokens.is_zero() {
                return Ok((d1, vec![BigInt::zero(); self.n]));
            }
            let mint = floor_div(&(&self.tokens * (&d1 - &d0)), &d0);
            return Ok((mint, vec![BigInt::zero(); self.n]));
        }

        let n_big = BigInt::from(self.n as u64);
        let _fee = floor_div(
            &(BigInt::from(self.fee) * &n_big),
            &(BigInt::from(4) * (&n_big - BigInt::one())),
        );

        let mut mint_balances = new_balances.clone();
        let mut fees = Vec::with_capacity(self.n);
        for i in 0..self.n {
            let ideal = floor_div(&(&d1 * &old_balances[i]), &d0);
            let actual = &new_balances[i];
            let diff = if ideal > *actual { &ideal - actual } else { actual - &ideal };
            let fee_i = floor_div(&(&_fee * diff), &BigInt::from(FEE_DENOMINATOR));
            mint_balances[i] -= &fee_i;
            fees.push(fee_i);
        }
        let d2 = Pool::get_d(&self.xp_of(&mint_balances), self.amp)?;

        if self.tokens.is_zero() {
            return Ok((d1, fees));
        }
        let mint = floor_div(&(&self.tokens * (&d2 - &d0)), &d0);
        Ok((mint, fees))
    }

    /// Quote (and optionally execute) a single-coin withdrawal of `amt`
    /// LP tokens against coin `i`. Returns `(dy, dy_fee)` in native units.
    pub fn calc_withdraw_one_coin(
        &self,
        amt: &BigInt,
        i: usize,
        use_fee: bool,
    ) -> PoolResult<(BigInt, BigInt)> {
        self.check_liquid()?;
        let xp = self.xp();
        let d0 = Pool::get_d(&xp, self.amp)?;
        let d1 = &d0 - floor_div(&(amt * &d0), &self.tokens);

        let new_y = Pool::get_y_d(self.amp, i, &xp, &d1)?;
        let precision = BigInt::from(PRECISION);
        let dy_before = floor_div(&((&xp[i] - &new_y) * &precision), &self.p[i]);

        if !use_fee {
            return Ok((dy_before, BigInt::zero()));
        }

        let n_big = BigInt::from(self.n as u64);
        let _fee = floor_div(
            &(BigInt::from(self.fee) * &n_big),
            &(BigInt::from(4) * (&n_big - BigInt::one())),
        );
        let fee_denom = BigInt::from(FEE_DENOMINATOR);

        let mut xp_reduced = xp.clone();
        for j in 0..self.n {
            let dx_expected = if j == i {
                floor_div(&(&xp[j] * &d1), &d0) - &new_y
            } else {
                &xp[j] - floor_div(&(&xp[j] * &d1), &d0)
            };
            xp_reduced[j] -= floor_div(&(&_fee * dx_expected), &fee_denom);
        }

        let new_y_reduced = Pool::get_y_d(self.amp, i, &xp_reduced, &d1)?;
        let dy = floor_div(
            &((&xp[i] - &new_y_reduced - BigInt::one()) * &precision),
            &self.p[i],
        );
        let dy_fee = &dy_before - &dy;

        Ok((dy, dy_fee))
    }

    /// Burn `amt` LP tokens for a single-coin payout of coin `i`.
    pub fn remove_liquidity_one_coin(&mut self, amt: &BigInt, i: usize) -> PoolResult<(BigInt, BigInt)> {
        let (dy, dy_fee) = self.calc_withdraw_one_coin(amt, i, true)?;
        let fee_denom = BigInt::from(FEE_DENOMINATOR);
        let admin_take = floor_div(&(&dy_fee * BigInt::from(self.admin_fee)), &fee_denom);

        self.x[i] -= &dy + &admin_take;
        self.admin_balances[i] += &admin_take;
        self.tokens -= amt;

        debug!(i, amt = %amt, dy = %dy, dy_fee = %dy_fee, "remove_liquidity_one_coin");
        Ok((dy, dy_fee))
    }

    /// Spot price `dy/dx` of coin `j` in terms of coin `i`, net of the
    /// trade fee when `use_fee` is set.
    pub fn price(&self, i: usize, j: usize, use_fee: bool) -> PoolResult<f64> {
        self.check_distinct(i, j)?;
        self.dydx(i, j, use_fee)
    }

    /// Closed-form derivative of the invariant at the current balances.
    pub fn dydx(&self, i: usize, j: usize, use_fee: bool) -> PoolResult<f64> {
        self.check_distinct(i, j)?;
        let xp = self.xp();
        let d = Pool::get_d(&xp, self.amp)?;
        let n = self.n;
        let n_big = BigInt::from(n as u64);
        let ann = BigInt::from(self.amp) * &n_big;

        let prod: BigInt = xp.iter().product();
        let d_pow = d.pow((n + 1) as u32);
        let ann_term = &ann * n_big.pow((n + 1) as u32) * &prod;

        let num = &xp[j] * (&xp[i] * &ann_term / &prod + &d_pow);
        let den = &xp[i] * (&xp[j] * &ann_term / &prod + &d_pow);

        let mut ratio = bigint_ratio_to_f64(&num, &den);

        if use_fee {
            let fee_denom = FEE_DENOMINATOR as f64;
            let fee_factor = match self.fee_mul {
                None => self.fee as f64 / fee_denom,
                Some(_) => {
                    let dyn_fee = self.dynamic_fee(&xp[i], &xp[j]);
                    bigint_to_f64(&dyn_fee) / fee_denom
                }
            };
            ratio *= 1.0 - fee_factor;
        }

        Ok(ratio)
    }

    /// `D() * 10^18 / tokens`.
    pub fn get_virtual_price(&self) -> PoolResult<BigInt> {
        self.check_liquid()?;
        let d = self.d()?;
        Ok(floor_div(&(d * BigInt::from(PRECISION)), &self.tokens))
    }

    /// Native-unit input amount that drains `out_idx`'s rate-normalized
    /// balance to `out_balance_perc` of its current value.
    pub fn get_in_amount(
        &self,
        in_idx: usize,
        out_idx: usize,
        out_balance_perc: f64,
    ) -> PoolResult<BigInt> {
        self.check_distinct(in_idx, out_idx)?;
        if !(0.0..=1.0).contains(&out_balance_perc) {
            return Err(PoolError::InvalidInputs(
                "out_balance_perc must be in [0, 1]".into(),
            ));
        }

        let xp = self.xp();
        let target_xp_out = floor_div(
            &(&xp[out_idx] * BigInt::from((out_balance_perc * 1e18) as u128)),
            &BigInt::from(PRECISION),
        );

        let new_xp_in = self.get_y(out_idx, in_idx, &target_xp_out, &xp)?;
        let precision = BigInt::from(PRECISION);
        let dx = floor_div(&((&new_xp_in - &xp[in_idx]) * &precision), &self.p[in_idx]);

        if dx < BigInt::zero() {
            warn!(in_idx, out_idx, "get_in_amount computed negative dx, clamping to zero");
            Ok(BigInt::zero())
        } else {
            Ok(dx)
        }
    }

    fn xp_of(&self, x: &[BigInt]) -> Vec<BigInt> {
        let precision = BigInt::from(PRECISION);
        x.iter()
            .zip(self.p.iter())
            .map(|(xi, pi)| floor_div(&(xi * pi), &precision))
            .collect()
    }
}

fn bigint_to_f64(v: &BigInt) -> f64 {
    let (sign, digits) = v.to_u32_digits();
    let mut acc = 0.0f64;
    for &d in digits.iter().rev() {
        acc = acc * 4294967296.0 + d as f64;
    }
    if sign == num_bigint::Sign::Minus {
        -acc
    } else {
        acc
    }
}

fn bigint_ratio_to_f64(num: &BigInt, den: &BigInt) -> f64 {
    // Both operands routinely exceed f64's exact-integer range, so shed
    // common trailing bits before converting rather than truncating to
    // i128/u128, which would overflow for realistic pool sizes.
    let shift = (num.bits().max(den.bits()) as i64 - 52).max(0) as u32;
    let num_shifted = num >> shift;
    let den_shifted = den >> shift;
    bigint_to_f64(&num_shifted) / bigint_to_f64(&den_shifted)
}
