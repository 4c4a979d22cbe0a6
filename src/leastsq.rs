//! Bounded trust-region-reflective least-squares solver (C7).
//!
//! Minimizes `(1/2)||r(x)||^2` over a box `lo <= x <= hi`, for the joint
//! multi-pair arbitrage residual in `crate::arb`. No off-the-shelf bounded
//! Levenberg-Marquardt crate is part of this lineage's dependency stack, so
//! the solver is built directly on `nalgebra`'s `DVector`/`DMatrix`, matching
//! the level the originating system's `scipy.optimize.least_squares` sits at.

use crate::cancel::{CancellationToken, NeverCancel};
use crate::error::{PoolError, PoolResult};
use nalgebra::{DMatrix, DVector};

/// Anything that can be probed at a point `x` and returns the residual
/// vector `r(x)`. Implemented by the joint arbitrage residual in `crate::arb`.
pub trait Residual {
    fn evaluate(&mut self, x: &[f64]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct SolveReport {
    pub iterations: usize,
    pub converged: bool,
}

/// Forward-difference Jacobian step, scaled by the larger of 1 and the
/// coordinate's magnitude (per-coordinate finite-difference step).
fn fd_step(x: f64) -> f64 {
    f64::EPSILON.sqrt() * x.abs().max(1.0)
}

fn clamp_box(x: &mut [f64], lo: &[f64], hi: &[f64]) {
    for k in 0..x.len() {
        x[k] = x[k].clamp(lo[k], hi[k]);
    }
}

/// Solve for `x` minimizing `||r(x)||` within `[lo, hi]`, starting from `x0`.
///
/// Uses a damped Gauss-Newton step (Levenberg-Marquardt) with the step
/// clamped back into the box before being accepted (reflective projection —
/// `r` is never evaluated outside the box). Terminates when the gradient
/// norm or the parameter step norm drops to `tol`, or after `max_iter`
/// iterations without doing so, in which case it returns
/// [`PoolError::SolverDiverged`].
pub fn solve_bounded(
    residual: &mut dyn Residual,
    x0: &[f64],
    lo: &[f64],
    hi: &[f64],
    max_iter: usize,
    tol: f64,
) -> PoolResult<(Vec<f64>, SolveReport)> {
    solve_bounded_cancellable(residual, x0, lo, hi, max_iter, tol, &NeverCancel)
}

/// As [`solve_bounded`], but `cancel` is polled once per outer iteration —
/// this loop is under this crate's direct control, unlike the opaque
/// Brent's-method call in `crate::rootfind`, so cancellation here is
/// genuinely per-iteration.
pub fn solve_bounded_cancellable(
    residual: &mut dyn Residual,
    x0: &[f64],
    lo: &[f64],
    hi: &[f64],
    max_iter: usize,
    tol: f64,
    cancel: &dyn CancellationToken,
) -> PoolResult<(Vec<f64>, SolveReport)> {
    let n = x0.len();
    let mut x: Vec<f64> = x0.to_vec();
    clamp_box(&mut x, lo, hi);

    let mut r = residual.evaluate(&x);
    let m = r.len();
    let mut lambda = 1e-3;

    for iteration in 0..max_iter {
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }
        let r_vec = DVector::from_vec(r.clone());

        let mut jac = DMatrix::<f64>::zeros(m, n);
        for k in 0..n {
            let h = fd_step(x[k]);
            let mut x_pert = x.clone();
            x_pert[k] = (x_pert[k] + h).clamp(lo[k], hi[k]);
            let applied_h = x_pert[k] - x[k];
            if applied_h == 0.0 {
                continue;
            }
            let r_pert = residual.evaluate(&x_pert);
            for row in 0..m {
                jac[(row, k)] = (nan_to_zero(r_pert[row]) - nan_to_zero(r[row])) / applied_h;
            }
        }

        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let jtr = &jt * &r_vec;

        let grad_norm = jtr.norm();
        if grad_norm <= tol {
            return Ok((x, SolveReport { iterations: iteration, converged: true }));
        }

        let mut a = jtj.clone();
        for k in 0..n {
            a[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
        }

        let step = match a.lu().solve(&(-&jtr)) {
            Some(s) => s,
            None => {
                lambda *= 10.0;
                continue;
            }
        };

        let mut x_trial = x.clone();
        for k in 0..n {
            x_trial[k] += step[k];
        }
        clamp_box(&mut x_trial, lo, hi);

        let step_norm = x_trial
            .iter()
            .zip(&x)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();

        let r_trial = residual.evaluate(&x_trial);
        let cost = sum_squares(&r);
        let cost_trial = sum_squares(&r_trial);

        if cost_trial < cost {
            x = x_trial;
            r = r_trial;
            lambda = (lambda / 10.0).max(1e-12);
        } else {
            lambda *= 10.0;
        }

        if step_norm <= tol {
            return Ok((x, SolveReport { iterations: iteration + 1, converged: true }));
        }
    }

    Err(PoolError::SolverDiverged)
}

fn nan_to_zero(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

fn sum_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| nan_to_zero(*v).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        target: Vec<f64>,
    }

    impl Residual for Quadratic {
        fn evaluate(&mut self, x: &[f64]) -> Vec<f64> {
            x.iter().zip(&self.target).map(|(xi, ti)| xi - ti).collect()
        }
    }

    #[test]
    fn converges_to_unconstrained_minimum() {
        let mut residual = Quadratic { target: vec![3.0, -2.0] };
        let (x, report) = solve_bounded(
            &mut residual,
            &[0.0, 0.0],
            &[-10.0, -10.0],
            &[10.0, 10.0],
            200,
            1e-12,
        )
        .unwrap();
        assert!(report.converged);
        assert!((x[0] - 3.0).abs() < 1e-4);
        assert!((x[1] + 2.0).abs() < 1e-4);
    }

    #[test]
    fn respects_box_bounds() {
        let mut residual = Quadratic { target: vec![100.0] };
        let (x, _report) = solve_bounded(&mut residual, &[0.0], &[0.0], &[5.0], 200, 1e-12).unwrap();
        assert!(x[0] <= 5.0 + 1e-9);
    }
}
