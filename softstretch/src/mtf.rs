//! Midtones transfer function and the midtones balance solver.
//!
//! The midtones transfer function (MTF) is the symmetric rational curve
//!
//! ```text
//! MTF(m; v) = ((m - 1) v) / ((2m - 1) v - m)
//! ```
//!
//! with `MTF(m; 0) = 0`, `MTF(m; m) = 0.5` and `MTF(m; 1) = 1`. A balance of
//! `0.5` is the identity; smaller balances brighten, larger ones darken.
//! `MTF(1 - m; ·)` is the inverse of `MTF(m; ·)`.
//!
//! The solver finds the balance that maps a measured median onto a target
//! median. The reported balance is `1 - r` for the inverse balance `r` with
//! `MTF(r; target) = current`; it is bisected for directly so that tiny
//! balances of very dark medians keep their significant digits.

use log::warn;

/// Default absolute tolerance on the balance value
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default bound on bisection steps
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Evaluate the midtones transfer function with balance `m` at `v`.
///
/// Inputs outside `(0, 1)` are clamped to the curve's fixed end points.
#[inline]
pub fn mtf(m: f64, v: f64) -> f64 {
    if v <= 0.0 {
        return 0.0;
    }
    if v >= 1.0 {
        return 1.0;
    }
    ((m - 1.0) * v) / ((2.0 * m - 1.0) * v - m)
}

/// Outcome of a balance search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceSolution {
    /// Midtones balance in `[0, 1]` mapping the current median onto the target
    pub balance: f64,
    /// Bisection steps taken, 0 for boundary cases
    pub iterations: usize,
    /// False when the iteration limit was hit before the tolerance was met
    pub converged: bool,
}

/// Bisection solver for the midtones balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidtonesBalanceSolver {
    /// Absolute tolerance on the balance and on the reproduced target
    pub tolerance: f64,
    /// Maximum number of bisection steps
    pub max_iterations: usize,
}

impl Default for MidtonesBalanceSolver {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl MidtonesBalanceSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Solve for the balance `m` with `MTF(m; current) = target`.
    ///
    /// Boundary inputs return without searching:
    /// * `current <= 0` or `target >= 1` returns `0.0`, the strongest stretch
    /// * `current >= 1` or `target <= 0` returns `1.0`, the strongest compression
    /// * `current == target` (or either is non-finite) returns `0.5`, the identity
    ///   curve. This is the only boundary case that is not `0` or `1`: no
    ///   stretch is needed, and either end point would clip the whole image.
    ///
    /// When the iteration limit is reached the best estimate is returned with
    /// `converged == false`.
    pub fn solve(&self, current: f64, target: f64) -> BalanceSolution {
        if let Some(balance) = boundary_balance(current, target) {
            return BalanceSolution {
                balance,
                iterations: 0,
                converged: true,
            };
        }

        let (balance, iterations, converged) = self.search_balance(current, target);
        if !converged {
            warn!(
                "Midtones balance search did not converge after {} iterations (current {:.6e}, target {:.6})",
                iterations, current, target
            );
        }

        BalanceSolution {
            balance,
            iterations,
            converged,
        }
    }

    /// Bisect for `b` with `MTF(b; current) = target`.
    ///
    /// `MTF(b; current)` falls monotonically from 1 at `b = 0` to 0 at `b = 1`,
    /// so the bracket `[0, 1]` always holds the root for inputs in `(0, 1)`.
    fn search_balance(&self, current: f64, target: f64) -> (f64, usize, bool) {
        let mut low = 0.0;
        let mut high = 1.0;
        let mut mid = 0.5;

        for iteration in 1..=self.max_iterations {
            mid = 0.5 * (low + high);
            let reached = mtf(mid, current);
            if reached > target {
                low = mid;
            } else {
                high = mid;
            }

            if high - low < self.tolerance && (reached - target).abs() < self.tolerance {
                return (mid, iteration, true);
            }
        }

        (mid, self.max_iterations, false)
    }
}

fn boundary_balance(current: f64, target: f64) -> Option<f64> {
    if !current.is_finite() || !target.is_finite() || current == target {
        Some(0.5)
    } else if current <= 0.0 || target >= 1.0 {
        Some(0.0)
    } else if current >= 1.0 || target <= 0.0 {
        Some(1.0)
    } else {
        None
    }
}
