//! Ordinary least squares with intercept, and a windowed variant.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a simple linear regression `y = intercept + slope * x`.
/// `error` is set instead of panicking when the fit is numerically
/// degenerate (e.g. fewer than 2 observations, or singular design matrix).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OlsResult {
    pub intercept: Option<f64>,
    pub slope: Option<f64>,
    pub r_squared: Option<f64>,
    pub p_value: Option<f64>,
    pub std_err: Option<f64>,
}

impl OlsResult {
    fn failed() -> Self {
        Self::default()
    }
}

/// Fit `y` on `x` with an intercept. Requires at least 2 paired
/// observations; returns a result with all fields `None` otherwise.
pub fn ols(y: &[f64], x: &[f64]) -> OlsResult {
    let n = y.len().min(x.len());
    if n < 2 {
        return OlsResult::failed();
    }
    let y = &y[..n];
    let x = &x[..n];

    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { x[r] });
    let target = DVector::from_column_slice(y);

    let xtx = design.transpose() * &design;
    let xtx_inv = match xtx.clone().try_inverse() {
        Some(inv) => inv,
        None => return OlsResult::failed(),
    };
    let beta = &xtx_inv * design.transpose() * &target;
    let intercept = beta[0];
    let slope = beta[1];
    if !intercept.is_finite() || !slope.is_finite() {
        return OlsResult::failed();
    }

    let fitted = &design * &beta;
    let residuals = &target - &fitted;
    let y_mean = target.mean();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = target.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let dof = (n - 2) as f64;
    if dof <= 0.0 {
        return OlsResult {
            intercept: Some(intercept),
            slope: Some(slope),
            r_squared: Some(r_squared),
            p_value: None,
            std_err: None,
        };
    }
    let mse = ss_res / dof;
    let std_err = (mse * xtx_inv[(1, 1)]).sqrt();
    let (p_value, std_err) = if std_err > 0.0 && std_err.is_finite() {
        let t_stat = slope / std_err;
        let p = match StudentsT::new(0.0, 1.0, dof) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t_stat.abs())),
            Err(_) => f64::NAN,
        };
        (Some(p).filter(|v| v.is_finite()), Some(std_err))
    } else {
        (None, None)
    };

    OlsResult {
        intercept: Some(intercept),
        slope: Some(slope),
        r_squared: Some(r_squared),
        p_value,
        std_err,
    }
}

/// Walk trailing windows of size `window` and fit `ols` on each,
/// returning one result per window-end index (ascending), starting once
/// enough observations exist.
pub fn rolling_ols(y: &[f64], x: &[f64], window: usize) -> Vec<OlsResult> {
    let n = y.len().min(x.len());
    let mut out = Vec::new();
    if window < 2 || n < window {
        return out;
    }
    for end in window..=n {
        let start = end - window;
        out.push(ols(&y[start..end], &x[start..end]));
    }
    out
}
