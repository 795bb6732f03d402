//! Augmented Dickey-Fuller stationarity test.

use nalgebra::{DMatrix, DVector};

/// Approximate MacKinnon (1994) critical values for the ADF test with a
/// constant and no trend, at the usual significance levels. These are
/// sample-size-invariant asymptotic approximations, adequate for the
/// pipeline's threshold-based `is_stationary` flag rather than precise
/// inference.
const CRITICAL_1PCT: f64 = -3.43;
const CRITICAL_5PCT: f64 = -2.86;
const CRITICAL_10PCT: f64 = -2.57;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdfResult {
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub used_lag: Option<usize>,
    pub n_obs: Option<usize>,
    pub critical_values: Option<[(String, f64); 3]>,
    pub is_stationary: Option<bool>,
    /// Set instead of the fields above when the fit is numerically
    /// degenerate. Never panics.
    pub error: Option<String>,
}

/// Run the ADF test on `series`, selecting the lag order in `[0,
/// max_lag]` by AIC, where `max_lag` defaults to `floor((n-1)^(1/3))`
/// when `None`. Requires at least 10 observations.
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> AdfResult {
    let clean: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = clean.len();
    if n < 10 {
        return AdfResult {
            error: Some("fewer than 10 observations".to_string()),
            ..Default::default()
        };
    }

    let max_lag = max_lag.unwrap_or_else(|| (((n - 1) as f64).cbrt()).floor() as usize);

    let mut best: Option<(usize, f64, AdfResult)> = None;
    for lag in 0..=max_lag {
        match fit_adf_regression(&clean, lag) {
            Some((aic, result)) => {
                if best.as_ref().map(|(_, best_aic, _)| aic < *best_aic).unwrap_or(true) {
                    best = Some((lag, aic, result));
                }
            }
            None => continue,
        }
    }

    match best {
        Some((_, _, result)) => result,
        None => AdfResult {
            error: Some("regression failed to converge for all candidate lags".to_string()),
            ..Default::default()
        },
    }
}

/// Fit `delta y_t = alpha + beta * y_{t-1} + sum phi_i * delta y_{t-i} + e`
/// for the given lag order. Returns `(aic, result)`.
fn fit_adf_regression(series: &[f64], lag: usize) -> Option<(f64, AdfResult)> {
    let n = series.len();
    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let start = lag + 1;
    if diffs.len() <= start {
        return None;
    }
    let n_obs = diffs.len() - lag;
    if n_obs < lag + 3 {
        return None;
    }

    let k = 2 + lag;
    let design = DMatrix::from_fn(n_obs, k, |r, c| {
        let t = start + r;
        match c {
            0 => 1.0,
            1 => series[t],
            j => diffs[t - j],
        }
    });
    let target = DVector::from_fn(n_obs, |r, _| diffs[start + r]);

    let xtx = design.transpose() * &design;
    let xtx_inv = xtx.clone().try_inverse()?;
    let beta = &xtx_inv * design.transpose() * &target;
    if beta.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let fitted = &design * &beta;
    let residuals = &target - &fitted;
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    if ss_res < 0.0 || !ss_res.is_finite() {
        return None;
    }

    let dof = (n_obs - k) as f64;
    if dof <= 0.0 {
        return None;
    }
    let mse = ss_res / dof;
    let se_beta1 = (mse * xtx_inv[(1, 1)]).sqrt();
    if se_beta1 <= 0.0 || !se_beta1.is_finite() {
        return None;
    }

    let statistic = beta[1] / se_beta1;
    let p_value = approximate_p_value(statistic);
    let is_stationary = p_value < 0.05;

    let log_likelihood = -0.5 * n_obs as f64 * ((ss_res / n_obs as f64).ln() + 1.0 + (2.0 * std::f64::consts::PI).ln());
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;

    let result = AdfResult {
        statistic: Some(statistic),
        p_value: Some(p_value),
        used_lag: Some(lag),
        n_obs: Some(n.min(n_obs + 1)),
        critical_values: Some([
            ("1%".to_string(), CRITICAL_1PCT),
            ("5%".to_string(), CRITICAL_5PCT),
            ("10%".to_string(), CRITICAL_10PCT),
        ]),
        is_stationary: Some(is_stationary),
        error: None,
    };
    Some((aic, result))
}

/// Crude MacKinnon-style p-value approximation: linear interpolation
/// between the three tabulated critical values, clamped to `[0, 1]`.
fn approximate_p_value(statistic: f64) -> f64 {
    if statistic <= CRITICAL_1PCT {
        return 0.01 * (statistic / CRITICAL_1PCT).min(1.0).max(0.0);
    }
    if statistic <= CRITICAL_5PCT {
        let span = CRITICAL_5PCT - CRITICAL_1PCT;
        let frac = (statistic - CRITICAL_1PCT) / span;
        return 0.01 + frac * 0.04;
    }
    if statistic <= CRITICAL_10PCT {
        let span = CRITICAL_10PCT - CRITICAL_5PCT;
        let frac = (statistic - CRITICAL_5PCT) / span;
        return 0.05 + frac * 0.05;
    }
    let tail = (statistic - CRITICAL_10PCT).max(0.0);
    (0.10 + tail * 0.05).min(0.999)
}
