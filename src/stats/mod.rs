//! Pure statistical functions over price/return series. Numerical failure
//! is never raised — callers get an empty result or an `error` field set.

mod adf;
mod ols;

pub use adf::{adf_test, AdfResult};
pub use ols::{ols, rolling_ols, OlsResult};

/// Simple returns: `(p[i] - p[i-1]) / p[i-1]`. Drops the undefined first
/// element.
pub fn returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Log returns: `ln(p[i] / p[i-1])`. Drops the undefined first element.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Rolling mean and sample standard deviation (denominator `n - 1`) over
/// trailing windows of size `window`. Indices before `window - 1` are NaN.
pub fn rolling_mean_std(series: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let n = series.len();
    let mut means = vec![f64::NAN; n];
    let mut stds = vec![f64::NAN; n];
    if window == 0 {
        return (means, stds);
    }
    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        let slice = &series[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = if window > 1 {
            slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0)
        } else {
            0.0
        };
        means[i] = mean;
        stds[i] = var.sqrt();
    }
    (means, stds)
}

/// Rolling Pearson correlation between two aligned series over trailing
/// windows of size `window`.
pub fn rolling_correlation(x: &[f64], y: &[f64], window: usize) -> Vec<f64> {
    let n = x.len().min(y.len());
    let mut out = vec![f64::NAN; n];
    if window < 2 {
        return out;
    }
    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        let xs = &x[i + 1 - window..=i];
        let ys = &y[i + 1 - window..=i];
        out[i] = pearson(xs, ys);
    }
    out
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx <= 0.0 || vy <= 0.0 {
        return f64::NAN;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// Z-score of the trailing window ending at each index: `(x - mean) /
/// std`. Non-finite inputs (from a degenerate window) are dropped — the
/// returned vector is shorter than `series` when that happens.
pub fn z_score(series: &[f64], window: usize) -> Vec<f64> {
    let (means, stds) = rolling_mean_std(series, window);
    series
        .iter()
        .zip(means.iter().zip(stds.iter()))
        .filter_map(|(&v, (&m, &s))| {
            if !v.is_finite() || !m.is_finite() || !s.is_finite() {
                return None;
            }
            let z = if s == 0.0 { 0.0 } else { (v - m) / s };
            Some(z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_drops_first() {
        let r = returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn log_returns_drops_first() {
        let r = log_returns(&[100.0, 100.0]);
        assert_eq!(r.len(), 1);
        assert!((r[0] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn rolling_mean_std_nan_before_window() {
        let (means, stds) = rolling_mean_std(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(means[0].is_nan());
        assert!(stds[1].is_nan());
        assert!((means[2] - 2.0).abs() < 1e-9);
        assert!((means[3] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_perfect_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn z_score_scale_shift_invariance() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let z1 = z_score(&series, 3);
        let scaled: Vec<f64> = series.iter().map(|v| v * 2.0 + 5.0).collect();
        let z2 = z_score(&scaled, 3);
        assert_eq!(z1.len(), z2.len());
        for (a, b) in z1.iter().zip(z2.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
