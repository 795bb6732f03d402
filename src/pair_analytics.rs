//! Composes the statistics kernel into a single pairwise cointegration
//! snapshot, and a rolling historical-table variant.

use crate::stats::{self, adf_test, ols, AdfResult};

const MIN_OBS: usize = 5;

/// Single-snapshot, tail-recompute cointegration record for a pair of
/// price series. This is the authoritative form used for live analytics;
/// `compute_rolling` below is a windowed historical-table variant built
/// on top of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairAnalytics {
    pub hedge_ratio: Option<f64>,
    pub spread_mean: Option<f64>,
    pub spread_std: Option<f64>,
    pub spread_last: Option<f64>,
    pub z_score_last: Option<f64>,
    pub z_score_mean: Option<f64>,
    pub z_score_std: Option<f64>,
    pub correlation: Option<f64>,
    pub adf_statistic: Option<f64>,
    pub adf_p_value: Option<f64>,
    pub is_stationary: Option<bool>,
}

impl PairAnalytics {
    pub fn is_empty(&self) -> bool {
        self.hedge_ratio.is_none()
    }

    /// Look up a metric by the name alerts reference it by. This is the
    /// full field set a live alert can be configured against — narrower
    /// than what gets persisted to the analytics table.
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "hedge_ratio" => self.hedge_ratio,
            "spread_mean" => self.spread_mean,
            "spread_std" => self.spread_std,
            "spread_last" => self.spread_last,
            "z_score_last" => self.z_score_last,
            "z_score_mean" => self.z_score_mean,
            "z_score_std" => self.z_score_std,
            "correlation" => self.correlation,
            "adf_statistic" => self.adf_statistic,
            "adf_p_value" => self.adf_p_value,
            "is_stationary" => self.is_stationary.map(|b| if b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// `(timestamp, price)` pairs for one leg of the pair, as read back from
/// the rolling buffer.
pub type PriceSeries<'a> = &'a [(i64, f64)];

/// Compute the tail-recompute pair analytics for `(prices_x, prices_y)`
/// over the last `max(window, 5)` observations. Requires at least 5
/// paired observations on the inner join of the two timestamp-aligned
/// series; returns an empty record otherwise.
pub fn compute_pair(prices_x: PriceSeries, prices_y: PriceSeries, window: usize) -> PairAnalytics {
    let (x, y) = inner_join(prices_x, prices_y);
    if x.len() < MIN_OBS {
        return PairAnalytics::default();
    }

    let ols_result = ols(&y, &x);
    let hedge_ratio = match ols_result.slope {
        Some(v) if v.is_finite() => v,
        _ => return PairAnalytics::default(),
    };

    let spread: Vec<f64> = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| yi - hedge_ratio * xi)
        .collect();
    if spread.is_empty() {
        return PairAnalytics::default();
    }

    let tail_window = window.max(MIN_OBS).min(spread.len());
    let spread_tail = &spread[spread.len() - tail_window..];
    let (spread_mean, spread_std) = mean_std(spread_tail);
    let spread_last = *spread.last().unwrap();
    let z_score_last = if spread_std == 0.0 || !spread_std.is_finite() {
        0.0
    } else {
        (spread_last - spread_mean) / spread_std
    };

    let z_series = stats::z_score(&spread, tail_window);
    let (z_score_mean, z_score_std) = if z_series.is_empty() {
        (0.0, 0.0)
    } else {
        mean_std(&z_series)
    };

    let price_tail = window.max(MIN_OBS).min(x.len());
    let correlation = {
        let c = stats::pearson(&x[x.len() - price_tail..], &y[y.len() - price_tail..]);
        if c.is_finite() {
            c
        } else {
            1.0
        }
    };

    let adf: AdfResult = adf_test(&spread, None);

    PairAnalytics {
        hedge_ratio: Some(hedge_ratio),
        spread_mean: Some(spread_mean),
        spread_std: Some(spread_std),
        spread_last: Some(spread_last),
        z_score_last: Some(z_score_last),
        z_score_mean: Some(z_score_mean),
        z_score_std: Some(z_score_std),
        correlation: Some(correlation),
        adf_statistic: adf.statistic,
        adf_p_value: adf.p_value,
        is_stationary: adf.is_stationary,
    }
}

/// One row of a walk-forward historical table: `compute_pair` applied to
/// each trailing window of size `window`, in order. Reserved for
/// historical/backfill use — `compute_pair` alone is authoritative for a
/// live single-point-in-time snapshot.
pub fn compute_rolling(
    prices_x: PriceSeries,
    prices_y: PriceSeries,
    window: usize,
) -> Vec<(i64, PairAnalytics)> {
    let (x, y) = inner_join(prices_x, prices_y);
    let timestamps = aligned_timestamps(prices_x, prices_y);
    let n = x.len();
    if n < window || window < MIN_OBS {
        return Vec::new();
    }

    let mut out = Vec::new();
    for end in window..=n {
        let start = end - window;
        let xs: Vec<(i64, f64)> = timestamps[start..end]
            .iter()
            .zip(x[start..end].iter())
            .map(|(&t, &v)| (t, v))
            .collect();
        let ys: Vec<(i64, f64)> = timestamps[start..end]
            .iter()
            .zip(y[start..end].iter())
            .map(|(&t, &v)| (t, v))
            .collect();
        let analytics = compute_pair(&xs, &ys, window);
        out.push((timestamps[end - 1], analytics));
    }
    out
}

fn mean_std(series: &[f64]) -> (f64, f64) {
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let var = if series.len() > 1 {
        series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    (mean, var.sqrt())
}

/// Inner join two `(timestamp, price)` series on matching timestamps,
/// preserving ascending order.
fn inner_join(a: PriceSeries, b: PriceSeries) -> (Vec<f64>, Vec<f64>) {
    use std::collections::HashMap;
    let b_map: HashMap<i64, f64> = b.iter().copied().collect();
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for &(ts, price) in a {
        if let Some(&other) = b_map.get(&ts) {
            xs.push(price);
            ys.push(other);
        }
    }
    (xs, ys)
}

fn aligned_timestamps(a: PriceSeries, b: PriceSeries) -> Vec<i64> {
    use std::collections::HashMap;
    let b_map: HashMap<i64, f64> = b.iter().copied().collect();
    a.iter()
        .filter(|(ts, _)| b_map.contains_key(ts))
        .map(|(ts, _)| *ts)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize) -> (Vec<(i64, f64)>, Vec<(i64, f64)>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let xi = 100.0 + i as f64 * 0.1;
            let yi = 2.0 * xi + 5.0;
            x.push((i as i64, xi));
            y.push((i as i64, yi));
        }
        (x, y)
    }

    #[test]
    fn too_few_observations_is_empty() {
        let (x, y) = synthetic(3);
        let result = compute_pair(&x, &y, 20);
        assert!(result.is_empty());
    }

    #[test]
    fn recovers_hedge_ratio_and_zero_spread() {
        let (x, y) = synthetic(50);
        let result = compute_pair(&x, &y, 20);
        assert!(!result.is_empty());
        assert!((result.hedge_ratio.unwrap() - 2.0).abs() < 1e-6);
        assert!(result.spread_last.unwrap().abs() < 1e-6);
    }

    #[test]
    fn spread_definition_matches_hedge_ratio() {
        let (x, y) = synthetic(30);
        let result = compute_pair(&x, &y, 10);
        let hedge_ratio = result.hedge_ratio.unwrap();
        let (xs, ys) = inner_join(&x, &y);
        let expected_last = *ys.last().unwrap() - hedge_ratio * *xs.last().unwrap();
        assert!((result.spread_last.unwrap() - expected_last).abs() < 1e-9);
    }

    #[test]
    fn rolling_table_length_matches_walk_count() {
        let (x, y) = synthetic(30);
        let table = compute_rolling(&x, &y, 10);
        assert_eq!(table.len(), 21);
    }

    #[test]
    fn shorter_than_window_is_empty_table() {
        let (x, y) = synthetic(5);
        assert!(compute_rolling(&x, &y, 10).is_empty());
    }

    #[test]
    fn metric_lookup_covers_spec_names() {
        let (x, y) = synthetic(50);
        let result = compute_pair(&x, &y, 20);
        assert_eq!(result.metric("z_score_last"), result.z_score_last);
        assert_eq!(result.metric("spread_last"), result.spread_last);
        assert_eq!(result.metric("correlation"), result.correlation);
        assert_eq!(result.metric("hedge_ratio"), result.hedge_ratio);
        assert_eq!(result.metric("adf_p_value"), result.adf_p_value);
        assert_eq!(result.metric("nope"), None);
    }
}
