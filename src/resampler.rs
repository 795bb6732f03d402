//! Buckets a tick series into OHLCV bars per timeframe.

use std::collections::BTreeMap;

use crate::models::{Bar, Tick, Timeframe};

/// Resample `ticks` into bars of `timeframe`. Arrival order doesn't
/// matter: ticks are sorted by timestamp first (the upstream feed
/// tolerates jitter of a couple seconds, so arrival order isn't bucket
/// order), then grouped by `floor(timestamp/timeframe_ms)`. Empty buckets
/// are dropped; bars come back ascending by `start_time`. Pure function
/// of the input slice's contents, so re-running over the same ticks in
/// any order reproduces byte-identical bars, and at most one bar is ever
/// produced per `start_time`.
pub fn resample(ticks: &[Tick], timeframe: Timeframe) -> Vec<Bar> {
    let bucket_ms = timeframe.millis();
    let mut sorted: Vec<&Tick> = ticks.iter().collect();
    sorted.sort_by_key(|t| t.timestamp);

    let mut buckets: BTreeMap<i64, Bar> = BTreeMap::new();
    for tick in sorted {
        let start = tick.timestamp.div_euclid(bucket_ms) * bucket_ms;
        buckets
            .entry(start)
            .and_modify(|bar| {
                bar.high = bar.high.max(tick.price);
                bar.low = bar.low.min(tick.price);
                bar.close = tick.price;
                bar.volume += tick.quantity;
            })
            .or_insert(Bar {
                timeframe,
                start_time: start,
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume: tick.quantity,
            });
    }

    buckets.into_values().collect()
}
