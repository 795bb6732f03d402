//! In-memory rolling per-symbol tick buffer. Bounded FIFO, insertion
//! order, oldest evicted on overflow. Never persisted.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::models::Tick;

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Default)]
struct SymbolBuffer {
    ticks: VecDeque<Tick>,
}

pub struct RollingBuffer {
    inner: RwLock<HashMap<String, SymbolBuffer>>,
    capacity: usize,
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn add(&self, symbol: &str, tick: Tick) {
        let mut map = self.inner.write();
        let buf = map.entry(symbol.to_string()).or_default();
        buf.ticks.push_back(tick);
        while buf.ticks.len() > self.capacity {
            buf.ticks.pop_front();
        }
    }

    /// Snapshot of up to `limit` most recent ticks for `symbol`, oldest
    /// first. The lock is released before the caller computes on the copy.
    pub fn get_recent(&self, symbol: &str, limit: usize) -> Vec<Tick> {
        let map = self.inner.read();
        match map.get(symbol) {
            Some(buf) => {
                let len = buf.ticks.len();
                let skip = len.saturating_sub(limit);
                buf.ticks.iter().skip(skip).copied().collect()
            }
            None => Vec::new(),
        }
    }

    /// Price series for `symbol`, deduplicated by timestamp (keeping the
    /// last occurrence) and sorted ascending by timestamp.
    pub fn get_price_series(&self, symbol: &str, limit: usize) -> Vec<(i64, f64)> {
        let recent = self.get_recent(symbol, limit);
        dedupe_keep_last(&recent)
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.inner
            .read()
            .get(symbol)
            .map(|b| b.ticks.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, symbol: &str) -> bool {
        self.len(symbol) == 0
    }

    pub fn clear(&self, symbol: Option<&str>) {
        let mut map = self.inner.write();
        match symbol {
            Some(sym) => {
                map.remove(sym);
            }
            None => map.clear(),
        }
    }

    pub fn buffer_sizes(&self) -> HashMap<String, usize> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.ticks.len()))
            .collect()
    }
}

fn dedupe_keep_last(ticks: &[Tick]) -> Vec<(i64, f64)> {
    let mut by_ts: HashMap<i64, f64> = HashMap::new();
    let mut order: Vec<i64> = Vec::new();
    for t in ticks {
        if !by_ts.contains_key(&t.timestamp) {
            order.push(t.timestamp);
        }
        by_ts.insert(t.timestamp, t.price);
    }
    order.sort_unstable();
    order
        .into_iter()
        .map(|ts| (ts, by_ts[&ts]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let buf = RollingBuffer::new(3);
        for i in 0..5 {
            buf.add("BTCUSDT", Tick::new(i, i as f64, 1.0));
        }
        assert_eq!(buf.len("BTCUSDT"), 3);
        let recent = buf.get_recent("BTCUSDT", 10);
        assert_eq!(recent.iter().map(|t| t.timestamp).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn dedupes_keeping_last() {
        let buf = RollingBuffer::new(10);
        buf.add("BTCUSDT", Tick::new(1, 10.0, 1.0));
        buf.add("BTCUSDT", Tick::new(1, 11.0, 1.0));
        buf.add("BTCUSDT", Tick::new(2, 12.0, 1.0));
        let series = buf.get_price_series("BTCUSDT", 10);
        assert_eq!(series, vec![(1, 11.0), (2, 12.0)]);
    }

    #[test]
    fn unknown_symbol_is_empty() {
        let buf = RollingBuffer::new(10);
        assert!(buf.get_recent("NOPE", 10).is_empty());
        assert!(buf.is_empty("NOPE"));
    }
}
