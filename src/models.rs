//! Core data types shared across the ingestion, analytics, and alerting
//! pipeline.

use serde::{Deserialize, Serialize};

/// A single trade print from the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Event time, milliseconds since epoch.
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
}

impl Tick {
    pub fn new(timestamp: i64, price: f64, quantity: f64) -> Self {
        Self {
            timestamp,
            price,
            quantity,
        }
    }
}

/// A tick tagged with its upper-cased symbol, as it flows through the
/// buffer/writer stage before being partitioned per-symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTick {
    pub symbol: String,
    pub tick: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneSecond,
    OneMinute,
    FiveMinutes,
}

impl Timeframe {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1s" => Some(Self::OneSecond),
            "1m" => Some(Self::OneMinute),
            "5m" => Some(Self::FiveMinutes),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
        }
    }

    pub const fn millis(&self) -> i64 {
        match self {
            Self::OneSecond => 1_000,
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 300_000,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An OHLCV bar, aligned to `start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timeframe: Timeframe,
    pub start_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// True when the bar satisfies the OHLC ordering and non-negative
    /// volume invariants.
    pub fn is_valid(&self) -> bool {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        self.low <= lo
            && lo <= hi
            && hi <= self.high
            && self.volume >= 0.0
            && self.start_time % self.timeframe.millis() == 0
    }
}

/// Persisted analytics row. Narrower than `PairAnalytics` — this is the
/// DB schema, not the alerting record; `AlertEngine::check` takes the
/// full `PairAnalytics` so alerts can reference fields this type drops.
/// `hedge_ratio.is_some()` implies `spread.is_some()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub computed_at: i64,
    pub hedge_ratio: Option<f64>,
    pub spread: Option<f64>,
    pub z_score: Option<f64>,
    pub rolling_corr: Option<f64>,
    pub adf_stat: Option<f64>,
    pub p_value: Option<f64>,
}

impl AnalyticsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.hedge_ratio.is_none()
            && self.spread.is_none()
            && self.z_score.is_none()
            && self.rolling_corr.is_none()
            && self.adf_stat.is_none()
            && self.p_value.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl Condition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Evaluate `value <cond> threshold`, with an epsilon tolerance for
    /// equality comparisons.
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        const EPS: f64 = 1e-6;
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < EPS,
            Self::Ne => (value - threshold).abs() >= EPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
    pub active: bool,
}

/// A single alert firing, produced by `AlertEngine::check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firing {
    pub alert_id: i64,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
    pub current_value: f64,
    pub timestamp_utc_iso: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_validity() {
        let bar = Bar {
            timeframe: Timeframe::OneSecond,
            start_time: 1_000,
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            volume: 5.0,
        };
        assert!(bar.is_valid());

        let bad = Bar { low: 13.0, ..bar };
        assert!(!bad.is_valid());
    }

    #[test]
    fn condition_epsilon() {
        assert!(Condition::Eq.evaluate(1.0000001, 1.0));
        assert!(!Condition::Eq.evaluate(1.01, 1.0));
        assert!(Condition::Ne.evaluate(1.01, 1.0));
    }

    #[test]
    fn snapshot_emptiness() {
        let snap = AnalyticsSnapshot {
            z_score: Some(2.5),
            ..Default::default()
        };
        assert!(!snap.is_empty());
        assert!(AnalyticsSnapshot::default().is_empty());
    }
}
