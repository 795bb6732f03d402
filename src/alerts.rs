//! Threshold alerting over pair analytics records.

use chrono::Utc;
use tracing::warn;

use crate::models::{Alert, Firing};
use crate::pair_analytics::PairAnalytics;

const DEFAULT_HISTORY_LEN: usize = 100;

/// A delivery target for firings. Implementations isolate their own
/// failures — a sink returning `Err` never stops the others from running.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, firing: &Firing) -> anyhow::Result<()>;
}

pub struct AlertEngine {
    alerts: Vec<Alert>,
    sinks: Vec<Box<dyn AlertSink>>,
    history: Vec<Firing>,
    history_len: usize,
}

impl AlertEngine {
    pub fn new(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: alerts.into_iter().filter(|a| a.active).collect(),
            sinks: Vec::new(),
            history: Vec::new(),
            history_len: DEFAULT_HISTORY_LEN,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn alert_history(&self, limit: usize) -> &[Firing] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    /// Evaluate every active alert against `analytics`, emitting and
    /// recording a `Firing` for each one whose condition holds. `analytics`
    /// is the full pair-analytics record, not the narrower persisted
    /// snapshot — alerts are checked against it directly, before any
    /// narrowing for storage happens. Skips any alert whose metric is
    /// absent from the record. At most one firing per alert per call.
    pub fn check(&mut self, analytics: &PairAnalytics) -> Vec<Firing> {
        let mut fired = Vec::new();
        for alert in &self.alerts {
            let Some(value) = analytics.metric(&alert.metric) else {
                continue;
            };
            if !alert.condition.evaluate(value, alert.threshold) {
                continue;
            }
            let firing = Firing {
                alert_id: alert.id,
                metric: alert.metric.clone(),
                condition: alert.condition,
                threshold: alert.threshold,
                current_value: value,
                timestamp_utc_iso: Utc::now().to_rfc3339(),
            };
            fired.push(firing);
        }

        for firing in &fired {
            self.history.push(firing.clone());
            for sink in &self.sinks {
                if let Err(err) = sink.deliver(firing) {
                    warn!(alert_id = firing.alert_id, error = %err, "alert sink failed");
                }
            }
        }
        let overflow = self.history.len().saturating_sub(self.history_len);
        if overflow > 0 {
            self.history.drain(0..overflow);
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;
    use std::sync::{Arc, Mutex};

    fn alert(id: i64, metric: &str, condition: Condition, threshold: f64) -> Alert {
        Alert {
            id,
            metric: metric.to_string(),
            condition,
            threshold,
            active: true,
        }
    }

    #[test]
    fn fires_on_matching_condition() {
        let mut engine = AlertEngine::new(vec![alert(1, "z_score_last", Condition::Gt, 2.0)]);
        let analytics = PairAnalytics {
            z_score_last: Some(2.5),
            ..Default::default()
        };
        let fired = engine.check(&analytics);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert_id, 1);
    }

    #[test]
    fn skips_missing_metric() {
        let mut engine = AlertEngine::new(vec![alert(1, "correlation", Condition::Lt, 0.5)]);
        let analytics = PairAnalytics::default();
        assert!(engine.check(&analytics).is_empty());
    }

    #[test]
    fn inactive_alerts_are_never_loaded() {
        let mut a = alert(1, "z_score_last", Condition::Gt, 0.0);
        a.active = false;
        let mut engine = AlertEngine::new(vec![a]);
        let analytics = PairAnalytics {
            z_score_last: Some(5.0),
            ..Default::default()
        };
        assert!(engine.check(&analytics).is_empty());
    }

    #[test]
    fn sink_failure_does_not_block_other_sinks() {
        struct Failing;
        impl AlertSink for Failing {
            fn deliver(&self, _firing: &Firing) -> anyhow::Result<()> {
                anyhow::bail!("boom")
            }
        }
        let delivered = Arc::new(Mutex::new(0));
        struct Counting(Arc<Mutex<i32>>);
        impl AlertSink for Counting {
            fn deliver(&self, _firing: &Firing) -> anyhow::Result<()> {
                *self.0.lock().unwrap() += 1;
                Ok(())
            }
        }

        let mut engine = AlertEngine::new(vec![alert(1, "z_score_last", Condition::Gt, 1.0)]);
        engine.add_sink(Box::new(Failing));
        engine.add_sink(Box::new(Counting(delivered.clone())));

        let analytics = PairAnalytics {
            z_score_last: Some(2.0),
            ..Default::default()
        };
        engine.check(&analytics);
        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut engine = AlertEngine::new(vec![alert(1, "z_score_last", Condition::Gt, 0.0)]);
        engine.history_len = 3;
        for i in 0..10 {
            let analytics = PairAnalytics {
                z_score_last: Some(i as f64 + 1.0),
                ..Default::default()
            };
            engine.check(&analytics);
        }
        assert_eq!(engine.alert_history(100).len(), 3);
    }
}
