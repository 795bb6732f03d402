//! Periodic background tasks: bar resampling and pair analytics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerts::AlertEngine;
use crate::buffer::RollingBuffer;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::models::AnalyticsSnapshot;
use crate::pair_analytics::compute_pair;
use crate::persistence::{AnalyticsRow, Persistence};
use crate::resampler::resample;

use std::sync::Mutex as StdMutex;

const RESAMPLE_START_DELAY: Duration = Duration::from_secs(10);
const RESAMPLE_PERIOD: Duration = Duration::from_secs(5);
const RESAMPLE_MIN_TICKS: usize = 10;
const RESAMPLE_READ_LIMIT: usize = 5_000;

const ANALYTICS_START_DELAY: Duration = Duration::from_secs(5);
const ANALYTICS_READ_LIMIT: usize = 1_000;
const ANALYTICS_KEEP: usize = 200;
const ANALYTICS_MIN_WINDOW: usize = 5;

pub struct Scheduler {
    config: Config,
    buffer: Arc<RollingBuffer>,
    store: Arc<dyn Persistence>,
    alerts: Arc<StdMutex<AlertEngine>>,
    clock: Arc<dyn Clock>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        buffer: Arc<RollingBuffer>,
        store: Arc<dyn Persistence>,
        alerts: Arc<StdMutex<AlertEngine>>,
    ) -> Arc<Self> {
        Self::with_clock(config, buffer, store, alerts, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        buffer: Arc<RollingBuffer>,
        store: Arc<dyn Persistence>,
        alerts: Arc<StdMutex<AlertEngine>>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            buffer,
            store,
            alerts,
            clock,
            tasks: StdMutex::new(Vec::new()),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let resample_scheduler = self.clone();
        let resample_handle = tokio::spawn(async move {
            tokio::time::sleep(RESAMPLE_START_DELAY).await;
            let mut ticker = tokio::time::interval(RESAMPLE_PERIOD);
            loop {
                ticker.tick().await;
                resample_scheduler.run_resample_tick();
            }
        });

        let analytics_scheduler = self.clone();
        let analytics_handle = tokio::spawn(async move {
            tokio::time::sleep(ANALYTICS_START_DELAY).await;
            let mut ticker = tokio::time::interval(analytics_scheduler.config.analytics_interval);
            loop {
                ticker.tick().await;
                analytics_scheduler.run_analytics_tick();
            }
        });

        self.tasks.lock().unwrap().push(resample_handle);
        self.tasks.lock().unwrap().push(analytics_handle);
    }

    pub fn stop(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }

    fn run_resample_tick(&self) {
        for symbol in &self.config.symbols {
            let ticks = self.buffer.get_recent(symbol, RESAMPLE_READ_LIMIT);
            if ticks.len() < RESAMPLE_MIN_TICKS {
                continue;
            }
            for timeframe in &self.config.timeframes {
                let bars = resample(&ticks, *timeframe);
                if bars.is_empty() {
                    continue;
                }
                if let Err(err) = self.store.upsert_bars(symbol, &bars) {
                    warn!(symbol, timeframe = %timeframe, error = %err, "bar upsert failed");
                }
            }
        }
    }

    fn run_analytics_tick(&self) {
        if self.config.symbols.len() < 2 {
            return;
        }
        let symbol_x = &self.config.symbols[0];
        let symbol_y = &self.config.symbols[1];

        let prices_x = truncate_tail(
            self.buffer.get_price_series(symbol_x, ANALYTICS_READ_LIMIT),
            ANALYTICS_KEEP,
        );
        let prices_y = truncate_tail(
            self.buffer.get_price_series(symbol_y, ANALYTICS_READ_LIMIT),
            ANALYTICS_KEEP,
        );

        let window = self
            .config
            .default_rolling_window
            .min(prices_x.len().min(prices_y.len()) / 2);
        if window < ANALYTICS_MIN_WINDOW {
            return;
        }

        let result = compute_pair(&prices_x, &prices_y, window);
        if result.is_empty() {
            return;
        }
        if result.z_score_last.is_none() && result.correlation.is_none() {
            return;
        }

        // Alerts are checked against the full pair-analytics record, not
        // the narrower schema below — narrowing only happens for the DB
        // row, never for alerting (an alert on e.g. `spread_mean` would
        // never fire otherwise).
        let firings = self.alerts.lock().unwrap().check(&result);
        for firing in &firings {
            info!(alert_id = firing.alert_id, metric = %firing.metric, value = firing.current_value, "alert fired");
        }

        let snapshot = AnalyticsSnapshot {
            computed_at: self.clock.now_ms(),
            hedge_ratio: result.hedge_ratio,
            spread: result.spread_last,
            z_score: result.z_score_last,
            rolling_corr: result.correlation,
            adf_stat: result.adf_statistic,
            p_value: result.adf_p_value,
        };

        let row = AnalyticsRow {
            symbol_x: symbol_x.clone(),
            symbol_y: symbol_y.clone(),
            timeframe: "tick".to_string(),
            snapshot,
        };
        if let Err(err) = self.store.append_analytics(&row) {
            warn!(error = %err, "analytics persistence failed");
        }
    }
}

fn truncate_tail(series: Vec<(i64, f64)>, keep: usize) -> Vec<(i64, f64)> {
    let start = series.len().saturating_sub(keep);
    series[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Alert, Condition, Tick};
    use crate::persistence::SqlitePersistence;

    #[test]
    fn truncates_to_keep_count() {
        let series: Vec<(i64, f64)> = (0..10).map(|i| (i, i as f64)).collect();
        let kept = truncate_tail(series, 3);
        assert_eq!(kept, vec![(7, 7.0), (8, 8.0), (9, 9.0)]);
    }

    fn test_config() -> Config {
        Config {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            timeframes: vec![crate::models::Timeframe::OneSecond],
            default_rolling_window: 5,
            analytics_interval: Duration::from_secs(1),
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            feed_endpoint_base: String::new(),
            db_url: ":memory:".to_string(),
        }
    }

    #[test]
    fn analytics_tick_stamps_snapshot_from_injected_clock() {
        let config = test_config();
        let buffer = Arc::new(RollingBuffer::default());
        for i in 0..30i64 {
            let x = 100.0 + i as f64 * 0.05;
            let y = 2.0 * x + 1.0;
            buffer.add("BTCUSDT", Tick::new(i * 100, x, 1.0));
            buffer.add("ETHUSDT", Tick::new(i * 100, y, 1.0));
        }
        let store: Arc<dyn Persistence> = Arc::new(SqlitePersistence::open_in_memory().unwrap());
        let alerts = Arc::new(StdMutex::new(AlertEngine::new(vec![Alert {
            id: 1,
            metric: "z_score_last".to_string(),
            condition: Condition::Ge,
            threshold: -1_000.0,
            active: true,
        }])));
        let clock = Arc::new(FixedClock::new(123_456));
        let scheduler =
            Scheduler::with_clock(config, buffer, store.clone(), alerts.clone(), clock);

        scheduler.run_analytics_tick();

        let history = alerts.lock().unwrap().alert_history(10).to_vec();
        assert_eq!(history.len(), 1, "z_score_last alert should fire against the rich record");

        let rows = store
            .read_recent_analytics("BTCUSDT", "ETHUSDT", "tick", 10)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].snapshot.computed_at, 123_456);
    }
}
