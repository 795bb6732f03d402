//! End-to-end integration test: feed ticks into the rolling buffer,
//! resample bars, compute pair analytics, and fire an alert, all against
//! an in-memory store with no live network feed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cointegrate::alerts::AlertEngine;
use cointegrate::buffer::RollingBuffer;
use cointegrate::config::Config;
use cointegrate::models::{Condition, Tick, Timeframe};
use cointegrate::pair_analytics::compute_pair;
use cointegrate::persistence::{Persistence, SqlitePersistence};
use cointegrate::resampler::resample;

fn test_config() -> Config {
    std::env::set_var("SYMBOLS", "BTCUSDT,ETHUSDT");
    std::env::set_var("TIMEFRAMES", "1s");
    std::env::set_var("DEFAULT_ROLLING_WINDOW", "5");
    std::env::set_var("DB_URL", ":memory:");
    let config = Config::from_env().unwrap();
    std::env::remove_var("SYMBOLS");
    std::env::remove_var("TIMEFRAMES");
    std::env::remove_var("DEFAULT_ROLLING_WINDOW");
    std::env::remove_var("DB_URL");
    config
}

#[tokio::test]
async fn ticks_flow_through_buffer_resample_and_analytics() {
    let config = test_config();
    let buffer = Arc::new(RollingBuffer::default());
    let store = Arc::new(SqlitePersistence::open_in_memory().unwrap());

    store.create_alert("z_score_last", Condition::Gt, 0.5).unwrap();
    let active = store.list_active_alerts().unwrap();
    assert_eq!(active.len(), 1);
    let mut alerts = AlertEngine::new(active);

    for i in 0..30i64 {
        let x_price = 100.0 + i as f64 * 0.05;
        let y_price = 2.0 * x_price + 1.0 + if i == 29 { 5.0 } else { 0.0 };
        buffer.add("BTCUSDT", Tick::new(i * 100, x_price, 1.0));
        buffer.add("ETHUSDT", Tick::new(i * 100, y_price, 1.0));
    }

    let x_ticks = buffer.get_recent("BTCUSDT", 1000);
    assert!(x_ticks.len() >= 10);
    let bars = resample(&x_ticks, Timeframe::OneSecond);
    assert!(!bars.is_empty());
    for bar in &bars {
        assert!(bar.is_valid());
    }
    store.upsert_bars("BTCUSDT", &bars).unwrap();
    let persisted = store
        .read_recent_bars("BTCUSDT", Timeframe::OneSecond, 10)
        .unwrap();
    assert_eq!(persisted.len(), bars.len());

    let prices_x = buffer.get_price_series("BTCUSDT", 1000);
    let prices_y = buffer.get_price_series("ETHUSDT", 1000);
    let window = config
        .default_rolling_window
        .min(prices_x.len().min(prices_y.len()) / 2);
    let result = compute_pair(&prices_x, &prices_y, window);
    assert!(!result.is_empty());
    assert!((result.hedge_ratio.unwrap() - 2.0).abs() < 0.5);

    // Alerts are checked against the rich pair-analytics record directly;
    // narrowing to `AnalyticsSnapshot` only happens for persistence.
    let fired = alerts.check(&result);
    assert!(!fired.is_empty(), "expected the z-score spike to fire the alert");
}

#[test]
fn reconnect_backoff_sequence_matches_scenario() {
    use cointegrate::feed::{BackoffCalculator, SessionConfig};
    let mut backoff = BackoffCalculator::new(SessionConfig::default());
    let delays: Vec<u64> = (0..6)
        .map(|_| backoff.next_backoff().as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000]);
    backoff.reset();
    assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
}
