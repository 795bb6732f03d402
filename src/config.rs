use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::Timeframe;

/// Pipeline configuration, loaded once at process start from the
/// environment (plus an optional `.env` file). See spec §6.
#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub default_rolling_window: usize,
    pub analytics_interval: Duration,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub feed_endpoint_base: String,
    pub db_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let symbols: Vec<String> = env::var("SYMBOLS")
            .unwrap_or_else(|_| "BTCUSDT,ETHUSDT".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(ConfigError::EmptySymbols);
        }

        let timeframes: Vec<Timeframe> = env::var("TIMEFRAMES")
            .unwrap_or_else(|_| "1s,1m,5m".to_string())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                Timeframe::parse(s).ok_or_else(|| ConfigError::UnknownTimeframe(s.to_string()))
            })
            .collect::<Result<_, _>>()?;
        if timeframes.is_empty() {
            return Err(ConfigError::EmptyTimeframes);
        }

        let default_rolling_window: usize = env_parse("DEFAULT_ROLLING_WINDOW", 20);
        if default_rolling_window < 5 {
            return Err(ConfigError::WindowTooSmall(default_rolling_window));
        }

        let analytics_interval_secs: f64 = env_parse("ANALYTICS_INTERVAL", 1.0);
        if analytics_interval_secs <= 0.0 {
            return Err(ConfigError::NotPositive(
                "ANALYTICS_INTERVAL",
                analytics_interval_secs,
            ));
        }

        let batch_size: usize = env_parse("BATCH_SIZE", 100);
        if batch_size == 0 {
            return Err(ConfigError::NotPositive("BATCH_SIZE", 0.0));
        }

        let flush_interval_secs: f64 = env_parse("FLUSH_INTERVAL", 1.0);
        if flush_interval_secs <= 0.0 {
            return Err(ConfigError::NotPositive(
                "FLUSH_INTERVAL",
                flush_interval_secs,
            ));
        }

        let feed_endpoint_base = env::var("FEED_ENDPOINT_BASE")
            .unwrap_or_else(|_| "wss://stream.binance.com:9443/stream".to_string());

        let db_url = env::var("DB_URL").unwrap_or_else(|_| {
            default_data_path("cointegrate.db")
                .to_string_lossy()
                .into_owned()
        });

        Ok(Self {
            symbols,
            timeframes,
            default_rolling_window,
            analytics_interval: Duration::from_secs_f64(analytics_interval_secs),
            batch_size,
            flush_interval: Duration::from_secs_f64(flush_interval_secs),
            feed_endpoint_base,
            db_url,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Search cwd, `CARGO_MANIFEST_DIR`, and its parent for a `.env` file.
fn load_dotenv() {
    let candidates = [
        env::current_dir().ok(),
        option_env!("CARGO_MANIFEST_DIR").map(PathBuf::from),
        option_env!("CARGO_MANIFEST_DIR").map(|d| PathBuf::from(d).join("..")),
    ];
    for dir in candidates.into_iter().flatten() {
        let candidate = dir.join(".env");
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
            return;
        }
    }
    let _ = dotenv::dotenv();
}

/// Resolve a relative data path against `CARGO_MANIFEST_DIR` so the
/// binary's data files don't depend on invocation cwd.
pub fn resolve_data_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match option_env!("CARGO_MANIFEST_DIR") {
        Some(dir) => Path::new(dir).join(path),
        None => path.to_path_buf(),
    }
}

fn default_data_path(filename: &str) -> PathBuf {
    resolve_data_path(Path::new("data").join(filename))
}
