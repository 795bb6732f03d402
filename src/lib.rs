//! Real-time trade-tick ingestion, OHLCV resampling, and pairwise
//! cointegration analytics with threshold alerting.

pub mod alerts;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod pair_analytics;
pub mod persistence;
pub mod resampler;
pub mod scheduler;
pub mod stats;
pub mod writer;

pub use config::Config;
