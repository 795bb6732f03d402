//! Persistence port: ticks, bars, analytics snapshots, and alerts.

mod sqlite;

pub use sqlite::SqlitePersistence;

use crate::error::PersistenceError;
use crate::models::{Alert, AnalyticsSnapshot, Bar, Condition, Timeframe};

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickRow {
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRow {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframe: String,
    pub snapshot: AnalyticsSnapshot,
}

/// Abstract storage contract the scheduler and admin surface depend on.
/// `SqlitePersistence` is the only production implementation; tests use
/// an in-memory `rusqlite` connection through the same trait.
pub trait Persistence: Send + Sync {
    fn append_ticks(&self, symbol: &str, ticks: &[TickRow]) -> Result<()>;
    fn read_recent_ticks(&self, symbol: &str, limit: usize) -> Result<Vec<TickRow>>;

    fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<()>;
    fn read_recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>>;

    fn append_analytics(&self, row: &AnalyticsRow) -> Result<()>;
    fn read_recent_analytics(
        &self,
        symbol_x: &str,
        symbol_y: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsRow>>;

    fn create_alert(&self, metric: &str, condition: Condition, threshold: f64) -> Result<i64>;
    fn list_active_alerts(&self) -> Result<Vec<Alert>>;
    fn deactivate_alert(&self, id: i64) -> Result<()>;
    fn delete_alert(&self, id: i64) -> Result<()>;
}
