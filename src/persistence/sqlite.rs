use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::PersistenceError;
use crate::models::{Alert, AnalyticsSnapshot, Bar, Condition, Timeframe};

use super::{AnalyticsRow, Persistence, Result, TickRow};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -16000;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    price REAL NOT NULL,
    quantity REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ticks_symbol_ts ON ticks(symbol, timestamp);

CREATE TABLE IF NOT EXISTS bars (
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    PRIMARY KEY (symbol, timeframe, start_time)
);

CREATE TABLE IF NOT EXISTS analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol_x TEXT NOT NULL,
    symbol_y TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    computed_at INTEGER NOT NULL,
    hedge_ratio REAL,
    spread REAL,
    z_score REAL,
    rolling_corr REAL,
    adf_stat REAL,
    p_value REAL
);
CREATE INDEX IF NOT EXISTS idx_analytics_pair ON analytics(symbol_x, symbol_y, timeframe, computed_at);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric TEXT NOT NULL,
    condition TEXT NOT NULL,
    threshold REAL NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);
"#;

pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Persistence for SqlitePersistence {
    fn append_ticks(&self, symbol: &str, ticks: &[TickRow]) -> Result<()> {
        if ticks.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ticks (symbol, timestamp, price, quantity) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for tick in ticks {
                stmt.execute(params![symbol, tick.timestamp, tick.price, tick.quantity])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn read_recent_ticks(&self, symbol: &str, limit: usize) -> Result<Vec<TickRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, price, quantity FROM ticks WHERE symbol = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![symbol, limit as i64], |row| {
                Ok(TickRow {
                    timestamp: row.get(0)?,
                    price: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().rev().collect())
    }

    fn upsert_bars(&self, symbol: &str, bars: &[Bar]) -> Result<()> {
        if bars.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bars (symbol, timeframe, start_time, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(symbol, timeframe, start_time) DO UPDATE SET
                   open = excluded.open, high = excluded.high, low = excluded.low,
                   close = excluded.close, volume = excluded.volume",
            )?;
            for bar in bars {
                stmt.execute(params![
                    symbol,
                    bar.timeframe.as_str(),
                    bar.start_time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn read_recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT start_time, open, high, low, close, volume FROM bars
             WHERE symbol = ?1 AND timeframe = ?2 ORDER BY start_time DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![symbol, timeframe.as_str(), limit as i64], |row| {
                Ok(Bar {
                    timeframe,
                    start_time: row.get(0)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().rev().collect())
    }

    fn append_analytics(&self, row: &AnalyticsRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO analytics
               (symbol_x, symbol_y, timeframe, computed_at, hedge_ratio, spread, z_score,
                rolling_corr, adf_stat, p_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.symbol_x,
                row.symbol_y,
                row.timeframe,
                row.snapshot.computed_at,
                row.snapshot.hedge_ratio,
                row.snapshot.spread,
                row.snapshot.z_score,
                row.snapshot.rolling_corr,
                row.snapshot.adf_stat,
                row.snapshot.p_value,
            ],
        )?;
        Ok(())
    }

    fn read_recent_analytics(
        &self,
        symbol_x: &str,
        symbol_y: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<AnalyticsRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT computed_at, hedge_ratio, spread, z_score, rolling_corr, adf_stat, p_value
             FROM analytics WHERE symbol_x = ?1 AND symbol_y = ?2 AND timeframe = ?3
             ORDER BY computed_at DESC LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![symbol_x, symbol_y, timeframe, limit as i64],
                |row| {
                    Ok(AnalyticsRow {
                        symbol_x: symbol_x.to_string(),
                        symbol_y: symbol_y.to_string(),
                        timeframe: timeframe.to_string(),
                        snapshot: AnalyticsSnapshot {
                            computed_at: row.get(0)?,
                            hedge_ratio: row.get(1)?,
                            spread: row.get(2)?,
                            z_score: row.get(3)?,
                            rolling_corr: row.get(4)?,
                            adf_stat: row.get(5)?,
                            p_value: row.get(6)?,
                        },
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().rev().collect())
    }

    fn create_alert(&self, metric: &str, condition: Condition, threshold: f64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alerts (metric, condition, threshold, is_active) VALUES (?1, ?2, ?3, 1)",
            params![metric, condition.as_str(), threshold],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, metric, condition, threshold, is_active FROM alerts WHERE is_active = 1",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let condition_str: String = row.get(2)?;
                let active: i64 = row.get(4)?;
                Ok(Alert {
                    id: row.get(0)?,
                    metric: row.get(1)?,
                    condition: Condition::parse(&condition_str).unwrap_or(Condition::Eq),
                    threshold: row.get(3)?,
                    active: active != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn deactivate_alert(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("UPDATE alerts SET is_active = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn delete_alert(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM alerts WHERE id = ?1", params![id])?;
        Ok(())
    }
}
