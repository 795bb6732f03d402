//! Batches ticks per symbol and flushes them to persistence by size or by
//! interval, preserving ordering on retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::models::Tick;
use crate::persistence::{Persistence, TickRow};

pub struct TickWriter {
    pending: Arc<Mutex<HashMap<String, Vec<Tick>>>>,
    store: Arc<dyn Persistence>,
    batch_size: usize,
    flush_interval: Duration,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl TickWriter {
    pub fn new(store: Arc<dyn Persistence>, batch_size: usize, flush_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            store,
            batch_size,
            flush_interval,
            flush_task: Mutex::new(None),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let writer = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(writer.flush_interval);
            loop {
                ticker.tick().await;
                writer.flush_all().await;
            }
        });
        // `blocking_lock` would deadlock in async context; this runs at
        // startup before any other task touches `flush_task`.
        *self.flush_task.try_lock().expect("flush_task uncontended at start") = Some(handle);
    }

    pub async fn handle_tick(&self, symbol: &str, tick: Tick) {
        let should_flush = {
            let mut pending = self.pending.lock().await;
            let entry = pending.entry(symbol.to_string()).or_default();
            entry.push(tick);
            entry.len() >= self.batch_size
        };
        if should_flush {
            self.flush_symbol(symbol).await;
        }
    }

    async fn flush_symbol(&self, symbol: &str) {
        let batch = {
            let mut pending = self.pending.lock().await;
            match pending.get_mut(symbol) {
                Some(buf) if !buf.is_empty() => std::mem::take(buf),
                _ => return,
            }
        };

        let rows: Vec<TickRow> = batch
            .iter()
            .map(|t| TickRow {
                timestamp: t.timestamp,
                price: t.price,
                quantity: t.quantity,
            })
            .collect();

        if let Err(err) = self.store.append_ticks(symbol, &rows) {
            error!(symbol, error = %err, "tick flush failed, re-queueing batch");
            let mut pending = self.pending.lock().await;
            let entry = pending.entry(symbol.to_string()).or_default();
            let mut requeued = batch;
            requeued.extend(std::mem::take(entry));
            *entry = requeued;
        }
    }

    pub async fn flush_all(&self) {
        let symbols: Vec<String> = {
            let pending = self.pending.lock().await;
            pending.keys().cloned().collect()
        };
        for symbol in symbols {
            self.flush_symbol(&symbol).await;
        }
    }

    /// Stop the periodic flush task and synchronously drain every
    /// remaining buffered batch.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.flush_task.lock().await.take() {
            handle.abort();
        }
        self.flush_all().await;
        info!("tick writer drained on shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, AnalyticsSnapshot, Bar, Condition, Timeframe};
    use crate::persistence::{AnalyticsRow, Result as PResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyStore {
        fail_next: AtomicBool,
        appended: AtomicUsize,
    }

    impl Persistence for FlakyStore {
        fn append_ticks(&self, _symbol: &str, rows: &[TickRow]) -> PResult<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(crate::error::PersistenceError::Poisoned);
            }
            self.appended.fetch_add(rows.len(), Ordering::SeqCst);
            Ok(())
        }
        fn read_recent_ticks(&self, _symbol: &str, _limit: usize) -> PResult<Vec<TickRow>> {
            Ok(Vec::new())
        }
        fn upsert_bars(&self, _symbol: &str, _bars: &[Bar]) -> PResult<()> {
            Ok(())
        }
        fn read_recent_bars(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> PResult<Vec<Bar>> {
            Ok(Vec::new())
        }
        fn append_analytics(&self, _row: &AnalyticsRow) -> PResult<()> {
            Ok(())
        }
        fn read_recent_analytics(
            &self,
            _x: &str,
            _y: &str,
            _tf: &str,
            _limit: usize,
        ) -> PResult<Vec<AnalyticsRow>> {
            Ok(Vec::new())
        }
        fn create_alert(&self, _m: &str, _c: Condition, _t: f64) -> PResult<i64> {
            Ok(1)
        }
        fn list_active_alerts(&self) -> PResult<Vec<Alert>> {
            Ok(Vec::new())
        }
        fn deactivate_alert(&self, _id: i64) -> PResult<()> {
            Ok(())
        }
        fn delete_alert(&self, _id: i64) -> PResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn flushes_at_batch_size() {
        let store = Arc::new(FlakyStore {
            fail_next: AtomicBool::new(false),
            appended: AtomicUsize::new(0),
        });
        let writer = TickWriter::new(store.clone(), 2, Duration::from_secs(60));
        writer.handle_tick("BTCUSDT", Tick::new(1, 1.0, 1.0)).await;
        assert_eq!(store.appended.load(Ordering::SeqCst), 0);
        writer.handle_tick("BTCUSDT", Tick::new(2, 1.0, 1.0)).await;
        assert_eq!(store.appended.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn requeues_on_failure_without_losing_ticks() {
        let store = Arc::new(FlakyStore {
            fail_next: AtomicBool::new(true),
            appended: AtomicUsize::new(0),
        });
        let writer = TickWriter::new(store.clone(), 1, Duration::from_secs(60));
        writer.handle_tick("BTCUSDT", Tick::new(1, 1.0, 1.0)).await;
        assert_eq!(store.appended.load(Ordering::SeqCst), 0);
        writer.flush_all().await;
        assert_eq!(store.appended.load(Ordering::SeqCst), 1);
    }
}
