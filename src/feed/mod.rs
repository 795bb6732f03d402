//! Websocket feed client: state-machine-driven reconnect with exponential
//! backoff, wire-envelope parsing, and delivery into the rolling buffer
//! and tick writer.

mod session;

pub use session::{BackoffCalculator, SessionConfig, SessionState, TransitionReason};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::buffer::RollingBuffer;
use crate::models::Tick;
use crate::writer::TickWriter;

#[derive(Debug, Clone, Default)]
pub struct FeedMetrics {
    pub total_messages: u64,
    pub buffer_sizes: std::collections::HashMap<String, usize>,
    pub is_running: bool,
}

/// Parse one upstream frame. Frames without a `data` object are ignored;
/// malformed `data` objects are reported as `Err` and the caller logs and
/// continues without tearing down the connection.
pub fn parse_frame(symbols: &[String], raw: &str) -> Option<Result<(String, Tick), String>> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Some(Err(format!("invalid json: {e}"))),
    };
    let data = value.get("data")?;

    let symbol = data.get("s").and_then(Value::as_str)?.to_uppercase();
    if !symbols.iter().any(|s| s == &symbol) {
        return None;
    }
    let ts = match data.get("T").and_then(Value::as_i64) {
        Some(t) => t,
        None => return Some(Err("missing event time".to_string())),
    };
    let price = match data.get("p").and_then(Value::as_str).and_then(|s| s.parse::<f64>().ok()) {
        Some(p) => p,
        None => return Some(Err("missing or unparsable price".to_string())),
    };
    let qty = match data.get("q").and_then(Value::as_str).and_then(|s| s.parse::<f64>().ok()) {
        Some(q) => q,
        None => return Some(Err("missing or unparsable quantity".to_string())),
    };

    Some(Ok((symbol, Tick::new(ts, price, qty))))
}

/// Build the combined-stream subscription URL joining `{symbol}@trade`
/// streams under `base`.
pub fn build_stream_url(base: &str, symbols: &[String]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@trade", s.to_lowercase()))
        .collect();
    format!("{base}?streams={}", streams.join("/"))
}

pub struct FeedClient {
    symbols: Vec<String>,
    endpoint_base: String,
    buffer: Arc<RollingBuffer>,
    writer: Arc<TickWriter>,
    session_config: SessionConfig,
    total_messages: AtomicU64,
    running: AtomicBool,
    shutdown: Notify,
}

impl FeedClient {
    pub fn new(
        symbols: Vec<String>,
        endpoint_base: String,
        buffer: Arc<RollingBuffer>,
        writer: Arc<TickWriter>,
        session_config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            symbols,
            endpoint_base,
            buffer,
            writer,
            session_config,
            total_messages: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn metrics(&self) -> FeedMetrics {
        FeedMetrics {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            buffer_sizes: self.buffer.buffer_sizes(),
            is_running: self.running.load(Ordering::Relaxed),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self: Arc<Self>) {
        let mut backoff = BackoffCalculator::new(self.session_config);
        let mut state = SessionState::Idle;
        info!(%state, reason = %TransitionReason::Startup, "feed starting");

        while self.running.load(Ordering::SeqCst) {
            state = SessionState::Connecting;
            let url = build_stream_url(&self.endpoint_base, &self.symbols);

            let connect_result = tokio::time::timeout(
                self.session_config.connect_timeout,
                tokio_tungstenite::connect_async(&url),
            )
            .await;

            let stream = match connect_result {
                Ok(Ok((stream, _))) => {
                    backoff.reset();
                    state = SessionState::Open;
                    info!(%state, reason = %TransitionReason::ConnectSucceeded, "feed connected");
                    stream
                }
                _ => {
                    state = SessionState::Reconnecting;
                    let delay = backoff.next_backoff();
                    warn!(%state, reason = %TransitionReason::ConnectFailed, delay_ms = delay.as_millis() as u64, "feed connect failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = self.shutdown.notified() => break,
                    }
                }
            };

            let (mut write, mut read) = stream.split();
            loop {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        let _ = write.send(Message::Close(None)).await;
                        state = SessionState::Closing;
                        info!(%state, reason = %TransitionReason::ShutdownRequested, "feed shutting down");
                        self.running.store(false, Ordering::SeqCst);
                        return;
                    }
                    msg = tokio::time::timeout(self.session_config.receive_timeout, read.next()) => {
                        match msg {
                            Ok(Some(Ok(Message::Text(text)))) => {
                                self.total_messages.fetch_add(1, Ordering::Relaxed);
                                match parse_frame(&self.symbols, &text) {
                                    Some(Ok((symbol, tick))) => {
                                        self.buffer.add(&symbol, tick);
                                        self.writer.handle_tick(&symbol, tick).await;
                                    }
                                    Some(Err(reason)) => {
                                        warn!(reason, "dropping malformed feed frame");
                                    }
                                    None => {}
                                }
                            }
                            Ok(Some(Ok(Message::Ping(payload)))) => {
                                let _ = write.send(Message::Pong(payload)).await;
                            }
                            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                                state = SessionState::Reconnecting;
                                warn!(%state, reason = %TransitionReason::UnexpectedClose, "feed connection closed");
                                break;
                            }
                            Ok(Some(Err(_))) => {
                                state = SessionState::Reconnecting;
                                warn!(%state, reason = %TransitionReason::UnexpectedClose, "feed stream error");
                                break;
                            }
                            Err(_elapsed) => {
                                if write.send(Message::Ping(Vec::new())).await.is_err() {
                                    state = SessionState::Reconnecting;
                                    warn!(%state, reason = %TransitionReason::PingFailed, "feed heartbeat failed");
                                    break;
                                }
                                warn!(%state, reason = %TransitionReason::ReceiveTimeout, "feed idle, sent ping");
                            }
                            _ => {}
                        }
                    }
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let delay = backoff.next_backoff();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.notified() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trade_envelope() {
        let symbols = vec!["BTCUSDT".to_string()];
        let raw = r#"{"data":{"s":"BTCUSDT","T":1000,"p":"50000.5","q":"0.01"}}"#;
        let (symbol, tick) = parse_frame(&symbols, raw).unwrap().unwrap();
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(tick.timestamp, 1000);
        assert_eq!(tick.price, 50000.5);
    }

    #[test]
    fn ignores_frames_without_data() {
        let symbols = vec!["BTCUSDT".to_string()];
        assert!(parse_frame(&symbols, r#"{"result":null,"id":1}"#).is_none());
    }

    #[test]
    fn reports_malformed_price() {
        let symbols = vec!["BTCUSDT".to_string()];
        let raw = r#"{"data":{"s":"BTCUSDT","T":1000,"p":"oops","q":"1"}}"#;
        assert!(parse_frame(&symbols, raw).unwrap().is_err());
    }

    #[test]
    fn builds_combined_stream_url() {
        let url = build_stream_url(
            "wss://stream.binance.com:9443/stream",
            &["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        );
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade"
        );
    }
}
