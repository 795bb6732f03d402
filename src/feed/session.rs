//! Connection lifecycle state machine and backoff calculator for the feed
//! client.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closing => "closing",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Startup,
    ConnectSucceeded,
    ConnectFailed,
    SubscribeAckReceived,
    ReceiveTimeout,
    PingFailed,
    UnexpectedClose,
    ShutdownRequested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Startup => "startup",
            Self::ConnectSucceeded => "connect_succeeded",
            Self::ConnectFailed => "connect_failed",
            Self::SubscribeAckReceived => "subscribe_ack_received",
            Self::ReceiveTimeout => "receive_timeout",
            Self::PingFailed => "ping_failed",
            Self::UnexpectedClose => "unexpected_close",
            Self::ShutdownRequested => "shutdown_requested",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the capped delay to randomize by, symmetric around the
    /// cap. `0.0` yields the deterministic doubling sequence the test
    /// scenarios require; the teacher's default carries jitter, which
    /// remains available for callers who don't need determinism.
    pub jitter_factor: f64,
    pub connect_timeout: Duration,
    pub receive_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            connect_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(30),
        }
    }
}

/// Exponential backoff with an optional jitter band. Resets to the first
/// attempt on `reset()`, called after every successful connection.
pub struct BackoffCalculator {
    config: SessionConfig,
    attempt: u32,
    rng_state: u64,
}

impl BackoffCalculator {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            attempt: 0,
            rng_state: 0x9E3779B97F4A7C15,
        }
    }

    fn next_random(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn next_backoff(&mut self) -> Duration {
        let base =
            (self.config.backoff_base_ms as f64) * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.backoff_max_ms as f64);
        let jitter_range = capped * self.config.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            (self.next_random() * 2.0 - 1.0) * jitter_range
        } else {
            0.0
        };
        let final_ms = (capped + jitter).max(self.config.backoff_base_ms as f64);
        self.attempt += 1;
        Duration::from_millis(final_ms as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
