use std::sync::{Arc, Mutex};

use cointegrate::alerts::AlertEngine;
use cointegrate::buffer::RollingBuffer;
use cointegrate::config::Config;
use cointegrate::feed::{FeedClient, SessionConfig};
use cointegrate::persistence::{Persistence, SqlitePersistence};
use cointegrate::scheduler::Scheduler;
use cointegrate::writer::TickWriter;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    info!(symbols = ?config.symbols, timeframes = ?config.timeframes, "starting pipeline");

    let store: Arc<dyn Persistence> = Arc::new(SqlitePersistence::open(&config.db_url)?);

    let buffer = Arc::new(RollingBuffer::default());
    let writer = TickWriter::new(store.clone(), config.batch_size, config.flush_interval);
    writer.start();

    let active_alerts = store.list_active_alerts()?;
    let alerts = Arc::new(Mutex::new(AlertEngine::new(active_alerts)));

    let scheduler = Scheduler::new(config.clone(), buffer.clone(), store.clone(), alerts);
    scheduler.start();

    let feed = FeedClient::new(
        config.symbols.clone(),
        config.feed_endpoint_base.clone(),
        buffer.clone(),
        writer.clone(),
        SessionConfig::default(),
    );
    let feed_handle = feed.clone().spawn();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop();
    writer.shutdown().await;
    feed.stop();
    let _ = feed_handle.await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cointegrate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
