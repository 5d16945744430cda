//! Payment-rail dispatch.
//!
//! The ledger emits settlement instructions; this worker publishes them on
//! the `rail:instructions` channel for the external rail to execute. The
//! rail confirms transfers back through the HTTP callback, and anything
//! unconfirmed is re-published by the reconciliation loop.

use std::sync::Arc;
use std::time::Duration;

use redis::{AsyncCommands, Client as RedisClient};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::battle::engine::BattleEngine;
use crate::config::settings;
use crate::escrow::RailInstruction;

pub const INSTRUCTIONS_CHANNEL: &str = "rail:instructions";

/// Spawn the dispatcher for freshly emitted instructions.
pub fn start(mut rx: mpsc::UnboundedReceiver<RailInstruction>, redis: RedisClient) {
    tokio::spawn(async move {
        while let Some(instruction) = rx.recv().await {
            publish_with_retry(&redis, &instruction).await;
        }
    });
}

/// Spawn the reconciliation loop: re-publish everything the rail has not
/// confirmed yet. Keeps settlements converging after a crash or a rail
/// outage without ever marking records paid on our side alone.
pub fn start_reconciliation(engine: Arc<BattleEngine>, redis: RedisClient) {
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(settings().reconcile_interval_secs)).await;
            let outstanding = engine.escrow.unconfirmed();
            if outstanding.is_empty() {
                continue;
            }
            log::info!("reconciling {} unconfirmed rail instruction(s)", outstanding.len());
            for instruction in outstanding {
                publish_with_retry(&redis, &instruction).await;
            }
        }
    });
}

async fn publish_with_retry(redis: &RedisClient, instruction: &RailInstruction) {
    let payload = match serde_json::to_string(instruction) {
        Ok(p) => p,
        Err(e) => {
            log::error!("unserializable rail instruction: {e}");
            return;
        }
    };

    let strategy = ExponentialBackoff::from_millis(200).map(jitter).take(5);
    let result = Retry::spawn(strategy, || {
        let redis = redis.clone();
        let payload = payload.clone();
        async move {
            let mut conn = redis.get_multiplexed_async_connection().await?;
            let _: () = conn.publish(INSTRUCTIONS_CHANNEL, payload).await?;
            Ok::<(), redis::RedisError>(())
        }
    })
    .await;

    if let Err(e) = result {
        // Left in the ledger's unconfirmed set; the reconciliation loop
        // picks it up again.
        tracing::error!(?e, "rail publish failed");
    }
}
