//! Client event fan-out and completed-battle archiving.
//!
//! Events flow out of the engine on an unbounded queue; this worker
//! publishes each one on the battle's Redis channel and, when a battle
//! completes, writes the archive row to Postgres.

use std::sync::Arc;

use redis::{AsyncCommands, Client as RedisClient};
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::battle::engine::BattleEngine;
use crate::db::battle_repo;
use crate::protocol::BattleEvent;

pub fn start(
    mut rx: mpsc::UnboundedReceiver<BattleEvent>,
    redis: RedisClient,
    db: PgPool,
    engine: Arc<BattleEngine>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            publish(&redis, &event).await;

            if let BattleEvent::BattleCompleted { battle_id, .. } = &event {
                match engine.snapshot(*battle_id).await {
                    Ok(battle) => {
                        let records = engine.escrow.records(*battle_id);
                        if let Err(e) = battle_repo::archive(&db, &battle, &records).await {
                            log::warn!("archive failed for {battle_id}: {e:?}");
                        }
                    }
                    Err(e) => log::warn!("snapshot failed for {battle_id}: {e}"),
                }
            }
        }
    });
}

async fn publish(redis: &RedisClient, event: &BattleEvent) {
    let channel = format!("battle:{}:events", event.battle_id());
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            log::error!("unserializable battle event: {e}");
            return;
        }
    };
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let _: () = conn.publish(channel, payload).await.unwrap_or(());
    }
}
