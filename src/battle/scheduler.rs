//! Periodic deadline sweep.
//!
//! No durable timer state: every pass re-derives outstanding deadlines
//! from each battle's timeline, so a restarted process resumes exactly
//! where the log left off.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration};

use crate::battle::engine::BattleEngine;
use crate::config::settings;

/// Spawn the infinite sweep loop as a Tokio task.
pub fn start(engine: Arc<BattleEngine>) {
    tokio::spawn(async move {
        loop {
            let enforced = engine.sweep(Utc::now()).await;
            if enforced > 0 {
                log::info!("deadline sweep enforced {enforced} action(s)");
            }
            sleep(Duration::from_secs(settings().sweep_interval_secs)).await;
        }
    });
}
