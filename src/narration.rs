//! Fire-and-forget turn narration.
//!
//! Turn resolution never waits for narrative text: jobs are queued inside
//! the battle lock and this worker resolves them afterwards, appending the
//! result to the timeline as a follow-up event. The generation call is an
//! opaque external service; `narrate` is the seam where it plugs in.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::battle::engine::BattleEngine;
use crate::battle::types::TurnAction;

#[derive(Debug, Clone)]
pub struct NarrationJob {
    pub battle_id: Uuid,
    pub turn_seq: u64,
    pub actor: Uuid,
    pub action: Option<TurnAction>,
    pub target: Option<Uuid>,
    pub damage: i64,
    pub timed_out: bool,
}

/// Spawn the narration worker.
pub fn start(mut rx: mpsc::UnboundedReceiver<NarrationJob>, engine: Arc<BattleEngine>) {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let text = narrate(&job).await;
            if let Err(e) = engine
                .append_narration(job.battle_id, job.turn_seq, text)
                .await
            {
                log::warn!("narration append failed for {}: {e}", job.battle_id);
            }
        }
    });
}

const STRIKE_VERBS: [&str; 4] = ["crashes into", "overruns", "routs", "breaks through"];

/// Produce the narrative line for one turn. Stands in for the external
/// AI narration service; swapping in a real client only changes this
/// function.
async fn narrate(job: &NarrationJob) -> String {
    if job.timed_out {
        return format!("{} hesitates and the moment passes.", job.actor);
    }
    match (&job.action, job.target) {
        (Some(TurnAction::Strike { .. }), Some(target)) => {
            let mut rng = rand::rng();
            let verb = STRIKE_VERBS.choose(&mut rng).unwrap_or(&STRIKE_VERBS[0]);
            format!(
                "{} {} {}'s lines for {} damage.",
                job.actor, verb, target, job.damage
            )
        }
        (Some(TurnAction::Forfeit), _) => format!("{} lowers the banner and withdraws.", job.actor),
        _ => format!("{} holds position.", job.actor),
    }
}
