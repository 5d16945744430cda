//! Typed events fanned out to clients over Redis pub/sub.
//!
//! Channel per battle: `battle:{battle_id}:events` (JSON).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum BattleEvent {
    BattleCreated {
        battle_id: Uuid,
        created_by: Uuid,
    },
    ParticipantJoined {
        battle_id: Uuid,
        player_id: Uuid,
    },
    DepositRecorded {
        battle_id: Uuid,
        player_id: Uuid,
        amount: i64,
    },
    BattleStarted {
        battle_id: Uuid,
        participants: Vec<Uuid>,
        prize_pool: i64,
    },
    TurnApplied {
        battle_id: Uuid,
        seq: u64,
        actor: Uuid,
        target: Option<Uuid>,
        damage: i64,
        target_health: i64,
        timed_out: bool,
    },
    ParticipantEliminated {
        battle_id: Uuid,
        player_id: Uuid,
        placement: u32,
    },
    Narration {
        battle_id: Uuid,
        turn_seq: u64,
        text: String,
    },
    BattleCompleted {
        battle_id: Uuid,
        winner: Option<Uuid>,
        placements: Vec<Vec<Uuid>>,
        ts: DateTime<Utc>,
    },
    BattleCancelled {
        battle_id: Uuid,
        reason: String,
    },
    EscrowSettled {
        battle_id: Uuid,
        instructions: usize,
    },
}

impl BattleEvent {
    /// Battle the event belongs to; used for channel routing.
    pub fn battle_id(&self) -> Uuid {
        match self {
            BattleEvent::BattleCreated { battle_id, .. }
            | BattleEvent::ParticipantJoined { battle_id, .. }
            | BattleEvent::DepositRecorded { battle_id, .. }
            | BattleEvent::BattleStarted { battle_id, .. }
            | BattleEvent::TurnApplied { battle_id, .. }
            | BattleEvent::ParticipantEliminated { battle_id, .. }
            | BattleEvent::Narration { battle_id, .. }
            | BattleEvent::BattleCompleted { battle_id, .. }
            | BattleEvent::BattleCancelled { battle_id, .. }
            | BattleEvent::EscrowSettled { battle_id, .. } => *battle_id,
        }
    }
}
