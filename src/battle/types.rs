use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::power::{Squadron, SquadronPower};
use crate::error::{BattleError, Result};

pub const MIN_CAPACITY: usize = 2;
pub const MAX_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BattleKind {
    Duel,
    Multiplayer,
    TournamentLeg,
}

impl BattleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BattleKind::Duel => "duel",
            BattleKind::Multiplayer => "multiplayer",
            BattleKind::TournamentLeg => "tournament_leg",
        }
    }
}

/// Battle life-cycle. Transitions are monotonic; `Completed` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BattleStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl BattleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BattleStatus::Completed | BattleStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BattleStatus::Open => "open",
            BattleStatus::InProgress => "in_progress",
            BattleStatus::Completed => "completed",
            BattleStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

/// Only holders of `collection` with at least `min_held` qualifying NFTs
/// may join a gated battle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionGate {
    pub collection: String,
    pub min_held: u32,
}

/// Placement percentages for 1st/2nd/3rd. May sum to under 100; the
/// remainder is the platform fee.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrizeSplit {
    pub first_pct: u8,
    pub second_pct: u8,
    pub third_pct: u8,
}

impl PrizeSplit {
    pub fn validate(&self) -> Result<()> {
        let sum = self.first_pct as u32 + self.second_pct as u32 + self.third_pct as u32;
        if sum > 100 {
            return Err(BattleError::InvalidSplit);
        }
        Ok(())
    }

    /// Percentage for a 0-based rank; ranks past third pay nothing.
    pub fn pct_for_rank(&self, rank: usize) -> u8 {
        match rank {
            0 => self.first_pct,
            1 => self.second_pct,
            2 => self.third_pct,
            _ => 0,
        }
    }
}

/// Immutable per-battle configuration fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRules {
    pub kind: BattleKind,
    pub min_participants: usize,
    pub max_participants: usize,
    pub entry_fee: i64,
    pub currency: String,
    pub split: PrizeSplit,
    pub turn_timeout_secs: i64,
    pub battle_length_mins: i64,
    pub open_ttl_secs: i64,
    pub timeout_threshold: u32,
    pub gate: Option<CollectionGate>,
    pub ai_opponent: Option<AiDifficulty>,
}

impl BattleRules {
    pub fn validate(&self) -> Result<()> {
        if self.entry_fee <= 0 {
            return Err(BattleError::InvalidAmount);
        }
        self.split.validate()?;

        let (lo, hi) = match self.kind {
            BattleKind::Duel => (2, 2),
            BattleKind::Multiplayer | BattleKind::TournamentLeg => (MIN_CAPACITY, MAX_CAPACITY),
        };
        if self.min_participants < lo
            || self.max_participants > hi
            || self.min_participants > self.max_participants
        {
            return Err(BattleError::CapacityExceeded);
        }
        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::seconds(self.turn_timeout_secs)
    }

    pub fn battle_length(&self) -> Duration {
        Duration::minutes(self.battle_length_mins)
    }
}

/// One player's entry into one battle. The squadron is a snapshot taken at
/// join time; the live squadron may change outside the battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub player_id: Uuid,
    pub squadron: Squadron,
    pub power: SquadronPower,
    pub health: i64,
    pub joined_at: DateTime<Utc>,
    pub turns_taken: u32,
    pub consecutive_timeouts: u32,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub placement: Option<u32>,
    pub is_ai: bool,
}

impl Participant {
    pub fn new(player_id: Uuid, squadron: Squadron, now: DateTime<Utc>, is_ai: bool) -> Self {
        let power = squadron.power();
        Participant {
            player_id,
            squadron,
            power,
            health: power.total,
            joined_at: now,
            turns_taken: 0,
            consecutive_timeouts: 0,
            eliminated_at: None,
            placement: None,
            is_ai,
        }
    }

    pub fn is_active(&self) -> bool {
        self.eliminated_at.is_none()
    }
}

/// Player intent for one turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TurnAction {
    Strike { target: Uuid },
    Forfeit,
}

/// Timeline payloads. A forced deadline expiry is a `Turn` with no action
/// and the `timed_out` flag set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TimelineEntry {
    BattleStarted {
        participants: Vec<Uuid>,
    },
    Turn {
        action: Option<TurnAction>,
        target: Option<Uuid>,
        damage: i64,
        target_health: i64,
        timed_out: bool,
    },
    Eliminated {
        placement: u32,
    },
    Narration {
        turn_seq: u64,
        text: String,
    },
    Completed {
        winner: Option<Uuid>,
    },
    Cancelled {
        reason: String,
    },
}

/// Append-only battle log entry. Sequence numbers are strictly increasing
/// per battle; events are never edited, corrections are new events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub seq: u64,
    pub ts: DateTime<Utc>,
    pub actor: Uuid,
    pub entry: TimelineEntry,
}

/// The aggregate root. Owns its participants and timeline; all mutation
/// goes through `battle::state` under the per-battle lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battle {
    pub id: Uuid,
    pub rules: BattleRules,
    pub status: BattleStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub winner: Option<Uuid>,
    pub participants: Vec<Participant>,
    pub timeline: Vec<TimelineEvent>,
}

impl Battle {
    pub fn new(id: Uuid, created_by: Uuid, rules: BattleRules, now: DateTime<Utc>) -> Self {
        let expires_at = now + Duration::seconds(rules.open_ttl_secs);
        Battle {
            id,
            rules,
            status: BattleStatus::Open,
            created_by,
            created_at: now,
            expires_at,
            started_at: None,
            completed_at: None,
            winner: None,
            participants: Vec::new(),
            timeline: Vec::new(),
        }
    }

    pub fn participant(&self, player_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }

    pub fn participant_mut(&mut self, player_id: Uuid) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_participants().count()
    }

    /// Participants that still lack a final placement.
    pub fn unplaced_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.placement.is_none())
            .count()
    }

    pub fn next_seq(&self) -> u64 {
        self.timeline.last().map(|e| e.seq).unwrap_or(0) + 1
    }

    /// Declared prize pool: one entry fee per fee-paying participant.
    pub fn total_prize_pool(&self) -> i64 {
        let payers = self.participants.iter().filter(|p| !p.is_ai).count() as i64;
        self.rules.entry_fee * payers
    }

    pub fn push_event(&mut self, actor: Uuid, entry: TimelineEntry, now: DateTime<Utc>) -> u64 {
        let seq = self.next_seq();
        self.timeline.push(TimelineEvent {
            seq,
            ts: now,
            actor,
            entry,
        });
        seq
    }
}
