//! Pure battle life-cycle transitions.
//!
//! Every function here mutates a single [`Battle`] aggregate and nothing
//! else; callers (the engine) hold the per-battle lock and handle escrow,
//! events and persistence. Validation always completes before the first
//! mutation so a rejected turn leaves no partial writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::battle::anticheat;
use crate::battle::power::Squadron;
use crate::battle::types::{
    Battle, BattleStatus, Participant, TimelineEntry, TurnAction,
};
use crate::error::{BattleError, Result};

/// Everything one committed turn (or forced timeout) changed.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_seq: u64,
    pub actor: Uuid,
    pub action: Option<TurnAction>,
    pub target: Option<Uuid>,
    pub damage: i64,
    pub target_health: i64,
    pub timed_out: bool,
    /// (player, placement) pairs eliminated by this commit.
    pub eliminated: Vec<(Uuid, u32)>,
    pub completion: Option<CompletionReport>,
}

/// Final standings of a completed battle: rank groups, best first.
/// Participants inside one group are tied.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub winner: Option<Uuid>,
    pub placements: Vec<Vec<Uuid>>,
}

/// Register a player. Joins are only accepted while `Open`, below
/// capacity, and past the collection gate when one is set.
pub fn join(
    battle: &mut Battle,
    player_id: Uuid,
    squadron: Squadron,
    holdings: &HashMap<String, u32>,
    now: DateTime<Utc>,
) -> Result<()> {
    if battle.status != BattleStatus::Open {
        return Err(BattleError::BattleNotJoinable);
    }
    if battle.participant(player_id).is_some() {
        return Err(BattleError::BattleNotJoinable);
    }
    if battle.participants.len() >= battle.rules.max_participants {
        return Err(BattleError::CapacityExceeded);
    }
    if let Some(gate) = &battle.rules.gate {
        let held = holdings.get(&gate.collection).copied().unwrap_or(0);
        if held < gate.min_held {
            return Err(BattleError::NotEligible);
        }
    }

    battle
        .participants
        .push(Participant::new(player_id, squadron, now, false));
    Ok(())
}

/// Seat the house squadron. Exempt from the gate and from escrow.
pub fn add_ai(battle: &mut Battle, squadron: Squadron, now: DateTime<Utc>) -> Uuid {
    let ai_id = Uuid::new_v4();
    battle
        .participants
        .push(Participant::new(ai_id, squadron, now, true));
    ai_id
}

/// `open -> in_progress`. The caller has already locked escrow.
pub fn begin(battle: &mut Battle, now: DateTime<Utc>) {
    battle.status = BattleStatus::InProgress;
    battle.started_at = Some(now);
    let ids: Vec<Uuid> = battle.participants.iter().map(|p| p.player_id).collect();
    battle.push_event(
        battle.created_by,
        TimelineEntry::BattleStarted { participants: ids },
        now,
    );
}

/// Validate and commit one turn. All-or-nothing: any error returns before
/// the timeline or any participant is touched.
pub fn submit_turn(
    battle: &mut Battle,
    actor: Uuid,
    seq: u64,
    action: TurnAction,
    claimed_hash: &str,
    now: DateTime<Utc>,
) -> Result<TurnOutcome> {
    if battle.status != BattleStatus::InProgress {
        return Err(BattleError::BattleNotJoinable);
    }
    let attacker = battle
        .participant(actor)
        .ok_or(BattleError::NotAParticipant)?;
    if !attacker.is_active() {
        return Err(BattleError::Eliminated);
    }

    let expected = battle.next_seq();
    if seq != expected {
        return Err(BattleError::TurnOutOfOrder { expected, got: seq });
    }

    anticheat::verify(&attacker.squadron, claimed_hash)?;

    // Resolve the action against current state before mutating anything.
    let (target, damage) = match &action {
        TurnAction::Strike { target } => {
            let victim = battle
                .participant(*target)
                .filter(|p| p.player_id != actor)
                .ok_or(BattleError::NotAParticipant)?;
            if !victim.is_active() {
                return Err(BattleError::Eliminated);
            }
            (Some(*target), attacker.power.army / 10 + 1)
        }
        TurnAction::Forfeit => (None, 0),
    };

    // Commit.
    let mut eliminated = Vec::new();
    let target_health = if let Some(tid) = target {
        let victim = battle.participant_mut(tid).expect("validated above");
        victim.health -= damage;
        victim.health
    } else {
        battle.participant(actor).expect("validated above").health
    };

    {
        let p = battle.participant_mut(actor).expect("validated above");
        p.turns_taken += 1;
        p.consecutive_timeouts = 0;
    }

    let turn_seq = battle.push_event(
        actor,
        TimelineEntry::Turn {
            action: Some(action.clone()),
            target,
            damage,
            target_health,
            timed_out: false,
        },
        now,
    );

    if let Some(tid) = target {
        if target_health <= 0 {
            eliminated.push((tid, eliminate(battle, tid, now)));
        }
    }
    if matches!(action, TurnAction::Forfeit) {
        eliminated.push((actor, eliminate(battle, actor, now)));
    }

    let completion = maybe_complete(battle, now);

    Ok(TurnOutcome {
        turn_seq,
        actor,
        action: Some(action),
        target,
        damage,
        target_health,
        timed_out: false,
        eliminated,
        completion,
    })
}

/// Enforce one participant's expired deadline. The deadline is re-derived
/// from the timeline under the battle lock, so a turn that landed after
/// the sweep computed its candidate list simply makes this a no-op.
pub fn force_timeout(battle: &mut Battle, player_id: Uuid, now: DateTime<Utc>) -> Option<TurnOutcome> {
    if battle.status != BattleStatus::InProgress {
        return None;
    }
    let participant = battle.participant(player_id)?;
    if !participant.is_active() || participant.is_ai {
        return None;
    }
    let deadline = participant_deadline(battle, player_id)?;
    if now < deadline {
        return None;
    }

    let health = participant.health;
    let turn_seq = battle.push_event(
        player_id,
        TimelineEntry::Turn {
            action: None,
            target: None,
            damage: 0,
            target_health: health,
            timed_out: true,
        },
        now,
    );

    let mut eliminated = Vec::new();
    let threshold = battle.rules.timeout_threshold;
    let strikes = {
        let p = battle.participant_mut(player_id).expect("checked above");
        p.consecutive_timeouts += 1;
        p.consecutive_timeouts
    };
    if strikes >= threshold {
        eliminated.push((player_id, eliminate(battle, player_id, now)));
    }

    let completion = maybe_complete(battle, now);

    Some(TurnOutcome {
        turn_seq,
        actor: player_id,
        action: None,
        target: None,
        damage: 0,
        target_health: health,
        timed_out: true,
        eliminated,
        completion,
    })
}

/// Cancel from `Open` or `InProgress`. Terminal states reject.
pub fn cancel(battle: &mut Battle, reason: &str, now: DateTime<Utc>) -> Result<()> {
    if battle.status.is_terminal() {
        return Err(BattleError::BattleNotJoinable);
    }
    battle.push_event(
        Uuid::nil(),
        TimelineEntry::Cancelled {
            reason: reason.to_string(),
        },
        now,
    );
    battle.status = BattleStatus::Cancelled;
    Ok(())
}

/// Force-complete a battle that overran its absolute length. Remaining
/// actives tie for the best remaining placement.
pub fn force_complete(battle: &mut Battle, now: DateTime<Utc>) -> Option<CompletionReport> {
    if battle.status != BattleStatus::InProgress || !length_elapsed(battle, now) {
        return None;
    }
    Some(complete(battle, now))
}

/// Current per-participant deadlines, derived purely from the timeline:
/// last event by that participant (or battle start) plus the per-turn
/// timeout. Reconstructable after a restart by replaying the log.
pub fn deadlines(battle: &Battle) -> Vec<(Uuid, DateTime<Utc>)> {
    battle
        .active_participants()
        .filter(|p| !p.is_ai)
        .filter_map(|p| participant_deadline(battle, p.player_id).map(|d| (p.player_id, d)))
        .collect()
}

pub fn length_elapsed(battle: &Battle, now: DateTime<Utc>) -> bool {
    match battle.started_at {
        Some(t) => now >= t + battle.rules.battle_length(),
        None => false,
    }
}

fn participant_deadline(battle: &Battle, player_id: Uuid) -> Option<DateTime<Utc>> {
    let basis = battle
        .timeline
        .iter()
        .rev()
        .find(|e| e.actor == player_id)
        .map(|e| e.ts)
        .or(battle.started_at)?;
    Some(basis + battle.rules.turn_timeout())
}

/// Assign the next-worst placement and mark the participant out.
fn eliminate(battle: &mut Battle, player_id: Uuid, now: DateTime<Utc>) -> u32 {
    let placement = battle.unplaced_count() as u32;
    {
        let p = battle.participant_mut(player_id).expect("participant exists");
        p.eliminated_at = Some(now);
        p.placement = Some(placement);
    }
    battle.push_event(player_id, TimelineEntry::Eliminated { placement }, now);
    placement
}

fn maybe_complete(battle: &mut Battle, now: DateTime<Utc>) -> Option<CompletionReport> {
    if battle.status != BattleStatus::InProgress {
        return None;
    }
    if battle.active_count() <= 1 || length_elapsed(battle, now) {
        return Some(complete(battle, now));
    }
    None
}

/// Terminal-success transition. Survivors tie at placement 1; the winner
/// slot goes to the healthiest of them (player id as a stable tiebreak).
fn complete(battle: &mut Battle, now: DateTime<Utc>) -> CompletionReport {
    for p in battle.participants.iter_mut() {
        if p.placement.is_none() {
            p.placement = Some(1);
        }
    }

    let winner = battle
        .participants
        .iter()
        .filter(|p| p.placement == Some(1))
        .max_by_key(|p| (p.health, p.player_id))
        .map(|p| p.player_id);

    let mut ranked: Vec<(u32, Uuid)> = battle
        .participants
        .iter()
        .map(|p| (p.placement.expect("assigned above"), p.player_id))
        .collect();
    ranked.sort_by_key(|(place, id)| (*place, *id));

    let mut placements: Vec<Vec<Uuid>> = Vec::new();
    let mut last_place = 0;
    for (place, id) in ranked {
        if placements.is_empty() || place != last_place {
            placements.push(Vec::new());
            last_place = place;
        }
        placements.last_mut().expect("just pushed").push(id);
    }

    battle.status = BattleStatus::Completed;
    battle.completed_at = Some(now);
    battle.winner = winner;
    battle.push_event(Uuid::nil(), TimelineEntry::Completed { winner }, now);

    CompletionReport { winner, placements }
}
