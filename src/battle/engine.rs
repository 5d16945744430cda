//! Battle registry and single-writer command surface.
//!
//! One async mutex per battle id: every transition for a battle (join,
//! deposit confirmation, turn, cancellation, sweep enforcement) runs under
//! that battle's lock while unrelated battles proceed in parallel.
//! Narration and payment-rail work is pushed onto unbounded queues inside
//! the lock and performed by background workers outside it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::battle::power::Squadron;
use crate::battle::state::{self, CompletionReport, TurnOutcome};
use crate::battle::types::{Battle, BattleRules, BattleStatus, TimelineEntry, TurnAction};
use crate::battle::{ai, anticheat, payout};
use crate::error::{BattleError, Result};
use crate::escrow::{EscrowLedger, RailInstruction, SettlementPlan};
use crate::metrics;
use crate::narration::NarrationJob;
use crate::protocol::BattleEvent;

/// Receivers handed to the background workers at startup.
pub struct EngineQueues {
    pub events_rx: mpsc::UnboundedReceiver<BattleEvent>,
    pub rail_rx: mpsc::UnboundedReceiver<RailInstruction>,
    pub narration_rx: mpsc::UnboundedReceiver<NarrationJob>,
}

/// What a successful `submitTurn` returns to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReceipt {
    pub battle_id: Uuid,
    pub seq: u64,
    pub damage: i64,
    pub target: Option<Uuid>,
    pub target_health: i64,
    pub eliminated: Vec<Uuid>,
    pub status: BattleStatus,
    pub winner: Option<Uuid>,
}

pub struct BattleEngine {
    battles: DashMap<Uuid, Arc<Mutex<Battle>>>,
    pub escrow: EscrowLedger,
    events_tx: mpsc::UnboundedSender<BattleEvent>,
    rail_tx: mpsc::UnboundedSender<RailInstruction>,
    narration_tx: mpsc::UnboundedSender<NarrationJob>,
}

impl BattleEngine {
    pub fn new() -> (Arc<Self>, EngineQueues) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (rail_tx, rail_rx) = mpsc::unbounded_channel();
        let (narration_tx, narration_rx) = mpsc::unbounded_channel();

        let engine = Arc::new(BattleEngine {
            battles: DashMap::new(),
            escrow: EscrowLedger::new(),
            events_tx,
            rail_tx,
            narration_tx,
        });
        let queues = EngineQueues {
            events_rx,
            rail_rx,
            narration_rx,
        };
        (engine, queues)
    }

    fn handle(&self, battle_id: Uuid) -> Result<Arc<Mutex<Battle>>> {
        self.battles
            .get(&battle_id)
            .map(|e| e.value().clone())
            .ok_or(BattleError::BattleNotFound)
    }

    fn emit(&self, event: BattleEvent) {
        self.events_tx.send(event).ok();
    }

    fn dispatch_rail(&self, instructions: Vec<RailInstruction>) {
        for i in instructions {
            self.rail_tx.send(i).ok();
        }
    }

    /// Create a battle with the creator as its first participant. The AI
    /// opponent, when requested, is seated immediately.
    pub fn create_battle(
        &self,
        creator: Uuid,
        rules: BattleRules,
        squadron: Squadron,
        holdings: &HashMap<String, u32>,
    ) -> Result<Uuid> {
        rules.validate()?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut battle = Battle::new(id, creator, rules, now);
        state::join(&mut battle, creator, squadron, holdings, now)?;

        let ai_id = battle
            .rules
            .ai_opponent
            .map(|difficulty| state::add_ai(&mut battle, ai::house_squadron(difficulty), now));

        self.escrow.open_account(id, &battle.rules.currency);
        self.battles.insert(id, Arc::new(Mutex::new(battle)));

        self.emit(BattleEvent::BattleCreated {
            battle_id: id,
            created_by: creator,
        });
        self.emit(BattleEvent::ParticipantJoined {
            battle_id: id,
            player_id: creator,
        });
        if let Some(ai_id) = ai_id {
            self.emit(BattleEvent::ParticipantJoined {
                battle_id: id,
                player_id: ai_id,
            });
        }
        Ok(id)
    }

    pub async fn join(
        &self,
        battle_id: Uuid,
        player_id: Uuid,
        squadron: Squadron,
        holdings: &HashMap<String, u32>,
    ) -> Result<()> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        state::join(&mut battle, player_id, squadron, holdings, Utc::now())?;
        self.emit(BattleEvent::ParticipantJoined {
            battle_id,
            player_id,
        });
        Ok(())
    }

    /// Payment-rail callback: an entry-fee deposit landed on chain. Once
    /// the battle is full and every fee is in, escrow locks and the
    /// battle starts.
    pub async fn confirm_deposit(
        &self,
        battle_id: Uuid,
        player_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<()> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        if battle.participant(player_id).is_none() {
            return Err(BattleError::NotAParticipant);
        }
        if amount != battle.rules.entry_fee {
            return Err(BattleError::InvalidAmount);
        }

        self.escrow.deposit(battle_id, player_id, amount, currency)?;
        self.emit(BattleEvent::DepositRecorded {
            battle_id,
            player_id,
            amount,
        });

        if battle.status == BattleStatus::Open
            && battle.participants.len() >= battle.rules.max_participants
        {
            self.try_begin(&mut battle, Utc::now());
        }
        Ok(())
    }

    /// Lock escrow and start, if every fee-paying participant deposited.
    fn try_begin(&self, battle: &mut Battle, now: DateTime<Utc>) -> bool {
        let required: Vec<Uuid> = battle
            .participants
            .iter()
            .filter(|p| !p.is_ai)
            .map(|p| p.player_id)
            .collect();

        let locked = match self.escrow.lock(battle.id, &required) {
            Ok(total) => total,
            Err(BattleError::IncompleteDeposits { .. }) => return false,
            Err(e) => {
                log::warn!("escrow lock failed for {}: {e}", battle.id);
                return false;
            }
        };

        // Locked funds must equal the declared pool when we leave `open`.
        if locked != battle.total_prize_pool() {
            log::error!(
                "escrow/pool divergence for {}: locked {} declared {}",
                battle.id,
                locked,
                battle.total_prize_pool()
            );
        }

        state::begin(battle, now);
        metrics::BATTLES_STARTED.inc();
        self.emit(BattleEvent::BattleStarted {
            battle_id: battle.id,
            participants: battle.participants.iter().map(|p| p.player_id).collect(),
            prize_pool: locked,
        });
        true
    }

    pub async fn submit_turn(
        &self,
        battle_id: Uuid,
        player_id: Uuid,
        seq: u64,
        action: TurnAction,
        squadron_hash: &str,
    ) -> Result<TurnReceipt> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        let outcome =
            state::submit_turn(&mut battle, player_id, seq, action, squadron_hash, Utc::now())?;
        metrics::TURNS_APPLIED.inc();
        self.emit_turn(&battle, &outcome);
        self.enqueue_narration(&battle, &outcome);

        if let Some(report) = &outcome.completion {
            self.finalize(&battle, report);
        } else {
            self.ai_reply(&mut battle, player_id);
        }

        Ok(TurnReceipt {
            battle_id,
            seq: outcome.turn_seq,
            damage: outcome.damage,
            target: outcome.target,
            target_health: outcome.target_health,
            eliminated: outcome.eliminated.iter().map(|(id, _)| *id).collect(),
            status: battle.status,
            winner: battle.winner,
        })
    }

    /// Play the house turn right after a player's, through the same
    /// validated path.
    fn ai_reply(&self, battle: &mut Battle, just_moved: Uuid) {
        let Some(ai_id) = battle
            .participants
            .iter()
            .find(|p| p.is_ai && p.is_active())
            .map(|p| p.player_id)
        else {
            return;
        };
        if ai_id == just_moved || battle.status != BattleStatus::InProgress {
            return;
        }
        let Some(action) = ai::choose_action(battle, ai_id) else {
            return;
        };
        let hash = match battle.participant(ai_id) {
            Some(p) => anticheat::squadron_hash(&p.squadron),
            None => return,
        };

        let seq = battle.next_seq();
        match state::submit_turn(battle, ai_id, seq, action, &hash, Utc::now()) {
            Ok(outcome) => {
                metrics::TURNS_APPLIED.inc();
                self.emit_turn(battle, &outcome);
                self.enqueue_narration(battle, &outcome);
                if let Some(report) = &outcome.completion {
                    self.finalize(battle, report);
                }
            }
            Err(e) => log::warn!("house turn rejected for {}: {e}", battle.id),
        }
    }

    pub async fn cancel(&self, battle_id: Uuid, by: Uuid, reason: &str) -> Result<()> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        if by != battle.created_by {
            return Err(BattleError::Unauthorized);
        }
        state::cancel(&mut battle, reason, Utc::now())?;
        self.refund_all(&battle);
        self.emit(BattleEvent::BattleCancelled {
            battle_id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Point-in-time copy for `getBattleState`.
    pub async fn snapshot(&self, battle_id: Uuid) -> Result<Battle> {
        let handle = self.handle(battle_id)?;
        let battle = handle.lock().await;
        Ok(battle.clone())
    }

    /// Follow-up from the narration worker; appended whenever the text
    /// arrives, even if the battle finished meanwhile.
    pub async fn append_narration(&self, battle_id: Uuid, turn_seq: u64, text: String) -> Result<()> {
        let handle = self.handle(battle_id)?;
        let mut battle = handle.lock().await;

        battle.push_event(
            Uuid::nil(),
            TimelineEntry::Narration {
                turn_seq,
                text: text.clone(),
            },
            Utc::now(),
        );
        self.emit(BattleEvent::Narration {
            battle_id,
            turn_seq,
            text,
        });
        Ok(())
    }

    pub fn battle_ids(&self) -> Vec<Uuid> {
        self.battles.iter().map(|e| *e.key()).collect()
    }

    /// One pass of the deadline sweep. Expires the open phase, enforces
    /// turn deadlines, and force-completes overdue battles. Deadlines are
    /// re-derived from the timeline under each battle's lock, so a turn
    /// that raced the sweep wins.
    // TODO: evict terminal battles from the registry once the rail has
    // confirmed their settlement; the Postgres archive already holds them.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut enforced = 0;

        for battle_id in self.battle_ids() {
            let Ok(handle) = self.handle(battle_id) else {
                continue;
            };
            let mut battle = handle.lock().await;

            match battle.status {
                BattleStatus::Open if now >= battle.expires_at => {
                    let late_start = battle.participants.len() >= battle.rules.min_participants
                        && self.try_begin(&mut battle, now);
                    if !late_start {
                        if state::cancel(&mut battle, "open phase expired", now).is_ok() {
                            self.refund_all(&battle);
                            self.emit(BattleEvent::BattleCancelled {
                                battle_id,
                                reason: "open phase expired".to_string(),
                            });
                            enforced += 1;
                        }
                    }
                }
                BattleStatus::InProgress => {
                    if let Some(report) = state::force_complete(&mut battle, now) {
                        self.finalize(&battle, &report);
                        enforced += 1;
                        continue;
                    }
                    let due: Vec<Uuid> = state::deadlines(&battle)
                        .into_iter()
                        .filter(|(_, deadline)| now >= *deadline)
                        .map(|(pid, _)| pid)
                        .collect();
                    for pid in due {
                        if let Some(outcome) = state::force_timeout(&mut battle, pid, now) {
                            metrics::FORCED_TIMEOUTS.inc();
                            enforced += 1;
                            self.emit_turn(&battle, &outcome);
                            if let Some(report) = &outcome.completion {
                                self.finalize(&battle, report);
                                break;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        enforced
    }

    /// Completed battle: compute the distribution, settle escrow once,
    /// hand the transfers to the rail.
    fn finalize(&self, battle: &Battle, report: &CompletionReport) {
        metrics::BATTLES_COMPLETED.inc();

        let pool = self.escrow.locked_total(battle.id);
        let mut distribution =
            match payout::compute_distribution(pool, &battle.rules.split, &report.placements) {
                Ok(d) => d,
                Err(e) => {
                    log::error!("distribution failed for {}: {e}", battle.id);
                    return;
                }
            };

        let house: Vec<Uuid> = battle
            .participants
            .iter()
            .filter(|p| p.is_ai)
            .map(|p| p.player_id)
            .collect();
        if !house.is_empty() {
            distribution.reassign_to_platform(&house);
        }

        match self
            .escrow
            .settle(battle.id, &SettlementPlan::Distribute(distribution))
        {
            Ok(instructions) => {
                self.emit(BattleEvent::EscrowSettled {
                    battle_id: battle.id,
                    instructions: instructions.len(),
                });
                self.dispatch_rail(instructions);
            }
            // Retried completion; funds already moved exactly once.
            Err(BattleError::AlreadySettled) => {}
            Err(e) => log::error!("settlement failed for {}: {e}", battle.id),
        }

        self.emit(BattleEvent::BattleCompleted {
            battle_id: battle.id,
            winner: report.winner,
            placements: report.placements.clone(),
            ts: Utc::now(),
        });
    }

    fn refund_all(&self, battle: &Battle) {
        match self.escrow.settle(battle.id, &SettlementPlan::RefundAll) {
            Ok(instructions) => {
                self.emit(BattleEvent::EscrowSettled {
                    battle_id: battle.id,
                    instructions: instructions.len(),
                });
                self.dispatch_rail(instructions);
            }
            Err(BattleError::AlreadySettled) => {}
            Err(e) => log::error!("refund failed for {}: {e}", battle.id),
        }
    }

    fn emit_turn(&self, battle: &Battle, outcome: &TurnOutcome) {
        self.emit(BattleEvent::TurnApplied {
            battle_id: battle.id,
            seq: outcome.turn_seq,
            actor: outcome.actor,
            target: outcome.target,
            damage: outcome.damage,
            target_health: outcome.target_health,
            timed_out: outcome.timed_out,
        });
        for (player_id, placement) in &outcome.eliminated {
            self.emit(BattleEvent::ParticipantEliminated {
                battle_id: battle.id,
                player_id: *player_id,
                placement: *placement,
            });
        }
    }

    fn enqueue_narration(&self, battle: &Battle, outcome: &TurnOutcome) {
        self.narration_tx
            .send(NarrationJob {
                battle_id: battle.id,
                turn_seq: outcome.turn_seq,
                actor: outcome.actor,
                action: outcome.action.clone(),
                target: outcome.target,
                damage: outcome.damage,
                timed_out: outcome.timed_out,
            })
            .ok();
    }
}
