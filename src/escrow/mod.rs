//! Entry-fee escrow ledger.
//!
//! One account per battle, one record per fee-paying participant. Records
//! move `pending -> locked -> (paid_out | refunded)` and settle exactly
//! once. The ledger records intent and results; the actual on-chain
//! transfer is executed by the external payment rail, which consumes the
//! instructions emitted here and confirms back via
//! [`EscrowLedger::confirm`].

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::payout::Distribution;
use crate::error::{BattleError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EscrowState {
    Pending,
    Locked,
    PaidOut,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub battle_id: Uuid,
    pub player_id: Uuid,
    /// Amount deposited by the participant.
    pub amount: i64,
    pub currency: String,
    pub state: EscrowState,
    /// Amount actually paid out or refunded once settled.
    pub settled_amount: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RailKind {
    Payout { rank: u32 },
    Refund,
    PlatformFee,
}

/// One transfer for the payment rail to execute. `player_id` is `None`
/// for the platform's own share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RailInstruction {
    pub battle_id: Uuid,
    pub player_id: Option<Uuid>,
    pub kind: RailKind,
    pub amount: i64,
    pub currency: String,
}

/// How a battle's escrow resolves.
#[derive(Debug, Clone)]
pub enum SettlementPlan {
    /// Completed battle: winners paid by rank, everyone else closed at
    /// zero, platform fee carved out.
    Distribute(Distribution),
    /// Cancelled battle: every deposit returned in full.
    RefundAll,
}

#[derive(Debug)]
struct BattleEscrow {
    currency: String,
    records: Vec<EscrowRecord>,
    settled: bool,
    /// Instructions emitted but not yet confirmed by the rail.
    pending_rail: Vec<RailInstruction>,
}

/// In-memory ledger keyed by battle id. Each account is mutated under its
/// map entry, and every engine call already holds the battle lock, so all
/// transitions for one battle are serialized.
#[derive(Debug, Default)]
pub struct EscrowLedger {
    accounts: DashMap<Uuid, BattleEscrow>,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at battle creation; fixes the entry currency.
    pub fn open_account(&self, battle_id: Uuid, currency: &str) {
        self.accounts.entry(battle_id).or_insert_with(|| BattleEscrow {
            currency: currency.to_string(),
            records: Vec::new(),
            settled: false,
            pending_rail: Vec::new(),
        });
    }

    /// Record a confirmed entry-fee deposit as a `pending` record. A
    /// repeated confirmation for the same participant is a no-op so rail
    /// retries stay safe.
    pub fn deposit(
        &self,
        battle_id: Uuid,
        player_id: Uuid,
        amount: i64,
        currency: &str,
    ) -> Result<()> {
        let mut account = self
            .accounts
            .get_mut(&battle_id)
            .ok_or(BattleError::BattleNotFound)?;

        if amount <= 0 {
            return Err(BattleError::InvalidAmount);
        }
        if currency != account.currency {
            return Err(BattleError::CurrencyMismatch {
                expected: account.currency.clone(),
                got: currency.to_string(),
            });
        }
        if account.records.iter().any(|r| r.player_id == player_id) {
            return Ok(());
        }
        if account.settled {
            return Err(BattleError::AlreadySettled);
        }

        let currency = account.currency.clone();
        account.records.push(EscrowRecord {
            battle_id,
            player_id,
            amount,
            currency,
            state: EscrowState::Pending,
            settled_amount: None,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    /// Atomically move every pending record to `locked`. This is the gate
    /// that lets the state machine leave `open`: it fails unless every
    /// required participant has deposited. Returns the locked total.
    pub fn lock(&self, battle_id: Uuid, required: &[Uuid]) -> Result<i64> {
        let mut account = self
            .accounts
            .get_mut(&battle_id)
            .ok_or(BattleError::BattleNotFound)?;

        if account.settled {
            return Err(BattleError::AlreadySettled);
        }

        let missing = required
            .iter()
            .filter(|pid| !account.records.iter().any(|r| r.player_id == **pid))
            .count();
        if missing > 0 {
            return Err(BattleError::IncompleteDeposits { missing });
        }

        let now = Utc::now();
        let mut total = 0;
        for r in account.records.iter_mut() {
            if r.state == EscrowState::Pending {
                r.state = EscrowState::Locked;
                r.updated_at = now;
            }
            total += r.amount;
        }
        Ok(total)
    }

    pub fn locked_total(&self, battle_id: Uuid) -> i64 {
        self.accounts
            .get(&battle_id)
            .map(|a| {
                a.records
                    .iter()
                    .filter(|r| r.state == EscrowState::Locked)
                    .map(|r| r.amount)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// One-time settlement of a battle's escrow. A retry after success
    /// returns `AlreadySettled` and moves no funds. The whole pass runs
    /// under the account entry, so a crash can never leave some records
    /// settled and others not visible as such.
    pub fn settle(&self, battle_id: Uuid, plan: &SettlementPlan) -> Result<Vec<RailInstruction>> {
        let mut account = self
            .accounts
            .get_mut(&battle_id)
            .ok_or(BattleError::BattleNotFound)?;

        if account.settled {
            return Err(BattleError::AlreadySettled);
        }

        let now = Utc::now();
        let currency = account.currency.clone();
        let mut instructions = Vec::new();

        match plan {
            SettlementPlan::Distribute(dist) => {
                for r in account.records.iter_mut() {
                    let won = dist
                        .payouts
                        .iter()
                        .find(|p| p.player_id == r.player_id)
                        .filter(|p| p.amount > 0);
                    match won {
                        Some(p) => {
                            r.state = EscrowState::PaidOut;
                            r.settled_amount = Some(p.amount);
                            instructions.push(RailInstruction {
                                battle_id,
                                player_id: Some(r.player_id),
                                kind: RailKind::Payout { rank: p.rank },
                                amount: p.amount,
                                currency: currency.clone(),
                            });
                        }
                        None => {
                            // Stake consumed by the pool; nothing returns.
                            r.state = EscrowState::Refunded;
                            r.settled_amount = Some(0);
                        }
                    }
                    r.updated_at = now;
                }
                if dist.platform_fee > 0 {
                    instructions.push(RailInstruction {
                        battle_id,
                        player_id: None,
                        kind: RailKind::PlatformFee,
                        amount: dist.platform_fee,
                        currency: currency.clone(),
                    });
                }
            }
            SettlementPlan::RefundAll => {
                for r in account.records.iter_mut() {
                    if matches!(r.state, EscrowState::Pending | EscrowState::Locked) {
                        r.state = EscrowState::Refunded;
                        r.settled_amount = Some(r.amount);
                        r.updated_at = now;
                        instructions.push(RailInstruction {
                            battle_id,
                            player_id: Some(r.player_id),
                            kind: RailKind::Refund,
                            amount: r.amount,
                            currency: currency.clone(),
                        });
                    }
                }
            }
        }

        account.settled = true;
        account.pending_rail.extend(instructions.iter().cloned());
        Ok(instructions)
    }

    /// Rail callback: the transfer for `player_id` (or the platform fee,
    /// when `None`) landed on chain. Returns false for unknown pairs.
    pub fn confirm(&self, battle_id: Uuid, player_id: Option<Uuid>) -> bool {
        let Some(mut account) = self.accounts.get_mut(&battle_id) else {
            return false;
        };
        let before = account.pending_rail.len();
        account.pending_rail.retain(|i| i.player_id != player_id);
        account.pending_rail.len() != before
    }

    /// Instructions emitted but never confirmed, across all battles.
    /// The reconciliation sweep re-publishes these.
    pub fn unconfirmed(&self) -> Vec<RailInstruction> {
        self.accounts
            .iter()
            .flat_map(|a| a.pending_rail.clone())
            .collect()
    }

    pub fn is_settled(&self, battle_id: Uuid) -> bool {
        self.accounts
            .get(&battle_id)
            .map(|a| a.settled)
            .unwrap_or(false)
    }

    pub fn records(&self, battle_id: Uuid) -> Vec<EscrowRecord> {
        self.accounts
            .get(&battle_id)
            .map(|a| a.records.clone())
            .unwrap_or_default()
    }
}
