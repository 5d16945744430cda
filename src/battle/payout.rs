//! Prize-pool distribution across final placements.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::types::PrizeSplit;
use crate::error::Result;

/// One winner's share of the pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payout {
    pub player_id: Uuid,
    /// 1-based rank this amount was computed for.
    pub rank: u32,
    pub amount: i64,
}

/// The full settlement of one battle's pool. The platform fee absorbs the
/// undeclared percentage remainder and every floor-rounding remainder, so
/// `payouts + platform_fee` always equals the pool exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Distribution {
    pub payouts: Vec<Payout>,
    pub platform_fee: i64,
}

impl Distribution {
    pub fn total_paid(&self) -> i64 {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    /// Reroute the listed players' shares to the platform. Used for house
    /// (AI) participants, which hold no escrow record.
    pub fn reassign_to_platform(&mut self, players: &[Uuid]) {
        let mut moved = 0;
        for p in &mut self.payouts {
            if players.contains(&p.player_id) {
                moved += p.amount;
                p.amount = 0;
            }
        }
        self.platform_fee += moved;
    }
}

/// Split the pool over rank groups, best first. Participants inside one
/// group are tied and share the percentage mass of the ranks the group
/// spans, floor-rounded per head.
pub fn compute_distribution(
    pool: i64,
    split: &PrizeSplit,
    rank_groups: &[Vec<Uuid>],
) -> Result<Distribution> {
    split.validate()?;

    let mut payouts = Vec::new();
    let mut distributed: i64 = 0;
    let mut rank = 0usize;

    for group in rank_groups {
        let span = group.len();
        let mass: i64 = (rank..rank + span)
            .map(|r| split.pct_for_rank(r) as i64)
            .sum();
        let group_total = (pool as i128 * mass as i128 / 100) as i64;
        let each = if span > 0 { group_total / span as i64 } else { 0 };

        for player_id in group {
            payouts.push(Payout {
                player_id: *player_id,
                rank: rank as u32 + 1,
                amount: each,
            });
            distributed += each;
        }
        rank += span;
    }

    Ok(Distribution {
        payouts,
        platform_fee: pool - distributed,
    })
}
