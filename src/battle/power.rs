//! Deterministic squadron power aggregation.
//!
//! The NFT metadata service hands us raw trait bags; everything is folded
//! into four known power categories here. Unknown traits contribute zero.

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};

/// Known power categories. Anything the metadata service emits outside of
/// these lands in `Unknown` and contributes no power.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PowerCategory {
    Army,
    Religion,
    Civilization,
    Economic,
    Unknown,
}

impl PowerCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "army" | "military" => PowerCategory::Army,
            "religion" | "faith" => PowerCategory::Religion,
            "civilization" | "culture" => PowerCategory::Civilization,
            "economic" | "economy" | "trade" => PowerCategory::Economic,
            _ => PowerCategory::Unknown,
        }
    }
}

/// One squadron member's power contribution, as supplied by the NFT
/// metadata service. `multiplier_pct` is a per-member boost in percent
/// (100 = neutral) and is applied before summation so totals stay
/// commutative across add/remove order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberPower {
    pub token_id: String,
    pub army: i64,
    pub religion: i64,
    pub civilization: i64,
    pub economic: i64,
    pub multiplier_pct: i64,
}

impl MemberPower {
    /// Build a member from a raw trait bag. Trait names are folded through
    /// [`PowerCategory::parse`]; unrecognised traits are dropped.
    pub fn from_traits(token_id: impl Into<String>, traits: &[(String, i64)]) -> Self {
        let mut m = MemberPower {
            token_id: token_id.into(),
            army: 0,
            religion: 0,
            civilization: 0,
            economic: 0,
            multiplier_pct: 100,
        };
        for (name, value) in traits {
            match PowerCategory::parse(name) {
                PowerCategory::Army => m.army += value,
                PowerCategory::Religion => m.religion += value,
                PowerCategory::Civilization => m.civilization += value,
                PowerCategory::Economic => m.economic += value,
                PowerCategory::Unknown => {}
            }
        }
        m
    }

    fn scaled(&self, v: i64) -> i64 {
        (v as i128 * self.multiplier_pct as i128 / 100) as i64
    }

    pub fn total(&self) -> i64 {
        self.scaled(self.army)
            + self.scaled(self.religion)
            + self.scaled(self.civilization)
            + self.scaled(self.economic)
    }
}

/// Category subtotals plus the combined total for one squadron.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SquadronPower {
    pub army: i64,
    pub religion: i64,
    pub civilization: i64,
    pub economic: i64,
    pub total: i64,
}

/// Pure aggregation over a member list. Idempotent and re-runnable; an
/// empty list yields zero power, not an error.
pub fn aggregate(members: &[MemberPower]) -> SquadronPower {
    let mut p = SquadronPower::default();
    for m in members {
        p.army += m.scaled(m.army);
        p.religion += m.scaled(m.religion);
        p.civilization += m.scaled(m.civilization);
        p.economic += m.scaled(m.economic);
    }
    p.total = p.army + p.religion + p.civilization + p.economic;
    p
}

/// Ordered, capacity-bounded collection of NFT members fielded by one
/// player. Owned by the player; battles hold a snapshot of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Squadron {
    pub capacity: usize,
    pub members: Vec<MemberPower>,
}

impl Squadron {
    pub fn new(capacity: usize) -> Self {
        Squadron {
            capacity,
            members: Vec::new(),
        }
    }

    pub fn with_members(capacity: usize, members: Vec<MemberPower>) -> Result<Self> {
        if members.len() > capacity {
            return Err(BattleError::CapacityExceeded);
        }
        Ok(Squadron { capacity, members })
    }

    pub fn add_member(&mut self, member: MemberPower) -> Result<()> {
        if self.members.len() >= self.capacity {
            return Err(BattleError::CapacityExceeded);
        }
        self.members.push(member);
        Ok(())
    }

    /// Returns true if a member with that token id was removed.
    pub fn remove_member(&mut self, token_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.token_id != token_id);
        self.members.len() != before
    }

    /// Recomputed on every call; never cached across membership changes.
    pub fn power(&self) -> SquadronPower {
        aggregate(&self.members)
    }
}
