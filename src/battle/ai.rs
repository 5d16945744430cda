//! House opponent: squadron seeding and turn selection.

use rand::seq::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

use crate::battle::power::{MemberPower, Squadron};
use crate::battle::types::{AiDifficulty, Battle, TurnAction};

/// Generate the house squadron for an AI-flagged battle. Size and stat
/// budget scale with difficulty.
pub fn house_squadron(difficulty: AiDifficulty) -> Squadron {
    let (size, base) = match difficulty {
        AiDifficulty::Easy => (3usize, 40i64),
        AiDifficulty::Normal => (5, 80),
        AiDifficulty::Hard => (8, 140),
    };

    let mut rng = rand::rng();
    let members = (0..size)
        .map(|i| MemberPower {
            token_id: format!("house-{}-{}", i, rng.random_range(1000..10_000)),
            army: base + rng.random_range(0..base),
            religion: rng.random_range(0..base / 2 + 1),
            civilization: rng.random_range(0..base / 2 + 1),
            economic: rng.random_range(0..base / 4 + 1),
            multiplier_pct: 100,
        })
        .collect();

    Squadron {
        capacity: size,
        members,
    }
}

/// Pick the house action. Hard goes for the weakest squadron; the rest
/// strike at random.
pub fn choose_action(battle: &Battle, ai_id: Uuid) -> Option<TurnAction> {
    let targets: Vec<(Uuid, i64)> = battle
        .active_participants()
        .filter(|p| p.player_id != ai_id)
        .map(|p| (p.player_id, p.health))
        .collect();
    if targets.is_empty() {
        return None;
    }

    let target = match battle.rules.ai_opponent {
        Some(AiDifficulty::Hard) => {
            targets
                .iter()
                .min_by_key(|(id, health)| (*health, *id))
                .map(|(id, _)| *id)
        }
        _ => {
            let mut rng = rand::rng();
            targets.choose(&mut rng).map(|(id, _)| *id)
        }
    }?;

    Some(TurnAction::Strike { target })
}
