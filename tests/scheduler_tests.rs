//! Deadline derivation and enforcement, driven directly against the pure
//! state machine with a controlled clock.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use uuid::Uuid;
use warforge_server::battle::anticheat::squadron_hash;
use warforge_server::battle::power::{MemberPower, Squadron};
use warforge_server::battle::state;
use warforge_server::battle::types::{
    Battle, BattleKind, BattleRules, BattleStatus, PrizeSplit, TimelineEntry, TurnAction,
};

fn squadron(army: i64) -> Squadron {
    Squadron::with_members(
        5,
        vec![MemberPower {
            token_id: format!("nft-{army}"),
            army,
            religion: 0,
            civilization: 0,
            economic: 0,
            multiplier_pct: 100,
        }],
    )
    .unwrap()
}

fn rules() -> BattleRules {
    BattleRules {
        kind: BattleKind::Multiplayer,
        min_participants: 2,
        max_participants: 4,
        entry_fee: 100,
        currency: "XRP".into(),
        split: PrizeSplit {
            first_pct: 70,
            second_pct: 20,
            third_pct: 10,
        },
        turn_timeout_secs: 90,
        battle_length_mins: 30,
        open_ttl_secs: 900,
        timeout_threshold: 3,
        gate: None,
        ai_opponent: None,
    }
}

fn started_battle(players: &[Uuid]) -> (Battle, chrono::DateTime<Utc>) {
    let t0 = Utc::now();
    let mut battle = Battle::new(Uuid::new_v4(), players[0], rules(), t0);
    for p in players {
        state::join(&mut battle, *p, squadron(100), &HashMap::new(), t0).unwrap();
    }
    state::begin(&mut battle, t0);
    (battle, t0)
}

#[test]
fn deadlines_derive_from_the_last_event_per_participant() {
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2]);
    let timeout = Duration::seconds(90);

    let deadlines: HashMap<Uuid, _> = state::deadlines(&battle).into_iter().collect();
    assert_eq!(deadlines[&p1], t0 + timeout);
    assert_eq!(deadlines[&p2], t0 + timeout);

    // A committed turn moves only the actor's deadline.
    let t1 = t0 + Duration::seconds(60);
    let hash = squadron_hash(&battle.participant(p2).unwrap().squadron);
    let seq = battle.next_seq();
    state::submit_turn(
        &mut battle,
        p2,
        seq,
        TurnAction::Strike { target: p1 },
        &hash,
        t1,
    )
    .unwrap();

    let deadlines: HashMap<Uuid, _> = state::deadlines(&battle).into_iter().collect();
    assert_eq!(deadlines[&p1], t0 + timeout);
    assert_eq!(deadlines[&p2], t1 + timeout);
}

#[test]
fn timeout_fires_only_past_the_deadline() {
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2]);

    assert!(state::force_timeout(&mut battle, p1, t0 + Duration::seconds(89)).is_none());

    let outcome = state::force_timeout(&mut battle, p1, t0 + Duration::seconds(90)).unwrap();
    assert!(outcome.timed_out);
    assert_eq!(outcome.damage, 0);
    assert_eq!(battle.participant(p1).unwrap().consecutive_timeouts, 1);

    // The forced event advanced the deadline; re-running the same sweep
    // instant is a no-op.
    assert!(state::force_timeout(&mut battle, p1, t0 + Duration::seconds(90)).is_none());
}

#[test]
fn a_real_turn_resets_the_consecutive_timeout_counter() {
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2]);

    state::force_timeout(&mut battle, p1, t0 + Duration::seconds(90)).unwrap();
    assert_eq!(battle.participant(p1).unwrap().consecutive_timeouts, 1);

    let t1 = t0 + Duration::seconds(100);
    let hash = squadron_hash(&battle.participant(p1).unwrap().squadron);
    let seq = battle.next_seq();
    state::submit_turn(
        &mut battle,
        p1,
        seq,
        TurnAction::Strike { target: p2 },
        &hash,
        t1,
    )
    .unwrap();
    assert_eq!(battle.participant(p1).unwrap().consecutive_timeouts, 0);
}

#[test]
fn repeated_timeouts_eliminate_with_the_worst_open_placement() {
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2]);

    let mut now = t0;
    let mut last = None;
    for _ in 0..3 {
        now = now + Duration::seconds(90);
        last = state::force_timeout(&mut battle, p1, now);
        assert!(last.is_some());
    }

    let outcome = last.unwrap();
    assert_eq!(outcome.eliminated, vec![(p1, 2)]);

    // One squadron left standing completes the battle; the survivor
    // places strictly better than the timed-out participant.
    let report = outcome.completion.expect("battle completes");
    assert_eq!(report.winner, Some(p2));
    assert_eq!(report.placements, vec![vec![p2], vec![p1]]);
    assert_eq!(battle.status, BattleStatus::Completed);
    assert!(battle.participant(p1).unwrap().placement > battle.participant(p2).unwrap().placement);
}

#[test]
fn overdue_battle_force_completes_with_actives_tied_for_first() {
    let (p1, p2, p3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2, p3]);

    // p3 bows out early.
    let hash = squadron_hash(&battle.participant(p3).unwrap().squadron);
    let seq = battle.next_seq();
    state::submit_turn(&mut battle, p3, seq, TurnAction::Forfeit, &hash, t0).unwrap();

    assert!(state::force_complete(&mut battle, t0 + Duration::minutes(29)).is_none());

    let report = state::force_complete(&mut battle, t0 + Duration::minutes(30)).unwrap();
    assert_eq!(battle.status, BattleStatus::Completed);
    assert_eq!(report.placements.len(), 2);
    let mut tied = report.placements[0].clone();
    tied.sort();
    let mut expected = vec![p1, p2];
    expected.sort();
    assert_eq!(tied, expected);
    assert_eq!(report.placements[1], vec![p3]);
    // Both tied actives carry placement 1.
    assert_eq!(battle.participant(p1).unwrap().placement, Some(1));
    assert_eq!(battle.participant(p2).unwrap().placement, Some(1));
}

#[test]
fn forced_timeout_writes_a_zero_action_timeline_event() {
    let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
    let (mut battle, t0) = started_battle(&[p1, p2]);

    let outcome = state::force_timeout(&mut battle, p1, t0 + Duration::seconds(90)).unwrap();
    let event = battle
        .timeline
        .iter()
        .find(|e| e.seq == outcome.turn_seq)
        .unwrap();
    match &event.entry {
        TimelineEntry::Turn {
            action,
            damage,
            timed_out,
            ..
        } => {
            assert!(action.is_none());
            assert_eq!(*damage, 0);
            assert!(*timed_out);
        }
        other => panic!("unexpected timeline entry: {other:?}"),
    }
}
