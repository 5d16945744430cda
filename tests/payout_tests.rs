//! Prize distribution properties: exact conservation, floor rounding,
//! remainder-to-platform.

use uuid::Uuid;
use warforge_server::battle::payout::compute_distribution;
use warforge_server::battle::types::PrizeSplit;
use warforge_server::error::BattleError;

fn split(first: u8, second: u8, third: u8) -> PrizeSplit {
    PrizeSplit {
        first_pct: first,
        second_pct: second,
        third_pct: third,
    }
}

#[test]
fn four_player_example_distributes_the_whole_pool() {
    // Entry 100 x 4 participants, splits 70/20/10, eliminations A, B, C
    // leave D first.
    let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let groups = vec![vec![d], vec![c], vec![b], vec![a]];

    let dist = compute_distribution(400, &split(70, 20, 10), &groups).unwrap();

    let amount_of = |id: Uuid| {
        dist.payouts
            .iter()
            .find(|p| p.player_id == id)
            .map(|p| p.amount)
            .unwrap()
    };
    assert_eq!(amount_of(d), 280);
    assert_eq!(amount_of(c), 80);
    assert_eq!(amount_of(b), 40);
    assert_eq!(amount_of(a), 0);
    assert_eq!(dist.platform_fee, 0);
    assert_eq!(dist.total_paid() + dist.platform_fee, 400);
}

#[test]
fn percentages_over_100_are_rejected() {
    let groups = vec![vec![Uuid::new_v4()]];
    let err = compute_distribution(100, &split(70, 20, 20), &groups).unwrap_err();
    assert_eq!(err, BattleError::InvalidSplit);
}

#[test]
fn undeclared_percentage_remainder_is_the_platform_fee() {
    let (w, l) = (Uuid::new_v4(), Uuid::new_v4());
    let dist = compute_distribution(1000, &split(50, 30, 0), &vec![vec![w], vec![l]]).unwrap();
    assert_eq!(dist.total_paid(), 800);
    assert_eq!(dist.platform_fee, 200);
}

#[test]
fn rounding_remainder_goes_to_the_platform_never_to_winners() {
    let (w1, w2, w3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let groups = vec![vec![w1], vec![w2], vec![w3]];

    // 101 * 70% = 70.7 -> 70, 20.2 -> 20, 10.1 -> 10; 1 left over.
    let dist = compute_distribution(101, &split(70, 20, 10), &groups).unwrap();
    assert_eq!(dist.total_paid(), 100);
    assert_eq!(dist.platform_fee, 1);
    assert_eq!(dist.total_paid() + dist.platform_fee, 101);
}

#[test]
fn tied_group_shares_the_rank_mass_it_spans() {
    let (d, e, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    // Two actives tied at first, one earlier elimination.
    let groups = vec![vec![d, e], vec![c]];

    let dist = compute_distribution(400, &split(70, 20, 10), &groups).unwrap();
    let amount_of = |id: Uuid| {
        dist.payouts
            .iter()
            .find(|p| p.player_id == id)
            .map(|p| p.amount)
            .unwrap()
    };
    // First + second mass (90%) split across the tie; c takes third.
    assert_eq!(amount_of(d), 180);
    assert_eq!(amount_of(e), 180);
    assert_eq!(amount_of(c), 40);
    assert_eq!(dist.platform_fee, 0);
}

#[test]
fn house_share_reroutes_to_the_platform() {
    let (house, player) = (Uuid::new_v4(), Uuid::new_v4());
    let mut dist =
        compute_distribution(200, &split(70, 20, 0), &vec![vec![house], vec![player]]).unwrap();

    dist.reassign_to_platform(&[house]);
    assert_eq!(dist.total_paid(), 40); // player's second-place share only
    assert_eq!(dist.platform_fee, 160);
    assert_eq!(dist.total_paid() + dist.platform_fee, 200);
}
