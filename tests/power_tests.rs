//! Unit tests for deterministic squadron power aggregation.

use warforge_server::battle::power::{aggregate, MemberPower, Squadron};

fn member(id: &str, army: i64, religion: i64, civilization: i64, economic: i64) -> MemberPower {
    MemberPower {
        token_id: id.into(),
        army,
        religion,
        civilization,
        economic,
        multiplier_pct: 100,
    }
}

#[test]
fn empty_squadron_has_zero_power() {
    let sq = Squadron::new(5);
    let p = sq.power();
    assert_eq!(p.total, 0);
    assert_eq!(p.army, 0);
}

#[test]
fn total_is_sum_of_category_subtotals() {
    let sq = Squadron::with_members(
        5,
        vec![member("a", 10, 20, 30, 40), member("b", 1, 2, 3, 4)],
    )
    .unwrap();
    let p = sq.power();
    assert_eq!(p.army, 11);
    assert_eq!(p.religion, 22);
    assert_eq!(p.civilization, 33);
    assert_eq!(p.economic, 44);
    assert_eq!(p.total, 110);
}

#[test]
fn aggregation_is_idempotent() {
    let members = vec![member("a", 5, 0, 0, 0), member("b", 0, 7, 0, 0)];
    let first = aggregate(&members);
    let second = aggregate(&members);
    assert_eq!(first, second);

    // No-op membership pass leaves the power unchanged.
    let sq = Squadron::with_members(4, members).unwrap();
    assert_eq!(sq.power(), first);
    assert_eq!(sq.power(), first);
}

#[test]
fn power_tracks_add_and_remove() {
    let mut sq = Squadron::new(3);
    sq.add_member(member("a", 10, 0, 0, 0)).unwrap();
    assert_eq!(sq.power().total, 10);

    sq.add_member(member("b", 0, 5, 0, 0)).unwrap();
    assert_eq!(sq.power().total, 15);

    assert!(sq.remove_member("a"));
    assert_eq!(sq.power().total, 5);

    assert!(!sq.remove_member("a")); // already gone
    assert_eq!(sq.power().total, 5);
}

#[test]
fn capacity_is_enforced() {
    let mut sq = Squadron::new(1);
    sq.add_member(member("a", 1, 0, 0, 0)).unwrap();
    assert!(sq.add_member(member("b", 1, 0, 0, 0)).is_err());
}

#[test]
fn multiplier_applies_per_member_so_order_is_irrelevant() {
    let mut boosted = member("a", 10, 0, 0, 10);
    boosted.multiplier_pct = 150;
    let plain = member("b", 8, 4, 0, 0);

    let forward = aggregate(&[boosted.clone(), plain.clone()]);
    let reversed = aggregate(&[plain, boosted]);
    assert_eq!(forward, reversed);
    // 150% of (10 army + 10 economic) = 15 + 15, plus 8 + 4.
    assert_eq!(forward.total, 42);
}

#[test]
fn unknown_traits_contribute_zero() {
    let m = MemberPower::from_traits(
        "nft-1",
        &[
            ("army".to_string(), 12),
            ("economy".to_string(), 3),
            ("sparkle".to_string(), 999),
        ],
    );
    assert_eq!(m.army, 12);
    assert_eq!(m.economic, 3);
    assert_eq!(m.total(), 15);
}
