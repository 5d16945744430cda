//! Completed-battle archive.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::battle::types::Battle;
use crate::db::models::HistoryRow;
use crate::escrow::EscrowRecord;

/// Persist a finished battle and its per-participant results. Idempotent:
/// re-archiving after a retried completion inserts nothing.
pub async fn archive(db: &PgPool, battle: &Battle, records: &[EscrowRecord]) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO battles
               (id, kind, status, winner_id, entry_fee, currency, prize_pool,
                participant_count, created_at, completed_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
           ON CONFLICT (id) DO NOTHING"#,
    )
    .bind(battle.id)
    .bind(battle.rules.kind.as_str())
    .bind(battle.status.as_str())
    .bind(battle.winner)
    .bind(battle.rules.entry_fee)
    .bind(battle.rules.currency.as_str())
    .bind(battle.total_prize_pool())
    .bind(battle.participants.len() as i32)
    .bind(battle.created_at)
    .bind(battle.completed_at)
    .execute(db)
    .await?;

    for p in &battle.participants {
        let payout = records
            .iter()
            .find(|r| r.player_id == p.player_id)
            .and_then(|r| r.settled_amount);

        sqlx::query(
            r#"INSERT INTO battle_participants
                   (battle_id, player_id, placement, payout, is_ai)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (battle_id, player_id) DO NOTHING"#,
        )
        .bind(battle.id)
        .bind(p.player_id)
        .bind(p.placement.map(|v| v as i32))
        .bind(payout)
        .bind(p.is_ai)
        .execute(db)
        .await?;
    }

    Ok(())
}

/// Most recent battles a player took part in.
pub async fn history(db: &PgPool, player_id: Uuid) -> Result<Vec<HistoryRow>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT
            b.id            AS battle_id,
            b.kind          AS kind,
            b.winner_id     AS winner_id,
            b.entry_fee     AS entry_fee,
            b.currency      AS currency,
            b.prize_pool    AS prize_pool,
            bp.placement    AS placement,
            bp.payout       AS payout,
            b.completed_at  AS completed_at
        FROM battles b
        JOIN battle_participants bp ON bp.battle_id = b.id
        WHERE bp.player_id = $1
        ORDER BY b.completed_at DESC NULLS LAST
        LIMIT 100
        "#,
    )
    .bind(player_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}
