use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Archive row for one completed battle.
#[derive(Debug, FromRow, Serialize)]
pub struct BattleRow {
    pub id: Uuid,
    pub kind: String,
    pub status: String,
    pub winner_id: Option<Uuid>,
    pub entry_fee: i64,
    pub currency: String,
    pub prize_pool: i64,
    pub participant_count: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One entry of a player's match history.
#[derive(Debug, FromRow, Serialize)]
pub struct HistoryRow {
    pub battle_id: Uuid,
    pub kind: String,
    pub winner_id: Option<Uuid>,
    pub entry_fee: i64,
    pub currency: String,
    pub prize_pool: i64,
    pub placement: Option<i32>,
    pub payout: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}
