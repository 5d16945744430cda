//! Battle command & query endpoints.

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battle::engine::BattleEngine;
use crate::battle::power::{MemberPower, Squadron};
use crate::battle::types::{
    AiDifficulty, BattleKind, BattleRules, CollectionGate, PrizeSplit, TurnAction,
};
use crate::config::settings;
use crate::error::BattleError;
use crate::http::auth::JwtAuth;

#[derive(Deserialize)]
pub struct SquadronInput {
    pub capacity: usize,
    pub members: Vec<MemberPower>,
}

impl SquadronInput {
    fn into_squadron(self) -> Result<Squadron, BattleError> {
        Squadron::with_members(self.capacity, self.members)
    }
}

#[derive(Deserialize)]
pub struct CreateBattleRequest {
    pub kind: BattleKind,
    pub min_participants: usize,
    pub max_participants: usize,
    pub entry_fee: i64,
    pub currency: String,
    pub split: PrizeSplit,
    /// Per-battle overrides; server defaults apply when omitted.
    pub turn_timeout_secs: Option<i64>,
    pub battle_length_mins: Option<i64>,
    pub open_ttl_secs: Option<i64>,
    pub gate: Option<CollectionGate>,
    pub ai_opponent: Option<AiDifficulty>,
    pub squadron: SquadronInput,
}

#[derive(Serialize)]
pub struct CreateBattleResponse {
    pub battle_id: Uuid,
}

/// POST /api/battles
#[post("/battles")]
pub async fn create_battle(
    auth: JwtAuth,
    body: web::Json<CreateBattleRequest>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let body = body.into_inner();
    let defaults = settings();

    let rules = BattleRules {
        kind: body.kind,
        min_participants: body.min_participants,
        max_participants: body.max_participants,
        entry_fee: body.entry_fee,
        currency: body.currency,
        split: body.split,
        turn_timeout_secs: body.turn_timeout_secs.unwrap_or(defaults.turn_timeout_secs),
        battle_length_mins: body
            .battle_length_mins
            .unwrap_or(defaults.battle_length_mins),
        open_ttl_secs: body.open_ttl_secs.unwrap_or(defaults.open_ttl_secs),
        timeout_threshold: defaults.timeout_threshold,
        gate: body.gate,
        ai_opponent: body.ai_opponent,
    };
    let squadron = body.squadron.into_squadron()?;

    let battle_id = engine.create_battle(auth.player_id, rules, squadron, &auth.holdings)?;
    Ok(HttpResponse::Created().json(CreateBattleResponse { battle_id }))
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub squadron: SquadronInput,
}

/// POST /api/battles/{id}/join
#[post("/battles/{id}/join")]
pub async fn join_battle(
    auth: JwtAuth,
    path: web::Path<Uuid>,
    body: web::Json<JoinRequest>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle_id = path.into_inner();
    let squadron = body.into_inner().squadron.into_squadron()?;

    engine
        .join(battle_id, auth.player_id, squadron, &auth.holdings)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "joined" })))
}

/// Deposit confirmation pushed by the payment rail once an entry fee
/// lands on chain.
#[derive(Deserialize)]
pub struct DepositNotice {
    pub player_id: Uuid,
    pub amount: i64,
    pub currency: String,
}

/// POST /api/battles/{id}/deposits
#[post("/battles/{id}/deposits")]
pub async fn confirm_deposit(
    path: web::Path<Uuid>,
    body: web::Json<DepositNotice>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle_id = path.into_inner();
    engine
        .confirm_deposit(battle_id, body.player_id, body.amount, &body.currency)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "recorded" })))
}

#[derive(Deserialize)]
pub struct TurnRequest {
    pub seq: u64,
    pub action: TurnAction,
    /// Hash of the squadron state the client believes is current.
    pub squadron_hash: String,
}

/// POST /api/battles/{id}/turns
#[post("/battles/{id}/turns")]
pub async fn submit_turn(
    auth: JwtAuth,
    path: web::Path<Uuid>,
    body: web::Json<TurnRequest>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle_id = path.into_inner();
    let body = body.into_inner();

    let receipt = engine
        .submit_turn(
            battle_id,
            auth.player_id,
            body.seq,
            body.action,
            &body.squadron_hash,
        )
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

/// GET /api/battles/{id}
#[get("/battles/{id}")]
pub async fn get_battle(
    path: web::Path<Uuid>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle = engine.snapshot(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(battle))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// POST /api/battles/{id}/cancel
#[post("/battles/{id}/cancel")]
pub async fn cancel_battle(
    auth: JwtAuth,
    path: web::Path<Uuid>,
    body: web::Json<CancelRequest>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle_id = path.into_inner();
    let reason = body
        .into_inner()
        .reason
        .unwrap_or_else(|| "cancelled by creator".to_string());

    engine.cancel(battle_id, auth.player_id, &reason).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "cancelled" })))
}

/// Settlement confirmation pushed by the payment rail. `player_id` is
/// absent for the platform-fee transfer.
#[derive(Deserialize)]
pub struct SettlementConfirmation {
    pub player_id: Option<Uuid>,
}

/// POST /api/battles/{id}/settlements/confirm
#[post("/battles/{id}/settlements/confirm")]
pub async fn confirm_settlement(
    path: web::Path<Uuid>,
    body: web::Json<SettlementConfirmation>,
    engine: web::Data<BattleEngine>,
) -> Result<HttpResponse, BattleError> {
    let battle_id = path.into_inner();
    let known = engine.escrow.confirm(battle_id, body.player_id);
    if !known {
        return Err(BattleError::BattleNotFound);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "confirmed" })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_battle)
        .service(join_battle)
        .service(confirm_deposit)
        .service(submit_turn)
        .service(get_battle)
        .service(cancel_battle)
        .service(confirm_settlement);
}
