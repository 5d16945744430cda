//! Player battle-history queries over the completed-battle archive.

use actix_web::{get, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::battle_repo;

/// GET /api/battles/history/{player_id}
#[get("/battles/history/{player_id}")]
pub async fn history(path: web::Path<Uuid>, db: web::Data<PgPool>) -> impl Responder {
    let player_id = path.into_inner();

    match battle_repo::history(&db, player_id).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            log::warn!("history query failed for {player_id}: {e:?}");
            HttpResponse::InternalServerError().body("DB error")
        }
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(history);
}
