use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{content_ref_from_path, ApiResponse};
use crate::engine::Intent;
use crate::middleware::AuthenticatedActor;
use crate::models::contribution_models::LeaderboardWindow;
use crate::AppState;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 20;
const MAX_LEADERBOARD_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: Option<u32>,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/intents", web::post().to(post_intent))
            .route("/content/{content_type}/{content_id}", web::get().to(get_content))
            .route("/content/{content_type}/{content_id}/history", web::get().to(get_history))
            .route("/contributions/{id}", web::get().to(get_contribution))
            .route("/actions/{id}", web::get().to(get_action))
            .route("/reports/{id}", web::get().to(get_report))
            .route("/leaderboard", web::get().to(get_leaderboard))
            .route("/maintenance/sweep", web::post().to(run_sweep)),
    );
}

async fn post_intent(
    state: web::Data<AppState>,
    actor: AuthenticatedActor,
    intent: web::Json<Intent>,
) -> actix_web::Result<HttpResponse> {
    let engine = state.engine.clone();
    let outcome = web::block(move || engine.handle(intent.into_inner(), actor.0)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(outcome)))
}

async fn get_content(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    path: web::Path<(String, i64)>,
) -> actix_web::Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content = content_ref_from_path(&content_type, content_id)?;
    let engine = state.engine.clone();
    let item = web::block(move || engine.content(content)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(item)))
}

async fn get_history(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    path: web::Path<(String, i64)>,
) -> actix_web::Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content = content_ref_from_path(&content_type, content_id)?;
    let engine = state.engine.clone();
    let records = web::block(move || engine.validation_history(content)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(records)))
}

async fn get_contribution(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    id: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    let engine = state.engine.clone();
    let id = id.into_inner();
    let entry = web::block(move || engine.contribution(id)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entry)))
}

async fn get_action(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    id: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    let engine = state.engine.clone();
    let id = id.into_inner();
    let action = web::block(move || engine.moderator_action(id)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(action)))
}

async fn get_report(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    id: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    let engine = state.engine.clone();
    let id = id.into_inner();
    let report = web::block(move || engine.report(id)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}

async fn get_leaderboard(
    state: web::Data<AppState>,
    _actor: AuthenticatedActor,
    query: web::Query<LeaderboardQuery>,
) -> actix_web::Result<HttpResponse> {
    let window = LeaderboardWindow { from: query.from, to: query.to };
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).clamp(1, MAX_LEADERBOARD_LIMIT);
    let engine = state.engine.clone();
    let entries = web::block(move || engine.leaderboard(window, limit)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entries)))
}

async fn run_sweep(state: web::Data<AppState>, actor: AuthenticatedActor) -> actix_web::Result<HttpResponse> {
    let engine = state.engine.clone();
    let report = web::block(move || engine.run_maintenance_as(&actor.0)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(report)))
}
