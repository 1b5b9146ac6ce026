use actix_web::{web, HttpResponse, Responder};

use super::{content_ref_from_path, ApiResponse};
use crate::AppState;

pub fn config_public(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/public")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/content/{content_type}/{content_id}", web::get().to(get_public_content)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

/// Only validated content is visible without an actor.
async fn get_public_content(
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
) -> actix_web::Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content = content_ref_from_path(&content_type, content_id)?;
    let engine = state.engine.clone();

    match web::block(move || engine.content(content)).await? {
        Ok(item) if item.is_public() => Ok(HttpResponse::Ok().json(ApiResponse::ok(item.payload))),
        Ok(_) | Err(crate::engine::EngineError::NotFound { .. }) => {
            Ok(HttpResponse::NotFound().json(ApiResponse::failure("Content not found")))
        }
        Err(e) => Err(e.into()),
    }
}
