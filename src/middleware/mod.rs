use actix_web::{dev, web, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

use crate::models::{ActorContext, Role};
use crate::AppState;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// The caller as asserted by the authentication gateway in front of this service.
/// Identity headers are only honoured from a trusted gateway address.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthenticatedActor(pub ActorContext);

impl FromRequest for AuthenticatedActor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(extract_actor(req))
    }
}

fn extract_actor(req: &HttpRequest) -> Result<AuthenticatedActor, actix_web::Error> {
    let allowed = req
        .app_data::<web::Data<AppState>>()
        .map(|state| state.trusted_gateway_ips.clone())
        .unwrap_or_default();
    if !is_trusted_gateway(&allowed, req) {
        return Err(actix_web::error::ErrorForbidden("Request did not come through the gateway."));
    }

    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let user_id = header(ACTOR_ID_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Missing or invalid actor id."))?;
    let role = header(ACTOR_ROLE_HEADER)
        .and_then(|v| v.parse::<Role>().ok())
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Missing or invalid actor role."))?;

    Ok(AuthenticatedActor(ActorContext::new(user_id, role)))
}

/// `allowed` is `*` or a comma-separated list of addresses.
pub fn is_trusted_gateway(allowed: &str, req: &HttpRequest) -> bool {
    if allowed.trim() == "*" {
        return true;
    }

    // Get the real IP, considering reverse proxies
    let request_ip = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()));

    let peer_addr = match request_ip {
        Some(ip) => ip,
        None => {
            log::warn!("Could not determine peer IP address for gateway request.");
            return false;
        }
    };

    let is_allowed = allowed.split(',').any(|ip| ip.trim() == peer_addr);
    if !is_allowed {
        log::warn!("Blocked request from untrusted address: {}", peer_addr);
    }
    is_allowed
}
