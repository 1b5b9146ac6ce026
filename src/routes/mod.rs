pub mod moderation;
pub mod public;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::engine::EngineError;
use crate::models::{ContentRef, ContentType};

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidTransition { .. }
            | EngineError::AlreadyInState { .. }
            | EngineError::AlreadyReviewed(_)
            | EngineError::AlreadyReversed(_)
            | EngineError::NotReversible(_)
            | EngineError::VersionConflict { .. } => StatusCode::CONFLICT,
            EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            EngineError::Storage(e) => {
                log::error!("Storage failure while handling request: {}", e);
                "Internal storage error.".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::failure(message))
    }
}

/// Parses the `{content_type}/{content_id}` part of a path.
pub(crate) fn content_ref_from_path(content_type: &str, content_id: i64) -> Result<ContentRef, EngineError> {
    let content_type = content_type
        .parse::<ContentType>()
        .map_err(|e| EngineError::invalid_input(e.to_string()))?;
    Ok(ContentRef::new(content_type, content_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_http_statuses() {
        assert_eq!(EngineError::not_found("report", 3).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(EngineError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(EngineError::NotReversible(1).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            EngineError::StorageUnavailable("busy".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn unknown_content_type_is_bad_input() {
        assert!(content_ref_from_path("forum_post", 4).is_ok());
        assert!(matches!(content_ref_from_path("poem", 4), Err(EngineError::InvalidInput(_))));
    }
}
