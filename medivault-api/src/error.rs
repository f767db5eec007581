use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medivault_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Anyhow(err) => classify(err),
        }
    }
}

/// Errors arrive here through `?`, so the concrete type is recovered by downcasting.
fn classify(err: anyhow::Error) -> (StatusCode, String) {
    if let Some(rejection) = err.downcast_ref::<JsonRejection>() {
        return (StatusCode::BAD_REQUEST, rejection.body_text());
    }

    match err.downcast::<CoreError>() {
        Ok(core) => AppError::from_core(core).status_and_message(),
        Err(err) => {
            tracing::error!("Internal Server Error: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    }
}

impl AppError {
    pub fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::ValidationFailed(msg) => AppError::ValidationError(msg),
            CoreError::BundleBuildFailed { field, reason } => {
                AppError::ValidationError(format!("{}: {}", field, reason))
            }
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            e @ CoreError::LookupFailed(_) => AppError::UpstreamError(e.to_string()),
            e @ CoreError::StorageUnavailable(_) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "ok": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_core_errors_map_to_statuses() {
        let cases = [
            (CoreError::ValidationFailed("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::StorageUnavailable("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (CoreError::LookupFailed("x".into()), StatusCode::BAD_GATEWAY),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::bundle("allergies[0]", "blank"), StatusCode::BAD_REQUEST),
        ];
        for (core, expected) in cases {
            assert_eq!(status_of(AppError::from(core)), expected);
        }
    }

    #[test]
    fn test_unknown_errors_are_internal() {
        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
