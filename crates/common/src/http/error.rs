use crate::domain::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Convert domain error to an HTTP status code
pub fn domain_error_to_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::InvalidPayload(_) | DomainError::ValidationError(_) => {
            StatusCode::BAD_REQUEST
        }

        DomainError::UnknownTenantOrRealm(_) => StatusCode::NOT_FOUND,

        // Operations are looked up by id from the payload; the pipeline drops
        // these before they reach the boundary, other callers see a 404.
        DomainError::OperationNotFound(_) => StatusCode::NOT_FOUND,

        DomainError::DeviceNotFound(_) | DomainError::RepositoryError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Error body returned by HTTP handlers
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = domain_error_to_status(&self.0);

        let message = match &self.0 {
            DomainError::RepositoryError(err) => {
                tracing::error!(error = %err, "repository failure while handling request");
                format!("Internal error: {}", err)
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert_eq!(
            domain_error_to_status(&DomainError::InvalidPayload("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            domain_error_to_status(&DomainError::ValidationError("empty".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            domain_error_to_status(&DomainError::UnknownTenantOrRealm("acme".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_server_errors() {
        assert_eq!(
            domain_error_to_status(&DomainError::RepositoryError(anyhow::anyhow!("down"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            domain_error_to_status(&DomainError::DeviceNotFound("dev-1".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_response_status() {
        let response =
            ApiError::from(DomainError::InvalidPayload("missing field".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
