use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::service::ServiceError;

/// Errors returned by the query endpoints. Store details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("order uid is required")]
    MissingOrderUid,

    #[error("order not found")]
    NotFound,

    #[error("internal error")]
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound { .. } => ApiError::NotFound,
            other => {
                tracing::error!(error = %other, "Order lookup failed");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingOrderUid => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
