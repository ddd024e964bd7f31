//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::aggregates::OrderError;
use crate::EcommerceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::EmptyCart
            | Self::InvalidPaymentMethod
            | Self::InvalidReference(_)
            | Self::SignatureInvalid => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::OrderNotFound(_) | Self::ProductNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } | Self::AlreadyPaid(_) | Self::ConcurrentUpdate(_) => StatusCode::CONFLICT,
            Self::Order(
                OrderError::IllegalPaymentTransition { .. } | OrderError::IllegalOrderTransition { .. } | OrderError::AlreadySettled(_),
            ) => StatusCode::CONFLICT,
            Self::Order(_) => StatusCode::BAD_REQUEST,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn response_message(&self) -> String {
        match self {
            Self::Storage(_) | Self::Configuration(_) => "Internal server error".to_string(),
            Self::Gateway(_) => "Payment gateway is unavailable, please retry".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Storage(_) | Self::Configuration(_) => tracing::error!(error = %self, "request failed"),
            Self::Gateway(_) => tracing::warn!(error = %self, "gateway error"),
            _ => {}
        }
        let body = ErrorResponse {
            success: false,
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
