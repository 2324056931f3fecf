use core::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// Engine errors carried across the HTTP boundary. Conflict-shaped errors
/// map to 409 so the caller can re-prompt for different dates.
#[derive(Debug)]
pub struct ApiError(pub abi::Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<abi::Error> for ApiError {
    fn from(e: abi::Error) -> Self {
        Self(e)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            abi::Error::InvalidRange { .. }
            | abi::Error::InvalidVillaId(_)
            | abi::Error::InvalidNightlyRate(_)
            | abi::Error::InvalidMaxOccupancy(_)
            | abi::Error::InvalidGuestCount(_)
            | abi::Error::OccupancyExceeded { .. } => StatusCode::BAD_REQUEST,
            abi::Error::Unavailable(_) | abi::Error::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            abi::Error::BookingNotFound(_) | abi::Error::VillaNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            abi::Error::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
