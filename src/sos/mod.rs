pub mod manager;
pub mod routes;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use thiserror::Error;

/// Errors of the SOS state machine. Authorization and state errors are
/// returned to the immediate caller and never terminate a connection.
#[derive(Debug, Error)]
pub enum SosError {
    #[error("alert not found")]
    NotFound,
    #[error("not authorized")]
    NotAuthorized,
    #[error("alert already resolved")]
    InvalidState,
    #[error("database error: {0}")]
    Db(String),
}

impl IntoResponse for SosError {
    fn into_response(self) -> Response {
        let status = match &self {
            SosError::NotFound => StatusCode::NOT_FOUND,
            SosError::NotAuthorized => StatusCode::FORBIDDEN,
            SosError::InvalidState => StatusCode::CONFLICT,
            SosError::Db(e) => {
                tracing::error!(error = %e, "SOS store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for SosError {
    fn from(e: rusqlite::Error) -> Self {
        SosError::Db(e.to_string())
    }
}
