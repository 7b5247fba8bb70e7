use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarmChainError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Error: Email is already taken!")]
    DuplicateEmail,

    #[error("Error: Invalid email or password!")]
    InvalidCredentials,

    #[error("Record not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No free codes left for this role")]
    CodeSpaceExhausted,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Keep the error serializable so handlers can embed it in JSON payloads.
impl Serialize for FarmChainError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type FarmChainResult<T> = Result<T, FarmChainError>;

impl FarmChainError {
    /// Check-then-insert can lose a concurrent race; the unique indexes then
    /// report the conflict as a database error. Surface it as the matching
    /// business error instead of a 500.
    fn flatten_unique_violation(self) -> Self {
        if let FarmChainError::Database(sqlx::Error::Database(ref db_err)) = self {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or_default();
                if constraint.contains("email") {
                    return FarmChainError::DuplicateEmail;
                }
                if constraint.contains("farmer_id") || constraint.contains("distributor_id") {
                    return FarmChainError::CodeSpaceExhausted;
                }
            }
        }
        self
    }
}

impl IntoResponse for FarmChainError {
    fn into_response(self) -> Response {
        let err = self.flatten_unique_violation();
        let (status, error_message) = match err {
            FarmChainError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred.".to_string(),
                )
            }
            FarmChainError::DuplicateEmail => (StatusCode::BAD_REQUEST, err.to_string()),
            FarmChainError::InvalidCredentials => (StatusCode::BAD_REQUEST, err.to_string()),
            FarmChainError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
            FarmChainError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            FarmChainError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            FarmChainError::CodeSpaceExhausted => (StatusCode::CONFLICT, err.to_string()),
            FarmChainError::Internal(msg) => {
                tracing::error!("Internal Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
