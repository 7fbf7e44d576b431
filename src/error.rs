//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Catalog loading and validation failures.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: entity {entity} field {field}")]
    InvalidPrimaryKey { entity: String, field: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("schema load: {0}")]
    Load(String),
}

/// Failures raised by an entity store, surfaced unchanged by the query engine.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("unknown table: {0}")]
    MissingTable(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        QueryError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Errors as seen by the HTTP adapter.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Query(QueryError::Store(e))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Query(q) => match q {
                QueryError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
                QueryError::UnknownField { .. } => (StatusCode::BAD_REQUEST, "unknown_field"),
                QueryError::UnknownEntity(_) | QueryError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                QueryError::Store(StoreError::Constraint(_)) => (StatusCode::CONFLICT, "conflict"),
                QueryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            },
            AppError::Auth(AuthError::Signing(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "token_error"),
            AppError::Auth(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
