use actix_web::error::{BlockingError, JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use thiserror::Error;

use crate::serializers::FieldErrors;

const SERVER_ERROR_DETAIL: &str = "A server error occurred.";

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("Not found.")]
    NotFound,
    #[error("invalid payload")]
    Validation(FieldErrors),
    #[error("JSON parse error - {0}")]
    MalformedJson(String),
    #[error("Invalid query string - {0}")]
    MalformedQuery(String),
    #[error("{0}")]
    Integrity(DieselError),
    #[error("database error: {0}")]
    Database(DieselError),
    #[error("could not get a database connection: {0}")]
    Pool(#[from] PoolError),
    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ApiError::NotFound,
            DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation,
                _,
            ) => ApiError::Integrity(err),
            other => ApiError::Database(other),
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<JsonPayloadError> for ApiError {
    fn from(err: JsonPayloadError) -> Self {
        ApiError::MalformedJson(err.to_string())
    }
}

impl From<QueryPayloadError> for ApiError {
    fn from(err: QueryPayloadError) -> Self {
        ApiError::MalformedQuery(err.to_string())
    }
}

//an id segment that is not an integer can never name a recipe
impl From<PathError> for ApiError {
    fn from(_: PathError) -> Self {
        ApiError::NotFound
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_)
            | ApiError::MalformedJson(_)
            | ApiError::MalformedQuery(_)
            | ApiError::Integrity(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::Validation(errors) => HttpResponse::build(status).json(errors),
            _ if status.is_server_error() => {
                log::error!("{}", self);
                HttpResponse::build(status).json(json!({ "detail": SERVER_ERROR_DETAIL }))
            }
            _ => HttpResponse::build(status).json(json!({ "detail": self.to_string() })),
        }
    }
}
