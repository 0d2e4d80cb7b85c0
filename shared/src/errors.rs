use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::objects::PresignError;
use crate::persistence::StorageError;
use crate::responses;

const GENERIC_FAILURE: &str = "Internal server error";

/// Everything a handler can fail with. Only `NotFound` and `Conflict` reach
/// the caller with their own message; the rest collapse into a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Presign(#[from] PresignError),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shape the boundary response; failures are logged here, once.
    pub fn into_response(self, operation: &str) -> Result<Response<Body>, Error> {
        match &self {
            ApiError::NotFound(_) => responses::error(self.status(), &self.to_string()),
            ApiError::Conflict(_) => {
                tracing::warn!("[{}] {}", operation, self);
                responses::error(self.status(), &self.to_string())
            }
            _ => {
                tracing::error!("[{}] {}", operation, self);
                responses::error(self.status(), GENERIC_FAILURE)
            }
        }
    }
}

/// Map a failed conditional write on a missing record to a 404.
pub fn missing_as(what: &'static str) -> impl Fn(StorageError) -> ApiError {
    move |err| match err {
        StorageError::ConditionFailed(_) => ApiError::NotFound(what),
        other => ApiError::Storage(other),
    }
}

/// Map an insert that hit an existing record to a 409.
pub fn taken_as(what: &'static str) -> impl Fn(StorageError) -> ApiError {
    move |err| match err {
        StorageError::AlreadyExists(_) => ApiError::Conflict(what),
        other => ApiError::Storage(other),
    }
}

/// Parse a request body, reporting malformed JSON as a validation failure.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(e.to_string()))
}
