use thiserror::Error;

use crate::models::RecordId;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("record store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("record store reported failure: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{entity} record does not match schema: {source}")]
    Schema {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {id} not found in {table}")]
    NotFound { table: String, id: RecordId },

    #[error("{failed} of {total} records failed")]
    Partial { failed: usize, total: usize },

    #[error("failed to persist fixture data: {0}")]
    Persist(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;
