use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod ai;
mod auth;
mod server;
mod transactions;

/// Error returned by every handler, rendered as a JSON body.
pub enum ServerError {
    Engine(EngineError),
}

/// JSON body of every error response.
///
/// `field` and `index` locate a validation failure; `raw` carries the model
/// output that could not be parsed.
#[derive(Serialize)]
struct Error {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl Error {
    fn message(error: String) -> Self {
        Self {
            error,
            field: None,
            index: None,
            raw: None,
        }
    }
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Unauthenticated => StatusCode::UNAUTHORIZED,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::ExtractionService(_) => StatusCode::BAD_GATEWAY,
        EngineError::Database(_) | EngineError::Credential(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::Validation(_)
        | EngineError::BatchValidation { .. }
        | EngineError::InvalidJson { .. }
        | EngineError::MalformedExtraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn body_for_engine_error(err: EngineError) -> Error {
    let message = err.to_string();
    match err {
        EngineError::Validation(field_error) => Error {
            field: Some(field_error.field),
            ..Error::message(message)
        },
        EngineError::BatchValidation { index, error } => Error {
            field: Some(error.field),
            index: Some(index),
            ..Error::message(message)
        },
        EngineError::InvalidJson { raw } | EngineError::MalformedExtraction { raw, .. } => Error {
            raw: Some(raw),
            ..Error::message(message)
        },
        EngineError::ExtractionService(cause) => {
            tracing::error!("text generation failed: {cause}");
            Error::message("text generation service unavailable".to_string())
        }
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            Error::message("internal server error".to_string())
        }
        EngineError::Credential(cause) => {
            tracing::error!("credential error: {cause}");
            Error::message("internal server error".to_string())
        }
        _ => Error::message(message),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), body_for_engine_error(err)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
