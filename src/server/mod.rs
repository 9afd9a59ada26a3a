//! HTTP host for the pipeline (spec §6): a small axum surface around the
//! parse/commit/list operations. Grounded on `ibank-service`'s
//! `ServiceState`/`build_router`/`ApiError` shape; the teacher has no HTTP
//! layer of its own (it is a one-shot CLI).

pub mod dto;
pub mod imports;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;

use crate::config::Config;
use crate::error::{PipelineError, StorageError};
use crate::repo::Repo;

#[derive(Clone)]
pub struct ServerState {
    pub repo: Arc<dyn Repo>,
    pub config: Arc<Config>,
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/imports/parse", post(imports::parse_handler))
        .route("/imports/commit", post(imports::commit_handler))
        .route("/imports", get(imports::list_handler))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Pipeline(err) => {
                let status =
                    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (
                    status,
                    Json(serde_json::json!({ "error": err.to_string(), "code": err.code() })),
                )
                    .into_response()
            }
            ApiError::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": err.to_string(), "code": "storage_error" })),
            )
                .into_response(),
        }
    }
}
