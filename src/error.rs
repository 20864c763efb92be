use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::models::ApiResponse;
use crate::views::SelectionError;

/// Errors an action handler reports back to the page
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("no demo named {0}")]
    UnknownDemo(String),

    #[error("no summary results for bucket {0}")]
    NoSummary(usize),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::UnknownDemo(_) => StatusCode::NOT_FOUND,
            Self::NoSummary(_) | Self::Selection(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            status: "error".to_string(),
            message: format!("Error: {self}"),
            data: None,
        };
        (self.status_code(), Json(body)).into_response()
    }
}
