use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use docgraph_service::{DaoError, TransactionError};
use serde::Serialize;
use tracing::error;

/// Error returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Dao(DaoError),
    Transaction(TransactionError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        ApiError::Dao(err)
    }
}

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        ApiError::Transaction(err)
    }
}

pub fn status_for(err: &DaoError) -> StatusCode {
    match err {
        DaoError::NotFound(_) => StatusCode::NOT_FOUND,
        DaoError::DuplicateContent(_)
        | DaoError::ProposalNotActive { .. }
        | DaoError::ProposalClosed { .. }
        | DaoError::Superseded { .. }
        | DaoError::VotingWindowOpen { .. }
        | DaoError::VotingExpired { .. }
        | DaoError::PeriodNotElapsed { .. }
        | DaoError::AlreadyClaimed { .. } => StatusCode::CONFLICT,
        DaoError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        DaoError::InvalidContent(_) | DaoError::Value(_) | DaoError::DanglingReference { .. } => {
            StatusCode::BAD_REQUEST
        }
        DaoError::Database(_) | DaoError::Serialization(_) | DaoError::Poisoned => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody { error: message, index: None, retryable: false },
            ),
            ApiError::Dao(err) => (
                status_for(&err),
                ErrorBody { error: err.to_string(), index: None, retryable: err.is_transient() },
            ),
            ApiError::Transaction(err) => (
                status_for(&err.source),
                ErrorBody {
                    error: err.to_string(),
                    index: Some(err.index),
                    retryable: err.source.is_transient(),
                },
            ),
        };

        if status.is_server_error() {
            error!(status = %status, error = %body.error, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}
