use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::CompletionError;

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// Class index 1 is positive, everything else negative.
    pub fn from_class_index(index: u32) -> Self {
        if index == 1 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub sentiment: Sentiment,
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(sentiment: Sentiment, confidence: f64) -> Self {
        Self {
            sentiment,
            confidence: round4(confidence),
        }
    }
}

/// Round to 4 decimal digits, matching the service's response contract.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// The llama path returns the raw completion as a bare JSON string, the
/// custom path a structured object; untagged serialization covers both.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Classification(ClassificationResult),
    Completion(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid model choice. Use 'custom' or 'llama'.")]
    InvalidModel(String),
    #[error("upstream returned {status}")]
    Upstream { status: u16, body: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Upstream { status, body } => ApiError::Upstream { status, body },
            other => ApiError::Internal(other.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::InvalidModel(ref model) => {
                tracing::warn!(model = %model, "rejected unknown model discriminator");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            // Upstream failures pass through verbatim: their status code and
            // raw body become ours.
            ApiError::Upstream { status, body } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            ),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
