//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use feedback_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// The method is routed but not permitted on this collection.
  #[error("method not allowed: {0}")]
  MethodNotAllowed(String),

  #[error("store error: {source}")]
  Store {
    transient: bool,
    #[source]
    source:    Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  pub fn store<E: StoreError>(e: E) -> Self {
    Self::Store { transient: e.is_transient(), source: Box::new(e) }
  }
}

impl From<feedback_core::Error> for ApiError {
  fn from(e: feedback_core::Error) -> Self {
    use feedback_core::Error as E;
    match e {
      E::Store(source) => Self::Store { transient: false, source },
      other @ (E::Validation(_)
      | E::Serialization(_)
      | E::InvalidCatalog(_)
      | E::InvalidKey(_)
      | E::UnknownPrize(_)) => Self::BadRequest(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
      ApiError::Store { transient: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Store { transient: false, .. } => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match &self {
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Conflict(m)
      | ApiError::MethodNotAllowed(m) => m.clone(),
      ApiError::Store { source, .. } => source.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
