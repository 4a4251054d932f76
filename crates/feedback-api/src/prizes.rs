//! `GET /prizes`: the configured catalog, in wheel order.

use std::sync::Arc;

use axum::{Json, extract::State};
use feedback_core::{prize::PrizeCatalog, store::DocumentStore};

use crate::ApiState;

/// `GET /prizes`
pub async fn handler<S>(State(state): State<Arc<ApiState<S>>>) -> Json<PrizeCatalog>
where
  S: DocumentStore,
{
  Json(state.catalog.clone())
}
