//! `GET /metrics`: dashboard aggregates over every survey response.

use std::sync::Arc;

use axum::{Json, extract::State};
use feedback_core::{
  analytics::DashboardMetrics,
  store::{Collection, DocumentStore},
  survey::SurveyRecord,
};
use tracing::warn;

use crate::{ApiState, error::ApiError};

/// `GET /metrics`
///
/// Documents that no longer decode as survey records are skipped and
/// logged rather than failing the whole dashboard.
pub async fn handler<S>(
  State(state): State<Arc<ApiState<S>>>,
) -> Result<Json<DashboardMetrics>, ApiError>
where
  S: DocumentStore,
{
  let docs = state
    .store
    .list(Collection::SurveyResponses)
    .await
    .map_err(ApiError::store)?;

  let records: Vec<SurveyRecord> = docs
    .iter()
    .filter_map(|doc| match SurveyRecord::from_document(doc) {
      Ok(r) => Some(r),
      Err(e) => {
        warn!(key = %doc.key, error = %e, "skipping undecodable survey response");
        None
      }
    })
    .collect();

  Ok(Json(DashboardMetrics::compute(&records)))
}
