//! Handlers for `/documents` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/documents/{collection}` | Every document, oldest first |
//! | `GET`   | `/documents/{collection}/{key}` | 404 if absent |
//! | `POST`  | `/documents/{collection}/{key}` | Create-if-absent; 201, or 409 if it exists |
//! | `PATCH` | `/documents/{collection}/{key}` | Merge update |
//! | `PUT`   | `/documents/{collection}/{key}` | Create-or-merge |
//!
//! Writes are checked per collection. Survey responses are only written with
//! `PUT` and must be a valid record for the key. Prize claims are created
//! with `POST` carrying only the key, then given a catalog prize with
//! `PATCH`.

use std::{str::FromStr, sync::Arc};

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use feedback_core::{
  IdentityKey,
  store::{Collection, CreateOutcome, Document, DocumentStore, Fields},
  survey::SurveyRecord,
};
use tracing::{debug, info};

use crate::{ApiState, error::ApiError};

/// Resolve the path segments. Unknown collections are 404, malformed keys
/// 400.
fn parse_path(collection: &str, key: &str) -> Result<(Collection, IdentityKey), ApiError> {
  let collection = Collection::from_str(collection)
    .map_err(|_| ApiError::NotFound(format!("unknown collection {collection:?}")))?;
  let key = IdentityKey::parse(key).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  Ok((collection, key))
}

fn body_error(e: JsonRejection) -> ApiError { ApiError::BadRequest(e.body_text()) }

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /documents/{collection}`
pub async fn list<S>(
  State(state): State<Arc<ApiState<S>>>,
  Path(collection): Path<String>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: DocumentStore,
{
  let collection = Collection::from_str(&collection)
    .map_err(|_| ApiError::NotFound(format!("unknown collection {collection:?}")))?;
  let docs = state.store.list(collection).await.map_err(ApiError::store)?;
  Ok(Json(docs))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /documents/{collection}/{key}`
pub async fn get_one<S>(
  State(state): State<Arc<ApiState<S>>>,
  Path((collection, key)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError>
where
  S: DocumentStore,
{
  let (collection, key) = parse_path(&collection, &key)?;
  let doc = state
    .store
    .get(collection, &key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{collection}/{key} not found")))?;
  Ok(Json(doc))
}

// ─── Create-if-absent ─────────────────────────────────────────────────────────

/// `POST /documents/prize_claims/{key}`, body `{"uid":"<key>"}`
pub async fn create<S>(
  State(state): State<Arc<ApiState<S>>>,
  Path((collection, key)): Path<(String, String)>,
  body: Result<Json<Fields>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore,
{
  let (collection, key) = parse_path(&collection, &key)?;
  if collection == Collection::SurveyResponses {
    return Err(ApiError::MethodNotAllowed(
      "survey responses are written with PUT".into(),
    ));
  }
  let Json(fields) = body.map_err(body_error)?;

  let uid_matches = fields.get("uid").and_then(|v| v.as_str()) == Some(key.as_str());
  if fields.len() != 1 || !uid_matches {
    return Err(ApiError::BadRequest(format!(
      "a claim body must be exactly {{\"uid\": \"{key}\"}}"
    )));
  }

  match state
    .store
    .create_if_absent(collection, &key, fields)
    .await
    .map_err(ApiError::store)?
  {
    CreateOutcome::Created(doc) => {
      info!(%collection, %key, "document created");
      Ok((StatusCode::CREATED, Json(doc)))
    }
    CreateOutcome::AlreadyExists => {
      debug!(%collection, %key, "create refused: already exists");
      Err(ApiError::Conflict(format!("{collection}/{key} already exists")))
    }
  }
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /documents/prize_claims/{key}`, body `{"prize":"<name>"}`
///
/// The claim must exist. Repeating the same prize is a no-op; replacing a
/// recorded prize with a different one is a 409.
pub async fn update<S>(
  State(state): State<Arc<ApiState<S>>>,
  Path((collection, key)): Path<(String, String)>,
  body: Result<Json<Fields>, JsonRejection>,
) -> Result<Json<Document>, ApiError>
where
  S: DocumentStore,
{
  let (collection, key) = parse_path(&collection, &key)?;
  if collection == Collection::SurveyResponses {
    return Err(ApiError::MethodNotAllowed(
      "survey responses are written with PUT".into(),
    ));
  }
  let Json(fields) = body.map_err(body_error)?;

  let prize = match fields.get("prize").and_then(|v| v.as_str()) {
    Some(p) if fields.len() == 1 => p.to_owned(),
    _ => {
      return Err(ApiError::BadRequest(
        "a claim update may only set \"prize\"".into(),
      ));
    }
  };
  if !state.catalog.contains(&prize) {
    return Err(ApiError::BadRequest(format!(
      "prize {prize:?} is not in the catalog"
    )));
  }

  let existing = state
    .store
    .get(collection, &key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no claim for {key}")))?;
  match existing.str_field("prize") {
    Some(recorded) if recorded != prize => {
      return Err(ApiError::Conflict(format!(
        "{key} already received {recorded:?}"
      )));
    }
    _ => {}
  }

  let doc = state
    .store
    .update(collection, &key, fields)
    .await
    .map_err(ApiError::store)?;
  info!(%key, prize = %prize, "prize recorded");
  Ok(Json(doc))
}

// ─── Create-or-merge ──────────────────────────────────────────────────────────

/// `PUT /documents/survey_responses/{key}`, body: a survey record
pub async fn create_or_merge<S>(
  State(state): State<Arc<ApiState<S>>>,
  Path((collection, key)): Path<(String, String)>,
  body: Result<Json<Fields>, JsonRejection>,
) -> Result<Json<Document>, ApiError>
where
  S: DocumentStore,
{
  let (collection, key) = parse_path(&collection, &key)?;
  if collection == Collection::PrizeClaims {
    return Err(ApiError::MethodNotAllowed(
      "claims are created with POST and updated with PATCH".into(),
    ));
  }
  let Json(fields) = body.map_err(body_error)?;

  let mut record: SurveyRecord = serde_json::from_value(fields.into())
    .map_err(|e| ApiError::BadRequest(format!("not a survey record: {e}")))?;
  if record.uid != key {
    return Err(ApiError::BadRequest(format!(
      "record uid {} does not match key {key}",
      record.uid
    )));
  }
  record
    .validate()
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  record.created_at = None;

  let doc = state
    .store
    .create_or_merge(collection, &key, record.to_fields()?)
    .await
    .map_err(ApiError::store)?;
  info!(%key, rating = record.overall_rating, "survey stored");
  Ok(Json(doc))
}
