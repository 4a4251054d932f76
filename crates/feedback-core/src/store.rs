//! The `DocumentStore` trait and the document envelope it traffics in.
//!
//! The trait is implemented by storage backends (`feedback-store-sqlite`) and
//! by remote clients (the CLI's HTTP store). The protocol flows in
//! [`crate::flow`] depend on this abstraction only.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, IdentityKey, Result};

/// A document body: a JSON object keyed by field name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

// ─── Collection ──────────────────────────────────────────────────────────────

/// The two collections the application writes to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
  /// One [`crate::survey::SurveyRecord`] per identity key.
  SurveyResponses,
  /// One [`crate::prize::PrizeClaim`] per identity key.
  PrizeClaims,
}

// ─── Document ────────────────────────────────────────────────────────────────

/// A stored document together with its server-assigned metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub collection: Collection,
  pub key:        IdentityKey,
  pub fields:     Fields,
  /// Assigned by the store on first write; never changes afterwards.
  pub created_at: DateTime<Utc>,
  /// Assigned by the store on every write.
  pub updated_at: DateTime<Utc>,
}

impl Document {
  /// Deserialise the field map into a typed record.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(
      self.fields.clone(),
    ))?)
  }

  /// A string field, if present.
  pub fn str_field(&self, name: &str) -> Option<&str> {
    self.fields.get(name).and_then(serde_json::Value::as_str)
  }
}

/// Serialise a record into a field map. The record must serialise to a JSON
/// object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
  match serde_json::to_value(value)? {
    serde_json::Value::Object(map) => Ok(map),
    other => Err(Error::Serialization(serde::ser::Error::custom(format!(
      "expected a JSON object, got {other}"
    )))),
  }
}

/// Shallow merge: every top-level field in `patch` replaces the one in
/// `base`; fields absent from `patch` are left untouched.
pub fn merge_fields(base: &mut Fields, patch: Fields) {
  for (k, v) in patch {
    base.insert(k, v);
  }
}

/// Result of [`DocumentStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
  /// This call created the document.
  Created(Document),
  /// A document already existed under the key; nothing was written.
  AlreadyExists,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Classification every backend error must provide so callers can decide
/// whether to retry.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// True for faults where repeating the same call may succeed (network
  /// blips, a busy database). "Already exists" is never an error, so it is
  /// never transient.
  fn is_transient(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the document store the application is backed by.
///
/// The store owns both records; callers only ever hold transient copies.
/// Uniqueness of prize claims rests entirely on
/// [`create_if_absent`](DocumentStore::create_if_absent) being atomic at the
/// store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: StoreError;

  /// Point lookup by key. Returns `None` if absent.
  fn get<'a>(
    &'a self,
    collection: Collection,
    key: &'a IdentityKey,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  /// Create the document only if no document exists under `key`.
  ///
  /// Must be atomic: of any number of concurrent calls for the same key,
  /// exactly one observes [`CreateOutcome::Created`].
  fn create_if_absent<'a>(
    &'a self,
    collection: Collection,
    key: &'a IdentityKey,
    fields: Fields,
  ) -> impl Future<Output = Result<CreateOutcome, Self::Error>> + Send + 'a;

  /// Merge `fields` into the document. The storage backends have no
  /// existence precondition: a missing document is created from `fields`.
  ///
  /// Remote implementations may sit behind stricter write rules. Through the
  /// HTTP API a prize claim must already exist and its prize may not change,
  /// and a rejected write surfaces as a non-transient error.
  fn update<'a>(
    &'a self,
    collection: Collection,
    key: &'a IdentityKey,
    fields: Fields,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + 'a;

  /// Write a whole record with merge semantics. Used for survey records,
  /// which are not the uniqueness authority.
  fn create_or_merge<'a>(
    &'a self,
    collection: Collection,
    key: &'a IdentityKey,
    fields: Fields,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + 'a;

  /// Every document in a collection, oldest first.
  fn list(
    &self,
    collection: Collection,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;
}
