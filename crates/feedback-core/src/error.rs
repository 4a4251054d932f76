//! Error types for `feedback-core`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ─── Field validation ────────────────────────────────────────────────────────

/// A single rejected form field, reported inline next to that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   &'static str,
  pub message: String,
}

impl FieldError {
  pub fn new(field: &'static str, message: impl Into<String>) -> Self {
    Self { field, message: message.into() }
  }
}

/// Every field error found in one submission. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
  /// `Ok(())` when `errors` is empty, otherwise the collected errors.
  pub fn check(errors: Vec<FieldError>) -> Result<(), Self> {
    if errors.is_empty() { Ok(()) } else { Err(Self(errors)) }
  }

  pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.0.iter().map(|e| e.field)
  }

  pub fn contains(&self, field: &str) -> bool {
    self.0.iter().any(|e| e.field == field)
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "{}: {}", e.field, e.message)?;
    }
    Ok(())
  }
}

impl std::error::Error for ValidationErrors {}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input, rejected before any store call.
  #[error("validation failed: {0}")]
  Validation(#[from] ValidationErrors),

  /// The document store could not complete the operation.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("invalid prize catalog: {0}")]
  InvalidCatalog(String),

  #[error("invalid identity key: {0:?}")]
  InvalidKey(String),

  #[error("prize {0:?} is not in the catalog")]
  UnknownPrize(String),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
