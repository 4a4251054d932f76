//! [`HttpStore`]: the feedback JSON API as a [`DocumentStore`].
//!
//! Lets the CLI run the same survey and prize flows the server-side tests
//! run against SQLite. Status codes map back onto store semantics: 404 on a
//! read is "absent", 409 on a create is "already exists", and 503 or a
//! failed connection is transient.

use std::time::Duration;

use anyhow::Context as _;
use feedback_core::{
  IdentityKey,
  analytics::DashboardMetrics,
  prize::PrizeCatalog,
  store::{Collection, CreateOutcome, Document, DocumentStore, Fields, StoreError},
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// A failed call to the feedback API.
#[derive(Debug, Error)]
pub enum HttpError {
  #[error("{method} {url} failed: {source}")]
  Request {
    method: Method,
    url:    String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{method} {url} → {status}: {message}")]
  Status {
    method:  Method,
    url:     String,
    status:  StatusCode,
    message: String,
  },

  #[error("decoding response from {url}: {source}")]
  Decode {
    url:    String,
    #[source]
    source: reqwest::Error,
  },
}

impl StoreError for HttpError {
  fn is_transient(&self) -> bool {
    match self {
      HttpError::Request { source, .. } => source.is_connect() || source.is_timeout(),
      HttpError::Status { status, .. } => *status == StatusCode::SERVICE_UNAVAILABLE,
      HttpError::Decode { .. } => false,
    }
  }
}

type Result<T, E = HttpError> = std::result::Result<T, E>;

/// Async HTTP client for the feedback API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpStore {
  client:   Client,
  base_url: String,
}

impl HttpStore {
  pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(15))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  fn doc_url(&self, collection: Collection, key: &IdentityKey) -> String {
    self.url(&format!("/documents/{collection}/{key}"))
  }

  async fn send(&self, method: Method, url: &str, body: Option<&Fields>) -> Result<Response> {
    debug!(%method, url, "api request");
    let mut req: RequestBuilder = self.client.request(method.clone(), url);
    if let Some(fields) = body {
      req = req.json(fields);
    }
    req.send().await.map_err(|source| HttpError::Request {
      method,
      url: url.to_owned(),
      source,
    })
  }

  async fn decode<T: DeserializeOwned>(url: &str, resp: Response) -> Result<T> {
    resp
      .json()
      .await
      .map_err(|source| HttpError::Decode { url: url.to_owned(), source })
  }

  /// Turn a non-success response into [`HttpError::Status`], keeping the
  /// server's `{"error": ...}` message when there is one.
  async fn status_error(method: Method, url: &str, resp: Response) -> HttpError {
    let status = resp.status();
    let message = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|v| v.get("error").and_then(|m| m.as_str()).map(str::to_owned))
      .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_owned());
    HttpError::Status { method, url: url.to_owned(), status, message }
  }

  /// Send and decode, treating anything but `expected` as an error.
  async fn expect_doc(
    &self,
    method: Method,
    url: String,
    body: &Fields,
    expected: StatusCode,
  ) -> Result<Document> {
    let resp = self.send(method.clone(), &url, Some(body)).await?;
    if resp.status() == expected {
      Self::decode(&url, resp).await
    } else {
      Err(Self::status_error(method, &url, resp).await)
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let url = self.url(path);
    let resp = self.send(Method::GET, &url, None).await?;
    if resp.status().is_success() {
      Self::decode(&url, resp).await
    } else {
      Err(Self::status_error(Method::GET, &url, resp).await)
    }
  }

  /// `GET /api/prizes`
  pub async fn catalog(&self) -> Result<PrizeCatalog> { self.get_json("/prizes").await }

  /// `GET /api/metrics`
  pub async fn metrics(&self) -> Result<DashboardMetrics> {
    self.get_json("/metrics").await
  }
}

impl DocumentStore for HttpStore {
  type Error = HttpError;

  async fn get(
    &self,
    collection: Collection,
    key: &IdentityKey,
  ) -> Result<Option<Document>> {
    let url = self.doc_url(collection, key);
    let resp = self.send(Method::GET, &url, None).await?;
    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => Self::decode(&url, resp).await.map(Some),
      _ => Err(Self::status_error(Method::GET, &url, resp).await),
    }
  }

  async fn create_if_absent(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<CreateOutcome> {
    let url = self.doc_url(collection, key);
    let resp = self.send(Method::POST, &url, Some(&fields)).await?;
    match resp.status() {
      StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
      StatusCode::CREATED => Self::decode(&url, resp).await.map(CreateOutcome::Created),
      _ => Err(Self::status_error(Method::POST, &url, resp).await),
    }
  }

  /// PATCH the document. Unlike the SQLite store this inherits the API's
  /// prize-claim rules: a missing claim is a 404 and a different prize a
  /// 409. Both come back as [`HttpError::Status`] and are not retried.
  async fn update(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<Document> {
    let url = self.doc_url(collection, key);
    self.expect_doc(Method::PATCH, url, &fields, StatusCode::OK).await
  }

  async fn create_or_merge(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<Document> {
    let url = self.doc_url(collection, key);
    self.expect_doc(Method::PUT, url, &fields, StatusCode::OK).await
  }

  async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
    self.get_json(&format!("/documents/{collection}")).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn status(code: StatusCode) -> HttpError {
    HttpError::Status {
      method:  Method::GET,
      url:     "http://localhost/api".into(),
      status:  code,
      message: String::new(),
    }
  }

  #[test]
  fn only_unavailable_statuses_are_transient() {
    assert!(status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
    assert!(!status(StatusCode::INTERNAL_SERVER_ERROR).is_transient());
    assert!(!status(StatusCode::BAD_REQUEST).is_transient());
  }

  #[test]
  fn rejected_prize_writes_are_not_retried() {
    // Missing claim, then a prize that differs from the recorded one.
    assert!(!status(StatusCode::NOT_FOUND).is_transient());
    assert!(!status(StatusCode::CONFLICT).is_transient());
  }

  #[tokio::test]
  async fn refused_connection_is_transient() {
    // Port 9 (discard) is closed on any sane test host.
    let store = HttpStore::new("http://127.0.0.1:9").unwrap();
    let key = IdentityKey::parse("11999990000").unwrap();
    let err = store
      .get(Collection::PrizeClaims, &key)
      .await
      .unwrap_err();
    assert!(err.is_transient(), "{err}");
  }

  #[test]
  fn urls_are_rooted_at_api() {
    let store = HttpStore::new("http://localhost:8080/").unwrap();
    let key = IdentityKey::parse("11999990000").unwrap();
    assert_eq!(
      store.doc_url(Collection::SurveyResponses, &key),
      "http://localhost:8080/api/documents/survey_responses/11999990000"
    );
  }
}
