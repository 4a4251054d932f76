//! HTTP server for the feedback survey: configuration and the top-level
//! router.
//!
//! The API itself lives in `feedback-api`; this crate nests it under `/api`,
//! adds a health check and request tracing, and knows how to read its
//! settings.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, routing::get};
use feedback_core::{prize::PrizeCatalog, store::DocumentStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Environment variable prefix, e.g. `FEEDBACK_PORT=9000`.
pub const ENV_PREFIX: &str = "FEEDBACK";

/// Runtime server configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path: PathBuf,
  /// Wheel contents. Defaults to the shipped catalog.
  #[serde(default)]
  pub prizes:     PrizeCatalog,
}

impl ServerConfig {
  /// Read `path` (optional) overlaid by `FEEDBACK_*` environment variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "feedback.db")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's [`Router`]: `/health` plus the API under `/api`.
pub fn router<S>(store: Arc<S>, catalog: PrizeCatalog) -> Router
where
  S: DocumentStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", feedback_api::api_router(store, catalog))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str { "ok" }
