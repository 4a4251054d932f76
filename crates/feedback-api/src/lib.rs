//! JSON REST API for the feedback survey and prize claims.
//!
//! Exposes an axum [`Router`] backed by any
//! [`feedback_core::store::DocumentStore`]. The handlers enforce the
//! per-collection write rules, so clients cannot forge records or choose
//! prizes outside the catalog. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", feedback_api::api_router(store.clone(), catalog))
//! ```

pub mod documents;
pub mod error;
pub mod metrics;
pub mod prizes;

use std::sync::Arc;

use axum::{Router, routing::get};
use feedback_core::{prize::PrizeCatalog, store::DocumentStore};

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<S> {
  pub store:   Arc<S>,
  pub catalog: PrizeCatalog,
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, catalog: PrizeCatalog) -> Router<()>
where
  S: DocumentStore + 'static,
{
  let state = Arc::new(ApiState { store, catalog });
  Router::new()
    .route("/documents/{collection}", get(documents::list::<S>))
    .route(
      "/documents/{collection}/{key}",
      get(documents::get_one::<S>)
        .post(documents::create::<S>)
        .patch(documents::update::<S>)
        .put(documents::create_or_merge::<S>),
    )
    .route("/metrics", get(metrics::handler::<S>))
    .route("/prizes", get(prizes::handler::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
