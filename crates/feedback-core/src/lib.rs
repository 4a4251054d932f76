//! Core types and trait definitions for the feedback survey and prize wheel.
//!
//! No HTTP or database code lives here. The consistency protocol (one survey
//! and one prize claim per participant) is written against the
//! [`store::DocumentStore`] abstraction; the store backend is the only
//! authority on uniqueness.

// `DocumentStore` spells out `Send` futures itself; the impls use `async fn`.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod error;
pub mod flow;
pub mod gate;
pub mod identity;
pub mod prize;
pub mod store;
pub mod survey;

pub use error::{Error, FieldError, Result, ValidationErrors};
pub use identity::{IdentityKey, normalize};
