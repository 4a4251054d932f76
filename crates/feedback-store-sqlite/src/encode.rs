//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings in UTC. Document bodies are compact JSON objects.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use feedback_core::{
  IdentityKey,
  store::{Collection, Document, Fields},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Fixed-width nanosecond RFC 3339, so column order is chronological order.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Collection ──────────────────────────────────────────────────────────────

/// Column value for `c`; the same snake_case name the wire format uses.
pub fn encode_collection(c: Collection) -> &'static str { c.into() }

pub fn decode_collection(s: &str) -> Result<Collection> {
  Collection::from_str(s).map_err(|_| Error::UnknownCollection(s.to_owned()))
}

// ─── Fields ──────────────────────────────────────────────────────────────────

pub fn encode_fields(fields: &Fields) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(key: &str, s: &str) -> Result<Fields> {
  match serde_json::from_str(s)? {
    serde_json::Value::Object(map) => Ok(map),
    _ => Err(Error::NotAnObject(key.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const DOCUMENT_COLUMNS: &str =
  "collection, doc_key, fields_json, created_at, updated_at";

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub collection:  String,
  pub doc_key:     String,
  pub fields_json: String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawDocument {
  /// Map a row selected with [`DOCUMENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      collection:  row.get(0)?,
      doc_key:     row.get(1)?,
      fields_json: row.get(2)?,
      created_at:  row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      collection: decode_collection(&self.collection)?,
      fields:     decode_fields(&self.doc_key, &self.fields_json)?,
      key:        IdentityKey::parse(&self.doc_key)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn collection_names_round_trip() {
    for c in Collection::iter() {
      assert_eq!(decode_collection(encode_collection(c)).unwrap(), c);
      assert_eq!(encode_collection(c), c.as_ref());
      assert_eq!(
        serde_json::to_value(c).unwrap(),
        serde_json::Value::from(encode_collection(c))
      );
    }
    assert_eq!(encode_collection(Collection::PrizeClaims), "prize_claims");
    assert!(decode_collection("users").is_err());
  }

  #[test]
  fn non_object_bodies_are_rejected() {
    assert!(decode_fields("1", "[1,2]").is_err());
    assert!(decode_fields("1", r#"{"uid":"1"}"#).is_ok());
  }
}
