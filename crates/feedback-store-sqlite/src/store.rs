//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;

use feedback_core::{
  IdentityKey,
  store::{Collection, CreateOutcome, Document, DocumentStore, Fields, merge_fields},
};

use crate::{
  Result,
  encode::{DOCUMENT_COLUMNS, RawDocument, encode_collection, encode_dt, encode_fields},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A feedback document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read-merge-write inside one immediate transaction, so concurrent merges
  /// on the same key serialise instead of losing fields.
  async fn merge_upsert(
    &self,
    collection: Collection,
    key: &IdentityKey,
    patch: Fields,
  ) -> Result<Document> {
    let coll_str = encode_collection(collection);
    let key_str = key.as_str().to_owned();
    let now_str = encode_dt(Utc::now());

    let raw: RawDocument = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
          .query_row(
            "SELECT fields_json FROM documents WHERE collection = ?1 AND doc_key = ?2",
            rusqlite::params![coll_str, key_str],
            |r| r.get(0),
          )
          .optional()?;

        let mut fields = match existing {
          Some(json) => serde_json::from_str::<Fields>(&json)
            .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?,
          None => Fields::new(),
        };
        merge_fields(&mut fields, patch);
        let fields_json = serde_json::to_string(&fields)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

        // created_at is only taken from the insert branch.
        tx.execute(
          "INSERT INTO documents (collection, doc_key, fields_json, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (collection, doc_key)
           DO UPDATE SET fields_json = excluded.fields_json, updated_at = excluded.updated_at",
          rusqlite::params![coll_str, key_str, fields_json, now_str],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = ?1 AND doc_key = ?2"
          ),
          rusqlite::params![coll_str, key_str],
          RawDocument::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_document()
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = crate::Error;

  async fn get(
    &self,
    collection: Collection,
    key: &IdentityKey,
  ) -> Result<Option<Document>> {
    let coll_str = encode_collection(collection);
    let key_str = key.as_str().to_owned();

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents \
                 WHERE collection = ?1 AND doc_key = ?2"
              ),
              rusqlite::params![coll_str, key_str],
              RawDocument::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn create_if_absent(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<CreateOutcome> {
    let now = Utc::now();
    let document = Document {
      collection,
      key: key.clone(),
      fields,
      created_at: now,
      updated_at: now,
    };

    let coll_str = encode_collection(collection);
    let key_str = key.as_str().to_owned();
    let fields_json = encode_fields(&document.fields)?;
    let now_str = encode_dt(now);

    // The primary key decides the race; no prior read is needed.
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO documents (collection, doc_key, fields_json, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)
           ON CONFLICT (collection, doc_key) DO NOTHING",
          rusqlite::params![coll_str, key_str, fields_json, now_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      debug!(%collection, key = %key, "create_if_absent: already exists");
      Ok(CreateOutcome::AlreadyExists)
    } else {
      Ok(CreateOutcome::Created(document))
    }
  }

  async fn update(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<Document> {
    self.merge_upsert(collection, key, fields).await
  }

  async fn create_or_merge(
    &self,
    collection: Collection,
    key: &IdentityKey,
    fields: Fields,
  ) -> Result<Document> {
    self.merge_upsert(collection, key, fields).await
  }

  async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
    let coll_str = encode_collection(collection);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents \
           WHERE collection = ?1 ORDER BY created_at, doc_key"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![coll_str], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }
}
