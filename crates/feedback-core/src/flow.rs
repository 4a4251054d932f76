//! The survey and prize flows: the consistency protocol proper.
//!
//! Both flows are thin sequences of [`DocumentStore`] calls. They never hold
//! authoritative state of their own; the store decides whether a participant
//! has already answered or claimed.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, IdentityKey, Result,
  gate::{GateState, PrizeGate, ReviewTimerCache},
  prize::{PrizeCatalog, PrizeClaim, WheelSpin},
  store::{Collection, CreateOutcome, DocumentStore, StoreError},
  survey::{Respondent, SurveyAnswers, SurveyRecord},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of the survey pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
  /// No prior survey was found, or the lookup failed.
  Admitted,
  /// A survey already exists for this identity.
  Blocked { display_name: String },
}

/// Result of a claim attempt. Both variants mean the participant now holds a
/// claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
  /// This attempt created the claim.
  Claimed,
  /// A claim already existed, from an earlier attempt or another session.
  AlreadyClaimed,
}

/// How many times to repeat a write that failed with a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first. At least 1.
  pub max_attempts: u32,
  /// Delay before retry `n` is `backoff * n`.
  pub backoff:      Duration,
}

impl RetryPolicy {
  pub fn none() -> Self { Self { max_attempts: 1, backoff: Duration::ZERO } }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, backoff: Duration::from_millis(200) }
  }
}

/// Run `op`, retrying transient store errors according to `policy`.
async fn with_retry<T, E, F, Fut>(
  policy: RetryPolicy,
  what: &str,
  key: &IdentityKey,
  mut op: F,
) -> Result<T>
where
  E: StoreError,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(v) => return Ok(v),
      Err(e) if e.is_transient() && attempt < policy.max_attempts => {
        warn!(%key, attempt, error = %e, "{what} failed transiently; retrying");
        tokio::time::sleep(policy.backoff * attempt).await;
        attempt += 1;
      }
      Err(e) => return Err(Error::store(e)),
    }
  }
}

// ─── Survey flow ─────────────────────────────────────────────────────────────

pub struct SurveyFlow<S> {
  store: Arc<S>,
}

impl<S: DocumentStore> SurveyFlow<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Point-read the survey collection and decide whether `key` may start
  /// the questionnaire.
  ///
  /// Fails open: if the read errors, the participant is admitted. Duplicate
  /// prizes are still impossible because the claim is store-enforced.
  pub async fn check_and_admit(&self, key: &IdentityKey) -> Admission {
    match self.store.get(Collection::SurveyResponses, key).await {
      Ok(Some(doc)) => {
        debug!(%key, "survey already answered");
        Admission::Blocked {
          display_name: doc.str_field("name").unwrap_or_default().to_owned(),
        }
      }
      Ok(None) => Admission::Admitted,
      Err(e) => {
        warn!(%key, error = %e, "survey pre-check failed; admitting");
        Admission::Admitted
      }
    }
  }

  /// Validate the respondent, then run the pre-check for their key.
  ///
  /// An invalid name or phone is rejected without any store call, so a
  /// malformed number never reaches the survey lookup.
  pub async fn start(
    &self,
    respondent: &Respondent,
  ) -> Result<(IdentityKey, Admission)> {
    respondent.validate()?;
    let key = respondent.key();
    let admission = self.check_and_admit(&key).await;
    Ok((key, admission))
  }

  /// Validate and write the survey record for `key`.
  ///
  /// Validation happens before any store call. Store failures are returned
  /// so the caller can offer a retry.
  pub async fn submit(
    &self,
    key: &IdentityKey,
    respondent: &Respondent,
    answers: &SurveyAnswers,
  ) -> Result<SurveyRecord> {
    let record = SurveyRecord::new(key.clone(), respondent, answers);
    record.validate()?;

    let doc = self
      .store
      .create_or_merge(Collection::SurveyResponses, key, record.to_fields()?)
      .await
      .map_err(Error::store)?;

    info!(%key, rating = record.overall_rating, "survey submitted");
    SurveyRecord::from_document(&doc)
  }
}

// ─── Prize flow ──────────────────────────────────────────────────────────────

pub struct PrizeFlow<S> {
  store:   Arc<S>,
  catalog: PrizeCatalog,
  retry:   RetryPolicy,
}

impl<S: DocumentStore> PrizeFlow<S> {
  pub fn new(store: Arc<S>, catalog: PrizeCatalog) -> Self {
    Self { store, catalog, retry: RetryPolicy::default() }
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn catalog(&self) -> &PrizeCatalog { &self.catalog }

  /// The stored claim for `key`, if any.
  pub async fn claim_status(
    &self,
    key: &IdentityKey,
  ) -> Result<Option<PrizeClaim>> {
    let doc = self
      .store
      .get(Collection::PrizeClaims, key)
      .await
      .map_err(Error::store)?;
    doc.as_ref().map(PrizeClaim::from_document).transpose()
  }

  /// Resolve the gate's `Checking` state from the remote claim status.
  ///
  /// If the status cannot be read the gate falls back to the local timer;
  /// the claim itself is still decided by the store.
  pub async fn mount(
    &self,
    gate: &mut PrizeGate,
    cache: &impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> GateState {
    let claimed = match self.claim_status(gate.key()).await {
      Ok(claim) => claim.is_some(),
      Err(e) => {
        warn!(key = %gate.key(), error = %e, "claim status unavailable");
        false
      }
    };
    gate.mount(claimed, cache, now)
  }

  /// Take the one prize slot for `key`.
  ///
  /// Relies on the store's atomic create-if-absent: of two concurrent calls,
  /// one gets [`ClaimOutcome::Claimed`] and the other
  /// [`ClaimOutcome::AlreadyClaimed`]. Transient errors are retried; if an
  /// earlier attempt did commit, the retry reports `AlreadyClaimed`, which
  /// is equivalent.
  pub async fn claim(&self, key: &IdentityKey) -> Result<ClaimOutcome> {
    let fields = PrizeClaim::claim_fields(key);
    let outcome = with_retry(self.retry, "claim", key, || {
      self
        .store
        .create_if_absent(Collection::PrizeClaims, key, fields.clone())
    })
    .await?;

    Ok(match outcome {
      CreateOutcome::Created(_) => {
        info!(%key, "prize claimed");
        ClaimOutcome::Claimed
      }
      CreateOutcome::AlreadyExists => {
        info!(%key, "prize already claimed");
        ClaimOutcome::AlreadyClaimed
      }
    })
  }

  /// Store the prize on the existing claim. An update, never a create;
  /// repeating it with the same prize changes nothing.
  pub async fn record_prize(
    &self,
    key: &IdentityKey,
    prize: &str,
  ) -> Result<PrizeClaim> {
    if !self.catalog.contains(prize) {
      return Err(Error::UnknownPrize(prize.to_owned()));
    }
    let fields = PrizeClaim::prize_fields(prize);
    let doc = with_retry(self.retry, "prize update", key, || {
      self
        .store
        .update(Collection::PrizeClaims, key, fields.clone())
    })
    .await?;

    info!(%key, prize, "prize recorded");
    PrizeClaim::from_document(&doc)
  }

  /// Decide the prize, persist it, and return the spin that displays it.
  ///
  /// Must only be called after [`claim`](Self::claim) has returned.
  pub async fn spin<R: Rng + ?Sized>(
    &self,
    key: &IdentityKey,
    rng: &mut R,
  ) -> Result<WheelSpin> {
    let spin = self.catalog.plan_spin(rng);
    self.record_prize(key, &spin.prize).await?;
    Ok(spin)
  }
}
