//! Command implementations: each runs one flow against a [`DocumentStore`]
//! and returns the text to show the participant.

use std::{fmt::Write as _, sync::Arc};

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use feedback_core::{
  Error, IdentityKey, ValidationErrors,
  analytics::{Bucket, DashboardMetrics, ResponseRow},
  flow::{Admission, PrizeFlow, RetryPolicy, SurveyFlow},
  gate::{GateState, PrizeGate, ReviewTimerCache},
  identity::normalize,
  prize::{PrizeCatalog, PrizeClaim},
  store::{Collection, Document, DocumentStore},
  survey::{Respondent, SurveyAnswers, SurveyRecord},
};
use rand::Rng;
use tracing::warn;

/// Derive the identity key from raw phone input, refusing input with no
/// digits at all.
pub fn key_for(phone: &str) -> Result<IdentityKey> {
  let key = normalize(phone);
  if key.is_empty() {
    bail!("enter a phone number");
  }
  Ok(key)
}

pub struct App<S> {
  store:       Arc<S>,
  catalog:     PrizeCatalog,
  retry:       RetryPolicy,
  review_link: Option<String>,
}

impl<S: DocumentStore> App<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      catalog: PrizeCatalog::default(),
      retry: RetryPolicy::default(),
      review_link: None,
    }
  }

  pub fn with_catalog(mut self, catalog: PrizeCatalog) -> Self {
    self.catalog = catalog;
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn with_review_link(mut self, link: Option<String>) -> Self {
    self.review_link = link;
    self
  }

  fn prize_flow(&self) -> PrizeFlow<S> {
    PrizeFlow::new(self.store.clone(), self.catalog.clone()).with_retry(self.retry)
  }

  // ── Survey ────────────────────────────────────────────────────────────────

  pub async fn survey(
    &self,
    respondent: &Respondent,
    answers: &SurveyAnswers,
  ) -> Result<String> {
    let flow = SurveyFlow::new(self.store.clone());

    // Name and phone are checked before the pre-check reads the store.
    let key = match flow.start(respondent).await {
      Ok((_, Admission::Blocked { display_name })) => {
        return Ok(format!(
          "{display_name}, you have already answered our survey. Thank you!"
        ));
      }
      Ok((key, Admission::Admitted)) => key,
      Err(Error::Validation(errors)) => bail!(fix_these(&errors)),
      Err(e) => return Err(e.into()),
    };

    let record = match flow.submit(&key, respondent, answers).await {
      Ok(record) => record,
      Err(Error::Validation(errors)) => bail!(fix_these(&errors)),
      Err(e) => return Err(e.into()),
    };

    Ok(format!(
      "Thanks, {}! Your answers were saved.\n\
       Next: leave us a review with `feedback prize review --phone {}`.",
      record.name, record.phone
    ))
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  /// Every survey response joined with the prize its respondent won.
  pub async fn responses(&self) -> Result<Vec<ResponseRow>> {
    let surveys = self
      .store
      .list(Collection::SurveyResponses)
      .await
      .map_err(Error::store)?;
    let claims = self
      .store
      .list(Collection::PrizeClaims)
      .await
      .map_err(Error::store)?;

    let records = decode_all(&surveys, SurveyRecord::from_document);
    let claims = decode_all(&claims, PrizeClaim::from_document);
    Ok(ResponseRow::join(&records, &claims))
  }

  // ── Prize ─────────────────────────────────────────────────────────────────

  async fn mount(
    &self,
    key: &IdentityKey,
    cache: &impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> PrizeGate {
    let mut gate = PrizeGate::new(key.clone());
    self.prize_flow().mount(&mut gate, cache, now).await;
    gate
  }

  pub async fn prize_status(
    &self,
    key: &IdentityKey,
    cache: &impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> Result<String> {
    let gate = self.mount(key, cache, now).await;
    if gate.state() == GateState::Claimed
      && let Some(prize) = self.prize_flow().claim_status(key).await?.and_then(|c| c.prize)
    {
      return Ok(format!("Prize already claimed: {prize}."));
    }
    Ok(describe(gate.state()))
  }

  /// "I reviewed": start the countdown and show where to leave the review.
  pub async fn prize_review(
    &self,
    key: &IdentityKey,
    cache: &mut impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> Result<String> {
    let mut gate = self.mount(key, &*cache, now).await;
    let state = gate.mark_reviewed(cache, now);

    let mut out = String::new();
    if let Some(link) = &self.review_link
      && state != GateState::Claimed
    {
      let _ = writeln!(out, "Leave your review at {link}");
    }
    out.push_str(&describe(state));
    Ok(out)
  }

  /// Claim the prize and spin the wheel. Refused until the gate is ready.
  pub async fn prize_claim<R: Rng + ?Sized>(
    &self,
    key: &IdentityKey,
    cache: &impl ReviewTimerCache,
    now: DateTime<Utc>,
    rng: &mut R,
  ) -> Result<String> {
    let mut gate = self.mount(key, cache, now).await;
    let flow = self.prize_flow();

    match gate.state() {
      GateState::Ready => {
        let outcome = flow.claim(key).await?;
        gate.apply_claim(outcome);
      }
      GateState::Claimed => {}
      other => bail!("{}", describe(other)),
    }

    if let Some(prize) = flow.claim_status(key).await?.and_then(|c| c.prize) {
      return Ok(format!("Prize already claimed: {prize}."));
    }

    let spin = flow.spin(key, rng).await?;
    Ok(format!(
      "The wheel spins {:.0}° and stops on... {}!\n\
       Show this message at the counter to collect your prize.",
      spin.rotation_degrees, spin.prize
    ))
  }
}

fn fix_these(errors: &ValidationErrors) -> String {
  let mut msg = String::from("please fix the following:");
  for e in &errors.0 {
    let _ = write!(msg, "\n  {}: {}", e.field, e.message);
  }
  msg
}

/// Decode what decodes; a bad document is logged, not fatal to the listing.
fn decode_all<T>(
  docs: &[Document],
  decode: impl Fn(&Document) -> feedback_core::Result<T>,
) -> Vec<T> {
  docs
    .iter()
    .filter_map(|doc| match decode(doc) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(
          collection = %doc.collection,
          key = %doc.key,
          error = %e,
          "skipping undecodable document"
        );
        None
      }
    })
    .collect()
}

fn describe(state: GateState) -> String {
  match state {
    GateState::Checking => "Checking your claim status...".into(),
    GateState::Initial => {
      "Leave us a review, then run `feedback prize review` to unlock the wheel.".into()
    }
    GateState::Counting { remaining_secs } => {
      format!("Review noted. The wheel unlocks in {remaining_secs}s.")
    }
    GateState::Ready => "The wheel is ready! Run `feedback prize claim` to spin.".into(),
    GateState::Claimed => "Prize already claimed.".into(),
  }
}

// ── Metrics ───────────────────────────────────────────────────────────────────

fn render_buckets(out: &mut String, title: &str, buckets: &[Bucket]) {
  let _ = writeln!(out, "\n{title}");
  if buckets.is_empty() {
    let _ = writeln!(out, "  (none)");
  }
  for b in buckets {
    let _ = writeln!(out, "  {:<20} {}", b.name, b.value);
  }
}

pub fn render_metrics(m: &DashboardMetrics) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "Responses:      {}", m.total_responses);
  let _ = writeln!(out, "Average rating: {:.1}", m.average_rating);
  render_buckets(&mut out, "How they found us", &m.discovery);
  render_buckets(&mut out, "Service", &m.service);
  render_buckets(&mut out, "Preparation speed", &m.speed);
  render_buckets(&mut out, "Food", &m.food);
  render_buckets(&mut out, "Ratings", &m.ratings);
  out
}

pub fn render_responses(rows: &[ResponseRow]) -> String {
  if rows.is_empty() {
    return "No responses yet.".into();
  }
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<20} {:<16} {:<6} {:<10} {:<12} {:<14} {:<12} Suggestion",
    "Name", "Phone", "Rating", "Service", "Speed", "Food", "Prize"
  );
  for row in rows {
    let r = &row.record;
    let _ = writeln!(
      out,
      "{:<20} {:<16} {:<6} {:<10} {:<12} {:<14} {:<12} {}",
      r.name,
      r.phone,
      format!("{}★", r.overall_rating),
      r.service.to_string(),
      r.speed.to_string(),
      r.food.to_string(),
      row.prize.as_deref().unwrap_or("N/A"),
      r.suggestion.as_deref().unwrap_or("-"),
    );
  }
  out
}
