//! The prize gate: review, wait, then claim.
//!
//! ```text
//! Checking ──mount──▶ Initial ──mark_reviewed──▶ Counting ──tick──▶ Ready ──claim──▶ Claimed
//!     └──────────────── remote claim exists ────────────────────────────────────────▲
//! ```
//!
//! The review timestamp lives in a [`ReviewTimerCache`] on the participant's
//! device. It only paces the UI; whether a prize may be claimed is decided by
//! the store when the claim is written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdentityKey, flow::ClaimOutcome};

/// Minimum seconds between "I reviewed" and the claim becoming available.
pub const MIN_DWELL_SECS: i64 = 30;

// ─── Timer cache ─────────────────────────────────────────────────────────────

/// Device-local record of when each identity said it left a review.
///
/// Advisory only. Never consult it to allow or refuse a claim.
pub trait ReviewTimerCache {
  fn reviewed_at(&self, key: &IdentityKey) -> Option<DateTime<Utc>>;
  fn set_reviewed_at(&mut self, key: &IdentityKey, at: DateTime<Utc>);
}

/// A [`ReviewTimerCache`] that forgets everything when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryTimerCache {
  entries: HashMap<IdentityKey, DateTime<Utc>>,
}

impl ReviewTimerCache for MemoryTimerCache {
  fn reviewed_at(&self, key: &IdentityKey) -> Option<DateTime<Utc>> {
    self.entries.get(key).copied()
  }

  fn set_reviewed_at(&mut self, key: &IdentityKey, at: DateTime<Utc>) {
    self.entries.insert(key.clone(), at);
  }
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
  /// The remote claim status has not been read yet.
  Checking,
  /// No review recorded on this device.
  Initial,
  /// Waiting out the dwell time; `remaining_secs` is for display.
  Counting { remaining_secs: i64 },
  Ready,
  /// Terminal: this identity holds a claim.
  Claimed,
}

#[derive(Debug, Clone)]
pub struct PrizeGate {
  key:         IdentityKey,
  state:       GateState,
  reviewed_at: Option<DateTime<Utc>>,
  dwell_secs:  i64,
  dismissed:   bool,
}

impl PrizeGate {
  pub fn new(key: IdentityKey) -> Self {
    Self {
      key,
      state: GateState::Checking,
      reviewed_at: None,
      dwell_secs: MIN_DWELL_SECS,
      dismissed: false,
    }
  }

  pub fn with_dwell_secs(mut self, secs: i64) -> Self {
    self.dwell_secs = secs;
    self
  }

  pub fn key(&self) -> &IdentityKey { &self.key }

  pub fn state(&self) -> GateState { self.state }

  pub fn reviewed_at(&self) -> Option<DateTime<Utc>> { self.reviewed_at }

  pub fn can_claim(&self) -> bool { self.state == GateState::Ready }

  /// Leave `Checking` once the remote claim status is known.
  ///
  /// A remote claim wins over anything the local timer says. Otherwise the
  /// dwell is recomputed from the cached timestamp, so a participant who
  /// reviewed on an earlier visit is not made to wait again.
  pub fn mount(
    &mut self,
    already_claimed: bool,
    cache: &impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> GateState {
    if already_claimed {
      self.state = GateState::Claimed;
      return self.state;
    }
    self.reviewed_at = cache.reviewed_at(&self.key);
    self.recompute(now)
  }

  /// "I reviewed": record the timestamp and start counting. Only meaningful
  /// from `Initial`; in any other state nothing changes.
  pub fn mark_reviewed(
    &mut self,
    cache: &mut impl ReviewTimerCache,
    now: DateTime<Utc>,
  ) -> GateState {
    if self.state != GateState::Initial {
      return self.state;
    }
    cache.set_reviewed_at(&self.key, now);
    self.reviewed_at = Some(now);
    self.recompute(now)
  }

  /// Once-a-second refresh while counting.
  pub fn tick(&mut self, now: DateTime<Utc>) -> GateState {
    if matches!(self.state, GateState::Counting { .. }) {
      self.recompute(now);
    }
    self.state
  }

  /// Apply a claim result. Both outcomes mean this identity now holds a
  /// claim. Ignored after [`dismiss`](Self::dismiss).
  pub fn apply_claim(&mut self, _outcome: ClaimOutcome) -> GateState {
    if !self.dismissed {
      self.state = GateState::Claimed;
    }
    self.state
  }

  /// The view owning this gate went away. A claim still in flight completes
  /// at the store but its result is no longer applied here.
  pub fn dismiss(&mut self) { self.dismissed = true; }

  fn recompute(&mut self, now: DateTime<Utc>) -> GateState {
    self.state = match self.reviewed_at {
      None => GateState::Initial,
      Some(at) => {
        let elapsed = (now - at).num_seconds();
        if elapsed >= self.dwell_secs {
          GateState::Ready
        } else {
          GateState::Counting {
            remaining_secs: (self.dwell_secs - elapsed).min(self.dwell_secs),
          }
        }
      }
    };
    self.state
  }
}
