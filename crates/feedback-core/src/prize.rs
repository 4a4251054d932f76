//! The prize catalog, weighted selection and the wheel spin plan.
//!
//! The winner is always decided first, by [`PrizeCatalog::select`]; the
//! wheel's rotation is then derived from the winning index so the segment
//! shown under the pointer is the prize that gets persisted.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
  Error, IdentityKey, Result,
  store::{Document, Fields},
};

/// The wheel as it ships: name and relative weight.
pub const DEFAULT_PRIZES: [(&str, f64); 5] = [
  ("Coca lata", 45.0),
  ("Batata 100g", 20.0),
  ("Batata 200g", 10.0),
  ("Onions 100g", 12.5),
  ("Frango frito 140g", 12.5),
];

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeEntry {
  pub name:   String,
  /// Relative weight; positive, need not sum to 100 across the catalog.
  pub weight: f64,
}

impl PrizeEntry {
  pub fn new(name: impl Into<String>, weight: f64) -> Self {
    Self { name: name.into(), weight }
  }
}

/// An ordered, non-empty list of prizes with positive weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PrizeEntry>", into = "Vec<PrizeEntry>")]
pub struct PrizeCatalog {
  entries:      Vec<PrizeEntry>,
  total_weight: f64,
}

impl PrizeCatalog {
  pub fn new(entries: Vec<PrizeEntry>) -> Result<Self> {
    if entries.is_empty() {
      return Err(Error::InvalidCatalog("catalog is empty".into()));
    }
    if let Some(bad) = entries
      .iter()
      .find(|e| !e.weight.is_finite() || e.weight <= 0.0)
    {
      return Err(Error::InvalidCatalog(format!(
        "weight for {:?} must be positive, got {}",
        bad.name, bad.weight
      )));
    }
    let total_weight: f64 = entries.iter().map(|e| e.weight).sum();
    if !total_weight.is_finite() {
      return Err(Error::InvalidCatalog(
        "weights overflow when summed".into(),
      ));
    }
    Ok(Self { entries, total_weight })
  }

  pub fn entries(&self) -> &[PrizeEntry] { &self.entries }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn total_weight(&self) -> f64 { self.total_weight }

  pub fn get(&self, index: usize) -> Option<&PrizeEntry> {
    self.entries.get(index)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.iter().any(|e| e.name == name)
  }

  /// Pick the entry whose weighted segment of `[0, W)` contains `r`.
  ///
  /// Walks the catalog in order, subtracting each weight from `r`; the first
  /// entry with `r < weight` wins. Falls back to the first entry if
  /// floating-point drift leaves nothing selected.
  pub fn select_with_draw(&self, r: f64) -> usize {
    let mut r = r;
    for (i, entry) in self.entries.iter().enumerate() {
      if r < entry.weight {
        return i;
      }
      r -= entry.weight;
    }
    0
  }

  /// Draw `r` uniformly from `[0, W)` and select with it.
  pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
    self.select_with_draw(rng.gen_range(0.0..self.total_weight))
  }

  // ── Wheel geometry ────────────────────────────────────────────────────────

  /// Every prize gets an equal slice of the wheel, whatever its weight.
  pub fn segment_angle(&self) -> f64 { 360.0 / self.entries.len() as f64 }

  /// Rotation (degrees, clockwise) that leaves the pointer at the top inside
  /// segment `index`, `offset_fraction` of the way across it, after
  /// `full_turns` complete turns.
  pub fn spin_target(
    &self,
    index: usize,
    full_turns: u32,
    offset_fraction: f64,
  ) -> f64 {
    let segment = self.segment_angle();
    let landing = index as f64 * segment + offset_fraction * segment;
    f64::from(full_turns) * 360.0 + (360.0 - landing)
  }

  /// The segment under the pointer after rotating by `rotation` degrees.
  pub fn landed_index(&self, rotation: f64) -> usize {
    let angle = (-rotation).rem_euclid(360.0);
    ((angle / self.segment_angle()) as usize).min(self.entries.len() - 1)
  }

  /// Decide the winner, then plan a spin that lands on it: 5 to 9 full turns
  /// and an offset that keeps clear of the segment edges.
  pub fn plan_spin<R: Rng + ?Sized>(&self, rng: &mut R) -> WheelSpin {
    let index = self.select(rng);
    let full_turns = rng.gen_range(5..10);
    let offset = rng.gen_range(0.1..0.9);
    WheelSpin {
      index,
      prize: self.entries[index].name.clone(),
      rotation_degrees: self.spin_target(index, full_turns, offset),
    }
  }
}

impl Default for PrizeCatalog {
  fn default() -> Self {
    let entries: Vec<_> = DEFAULT_PRIZES
      .iter()
      .map(|(name, weight)| PrizeEntry::new(*name, *weight))
      .collect();
    let total_weight = entries.iter().map(|e| e.weight).sum();
    Self { entries, total_weight }
  }
}

impl TryFrom<Vec<PrizeEntry>> for PrizeCatalog {
  type Error = Error;

  fn try_from(entries: Vec<PrizeEntry>) -> Result<Self> { Self::new(entries) }
}

impl From<PrizeCatalog> for Vec<PrizeEntry> {
  fn from(c: PrizeCatalog) -> Self { c.entries }
}

/// A decided outcome plus the animation target that displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelSpin {
  pub index:            usize,
  pub prize:            String,
  pub rotation_degrees: f64,
}

// ─── Claim record ────────────────────────────────────────────────────────────

/// One prize claim, stored under the participant's identity key.
///
/// Its existence is the only authority for "already claimed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeClaim {
  pub uid:        IdentityKey,
  /// Server-assigned; the document's creation time.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub claimed_at: Option<DateTime<Utc>>,
  /// Set once the wheel has resolved; absent right after the claim.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prize:      Option<String>,
}

impl PrizeClaim {
  /// The body of the conditional create: just the identity reference.
  pub fn claim_fields(key: &IdentityKey) -> Fields {
    let mut fields = Fields::new();
    fields.insert("uid".into(), key.as_str().into());
    fields
  }

  /// The body of the follow-up update.
  pub fn prize_fields(prize: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("prize".into(), prize.into());
    fields
  }

  pub fn from_document(doc: &Document) -> Result<Self> {
    let mut claim: Self = doc.decode()?;
    claim.claimed_at = Some(doc.created_at);
    Ok(claim)
  }
}

#[cfg(test)]
mod tests {
  use rand::{SeedableRng, rngs::StdRng};

  use super::*;

  fn letters() -> PrizeCatalog {
    PrizeCatalog::new(vec![
      PrizeEntry::new("A", 45.0),
      PrizeEntry::new("B", 20.0),
      PrizeEntry::new("C", 10.0),
      PrizeEntry::new("D", 12.5),
      PrizeEntry::new("E", 12.5),
    ])
    .unwrap()
  }

  #[test]
  fn cumulative_walk_matches_boundaries() {
    let c = letters();
    assert_eq!(c.total_weight(), 100.0);
    // A 0–45, B 45–65, C 65–75, D 75–87.5, E 87.5–100.
    assert_eq!(c.select_with_draw(50.0), 1);
    assert_eq!(c.select_with_draw(0.0), 0);
    assert_eq!(c.select_with_draw(44.999), 0);
    assert_eq!(c.select_with_draw(45.0), 1);
    assert_eq!(c.select_with_draw(65.0), 2);
    assert_eq!(c.select_with_draw(74.9), 2);
    assert_eq!(c.select_with_draw(75.0), 3);
    assert_eq!(c.select_with_draw(87.5), 4);
    assert_eq!(c.select_with_draw(99.999), 4);
  }

  #[test]
  fn drift_past_the_total_falls_back_to_first() {
    assert_eq!(letters().select_with_draw(100.0), 0);
    assert_eq!(letters().select_with_draw(1e9), 0);
  }

  #[test]
  fn rejects_invalid_catalogs() {
    assert!(PrizeCatalog::new(vec![]).is_err());
    assert!(PrizeCatalog::new(vec![PrizeEntry::new("x", 0.0)]).is_err());
    assert!(PrizeCatalog::new(vec![PrizeEntry::new("x", -1.0)]).is_err());
    assert!(PrizeCatalog::new(vec![PrizeEntry::new("x", f64::NAN)]).is_err());
    // Each weight is finite but the sum is not.
    let huge = vec![PrizeEntry::new("a", 1e308), PrizeEntry::new("b", 1e308)];
    assert!(PrizeCatalog::new(huge).is_err());
    assert!(serde_json::from_str::<PrizeCatalog>(
      r#"[{"name":"a","weight":1e308},{"name":"b","weight":1e308}]"#
    )
    .is_err());
    assert!(serde_json::from_str::<PrizeCatalog>("[]").is_err());
  }

  #[test]
  fn default_catalog_is_the_shipped_wheel() {
    let c = PrizeCatalog::default();
    assert_eq!(c.len(), 5);
    assert_eq!(c.total_weight(), 100.0);
    assert!(c.contains("Coca lata"));
    assert!(!c.contains("Pizza"));
  }

  #[test]
  fn seeded_sampling_converges_to_weights() {
    let c = letters();
    let mut rng = StdRng::seed_from_u64(7);
    let draws = 100_000;
    let mut counts = [0usize; 5];
    for _ in 0..draws {
      let i = c.select(&mut rng);
      assert!(i < c.len());
      counts[i] += 1;
    }
    for (entry, count) in c.entries().iter().zip(counts) {
      let expected = entry.weight / c.total_weight();
      let observed = count as f64 / draws as f64;
      // Five standard errors at n = 100k is well under one percentage point.
      let tolerance = 5.0 * (expected * (1.0 - expected) / draws as f64).sqrt();
      assert!(
        (observed - expected).abs() < tolerance,
        "{}: expected {expected}, observed {observed}",
        entry.name
      );
    }
  }

  #[test]
  fn spin_lands_on_the_selected_segment() {
    let c = PrizeCatalog::default();
    for index in 0..c.len() {
      for turns in [5, 7, 9] {
        for offset in [0.1, 0.5, 0.89] {
          let rotation = c.spin_target(index, turns, offset);
          assert_eq!(c.landed_index(rotation), index);
          assert!(rotation > f64::from(turns) * 360.0);
        }
      }
    }
  }

  #[test]
  fn planned_spins_always_display_the_recorded_prize() {
    let c = PrizeCatalog::default();
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1_000 {
      let spin = c.plan_spin(&mut rng);
      assert_eq!(c.landed_index(spin.rotation_degrees), spin.index);
      assert_eq!(c.get(spin.index).unwrap().name, spin.prize);
      assert!(spin.rotation_degrees >= 5.0 * 360.0);
      assert!(spin.rotation_degrees < 10.0 * 360.0);
    }
  }

  #[test]
  fn claim_fields_hold_only_the_uid() {
    let key = IdentityKey::parse("11999990000").unwrap();
    let fields = PrizeClaim::claim_fields(&key);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["uid"], "11999990000");
  }
}
